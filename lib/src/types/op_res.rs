//! Operator Resource pool (§4.1, §5): the operator keypairs, holder
//! accounts, and treasury slots the ladder borrows for the lifetime of one
//! `ExecCtx`. The pool's only invariant: at most one in-flight tx per
//! `OpRes` at a time.
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use tokio::sync::Mutex;

use crate::types::holder::Holder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpResId {
    pub operator_idx: u32,
    pub resource_idx: u32,
}

/// One operator's resource slot: a signer, its treasury pool PDA, and the
/// holder account reserved for this slot. `treasury_pool_index`/
/// `treasury_pool_address` are this slot's own pool — distinct from the tx's
/// pool, which `build_ladder` derives fresh per tx from the tx hash.
pub struct OpRes {
    pub id: OpResId,
    pub signer: Keypair,
    pub treasury_pool_index: u32,
    pub treasury_pool_address: Pubkey,
    pub holder_address: Pubkey,
    /// This operator's gas-tank account, derived via
    /// `instruction::operator_ether_address` + `ether_account_address`.
    pub operator_neon_address: Pubkey,
    pub holder: Holder,
}

impl std::fmt::Debug for OpRes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpRes")
            .field("id", &self.id)
            .field("signer", &self.signer.pubkey())
            .field("treasury_pool_index", &self.treasury_pool_index)
            .field("treasury_pool_address", &self.treasury_pool_address)
            .field("holder_address", &self.holder_address)
            .field("operator_neon_address", &self.operator_neon_address)
            .field("holder", &self.holder)
            .finish()
    }
}

/// Pool of [`OpRes`] slots guarded by one lock per slot. `acquire` never
/// blocks the whole pool on a single busy slot — callers scan for the first
/// free slot and move on if none is free.
pub struct OpResPool {
    slots: Vec<Mutex<Option<OpRes>>>,
}

impl OpResPool {
    #[must_use]
    pub fn new(resources: Vec<OpRes>) -> Self {
        Self {
            slots: resources.into_iter().map(|r| Mutex::new(Some(r))).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Scans for the first slot not currently held and removes it from the
    /// pool for the duration of the caller's tx. Returns `None` if every
    /// slot is in use; callers treat this as "reschedule" (§7), not an
    /// error.
    pub async fn try_acquire(&self) -> Option<OpRes> {
        for slot in &self.slots {
            let mut guard = slot.lock().await;
            if let Some(resource) = guard.take() {
                return Some(resource);
            }
        }
        None
    }

    /// Returns a resource to its slot by id. A caller that hit corrupt
    /// on-chain state should reinitialize the resource's signer-visible
    /// accounts before calling this, per §4.1's "force-reinitialize on
    /// corrupt state".
    pub async fn release(&self, resource: OpRes) {
        for slot in &self.slots {
            let mut guard = slot.lock().await;
            if guard.is_none() {
                *guard = Some(resource);
                return;
            }
        }
        debug_assert!(false, "released an OpRes into a pool with no free slot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_resource(idx: u32) -> OpRes {
        let holder_address = Pubkey::new_unique();
        OpRes {
            id: OpResId { operator_idx: 0, resource_idx: idx },
            signer: Keypair::new(),
            treasury_pool_index: idx,
            treasury_pool_address: Pubkey::new_unique(),
            holder_address,
            operator_neon_address: Pubkey::new_unique(),
            holder: Holder::new(holder_address),
        }
    }

    #[tokio::test]
    async fn acquire_removes_slot_until_released() {
        let pool = OpResPool::new(vec![test_resource(0)]);
        let resource = pool.try_acquire().await.expect("one free slot");
        assert!(pool.try_acquire().await.is_none());

        pool.release(resource).await;
        assert!(pool.try_acquire().await.is_some());
    }

    #[tokio::test]
    async fn independent_slots_acquire_concurrently() {
        let pool = OpResPool::new(vec![test_resource(0), test_resource(1)]);
        let first = pool.try_acquire().await.expect("slot 0");
        let second = pool.try_acquire().await.expect("slot 1");
        assert_ne!(first.id, second.id);
        assert!(pool.try_acquire().await.is_none());
    }
}
