//! Holder account lifecycle (§4.1, open question resolved in DESIGN.md):
//! the staging account the Holder-family strategies write oversized
//! calldata into before execution.
use solana_sdk::pubkey::Pubkey;

/// `Dirty` — written by a previous tx and not yet cleared.
/// `Cleared` — zeroed and safe to write fresh calldata into.
/// `Free` — never written, or cleared and released back to the pool.
///
/// Transitions: `Free|Cleared -> Dirty` on `HolderWrite`; `Dirty -> Cleared`
/// on a completed execution, an explicit `HolderCreate`/reset, or a
/// `CancelWithHash` against the holder's own tx; `Cleared -> Free` when the
/// holder is returned to the [`crate::types::op_res::OpResPool`] as part of
/// its owning [`crate::types::op_res::OpRes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderState {
    Free,
    Cleared,
    Dirty,
}

#[derive(Debug, Clone)]
pub struct Holder {
    pub address: Pubkey,
    pub state: HolderState,
    /// Set once the first `HolderWrite` lands; identifies which tx's
    /// calldata currently occupies the account.
    pub holding_tx_sig: Option<[u8; 32]>,
    pub bytes_written: usize,
}

impl Holder {
    #[must_use]
    pub fn new(address: Pubkey) -> Self {
        Self { address, state: HolderState::Free, holding_tx_sig: None, bytes_written: 0 }
    }

    /// §4.4 — a Holder-family strategy may write into this account only if
    /// it is free, already cleared, or already holds the same tx (a resumed
    /// multi-step write).
    #[must_use]
    pub fn can_write_for(&self, tx_sig: [u8; 32]) -> bool {
        match self.state {
            HolderState::Free | HolderState::Cleared => true,
            HolderState::Dirty => self.holding_tx_sig == Some(tx_sig),
        }
    }

    pub fn begin_write(&mut self, tx_sig: [u8; 32], bytes: usize) {
        self.state = HolderState::Dirty;
        self.holding_tx_sig = Some(tx_sig);
        self.bytes_written = bytes;
    }

    /// Called once a tx held by this account reaches a completed receipt or
    /// is cancelled.
    pub fn clear(&mut self) {
        self.state = HolderState::Cleared;
        self.holding_tx_sig = None;
        self.bytes_written = 0;
    }

    pub fn release(&mut self) {
        debug_assert_ne!(self.state, HolderState::Dirty, "releasing a dirty holder loses calldata");
        self.state = HolderState::Free;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_holder_only_writable_by_its_own_tx() {
        let mut holder = Holder::new(Pubkey::new_unique());
        let tx_a = [1u8; 32];
        let tx_b = [2u8; 32];

        holder.begin_write(tx_a, 128);
        assert!(holder.can_write_for(tx_a));
        assert!(!holder.can_write_for(tx_b));

        holder.clear();
        assert!(holder.can_write_for(tx_b));
    }
}
