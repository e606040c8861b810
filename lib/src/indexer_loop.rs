//! Indexer Loop (§4.7, C7): resolves where historical ingestion should
//! resume from, then drives `process` on a fixed-interval tick forever.
//! Grounded in `indexer_base.py`'s `IndexerBase`.
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use solana_sdk::commitment_config::CommitmentConfig;

use crate::{chain_rpc::Rpc, config::StartSlot, errors::ProxyError};

/// §4.7 — resolves the slot indexing should (re)start from given the
/// configured [`StartSlot`] policy and the last slot persisted by a
/// previous run (`0` if there was none).
///
/// - `Latest` always starts from the Chain's current finalized slot.
/// - `Continue` resumes `last_known_slot` if one exists, else falls back
///   to `Latest`.
/// - `Number(n)` starts from `min(n, latest_slot)`, unless `last_known_slot`
///   is already further along, in which case that takes precedence.
///
/// # Errors
/// Propagates [`Rpc::get_slot`] failures.
pub async fn resolve_start_slot(
    rpc: &dyn Rpc,
    start_slot: &StartSlot,
    last_known_slot: u64,
) -> Result<u64, ProxyError> {
    let latest_slot = rpc.get_slot().await?;

    let start_int_slot = match start_slot {
        StartSlot::Number(n) => (*n).min(latest_slot),
        StartSlot::Latest | StartSlot::Continue => 0,
    };

    if matches!(start_slot, StartSlot::Continue) {
        if last_known_slot > 0 {
            info!("resuming indexer from previous run at slot {last_known_slot}");
            return Ok(last_known_slot);
        }
        info!("no previous run recorded, starting indexer from the latest slot");
        return Ok(latest_slot);
    }

    if matches!(start_slot, StartSlot::Latest) {
        info!("starting indexer from the latest slot {latest_slot}");
        return Ok(latest_slot);
    }

    if start_int_slot < last_known_slot {
        info!("configured start slot is behind the previous run, resuming from slot {last_known_slot}");
        return Ok(last_known_slot);
    }

    info!("starting indexer from configured slot {start_int_slot}");
    Ok(start_int_slot)
}

/// One tick of ingestion work: fetch and persist whatever transactions,
/// blocks, and logs have landed since the last call. Implementations own
/// their own cursor/offset state between calls.
#[async_trait]
pub trait IndexerTick: Send + Sync {
    async fn process(&mut self) -> Result<(), ProxyError>;
}

/// §4.7 — runs `tick.process()` on a fixed-interval timer, forever. A
/// single tick's failure is logged and swallowed so one bad slot range
/// doesn't stop ingestion; `Reschedule`-labeled failures and genuine RPC
/// errors are both handled the same way here, matching the original's
/// catch-all around `process_functions`.
pub async fn run<T: IndexerTick + ?Sized>(tick: &mut T, check_interval: std::time::Duration) -> ! {
    loop {
        if let Err(err) = tick.process().await {
            warn!("indexer tick failed, will retry next interval: {err}");
        }
        tokio::time::sleep(check_interval).await;
    }
}

/// §4.7 — the slot the indexer should treat as `get_first_available_block`:
/// the resolved start slot never precedes the Chain's own retention floor.
///
/// # Errors
/// Propagates [`Rpc::get_slot`] failures.
pub async fn clamp_to_first_available(rpc: &dyn Rpc, start_slot: u64, first_available_slot: u64) -> Result<u64, ProxyError> {
    let _ = rpc.commitment();
    Ok(start_slot.max(first_available_slot))
}

/// Convenience bundle an indexer binary constructs once at startup: the
/// resolved starting slot plus the commitment the ingestion loop polls at.
pub struct IndexerStart {
    pub start_slot: u64,
    pub poll_commitment: CommitmentConfig,
}

/// # Errors
/// Propagates [`resolve_start_slot`] / [`clamp_to_first_available`] failures.
pub async fn init(
    rpc: Arc<dyn Rpc>,
    start_slot_policy: &StartSlot,
    last_known_slot: u64,
    first_available_slot: u64,
) -> Result<IndexerStart, ProxyError> {
    let resolved = resolve_start_slot(rpc.as_ref(), start_slot_policy, last_known_slot).await?;
    let start_slot = clamp_to_first_available(rpc.as_ref(), resolved, first_available_slot).await?;
    info!("indexer start slot resolved to {start_slot} (first available: {first_available_slot})");
    Ok(IndexerStart { start_slot, poll_commitment: CommitmentConfig::finalized() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use solana_client::client_error::Result as ClientResult;
    use solana_sdk::{
        account::Account, clock::Slot, hash::Hash, pubkey::Pubkey, signature::Signature,
        transaction::{Transaction, VersionedTransaction},
    };

    struct FixedSlotRpc(Slot);

    #[async_trait]
    impl Rpc for FixedSlotRpc {
        fn commitment(&self) -> CommitmentConfig {
            CommitmentConfig::finalized()
        }
        async fn get_account(&self, _key: &Pubkey) -> ClientResult<Option<Account>> {
            Ok(None)
        }
        async fn get_multiple_accounts(&self, _keys: &[Pubkey]) -> ClientResult<Vec<Option<Account>>> {
            Ok(vec![])
        }
        async fn get_balance(&self, _key: &Pubkey) -> ClientResult<u64> {
            Ok(0)
        }
        async fn get_slot(&self) -> ClientResult<Slot> {
            Ok(self.0)
        }
        async fn get_latest_blockhash(&self) -> ClientResult<Hash> {
            Ok(Hash::default())
        }
        async fn get_signature_status(&self, _signature: &Signature) -> ClientResult<Option<bool>> {
            Ok(None)
        }
        async fn get_cluster_nodes_count(&self) -> ClientResult<usize> {
            Ok(1)
        }
        async fn send_transaction(&self, _transaction: &Transaction) -> ClientResult<Signature> {
            Ok(Signature::default())
        }
        async fn send_versioned_transaction(&self, _transaction: &VersionedTransaction) -> ClientResult<Signature> {
            Ok(Signature::default())
        }
    }

    #[tokio::test]
    async fn latest_policy_always_returns_current_slot() {
        let rpc = FixedSlotRpc(500);
        let slot = resolve_start_slot(&rpc, &StartSlot::Latest, 100).await.unwrap();
        assert_eq!(slot, 500);
    }

    #[tokio::test]
    async fn continue_policy_resumes_previous_run_when_present() {
        let rpc = FixedSlotRpc(500);
        let slot = resolve_start_slot(&rpc, &StartSlot::Continue, 123).await.unwrap();
        assert_eq!(slot, 123);
    }

    #[tokio::test]
    async fn continue_policy_falls_back_to_latest_with_no_previous_run() {
        let rpc = FixedSlotRpc(500);
        let slot = resolve_start_slot(&rpc, &StartSlot::Continue, 0).await.unwrap();
        assert_eq!(slot, 500);
    }

    #[tokio::test]
    async fn number_policy_prefers_further_along_previous_run() {
        let rpc = FixedSlotRpc(500);
        let slot = resolve_start_slot(&rpc, &StartSlot::Number(50), 200).await.unwrap();
        assert_eq!(slot, 200);
    }

    #[tokio::test]
    async fn number_policy_is_capped_by_latest_slot() {
        let rpc = FixedSlotRpc(500);
        let slot = resolve_start_slot(&rpc, &StartSlot::Number(10_000), 0).await.unwrap();
        assert_eq!(slot, 500);
    }

    #[tokio::test]
    async fn clamp_never_goes_below_first_available_slot() {
        let rpc = FixedSlotRpc(500);
        let slot = clamp_to_first_available(&rpc, 10, 100).await.unwrap();
        assert_eq!(slot, 100);
    }
}
