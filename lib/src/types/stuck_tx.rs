//! Stuck-transaction records (§4.3, §7): what the indexer or a restarted
//! mempool needs to resume or cancel a tx whose `ExecCtx` was lost (process
//! restart, operator crash) but whose on-chain state (holder, ALT) survives.
use solana_sdk::pubkey::Pubkey;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct StuckTxRecord {
    pub tx_sig: [u8; 32],
    pub sender: [u8; 20],
    pub nonce: u64,
    pub holder_address: Option<Pubkey>,
    pub alt_addresses: Vec<Pubkey>,
    /// Wall-clock age since this record's last observed on-chain activity;
    /// the indexer surfaces records older than its abandon threshold as
    /// cancellation candidates.
    pub age: Duration,
    /// When this record was created; `age` is recomputed from this on every
    /// scan rather than incremented by hand.
    #[allow(dead_code)]
    first_seen: Option<Instant>,
}

impl StuckTxRecord {
    #[must_use]
    pub fn new(
        tx_sig: [u8; 32],
        sender: [u8; 20],
        nonce: u64,
        holder_address: Option<Pubkey>,
        alt_addresses: Vec<Pubkey>,
    ) -> Self {
        Self { tx_sig, sender, nonce, holder_address, alt_addresses, age: Duration::ZERO, first_seen: Some(Instant::now()) }
    }

    #[must_use]
    pub fn is_abandoned(&self, abandon_after: Duration) -> bool {
        self.age >= abandon_after
    }

    /// Recomputes `age` from `first_seen`; a no-op for records built with a
    /// literal `age` (e.g. in tests) that never set `first_seen`.
    pub fn refresh_age(&mut self) {
        if let Some(first_seen) = self.first_seen {
            self.age = first_seen.elapsed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abandoned_once_age_reaches_threshold() {
        let record = StuckTxRecord {
            tx_sig: [0u8; 32],
            sender: [0u8; 20],
            nonce: 0,
            holder_address: None,
            alt_addresses: vec![],
            age: Duration::from_secs(3_600),
            first_seen: None,
        };
        assert!(record.is_abandoned(Duration::from_secs(1_800)));
        assert!(!record.is_abandoned(Duration::from_secs(7_200)));
    }
}
