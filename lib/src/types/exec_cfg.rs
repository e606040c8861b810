//! `ExecCfg` (§4.1): the sizing hints the emulator produces and the strategy
//! ladder consumes to pick a starting rung and to size iterative steps.
use solana_sdk::pubkey::Pubkey;

/// Raw result of an emulation pass, before it's folded into an [`ExecCfg`].
#[derive(Debug, Clone)]
pub struct EmulationOutcome {
    pub steps_executed: u64,
    pub used_gas: u64,
    pub exit_status: String,
    pub accounts_touched: Vec<Pubkey>,
    /// True when the emulator reports the tx cannot complete in a single
    /// transaction's compute/account budget.
    pub exceeds_single_tx_budget: bool,
    /// The sender's on-Chain nonce as observed by this emulation pass
    /// (§3/§4.3 `state_tx_cnt`); the emulator reads the same account state
    /// it walks to produce `accounts_touched`, so this rides along with
    /// every emulation rather than needing a separate Chain RPC round trip.
    pub state_tx_cnt: u64,
}

#[derive(Debug, Clone)]
pub struct ExecCfg {
    /// Number of EVM steps the emulator reported, rounded up to the ladder's
    /// step granularity. Drives the iterative strategies' step count.
    pub evm_step_cnt: u64,
    pub used_gas: u64,
    /// Chain accounts the emulator touched; candidates for an Address
    /// Lookup Table when the account list would otherwise overflow a
    /// single transaction's account limit.
    pub accounts_touched: Vec<Pubkey>,
    /// §4.4 step 1 — payload/account-list size exceeds what any
    /// non-holder strategy can carry in one transaction.
    pub payload_exceeds_budget: bool,
    /// §4.2 — the decoded tx omitted a chain id (`EthTx::chain_id.is_none()`).
    pub lacks_chain_id: bool,
}

impl ExecCfg {
    #[must_use]
    pub fn from_emulation(outcome: &EmulationOutcome, lacks_chain_id: bool, step_granularity: u64) -> Self {
        let evm_step_cnt = round_up(outcome.steps_executed, step_granularity);
        Self {
            evm_step_cnt,
            used_gas: outcome.used_gas,
            accounts_touched: outcome.accounts_touched.clone(),
            payload_exceeds_budget: outcome.exceeds_single_tx_budget,
            lacks_chain_id,
        }
    }

    /// §4.4 step 1 — an Address Lookup Table is needed once the touched
    /// account list would no longer fit a single transaction's account
    /// references alongside the Chain-Instruction accounts.
    #[must_use]
    pub fn needs_alt(&self, max_accounts_without_alt: usize) -> bool {
        self.accounts_touched.len() > max_accounts_without_alt
    }
}

fn round_up(value: u64, granularity: u64) -> u64 {
    if granularity == 0 {
        return value;
    }
    value.div_ceil(granularity) * granularity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_count_rounds_up_to_granularity() {
        let outcome = EmulationOutcome {
            steps_executed: 251,
            used_gas: 21_000,
            exit_status: "succeed".to_owned(),
            accounts_touched: vec![],
            exceeds_single_tx_budget: false,
            state_tx_cnt: 0,
        };
        let cfg = ExecCfg::from_emulation(&outcome, false, 500);
        assert_eq!(cfg.evm_step_cnt, 500);
    }

    #[test]
    fn needs_alt_when_touched_accounts_exceed_budget() {
        let outcome = EmulationOutcome {
            steps_executed: 0,
            used_gas: 0,
            exit_status: "succeed".to_owned(),
            accounts_touched: vec![Pubkey::new_unique(); 30],
            exceeds_single_tx_budget: false,
            state_tx_cnt: 0,
        };
        let cfg = ExecCfg::from_emulation(&outcome, false, 500);
        assert!(cfg.needs_alt(20));
        assert!(!cfg.needs_alt(40));
    }
}
