//! Execution Context (§4.3, C3): the state one in-flight tx carries across
//! ladder rungs. The invariants here are what keep the ladder from
//! resubmitting work a completed strategy has already landed.
use crate::types::{eth_tx::EthTx, exec_cfg::ExecCfg, op_res::OpRes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StrategyIdx(pub usize);

#[derive(Debug)]
pub struct ExecCtx {
    pub eth_tx: EthTx,
    pub exec_cfg: ExecCfg,
    pub op_res: OpRes,
    strategy_idx: StrategyIdx,
    /// §3/§4.3 — the sender's on-Chain nonce as most recently observed.
    /// Refreshed by the ladder driver before every strategy attempt and
    /// again after every terminal outcome (§7's `finally` contract); never
    /// touched by an individual strategy.
    pub state_tx_cnt: u64,
    /// Count of `TxStep*` instructions the currently-selected iterative
    /// strategy has already submitted; the `index` field of its next
    /// instruction. Reset only when `strategy_idx` moves — distinct from
    /// [`Self::state_tx_cnt`], which tracks the sender's nonce, not
    /// iteration progress.
    step_index: u32,
    /// §4.4 — whether this rung's holder account has already been created
    /// and fully written; makes `prep_before_emulate` idempotent across
    /// retries instead of rewriting the whole payload every attempt.
    holder_staged: bool,
    completed_receipt: bool,
}

impl ExecCtx {
    #[must_use]
    pub fn new(eth_tx: EthTx, exec_cfg: ExecCfg, op_res: OpRes) -> Self {
        Self {
            eth_tx,
            exec_cfg,
            op_res,
            strategy_idx: StrategyIdx(0),
            state_tx_cnt: 0,
            step_index: 0,
            holder_staged: false,
            completed_receipt: false,
        }
    }

    #[must_use]
    pub fn strategy_idx(&self) -> StrategyIdx {
        self.strategy_idx
    }

    #[must_use]
    pub fn has_completed_receipt(&self) -> bool {
        self.completed_receipt
    }

    /// §4.3 invariant — `strategy_idx` is monotonic non-decreasing and never
    /// advances once a receipt has landed. Panics on violation: this would
    /// be a ladder bug, not a runtime condition callers can recover from.
    pub fn advance_strategy(&mut self, next: StrategyIdx) {
        assert!(!self.completed_receipt, "advancing strategy after a completed receipt");
        assert!(next >= self.strategy_idx, "strategy_idx must not rewind");
        if next != self.strategy_idx {
            self.step_index = 0;
            self.holder_staged = false;
        }
        self.strategy_idx = next;
    }

    #[must_use]
    pub fn step_index(&self) -> u32 {
        self.step_index
    }

    /// Called by an iterative strategy's `execute()` after each landed
    /// `TxStep*` instruction.
    pub fn advance_step_index(&mut self) {
        self.step_index += 1;
    }

    #[must_use]
    pub fn is_holder_staged(&self) -> bool {
        self.holder_staged
    }

    pub fn mark_holder_staged(&mut self) {
        self.holder_staged = true;
    }

    /// §4.3 — once a receipt is observed, `prep_before_emulate` is no longer
    /// callable and only a cancel or a same-strategy step instruction may
    /// follow.
    pub fn mark_completed_receipt(&mut self) {
        self.completed_receipt = true;
    }

    #[must_use]
    pub fn can_prep_before_emulate(&self) -> bool {
        !self.completed_receipt
    }

    /// §4.3 — after completion, the only instructions a strategy may still
    /// emit are `CancelWithHash` or a step instruction belonging to the
    /// strategy already selected.
    #[must_use]
    pub fn can_emit_step_for(&self, strategy: StrategyIdx) -> bool {
        !self.completed_receipt || strategy == self.strategy_idx
    }

    /// §7 — whether the ladder has already landed at least one instruction
    /// for this tx (a step, a holder write, a completed receipt). Gates
    /// whether an abandoned tx is worth recording as a stuck tx: one that
    /// never got an instruction on-Chain has nothing to resume or cancel.
    #[must_use]
    pub fn has_on_chain_progress(&self) -> bool {
        self.completed_receipt || self.step_index > 0 || self.holder_staged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::op_res::{OpRes, OpResId};
    use solana_sdk::{pubkey::Pubkey, signature::Keypair};

    fn test_ctx() -> ExecCtx {
        let raw = sample_rlp();
        let eth_tx = EthTx::from_rlp(&raw).unwrap();
        let exec_cfg = ExecCfg {
            evm_step_cnt: 500,
            used_gas: 21_000,
            accounts_touched: vec![],
            payload_exceeds_budget: false,
            lacks_chain_id: false,
        };
        let holder_address = Pubkey::new_unique();
        let op_res = OpRes {
            id: OpResId { operator_idx: 0, resource_idx: 0 },
            signer: Keypair::new(),
            treasury_pool_index: 0,
            treasury_pool_address: Pubkey::new_unique(),
            holder_address,
            operator_neon_address: Pubkey::new_unique(),
            holder: crate::types::holder::Holder::new(holder_address),
        };
        ExecCtx::new(eth_tx, exec_cfg, op_res)
    }

    fn sample_rlp() -> Vec<u8> {
        let key = libsecp256k1::SecretKey::parse(&[9u8; 32]).unwrap();
        let mut unsigned = rlp::RlpStream::new_list(9);
        unsigned.append(&0u64);
        unsigned.append(&1_000_000_000u64);
        unsigned.append(&21_000u64);
        unsigned.append_empty_data();
        unsigned.append(&0u64);
        unsigned.append_empty_data();
        unsigned.append(&245_022_940u64);
        unsigned.append_empty_data();
        unsigned.append_empty_data();
        let hash = solana_sdk::keccak::hash(&unsigned.out()).to_bytes();
        let message = libsecp256k1::Message::parse(&hash);
        let (signature, recovery_id) = libsecp256k1::sign(&message, &key);
        let sig_bytes = signature.serialize();
        let r = ethnum::U256::from_be_bytes(sig_bytes[0..32].try_into().unwrap());
        let s = ethnum::U256::from_be_bytes(sig_bytes[32..64].try_into().unwrap());
        let v = ethnum::U256::from(245_022_940u64) * ethnum::U256::from(2_u8)
            + ethnum::U256::from(35_u8)
            + ethnum::U256::from(recovery_id.serialize());

        let mut signed = rlp::RlpStream::new_list(9);
        signed.append(&0u64);
        signed.append(&1_000_000_000u64);
        signed.append(&21_000u64);
        signed.append_empty_data();
        signed.append(&0u64);
        signed.append_empty_data();
        signed.append(&v.to_be_bytes().to_vec());
        signed.append(&r.to_be_bytes().to_vec());
        signed.append(&s.to_be_bytes().to_vec());
        signed.out().to_vec()
    }

    #[test]
    fn strategy_idx_cannot_rewind() {
        let mut ctx = test_ctx();
        ctx.advance_strategy(StrategyIdx(2));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ctx.advance_strategy(StrategyIdx(1));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn no_prep_or_rewind_after_completed_receipt() {
        let mut ctx = test_ctx();
        ctx.advance_strategy(StrategyIdx(3));
        ctx.mark_completed_receipt();

        assert!(!ctx.can_prep_before_emulate());
        assert!(ctx.can_emit_step_for(StrategyIdx(3)));
        assert!(!ctx.can_emit_step_for(StrategyIdx(4)));
    }

    #[test]
    fn advancing_strategy_resets_step_index_and_holder_staged_not_nonce_cache() {
        let mut ctx = test_ctx();
        ctx.advance_step_index();
        ctx.mark_holder_staged();
        ctx.state_tx_cnt = 5;

        ctx.advance_strategy(StrategyIdx(1));

        assert_eq!(ctx.step_index(), 0);
        assert!(!ctx.is_holder_staged());
        assert_eq!(ctx.state_tx_cnt, 5, "nonce cache is independent of strategy_idx");
    }
}
