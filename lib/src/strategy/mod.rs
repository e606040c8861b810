//! Strategy Ladder (§4.4, C4): tries each strategy in a fixed order until
//! one both applies to the tx and lands a receipt. Grounded in the
//! reference's `NeonTxSendStrategyExecutor`; its Python exception-driven
//! control flow (`Reschedule`/`WrongStrategy` raised and caught) is
//! re-architected here as [`ProxyError`] variants a driver loop matches on,
//! since Rust has no cheap stack-unwinding equivalent worth reaching for.
pub mod holder;
pub mod iterative;
pub mod no_chain_id;
pub mod simple;

use async_trait::async_trait;
use solana_sdk::{
    address_lookup_table_account::AddressLookupTableAccount, instruction::Instruction, message::{v0, VersionedMessage},
    signature::Keypair, signer::Signer, transaction::VersionedTransaction,
};

use crate::{
    chain_rpc::Rpc,
    emulator::Emulator,
    errors::ProxyError,
    types::{
        alt::AddressLookupTable,
        exec_cfg::ExecCfg,
        exec_ctx::{ExecCtx, StrategyIdx},
    },
};

/// Ordered cheapest-first; the driver advances to the next rung only when
/// the current one declines with [`ProxyError::WrongStrategy`] or
/// [`ProxyError::BigTx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Simple,
    AltSimple,
    Iterative,
    AltIterative,
    SimpleHolder,
    AltSimpleHolder,
    Holder,
    AltHolder,
    NoChainId,
    AltNoChainId,
}

pub const LADDER_ORDER: [StrategyKind; 10] = [
    StrategyKind::Simple,
    StrategyKind::AltSimple,
    StrategyKind::Iterative,
    StrategyKind::AltIterative,
    StrategyKind::SimpleHolder,
    StrategyKind::AltSimpleHolder,
    StrategyKind::Holder,
    StrategyKind::AltHolder,
    StrategyKind::NoChainId,
    StrategyKind::AltNoChainId,
];

/// One rung of the ladder. Every method borrows the shared [`ExecCtx`]
/// mutably for its own step; the driver is the only caller that sequences
/// them, per §4.3's invariant that `strategy_idx` only moves forward.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Declines with [`ProxyError::WrongStrategy`] if this rung doesn't fit
    /// `ctx` (wrong chain-id-ness, payload size, ALT-need mismatch) and
    /// [`ProxyError::BigTx`] if no later rung would fit either.
    fn validate(&self, ctx: &ExecCtx) -> Result<(), ProxyError>;

    /// Anything that must happen before the next emulation pass: holder
    /// writes, ALT creation/extension. No-op for the `Simple` family.
    /// Returns whether it changed `ctx`'s on-chain state (`has_changes`) —
    /// the driver re-emulates and spins on this rung while it keeps
    /// reporting `true`, and only calls [`Self::execute`] once it settles
    /// to `false`.
    async fn prep_before_emulate(&self, ctx: &mut ExecCtx) -> Result<bool, ProxyError>;

    /// Folds a fresh emulation pass's [`crate::types::exec_cfg::ExecCfg`]
    /// back into `ctx` once [`Self::prep_before_emulate`] has run.
    fn update_after_emulate(&self, ctx: &mut ExecCtx, exec_cfg: crate::types::exec_cfg::ExecCfg);

    /// Builds and sends this rung's next instruction. Returns
    /// [`ProxyError::Reschedule`] on a transient send failure the driver
    /// should retry, subject to `retry_on_fail`.
    async fn execute(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError>;

    fn has_completed_receipt(&self, ctx: &ExecCtx) -> bool {
        ctx.has_completed_receipt()
    }

    /// Unwinds any holder/ALT state this rung left behind. Called by the
    /// driver when the ladder gives up or the caller explicitly cancels.
    async fn cancel(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError>;
}

/// §4.4 — builds and signs a `V0` transaction that resolves `instructions`'
/// accounts against `alt` instead of listing them inline. Every Alt* rung
/// goes through this rather than a legacy [`solana_sdk::transaction::Transaction`]
/// once it has created a table, or the table it paid to create never gets used.
pub(crate) async fn build_versioned_tx(
    rpc: &dyn Rpc,
    payer: &Keypair,
    alt: &AddressLookupTable,
    instructions: Vec<Instruction>,
) -> Result<VersionedTransaction, ProxyError> {
    let blockhash = rpc.get_latest_blockhash().await?;
    let lookup_table = AddressLookupTableAccount { key: alt.table_account, addresses: alt.addresses.clone() };
    let message = v0::Message::try_compile(&payer.pubkey(), &instructions, &[lookup_table], blockhash)
        .map_err(|err| ProxyError::InvalidParam { field: "alt_message".to_owned(), reason: err.to_string() })?;
    Ok(VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])?)
}

/// How many times the driver lets a single rung's [`Strategy::prep_before_emulate`]
/// report `has_changes` before giving up on it. This bounds the
/// prep/re-emulate convergence spin, not [`ProxyError::Reschedule`] — a
/// Reschedule always propagates to the caller immediately (§4.4/§7).
pub const RETRY_ON_FAIL: u32 = 10;

/// Drives `ctx` through [`LADDER_ORDER`] starting at `ctx.strategy_idx()`,
/// calling into `strategies` (which must be indexed the same way) until one
/// rung reports a completed receipt. Returns [`ProxyError::BigTx`] if every
/// rung declines and [`ProxyError::NoMoreRetries`] if a rung's
/// `prep_before_emulate`/re-emulate spin never converges.
///
/// Whatever the outcome, `ctx.state_tx_cnt` is refreshed one last time
/// before returning (§7's `finally` contract) so a caller that requeues the
/// tx sees the freshest nonce.
pub async fn run_ladder(
    ctx: &mut ExecCtx,
    strategies: &[Box<dyn Strategy>; 10],
    emulator: &dyn Emulator,
    step_granularity: u64,
) -> Result<(), ProxyError> {
    let result = run_ladder_inner(ctx, strategies, emulator, step_granularity).await;

    if let Ok(outcome) = emulator.emulate(&ctx.eth_tx).await {
        ctx.state_tx_cnt = outcome.state_tx_cnt;
    }

    result
}

async fn run_ladder_inner(
    ctx: &mut ExecCtx,
    strategies: &[Box<dyn Strategy>; 10],
    emulator: &dyn Emulator,
    step_granularity: u64,
) -> Result<(), ProxyError> {
    if !ctx.has_completed_receipt() {
        let outcome = emulator.emulate(&ctx.eth_tx).await?;
        ctx.state_tx_cnt = outcome.state_tx_cnt;
        if ctx.eth_tx.nonce < ctx.state_tx_cnt {
            let sender = hex::encode(ctx.eth_tx.recover_sender()?);
            return Err(ProxyError::NonceTooLow(sender, ctx.eth_tx.nonce, ctx.state_tx_cnt));
        }
        if ctx.eth_tx.nonce > ctx.state_tx_cnt {
            let sender = hex::encode(ctx.eth_tx.recover_sender()?);
            return Err(ProxyError::NonceTooHigh(sender, ctx.eth_tx.nonce, ctx.state_tx_cnt));
        }
    }

    'outer: for idx in ctx.strategy_idx().0..strategies.len() {
        let strategy = &strategies[idx];
        if let Err(err) = strategy.validate(ctx) {
            match err {
                ProxyError::WrongStrategy => continue,
                other => return Err(other),
            }
        }

        ctx.advance_strategy(StrategyIdx(idx));

        let mut retry = 0u32;
        loop {
            let has_changes = if ctx.can_prep_before_emulate() {
                strategy.prep_before_emulate(ctx).await?
            } else {
                false
            };

            if (has_changes || retry == 0) && !ctx.has_completed_receipt() {
                let outcome = emulator.emulate(&ctx.eth_tx).await?;
                let exec_cfg = ExecCfg::from_emulation(&outcome, ctx.exec_cfg.lacks_chain_id, step_granularity);
                strategy.update_after_emulate(ctx, exec_cfg);
            }

            if has_changes {
                retry += 1;
                if retry >= RETRY_ON_FAIL {
                    return Err(ProxyError::NoMoreRetries);
                }
                continue;
            }

            match strategy.execute(ctx).await {
                Ok(()) => break,
                Err(ProxyError::Reschedule) => return Err(ProxyError::Reschedule),
                Err(ProxyError::WrongStrategy) => {
                    if ctx.has_completed_receipt() {
                        strategy.cancel(ctx).await?;
                        return Err(ProxyError::WrongStrategy);
                    }
                    continue 'outer;
                }
                Err(other) => {
                    strategy.cancel(ctx).await?;
                    return Err(other);
                }
            }
        }

        if strategy.has_completed_receipt(ctx) {
            return Ok(());
        }
    }

    Err(ProxyError::BigTx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_order_has_ten_distinct_rungs() {
        let mut seen = std::collections::HashSet::new();
        for kind in LADDER_ORDER {
            assert!(seen.insert(kind), "duplicate rung {kind:?}");
        }
        assert_eq!(seen.len(), 10);
    }
}
