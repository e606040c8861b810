//! Holder-family strategies (§4.4 rungs 5-8): for tx payloads too large to
//! travel inline in any single instruction, calldata is staged into a
//! holder account first via repeated `HolderWrite`, then executed either
//! whole (`SimpleHolder`) or step by step (`Holder`). The `Alt*` variants
//! additionally route the touched-account list through a lookup table.
use async_trait::async_trait;
use solana_sdk::signer::Signer;

use crate::{
    chain_rpc::Rpc,
    errors::ProxyError,
    instruction::{alt, IxBuilder},
    types::{exec_cfg::ExecCfg, exec_ctx::ExecCtx},
};

/// Max bytes of calldata one `HolderWrite` instruction carries, leaving
/// headroom in the transaction's wire-size budget for its account list.
const HOLDER_WRITE_CHUNK_BYTES: usize = 900;

/// Stages the tx's calldata into the holder account, skipping the writes
/// entirely once already staged (§4.4 — `prep_before_emulate` must be
/// idempotent across retry spins). Returns whether it actually wrote
/// anything this call.
///
/// §4.1 open question (resolved, see DESIGN.md) — the holder is reset with
/// an explicit `HolderCreate` rather than trusting an arbitrary prior
/// `Dirty` state to be this tx's own; [`crate::types::holder::Holder::can_write_for`]
/// is the actual exclusivity gate, `HolderCreate` just clears the bytes.
pub(crate) async fn write_calldata_to_holder(
    rpc: &dyn Rpc,
    ix_builder: &IxBuilder,
    ctx: &mut ExecCtx,
) -> Result<bool, ProxyError> {
    if ctx.is_holder_staged() {
        return Ok(false);
    }
    if !ctx.op_res.holder.can_write_for(ctx.eth_tx.tx_sig) {
        return Err(ProxyError::WrongStrategy);
    }

    let create_ix = ix_builder.make_holder_create_ix(&ctx.eth_tx.tx_sig[..]);
    let blockhash = rpc.get_latest_blockhash().await?;
    let create_tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
        &[create_ix],
        Some(&ctx.op_res.signer.pubkey()),
        &[&ctx.op_res.signer],
        blockhash,
    );
    rpc.send_transaction(&create_tx).await?;

    let mut bytes_written = 0usize;
    for (offset, chunk) in ctx.eth_tx.calldata.chunks(HOLDER_WRITE_CHUNK_BYTES).enumerate() {
        let ix = ix_builder.make_holder_write_ix(ctx.eth_tx.tx_sig, (offset * HOLDER_WRITE_CHUNK_BYTES) as u64, chunk);
        let blockhash = rpc.get_latest_blockhash().await?;
        let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
            &[ix],
            Some(&ctx.op_res.signer.pubkey()),
            &[&ctx.op_res.signer],
            blockhash,
        );
        rpc.send_transaction(&tx).await?;
        bytes_written += chunk.len();
    }
    ctx.op_res.holder.begin_write(ctx.eth_tx.tx_sig, bytes_written);
    ctx.mark_holder_staged();
    Ok(true)
}

pub struct SimpleHolder {
    pub ix_builder: IxBuilder,
    pub rpc: std::sync::Arc<dyn Rpc>,
    pub max_accounts_without_alt: usize,
}

#[async_trait]
impl super::Strategy for SimpleHolder {
    fn kind(&self) -> super::StrategyKind {
        super::StrategyKind::SimpleHolder
    }

    fn validate(&self, ctx: &ExecCtx) -> Result<(), ProxyError> {
        if ctx.exec_cfg.lacks_chain_id || ctx.exec_cfg.needs_alt(self.max_accounts_without_alt) {
            return Err(ProxyError::WrongStrategy);
        }
        Ok(())
    }

    async fn prep_before_emulate(&self, ctx: &mut ExecCtx) -> Result<bool, ProxyError> {
        write_calldata_to_holder(self.rpc.as_ref(), &self.ix_builder, ctx).await
    }

    fn update_after_emulate(&self, ctx: &mut ExecCtx, exec_cfg: ExecCfg) {
        ctx.exec_cfg = exec_cfg;
    }

    async fn execute(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        let accounts = ctx.exec_cfg.accounts_touched.clone();
        let ix = self.ix_builder.make_tx_exec_from_account_ix(&accounts);
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
            &[ix],
            Some(&ctx.op_res.signer.pubkey()),
            &[&ctx.op_res.signer],
            blockhash,
        );
        self.rpc.send_transaction(&tx).await?;
        ctx.mark_completed_receipt();
        ctx.op_res.holder.clear();
        Ok(())
    }

    async fn cancel(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        cancel_and_clear_holder(self.rpc.as_ref(), &self.ix_builder, ctx).await
    }
}

pub struct AltSimpleHolder {
    pub ix_builder: IxBuilder,
    pub rpc: std::sync::Arc<dyn Rpc>,
    pub max_accounts_without_alt: usize,
    pub alt: tokio::sync::Mutex<Option<crate::types::alt::AddressLookupTable>>,
}

#[async_trait]
impl super::Strategy for AltSimpleHolder {
    fn kind(&self) -> super::StrategyKind {
        super::StrategyKind::AltSimpleHolder
    }

    fn validate(&self, ctx: &ExecCtx) -> Result<(), ProxyError> {
        if ctx.exec_cfg.lacks_chain_id {
            return Err(ProxyError::WrongStrategy);
        }
        if !ctx.exec_cfg.needs_alt(self.max_accounts_without_alt) {
            return Err(ProxyError::WrongStrategy);
        }
        Ok(())
    }

    async fn prep_before_emulate(&self, ctx: &mut ExecCtx) -> Result<bool, ProxyError> {
        let wrote = write_calldata_to_holder(self.rpc.as_ref(), &self.ix_builder, ctx).await?;
        let alt_created = ensure_alt(self.rpc.as_ref(), &self.alt, ctx).await?;
        Ok(wrote || alt_created)
    }

    fn update_after_emulate(&self, ctx: &mut ExecCtx, exec_cfg: ExecCfg) {
        ctx.exec_cfg = exec_cfg;
    }

    async fn execute(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        let accounts = ctx.exec_cfg.accounts_touched.clone();
        let ix = self.ix_builder.make_tx_exec_from_account_ix(&accounts);
        let guard = self.alt.lock().await;
        let table = guard.as_ref().ok_or(ProxyError::WrongStrategy)?;
        let tx = super::build_versioned_tx(self.rpc.as_ref(), &ctx.op_res.signer, table, vec![ix]).await?;
        self.rpc.send_versioned_transaction(&tx).await?;
        ctx.mark_completed_receipt();
        ctx.op_res.holder.clear();
        Ok(())
    }

    async fn cancel(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        cancel_and_clear_holder_via_alt(self.rpc.as_ref(), &self.ix_builder, &self.alt, ctx).await?;
        deactivate_alt(self.rpc.as_ref(), &self.alt, ctx).await
    }
}

pub struct Holder {
    pub ix_builder: IxBuilder,
    pub rpc: std::sync::Arc<dyn Rpc>,
    pub max_accounts_without_alt: usize,
    pub evm_step_cnt_per_ix: u32,
}

#[async_trait]
impl super::Strategy for Holder {
    fn kind(&self) -> super::StrategyKind {
        super::StrategyKind::Holder
    }

    fn validate(&self, ctx: &ExecCtx) -> Result<(), ProxyError> {
        if ctx.exec_cfg.lacks_chain_id || ctx.exec_cfg.needs_alt(self.max_accounts_without_alt) {
            return Err(ProxyError::WrongStrategy);
        }
        Ok(())
    }

    async fn prep_before_emulate(&self, ctx: &mut ExecCtx) -> Result<bool, ProxyError> {
        write_calldata_to_holder(self.rpc.as_ref(), &self.ix_builder, ctx).await
    }

    fn update_after_emulate(&self, ctx: &mut ExecCtx, exec_cfg: ExecCfg) {
        ctx.exec_cfg = exec_cfg;
    }

    async fn execute(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        let accounts = ctx.exec_cfg.accounts_touched.clone();
        let ix = self.ix_builder.make_tx_step_from_account_ix(&accounts, self.evm_step_cnt_per_ix, ctx.step_index());
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
            &[ix],
            Some(&ctx.op_res.signer.pubkey()),
            &[&ctx.op_res.signer],
            blockhash,
        );
        self.rpc.send_transaction(&tx).await?;
        ctx.advance_step_index();
        if u64::from(self.evm_step_cnt_per_ix) * u64::from(ctx.step_index()) >= ctx.exec_cfg.evm_step_cnt {
            ctx.mark_completed_receipt();
            ctx.op_res.holder.clear();
        }
        Ok(())
    }

    async fn cancel(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        cancel_and_clear_holder(self.rpc.as_ref(), &self.ix_builder, ctx).await
    }
}

pub struct AltHolder {
    pub ix_builder: IxBuilder,
    pub rpc: std::sync::Arc<dyn Rpc>,
    pub max_accounts_without_alt: usize,
    pub evm_step_cnt_per_ix: u32,
    pub alt: tokio::sync::Mutex<Option<crate::types::alt::AddressLookupTable>>,
}

#[async_trait]
impl super::Strategy for AltHolder {
    fn kind(&self) -> super::StrategyKind {
        super::StrategyKind::AltHolder
    }

    fn validate(&self, ctx: &ExecCtx) -> Result<(), ProxyError> {
        if ctx.exec_cfg.lacks_chain_id {
            return Err(ProxyError::WrongStrategy);
        }
        if !ctx.exec_cfg.needs_alt(self.max_accounts_without_alt) {
            return Err(ProxyError::WrongStrategy);
        }
        Ok(())
    }

    async fn prep_before_emulate(&self, ctx: &mut ExecCtx) -> Result<bool, ProxyError> {
        let wrote = write_calldata_to_holder(self.rpc.as_ref(), &self.ix_builder, ctx).await?;
        let alt_created = ensure_alt(self.rpc.as_ref(), &self.alt, ctx).await?;
        Ok(wrote || alt_created)
    }

    fn update_after_emulate(&self, ctx: &mut ExecCtx, exec_cfg: ExecCfg) {
        ctx.exec_cfg = exec_cfg;
    }

    async fn execute(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        let accounts = ctx.exec_cfg.accounts_touched.clone();
        let ix = self.ix_builder.make_tx_step_from_account_ix(&accounts, self.evm_step_cnt_per_ix, ctx.step_index());
        let guard = self.alt.lock().await;
        let table = guard.as_ref().ok_or(ProxyError::WrongStrategy)?;
        let tx = super::build_versioned_tx(self.rpc.as_ref(), &ctx.op_res.signer, table, vec![ix]).await?;
        self.rpc.send_versioned_transaction(&tx).await?;
        ctx.advance_step_index();
        if u64::from(self.evm_step_cnt_per_ix) * u64::from(ctx.step_index()) >= ctx.exec_cfg.evm_step_cnt {
            ctx.mark_completed_receipt();
            ctx.op_res.holder.clear();
        }
        Ok(())
    }

    async fn cancel(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        cancel_and_clear_holder_via_alt(self.rpc.as_ref(), &self.ix_builder, &self.alt, ctx).await?;
        deactivate_alt(self.rpc.as_ref(), &self.alt, ctx).await
    }
}

/// Creates and extends the lookup table once, idempotently. Returns
/// whether it just did so (the holder-family `prep_before_emulate`
/// combines this with the holder-staged bit via OR).
async fn ensure_alt(
    rpc: &dyn Rpc,
    alt_slot: &tokio::sync::Mutex<Option<crate::types::alt::AddressLookupTable>>,
    ctx: &mut ExecCtx,
) -> Result<bool, ProxyError> {
    let mut guard = alt_slot.lock().await;
    if guard.is_some() {
        return Ok(false);
    }
    let slot = rpc.get_slot().await?;
    let (create_ix, table_address) =
        alt::make_create_lookup_table_ix(&ctx.op_res.signer.pubkey(), &ctx.op_res.signer.pubkey(), slot);
    let extend_ix = alt::make_extend_lookup_table_ix(
        &table_address,
        &ctx.op_res.signer.pubkey(),
        &ctx.op_res.signer.pubkey(),
        &ctx.exec_cfg.accounts_touched,
    );
    let blockhash = rpc.get_latest_blockhash().await?;
    let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
        &[create_ix, extend_ix],
        Some(&ctx.op_res.signer.pubkey()),
        &[&ctx.op_res.signer],
        blockhash,
    );
    rpc.send_transaction(&tx).await?;
    let mut table = crate::types::alt::AddressLookupTable::new(table_address, ctx.op_res.signer.pubkey(), slot);
    table.extend(&ctx.exec_cfg.accounts_touched, slot);
    *guard = Some(table);
    Ok(true)
}

async fn deactivate_alt(
    rpc: &dyn Rpc,
    alt_slot: &tokio::sync::Mutex<Option<crate::types::alt::AddressLookupTable>>,
    ctx: &mut ExecCtx,
) -> Result<(), ProxyError> {
    if let Some(alt) = alt_slot.lock().await.as_mut() {
        let deactivate_ix = alt::make_deactivate_lookup_table_ix(&alt.table_account, &ctx.op_res.signer.pubkey());
        let blockhash = rpc.get_latest_blockhash().await?;
        let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
            &[deactivate_ix],
            Some(&ctx.op_res.signer.pubkey()),
            &[&ctx.op_res.signer],
            blockhash,
        );
        rpc.send_transaction(&tx).await?;
        alt.deactivate(rpc.get_slot().await?);
    }
    Ok(())
}

pub(crate) async fn cancel_and_clear_holder(rpc: &dyn Rpc, ix_builder: &IxBuilder, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
    let accounts = ctx.exec_cfg.accounts_touched.clone();
    let ix = ix_builder.make_cancel_ix(ctx.eth_tx.tx_sig, &accounts);
    let blockhash = rpc.get_latest_blockhash().await?;
    let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
        &[ix],
        Some(&ctx.op_res.signer.pubkey()),
        &[&ctx.op_res.signer],
        blockhash,
    );
    rpc.send_transaction(&tx).await?;

    let delete_ix = ix_builder.make_holder_delete_ix();
    let blockhash = rpc.get_latest_blockhash().await?;
    let delete_tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
        &[delete_ix],
        Some(&ctx.op_res.signer.pubkey()),
        &[&ctx.op_res.signer],
        blockhash,
    );
    rpc.send_transaction(&delete_tx).await?;

    ctx.op_res.holder.clear();
    Ok(())
}

/// As [`cancel_and_clear_holder`], but sends the `CancelWithHash` through
/// `table` since the Alt* rungs never built a legacy account list for it.
pub(crate) async fn cancel_and_clear_holder_via_alt(
    rpc: &dyn Rpc,
    ix_builder: &IxBuilder,
    alt_slot: &tokio::sync::Mutex<Option<crate::types::alt::AddressLookupTable>>,
    ctx: &mut ExecCtx,
) -> Result<(), ProxyError> {
    let guard = alt_slot.lock().await;
    let Some(table) = guard.as_ref() else {
        drop(guard);
        return cancel_and_clear_holder(rpc, ix_builder, ctx).await;
    };

    let accounts = ctx.exec_cfg.accounts_touched.clone();
    let ix = ix_builder.make_cancel_ix(ctx.eth_tx.tx_sig, &accounts);
    let tx = super::build_versioned_tx(rpc, &ctx.op_res.signer, table, vec![ix]).await?;
    rpc.send_versioned_transaction(&tx).await?;
    drop(guard);

    let delete_ix = ix_builder.make_holder_delete_ix();
    let blockhash = rpc.get_latest_blockhash().await?;
    let delete_tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
        &[delete_ix],
        Some(&ctx.op_res.signer.pubkey()),
        &[&ctx.op_res.signer],
        blockhash,
    );
    rpc.send_transaction(&delete_tx).await?;

    ctx.op_res.holder.clear();
    Ok(())
}
