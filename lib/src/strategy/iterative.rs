//! Iterative and ALT-Iterative strategies (§4.4 rungs 3-4): the tx executes
//! across multiple `TxStepFromData` instructions, `evm_step_cnt` steps per
//! instruction, when the payload is small enough to travel inline but too
//! large or too compute-heavy for a single instruction.
use async_trait::async_trait;
use solana_sdk::signer::Signer;

use crate::{
    chain_rpc::Rpc,
    errors::ProxyError,
    instruction::{alt, IxBuilder},
    types::{exec_cfg::ExecCfg, exec_ctx::ExecCtx},
};

async fn send_step(
    rpc: &dyn Rpc,
    ix_builder: &IxBuilder,
    ctx: &mut ExecCtx,
    evm_step_cnt: u32,
    accounts: &[solana_sdk::pubkey::Pubkey],
) -> Result<(), ProxyError> {
    let ix = ix_builder.make_tx_step_from_data_ix(&ctx.eth_tx, accounts, evm_step_cnt, ctx.step_index());
    let blockhash = rpc.get_latest_blockhash().await?;
    let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
        &[ix],
        Some(&ctx.op_res.signer.pubkey()),
        &[&ctx.op_res.signer],
        blockhash,
    );
    rpc.send_transaction(&tx).await?;
    ctx.advance_step_index();
    if u64::from(evm_step_cnt) * u64::from(ctx.step_index()) >= ctx.exec_cfg.evm_step_cnt {
        ctx.mark_completed_receipt();
    }
    Ok(())
}

async fn send_step_via_alt(
    rpc: &dyn Rpc,
    ix_builder: &IxBuilder,
    ctx: &mut ExecCtx,
    evm_step_cnt: u32,
    accounts: &[solana_sdk::pubkey::Pubkey],
    table: &crate::types::alt::AddressLookupTable,
) -> Result<(), ProxyError> {
    let ix = ix_builder.make_tx_step_from_data_ix(&ctx.eth_tx, accounts, evm_step_cnt, ctx.step_index());
    let tx = super::build_versioned_tx(rpc, &ctx.op_res.signer, table, vec![ix]).await?;
    rpc.send_versioned_transaction(&tx).await?;
    ctx.advance_step_index();
    if u64::from(evm_step_cnt) * u64::from(ctx.step_index()) >= ctx.exec_cfg.evm_step_cnt {
        ctx.mark_completed_receipt();
    }
    Ok(())
}

pub struct Iterative {
    pub ix_builder: IxBuilder,
    pub rpc: std::sync::Arc<dyn Rpc>,
    pub max_accounts_without_alt: usize,
    pub evm_step_cnt_per_ix: u32,
}

#[async_trait]
impl super::Strategy for Iterative {
    fn kind(&self) -> super::StrategyKind {
        super::StrategyKind::Iterative
    }

    fn validate(&self, ctx: &ExecCtx) -> Result<(), ProxyError> {
        if ctx.exec_cfg.payload_exceeds_budget || ctx.exec_cfg.lacks_chain_id {
            return Err(ProxyError::WrongStrategy);
        }
        if ctx.exec_cfg.needs_alt(self.max_accounts_without_alt) {
            return Err(ProxyError::WrongStrategy);
        }
        Ok(())
    }

    async fn prep_before_emulate(&self, _ctx: &mut ExecCtx) -> Result<bool, ProxyError> {
        Ok(false)
    }

    fn update_after_emulate(&self, ctx: &mut ExecCtx, exec_cfg: ExecCfg) {
        ctx.exec_cfg = exec_cfg;
    }

    async fn execute(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        let accounts = ctx.exec_cfg.accounts_touched.clone();
        send_step(self.rpc.as_ref(), &self.ix_builder, ctx, self.evm_step_cnt_per_ix, &accounts).await
    }

    async fn cancel(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        let accounts = ctx.exec_cfg.accounts_touched.clone();
        let ix = self.ix_builder.make_cancel_ix(ctx.eth_tx.tx_sig, &accounts);
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
            &[ix],
            Some(&ctx.op_res.signer.pubkey()),
            &[&ctx.op_res.signer],
            blockhash,
        );
        self.rpc.send_transaction(&tx).await?;
        Ok(())
    }
}

pub struct AltIterative {
    pub ix_builder: IxBuilder,
    pub rpc: std::sync::Arc<dyn Rpc>,
    pub max_accounts_without_alt: usize,
    pub evm_step_cnt_per_ix: u32,
    pub alt: tokio::sync::Mutex<Option<crate::types::alt::AddressLookupTable>>,
}

#[async_trait]
impl super::Strategy for AltIterative {
    fn kind(&self) -> super::StrategyKind {
        super::StrategyKind::AltIterative
    }

    fn validate(&self, ctx: &ExecCtx) -> Result<(), ProxyError> {
        if ctx.exec_cfg.payload_exceeds_budget || ctx.exec_cfg.lacks_chain_id {
            return Err(ProxyError::WrongStrategy);
        }
        if !ctx.exec_cfg.needs_alt(self.max_accounts_without_alt) {
            return Err(ProxyError::WrongStrategy);
        }
        Ok(())
    }

    async fn prep_before_emulate(&self, ctx: &mut ExecCtx) -> Result<bool, ProxyError> {
        let mut guard = self.alt.lock().await;
        if guard.is_some() {
            return Ok(false);
        }
        let slot = self.rpc.get_slot().await?;
        let (create_ix, table_address) =
            alt::make_create_lookup_table_ix(&ctx.op_res.signer.pubkey(), &ctx.op_res.signer.pubkey(), slot);
        let extend_ix = alt::make_extend_lookup_table_ix(
            &table_address,
            &ctx.op_res.signer.pubkey(),
            &ctx.op_res.signer.pubkey(),
            &ctx.exec_cfg.accounts_touched,
        );
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
            &[create_ix, extend_ix],
            Some(&ctx.op_res.signer.pubkey()),
            &[&ctx.op_res.signer],
            blockhash,
        );
        self.rpc.send_transaction(&tx).await?;
        let mut table = crate::types::alt::AddressLookupTable::new(table_address, ctx.op_res.signer.pubkey(), slot);
        table.extend(&ctx.exec_cfg.accounts_touched, slot);
        *guard = Some(table);
        Ok(true)
    }

    fn update_after_emulate(&self, ctx: &mut ExecCtx, exec_cfg: ExecCfg) {
        ctx.exec_cfg = exec_cfg;
    }

    async fn execute(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        let accounts = ctx.exec_cfg.accounts_touched.clone();
        let guard = self.alt.lock().await;
        let table = guard.as_ref().ok_or(ProxyError::WrongStrategy)?;
        send_step_via_alt(self.rpc.as_ref(), &self.ix_builder, ctx, self.evm_step_cnt_per_ix, &accounts, table).await
    }

    async fn cancel(&self, ctx: &mut ExecCtx) -> Result<(), ProxyError> {
        let mut guard = self.alt.lock().await;
        let Some(table) = guard.as_ref() else { return Ok(()) };

        let accounts = ctx.exec_cfg.accounts_touched.clone();
        let ix = self.ix_builder.make_cancel_ix(ctx.eth_tx.tx_sig, &accounts);
        let tx = super::build_versioned_tx(self.rpc.as_ref(), &ctx.op_res.signer, table, vec![ix]).await?;
        self.rpc.send_versioned_transaction(&tx).await?;

        let deactivate_ix = alt::make_deactivate_lookup_table_ix(&table.table_account, &ctx.op_res.signer.pubkey());
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let deactivate_tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
            &[deactivate_ix],
            Some(&ctx.op_res.signer.pubkey()),
            &[&ctx.op_res.signer],
            blockhash,
        );
        self.rpc.send_transaction(&deactivate_tx).await?;
        let deactivated_at = self.rpc.get_slot().await?;
        guard.as_mut().expect("checked Some above").deactivate(deactivated_at);
        Ok(())
    }
}
