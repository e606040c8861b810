//! NoChainId and ALT-NoChainId strategies (§4.4 rungs 9-10): the last
//! resort for a pre-EIP-155 tx (`EthTx::chain_id.is_none()`). Calldata
//! always goes through a holder account here — without a chain id bound
//! into the signature, the Chain program leans on the holder requirement
//! plus `TxStepFromAccountNoChainId`'s distinct opcode to keep such a tx
//! from being replayed against a different chain's Chain-Instruction
//! program deployment.
use async_trait::async_trait;
use solana_sdk::signer::Signer;

use crate::{
    chain_rpc::Rpc,
    errors::ProxyError,
    instruction::{alt, IxBuilder},
    types::{exec_cfg::ExecCfg, exec_ctx::ExecCtx},
};

use super::holder::{cancel_and_clear_holder, cancel_and_clear_holder_via_alt, write_calldata_to_holder};

pub struct NoChainId {
    pub ix_builder: IxBuilder,
    pub rpc: std::sync::Arc<dyn Rpc>,
    pub max_accounts_without_alt: usize,
    pub evm_step_cnt_per_ix: u32,
}

#[async_trait]
impl super::Strategy for NoChainId {
    fn kind(&self) -> super::StrategyKind {
        super::StrategyKind::NoChainId
    }

    fn validate(&self, ctx: &ExecCtx) -> Result<(), ProxyError> {
        if !ctx.exec_cfg.lacks_chain_id {
            return Err(ProxyError::WrongStrategy);
        }
        if ctx.exec_cfg.needs_alt(self.max_accounts_without_alt) {
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
        let ix = self.ix_builder.make_tx_step_from_account_no_chainid_ix(
            &accounts,
            self.evm_step_cnt_per_ix,
            ctx.step_index(),
        );
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

pub struct AltNoChainId {
    pub ix_builder: IxBuilder,
    pub rpc: std::sync::Arc<dyn Rpc>,
    pub max_accounts_without_alt: usize,
    pub evm_step_cnt_per_ix: u32,
    pub alt: tokio::sync::Mutex<Option<crate::types::alt::AddressLookupTable>>,
}

#[async_trait]
impl super::Strategy for AltNoChainId {
    fn kind(&self) -> super::StrategyKind {
        super::StrategyKind::AltNoChainId
    }

    fn validate(&self, ctx: &ExecCtx) -> Result<(), ProxyError> {
        if !ctx.exec_cfg.lacks_chain_id {
            return Err(ProxyError::WrongStrategy);
        }
        if !ctx.exec_cfg.needs_alt(self.max_accounts_without_alt) {
            return Err(ProxyError::WrongStrategy);
        }
        Ok(())
    }

    async fn prep_before_emulate(&self, ctx: &mut ExecCtx) -> Result<bool, ProxyError> {
        let wrote = write_calldata_to_holder(self.rpc.as_ref(), &self.ix_builder, ctx).await?;

        let mut guard = self.alt.lock().await;
        if guard.is_some() {
            return Ok(wrote);
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
        let ix = self.ix_builder.make_tx_step_from_account_no_chainid_ix(
            &accounts,
            self.evm_step_cnt_per_ix,
            ctx.step_index(),
        );
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

async fn deactivate_alt(
    rpc: &dyn Rpc,
    alt_slot: &tokio::sync::Mutex<Option<crate::types::alt::AddressLookupTable>>,
    ctx: &mut ExecCtx,
) -> Result<(), ProxyError> {
    let mut guard = alt_slot.lock().await;
    let Some(table) = guard.as_mut() else { return Ok(()) };

    let deactivate_ix = alt::make_deactivate_lookup_table_ix(&table.table_account, &ctx.op_res.signer.pubkey());
    let blockhash = rpc.get_latest_blockhash().await?;
    let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
        &[deactivate_ix],
        Some(&ctx.op_res.signer.pubkey()),
        &[&ctx.op_res.signer],
        blockhash,
    );
    rpc.send_transaction(&tx).await?;
    table.deactivate(rpc.get_slot().await?);
    Ok(())
}
