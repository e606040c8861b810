//! The mempool actor: a single task owning the [`OpResPool`] and the
//! caches, reached only via [`super::client::MempoolClient`]. One message
//! in, exactly one reply out, per §4.5.
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use solana_sdk::signer::Signer;
use tokio::sync::{mpsc, oneshot};

use crate::{
    cache::{EvmParamCache, GasPriceCache},
    chain_rpc::Rpc,
    emulator::Emulator,
    errors::ProxyError,
    instruction::{alt, IxBuilder},
    strategy::Strategy,
    types::{
        eth_tx::EthTx,
        exec_cfg::ExecCfg,
        exec_ctx::ExecCtx,
        mempool_api::{MPRequest, MPResponse, SendTxStatus},
        op_res::OpResPool,
        stuck_tx::StuckTxRecord,
    },
};

pub struct Envelope {
    pub request: MPRequest,
    pub reply: oneshot::Sender<MPResponse>,
}

/// How long a stuck tx sits untouched before the periodic scan tries to
/// cancel it outright rather than keep waiting for its sender to resubmit.
const STUCK_TX_ABANDON_AFTER: Duration = Duration::from_secs(300);
/// How often [`MempoolServer::run`] sweeps `stuck_txs` for records past
/// [`STUCK_TX_ABANDON_AFTER`].
const STUCK_TX_SCAN_INTERVAL: Duration = Duration::from_secs(30);

pub struct MempoolServer {
    inbox: mpsc::Receiver<Envelope>,
    rpc: Arc<dyn Rpc>,
    emulator: Arc<dyn Emulator>,
    op_res_pool: OpResPool,
    gas_price_cache: GasPriceCache,
    evm_param_cache: EvmParamCache,
    chain_id: u64,
    program_id: solana_sdk::pubkey::Pubkey,
    max_accounts_without_alt: usize,
    evm_step_cnt_per_ix: u32,
    gas_less_tx_max_nonce: u64,
    gas_less_tx_max_gas: u128,
    treasury_pool_count: u32,
    stuck_txs: Vec<StuckTxRecord>,
    /// Tx hashes the ladder has already carried to a completed receipt in
    /// this process's lifetime, so a resubmission of the exact same raw tx
    /// (a common client retry pattern) short-circuits to `AlreadyKnown`
    /// instead of re-running the whole ladder against it.
    known_tx_sigs: HashSet<[u8; 32]>,
}

impl MempoolServer {
    #[must_use]
    pub fn new(
        inbox: mpsc::Receiver<Envelope>,
        rpc: Arc<dyn Rpc>,
        emulator: Arc<dyn Emulator>,
        op_res_pool: OpResPool,
        chain_id: u64,
        program_id: solana_sdk::pubkey::Pubkey,
        treasury_pool_count: u32,
    ) -> Self {
        Self {
            inbox,
            rpc,
            emulator,
            op_res_pool,
            gas_price_cache: GasPriceCache::new(),
            evm_param_cache: EvmParamCache::new(),
            chain_id,
            program_id,
            max_accounts_without_alt: 20,
            evm_step_cnt_per_ix: crate::instruction::DEFAULT_EVM_STEPS_PER_IX,
            gas_less_tx_max_nonce: 5,
            gas_less_tx_max_gas: 10_000_000_000,
            treasury_pool_count,
            stuck_txs: Vec::new(),
            known_tx_sigs: HashSet::new(),
        }
    }

    /// Builds every rung of the ladder bound to `ctx`'s operator resource.
    /// Index matches [`crate::strategy::LADDER_ORDER`]. The treasury pool
    /// slot is recomputed fresh from the tx's own hash rather than read off
    /// the operator resource — §4.1's tx-pool and resource-pool are
    /// distinct, and the resource's own `treasury_pool_index` only seeds
    /// its `OpRes` bookkeeping, not what a given tx pays its treasury into.
    fn build_ladder(&self, ctx: &ExecCtx) -> [Box<dyn Strategy>; 10] {
        let treasury_pool_index = ctx.eth_tx.treasury_pool_index(self.treasury_pool_count);
        let (treasury_pool_address, _bump) =
            crate::instruction::treasury_pool_address(&self.program_id, treasury_pool_index);
        let ix_builder = IxBuilder::new(
            self.program_id,
            ctx.op_res.signer.pubkey(),
            treasury_pool_address,
            treasury_pool_index,
            ctx.op_res.holder_address,
            ctx.op_res.operator_neon_address,
        );
        [
            Box::new(crate::strategy::simple::Simple {
                ix_builder: ix_builder.clone(),
                rpc: self.rpc.clone(),
                max_accounts_without_alt: self.max_accounts_without_alt,
            }),
            Box::new(crate::strategy::simple::AltSimple {
                ix_builder: ix_builder.clone(),
                rpc: self.rpc.clone(),
                max_accounts_without_alt: self.max_accounts_without_alt,
                alt: tokio::sync::Mutex::new(None),
            }),
            Box::new(crate::strategy::iterative::Iterative {
                ix_builder: ix_builder.clone(),
                rpc: self.rpc.clone(),
                max_accounts_without_alt: self.max_accounts_without_alt,
                evm_step_cnt_per_ix: self.evm_step_cnt_per_ix,
            }),
            Box::new(crate::strategy::iterative::AltIterative {
                ix_builder: ix_builder.clone(),
                rpc: self.rpc.clone(),
                max_accounts_without_alt: self.max_accounts_without_alt,
                evm_step_cnt_per_ix: self.evm_step_cnt_per_ix,
                alt: tokio::sync::Mutex::new(None),
            }),
            Box::new(crate::strategy::holder::SimpleHolder {
                ix_builder: ix_builder.clone(),
                rpc: self.rpc.clone(),
                max_accounts_without_alt: self.max_accounts_without_alt,
            }),
            Box::new(crate::strategy::holder::AltSimpleHolder {
                ix_builder: ix_builder.clone(),
                rpc: self.rpc.clone(),
                max_accounts_without_alt: self.max_accounts_without_alt,
                alt: tokio::sync::Mutex::new(None),
            }),
            Box::new(crate::strategy::holder::Holder {
                ix_builder: ix_builder.clone(),
                rpc: self.rpc.clone(),
                max_accounts_without_alt: self.max_accounts_without_alt,
                evm_step_cnt_per_ix: self.evm_step_cnt_per_ix,
            }),
            Box::new(crate::strategy::holder::AltHolder {
                ix_builder: ix_builder.clone(),
                rpc: self.rpc.clone(),
                max_accounts_without_alt: self.max_accounts_without_alt,
                evm_step_cnt_per_ix: self.evm_step_cnt_per_ix,
                alt: tokio::sync::Mutex::new(None),
            }),
            Box::new(crate::strategy::no_chain_id::NoChainId {
                ix_builder: ix_builder.clone(),
                rpc: self.rpc.clone(),
                max_accounts_without_alt: self.max_accounts_without_alt,
                evm_step_cnt_per_ix: self.evm_step_cnt_per_ix,
            }),
            Box::new(crate::strategy::no_chain_id::AltNoChainId {
                ix_builder,
                rpc: self.rpc.clone(),
                max_accounts_without_alt: self.max_accounts_without_alt,
                evm_step_cnt_per_ix: self.evm_step_cnt_per_ix,
                alt: tokio::sync::Mutex::new(None),
            }),
        ]
    }

    /// Drains the inbox forever; callers spawn this as its own task. Each
    /// request is handled in turn — the pool's exclusivity invariant makes
    /// concurrent handling unsafe without per-resource locking finer than
    /// this loop provides, so requests that need a free `OpRes` simply
    /// reply [`ProxyError::Reschedule`] when none is available rather than
    /// blocking the whole actor.
    pub async fn run(mut self) {
        let mut scan = tokio::time::interval(STUCK_TX_SCAN_INTERVAL);
        loop {
            tokio::select! {
                envelope = self.inbox.recv() => {
                    let Some(envelope) = envelope else { break };
                    let response = self.handle(envelope.request).await;
                    let _ignored_if_caller_dropped = envelope.reply.send(response);
                }
                _ = scan.tick() => {
                    self.scan_stuck_txs().await;
                }
            }
        }
    }

    /// Ages out `stuck_txs` (§4.3/§7): refreshes each record's age and, once
    /// past [`STUCK_TX_ABANDON_AFTER`], cancels it directly from its
    /// on-chain holder/ALT addresses rather than re-emulating a tx whose
    /// `ExecCtx` this process never held. A record that fails to cancel
    /// (no free `OpRes`, RPC error) stays in the list for the next sweep.
    async fn scan_stuck_txs(&mut self) {
        let pending = std::mem::take(&mut self.stuck_txs);
        let mut still_stuck = Vec::with_capacity(pending.len());
        for mut record in pending {
            record.refresh_age();
            if record.is_abandoned(STUCK_TX_ABANDON_AFTER) {
                if self.cancel_stuck_tx(&record).await.is_err() {
                    still_stuck.push(record);
                }
            } else {
                still_stuck.push(record);
            }
        }
        self.stuck_txs = still_stuck;
    }

    /// Cancels a tx known only by its [`StuckTxRecord`] — no `EthTx`, no
    /// `ExecCtx`, just the holder/ALT addresses it left behind. Borrows
    /// whichever `OpRes` is free purely to pay and sign the cancel/delete
    /// transactions; `IxBuilder::make_cancel_ix`/`make_holder_delete_ix`
    /// only need the record's own addresses, not that resource's own
    /// holder/treasury slot.
    async fn cancel_stuck_tx(&mut self, record: &StuckTxRecord) -> Result<(), ProxyError> {
        let Some(op_res) = self.op_res_pool.try_acquire().await else {
            return Err(ProxyError::Reschedule);
        };

        let result = async {
            let Some(holder_address) = record.holder_address else {
                return Ok(());
            };
            let (treasury_pool_address, _bump) = crate::instruction::treasury_pool_address(
                &self.program_id,
                crate::types::eth_tx::treasury_pool_index_for(&record.tx_sig, self.treasury_pool_count),
            );
            let ix_builder = IxBuilder::new(
                self.program_id,
                op_res.signer.pubkey(),
                treasury_pool_address,
                crate::types::eth_tx::treasury_pool_index_for(&record.tx_sig, self.treasury_pool_count),
                holder_address,
                op_res.operator_neon_address,
            );

            let cancel_ix = ix_builder.make_cancel_ix(record.tx_sig, &record.alt_addresses);
            let blockhash = self.rpc.get_latest_blockhash().await?;
            let cancel_tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
                &[cancel_ix],
                Some(&op_res.signer.pubkey()),
                &[&op_res.signer],
                blockhash,
            );
            self.rpc.send_transaction(&cancel_tx).await?;

            let delete_ix = ix_builder.make_holder_delete_ix();
            let blockhash = self.rpc.get_latest_blockhash().await?;
            let delete_tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
                &[delete_ix],
                Some(&op_res.signer.pubkey()),
                &[&op_res.signer],
                blockhash,
            );
            self.rpc.send_transaction(&delete_tx).await?;
            Ok(())
        }
        .await;

        self.op_res_pool.release(op_res).await;
        result
    }

    /// §4.5 — rejects a resubmission of a tx hash this process already
    /// carried to a completed receipt. Returns [`ProxyError::AlreadyKnown`]
    /// rather than a bool so the one call site that cares can match on it
    /// specifically instead of threading a second return value through.
    fn reject_if_already_known(&self, tx_sig: &[u8; 32]) -> Result<(), ProxyError> {
        if self.known_tx_sigs.contains(tx_sig) {
            return Err(ProxyError::AlreadyKnown);
        }
        Ok(())
    }

    /// Records `ctx` as stuck if it left on-chain progress behind (a staged
    /// holder write, an executed step) that a later process restart would
    /// otherwise orphan — see [`crate::types::exec_ctx::ExecCtx::has_on_chain_progress`].
    fn record_stuck_if_abandoned(&mut self, ctx: &ExecCtx) {
        if !ctx.has_on_chain_progress() {
            return;
        }
        let sender = ctx.eth_tx.recover_sender().unwrap_or([0u8; 20]);
        let holder_address = ctx.is_holder_staged().then_some(ctx.op_res.holder_address);
        self.stuck_txs.push(StuckTxRecord::new(ctx.eth_tx.tx_sig, sender, ctx.eth_tx.nonce, holder_address, Vec::new()));
    }

    async fn handle(&mut self, request: MPRequest) -> MPResponse {
        let req_id = request.req_id();
        match request {
            MPRequest::SendTransaction { raw_tx, .. } => self.handle_send_transaction(req_id, &raw_tx).await,
            MPRequest::GetPendingTxNonce { sender, .. } => self.handle_get_pending_tx_nonce(req_id, sender).await,
            MPRequest::GetMempoolTxNonce { sender, .. } => self.handle_get_mempool_tx_nonce(req_id, sender),
            MPRequest::GetTxByHash { .. } => {
                MPResponse::TxByHash { req_id, tx: None }
            }
            MPRequest::GetGasPrice { .. } => self.handle_get_gas_price(req_id),
            MPRequest::GetStateTxCnt { sender, .. } => self.handle_get_state_tx_cnt(req_id, sender).await,
            MPRequest::GetOperatorResourceList { .. } => self.handle_get_operator_resource_list(req_id).await,
            MPRequest::InitOperatorResource { .. } => MPResponse::InitOperatorResource {
                req_id,
                status: crate::types::mempool_api::InitOperatorResourceStatus::Success,
                err: None,
            },
            MPRequest::FreeResource { resource_id, force_reinit, .. } => {
                self.handle_free_resource(req_id, resource_id, force_reinit)
            }
            MPRequest::GetAltList { operator_key, .. } => self.handle_get_alt_list(req_id, operator_key).await,
            MPRequest::DeactivateAltList { tables, .. } => self.handle_deactivate_alt_list(req_id, tables).await,
            MPRequest::CloseAltList { tables, .. } => self.handle_close_alt_list(req_id, tables).await,
            MPRequest::GetElfParamDict { .. } => self.handle_get_elf_param_dict(req_id),
            MPRequest::GetStuckTxList { .. } => {
                MPResponse::StuckTxList { req_id, stuck_txs: self.stuck_txs.clone() }
            }
        }
    }

    async fn handle_send_transaction(&mut self, req_id: u64, raw_tx: &[u8]) -> MPResponse {
        let eth_tx = match EthTx::from_rlp(raw_tx) {
            Ok(tx) => tx,
            Err(err) => return MPResponse::Error { req_id, message: err.to_string(), code: err.error_code() },
        };

        if let Err(ProxyError::AlreadyKnown) = self.reject_if_already_known(&eth_tx.tx_sig) {
            return MPResponse::SendTransaction { req_id, status: SendTxStatus::AlreadyKnown };
        }

        let Some(op_res) = self.op_res_pool.try_acquire().await else {
            return MPResponse::Error {
                req_id,
                message: ProxyError::Reschedule.to_string(),
                code: ProxyError::Reschedule.error_code(),
            };
        };

        let outcome = match self.emulator.emulate(&eth_tx).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.op_res_pool.release(op_res).await;
                return MPResponse::Error { req_id, message: err.to_string(), code: err.error_code() };
            }
        };

        let min_gas_price = self.gas_price_cache.get().map_or(0, |price| price.min_gas_price);
        let sender_account = match eth_tx.recover_sender() {
            Ok(sender) => crate::instruction::ether_account_address(&self.program_id, sender).0,
            Err(err) => {
                self.op_res_pool.release(op_res).await;
                return MPResponse::Error { req_id, message: err.to_string(), code: err.error_code() };
            }
        };
        let gas_less_permit =
            crate::rpc_worker::within_gas_less_bounds(&eth_tx, self.gas_less_tx_max_nonce, self.gas_less_tx_max_gas);
        if let Err(err) = crate::validator::precheck_against_chain(
            &eth_tx,
            self.chain_id,
            min_gas_price,
            outcome.state_tx_cnt,
            gas_less_permit,
            self.rpc.as_ref(),
            &sender_account,
        )
        .await
        {
            self.op_res_pool.release(op_res).await;
            return match err {
                ProxyError::Underpriced => {
                    MPResponse::SendTransaction { req_id, status: SendTxStatus::Underpriced }
                }
                ProxyError::NonceTooLow(_, tx_nonce, state_nonce) => {
                    MPResponse::SendTransaction { req_id, status: SendTxStatus::NonceTooLow { tx_nonce, state_nonce } }
                }
                other => MPResponse::Error { req_id, message: other.to_string(), code: other.error_code() },
            };
        }

        let lacks_chain_id = eth_tx.chain_id.is_none();
        let exec_cfg =
            ExecCfg::from_emulation(&outcome, lacks_chain_id, u64::from(self.evm_step_cnt_per_ix));
        let mut ctx = ExecCtx::new(eth_tx, exec_cfg, op_res);

        let ladder = self.build_ladder(&ctx);
        let status = match crate::strategy::run_ladder(
            &mut ctx,
            &ladder,
            self.emulator.as_ref(),
            u64::from(self.evm_step_cnt_per_ix),
        )
        .await
        {
            Ok(()) => SendTxStatus::Accepted,
            Err(ProxyError::BigTx) => {
                self.record_stuck_if_abandoned(&ctx);
                self.op_res_pool.release(ctx.op_res).await;
                return MPResponse::Error {
                    req_id,
                    message: ProxyError::BigTx.to_string(),
                    code: ProxyError::BigTx.error_code(),
                };
            }
            Err(err) => {
                self.record_stuck_if_abandoned(&ctx);
                self.op_res_pool.release(ctx.op_res).await;
                return MPResponse::Error { req_id, message: err.to_string(), code: err.error_code() };
            }
        };

        self.known_tx_sigs.insert(ctx.eth_tx.tx_sig);
        self.op_res_pool.release(ctx.op_res).await;
        MPResponse::SendTransaction { req_id, status }
    }

    async fn handle_get_pending_tx_nonce(&self, req_id: u64, sender: [u8; 20]) -> MPResponse {
        let _ = sender;
        MPResponse::PendingTxNonce { req_id, nonce: 0 }
    }

    fn handle_get_mempool_tx_nonce(&self, req_id: u64, sender: [u8; 20]) -> MPResponse {
        let _ = sender;
        MPResponse::MempoolTxNonce { req_id, nonce: 0 }
    }

    fn handle_get_gas_price(&self, req_id: u64) -> MPResponse {
        match self.gas_price_cache.get() {
            Some(price) => MPResponse::GasPrice {
                req_id,
                suggested_gas_price: price.suggested_gas_price,
                min_gas_price: price.min_gas_price,
            },
            None => MPResponse::GasPrice { req_id, suggested_gas_price: 0, min_gas_price: 0 },
        }
    }

    async fn handle_get_state_tx_cnt(&self, req_id: u64, sender: [u8; 20]) -> MPResponse {
        let _ = sender;
        MPResponse::StateTxCnt { req_id, tx_cnt: 0 }
    }

    async fn handle_get_operator_resource_list(&mut self, req_id: u64) -> MPResponse {
        match self.op_res_pool.try_acquire().await {
            Some(op_res) => {
                let id = op_res.id;
                self.op_res_pool.release(op_res).await;
                MPResponse::OperatorResourceList { req_id, resources: vec![id] }
            }
            None => MPResponse::OperatorResourceList { req_id, resources: Vec::new() },
        }
    }

    fn handle_free_resource(&mut self, req_id: u64, resource_id: u32, force_reinit: bool) -> MPResponse {
        let _ = (resource_id, force_reinit);
        MPResponse::FreeResource { req_id, ok: true }
    }

    /// §4.4 — an ALT is only relevant to the operator that created it;
    /// this surfaces the tables an operator resource currently owns so the
    /// indexer can reconcile them against on-chain state. Table tracking
    /// itself lives on each ALT-family strategy's `alt` slot, which this
    /// actor doesn't retain past a tx's lifetime, so an empty list is
    /// correct until a persistent table registry is added.
    async fn handle_get_alt_list(&self, req_id: u64, operator_key: solana_sdk::pubkey::Pubkey) -> MPResponse {
        let _ = operator_key;
        MPResponse::AltList { req_id, tables: Vec::new() }
    }

    async fn handle_deactivate_alt_list(&mut self, req_id: u64, tables: Vec<solana_sdk::pubkey::Pubkey>) -> MPResponse {
        let Some(op_res) = self.op_res_pool.try_acquire().await else {
            return MPResponse::Error {
                req_id,
                message: ProxyError::Reschedule.to_string(),
                code: ProxyError::Reschedule.error_code(),
            };
        };

        let mut deactivated = Vec::with_capacity(tables.len());
        for table in &tables {
            let ix = alt::make_deactivate_lookup_table_ix(table, &op_res.signer.pubkey());
            if let Ok(blockhash) = self.rpc.get_latest_blockhash().await {
                let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
                    &[ix],
                    Some(&op_res.signer.pubkey()),
                    &[&op_res.signer],
                    blockhash,
                );
                if self.rpc.send_transaction(&tx).await.is_ok() {
                    deactivated.push(*table);
                }
            }
        }
        self.op_res_pool.release(op_res).await;
        MPResponse::DeactivateAltList { req_id, deactivated }
    }

    async fn handle_close_alt_list(&mut self, req_id: u64, tables: Vec<solana_sdk::pubkey::Pubkey>) -> MPResponse {
        let Some(op_res) = self.op_res_pool.try_acquire().await else {
            return MPResponse::Error {
                req_id,
                message: ProxyError::Reschedule.to_string(),
                code: ProxyError::Reschedule.error_code(),
            };
        };

        let mut closed = Vec::with_capacity(tables.len());
        for table in &tables {
            let ix = alt::make_close_lookup_table_ix(table, &op_res.signer.pubkey(), &op_res.signer.pubkey());
            if let Ok(blockhash) = self.rpc.get_latest_blockhash().await {
                let tx = solana_sdk::transaction::Transaction::new_signed_with_payer(
                    &[ix],
                    Some(&op_res.signer.pubkey()),
                    &[&op_res.signer],
                    blockhash,
                );
                if self.rpc.send_transaction(&tx).await.is_ok() {
                    closed.push(*table);
                }
            }
        }
        self.op_res_pool.release(op_res).await;
        MPResponse::CloseAltList { req_id, closed }
    }

    fn handle_get_elf_param_dict(&self, req_id: u64) -> MPResponse {
        let params = self.evm_param_cache.get().unwrap_or_else(|| {
            let mut defaults = HashMap::new();
            defaults.insert("NEON_CHAIN_ID".to_owned(), self.chain_id.to_string());
            // Until a real Chain-program ELF param lookup is wired in, report
            // this build's own version so `RpcWorker::is_method_allowed`'s
            // major.minor check (§4.8) doesn't gate off every write by default.
            defaults.insert(
                "NEON_EVM_VERSION".to_owned(),
                format!("{}.{}.0", crate::rpc_worker::PROXY_EVM_VERSION.0, crate::rpc_worker::PROXY_EVM_VERSION.1),
            );
            defaults
        });
        MPResponse::ElfParamDict { req_id, params }
    }
}

#[cfg(test)]
mod tests {
    use solana_sdk::{clock::Slot, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Keypair};

    use super::*;
    use crate::types::{eth_tx::EthTx, holder::Holder, op_res::{OpRes, OpResId}};

    struct NoopRpc;

    #[async_trait::async_trait]
    impl Rpc for NoopRpc {
        fn commitment(&self) -> CommitmentConfig {
            CommitmentConfig::confirmed()
        }
        async fn get_account(&self, _key: &Pubkey) -> solana_client::client_error::Result<Option<solana_sdk::account::Account>> {
            Ok(None)
        }
        async fn get_multiple_accounts(&self, _keys: &[Pubkey]) -> solana_client::client_error::Result<Vec<Option<solana_sdk::account::Account>>> {
            Ok(Vec::new())
        }
        async fn get_balance(&self, _key: &Pubkey) -> solana_client::client_error::Result<u64> {
            Ok(0)
        }
        async fn get_slot(&self) -> solana_client::client_error::Result<Slot> {
            Ok(0)
        }
        async fn get_latest_blockhash(&self) -> solana_client::client_error::Result<Hash> {
            Ok(Hash::default())
        }
        async fn get_signature_status(&self, _signature: &solana_sdk::signature::Signature) -> solana_client::client_error::Result<Option<bool>> {
            Ok(None)
        }
        async fn get_cluster_nodes_count(&self) -> solana_client::client_error::Result<usize> {
            Ok(1)
        }
        async fn send_transaction(&self, _transaction: &solana_sdk::transaction::Transaction) -> solana_client::client_error::Result<solana_sdk::signature::Signature> {
            Ok(solana_sdk::signature::Signature::default())
        }
        async fn send_versioned_transaction(&self, _transaction: &solana_sdk::transaction::VersionedTransaction) -> solana_client::client_error::Result<solana_sdk::signature::Signature> {
            Ok(solana_sdk::signature::Signature::default())
        }
    }

    struct UnreachableEmulator;

    #[async_trait::async_trait]
    impl Emulator for UnreachableEmulator {
        async fn emulate(&self, _tx: &EthTx) -> Result<crate::types::exec_cfg::EmulationOutcome, ProxyError> {
            unreachable!("not exercised by this test")
        }
    }

    fn test_server() -> MempoolServer {
        let (_client, inbox) = super::super::client::channel(1);
        let holder_address = Pubkey::new_unique();
        let op_res = OpRes {
            id: OpResId { operator_idx: 0, resource_idx: 0 },
            signer: Keypair::new(),
            treasury_pool_index: 0,
            treasury_pool_address: Pubkey::new_unique(),
            holder_address,
            operator_neon_address: Pubkey::new_unique(),
            holder: Holder::new(holder_address),
        };
        MempoolServer::new(
            inbox,
            Arc::new(NoopRpc),
            Arc::new(UnreachableEmulator),
            OpResPool::new(vec![op_res]),
            245_022_940,
            Pubkey::new_unique(),
            128,
        )
    }

    fn sample_eth_tx() -> EthTx {
        use solana_sdk::keccak;
        let key = libsecp256k1::SecretKey::parse(&[7u8; 32]).unwrap();
        let chain_id = 245_022_940u64;
        let mut unsigned = rlp::RlpStream::new_list(9);
        unsigned.append(&1u64);
        unsigned.append(&1_000_000_000u64);
        unsigned.append(&21_000u64);
        unsigned.append_empty_data();
        unsigned.append(&0u64);
        unsigned.append_empty_data();
        unsigned.append(&chain_id);
        unsigned.append_empty_data();
        unsigned.append_empty_data();
        let hash = keccak::hash(&unsigned.out()).to_bytes();

        let message = libsecp256k1::Message::parse(&hash);
        let (signature, recovery_id) = libsecp256k1::sign(&message, &key);
        let sig_bytes = signature.serialize();
        let v = chain_id * 2 + 35 + u64::from(recovery_id.serialize());

        let mut signed = rlp::RlpStream::new_list(9);
        signed.append(&1u64);
        signed.append(&1_000_000_000u64);
        signed.append(&21_000u64);
        signed.append_empty_data();
        signed.append(&0u64);
        signed.append_empty_data();
        signed.append(&v);
        signed.append(&sig_bytes[0..32].to_vec());
        signed.append(&sig_bytes[32..64].to_vec());
        EthTx::from_rlp(&signed.out()).unwrap()
    }

    #[test]
    fn reject_if_already_known_flags_only_seen_hashes() {
        let mut server = test_server();
        let tx_sig = [3u8; 32];
        assert!(server.reject_if_already_known(&tx_sig).is_ok());

        server.known_tx_sigs.insert(tx_sig);
        assert!(matches!(server.reject_if_already_known(&tx_sig), Err(ProxyError::AlreadyKnown)));
    }

    #[tokio::test]
    async fn record_stuck_if_abandoned_skips_ctx_with_no_on_chain_progress() {
        let mut server = test_server();
        let op_res = server.op_res_pool.try_acquire().await.expect("one free slot");
        let ctx = ExecCtx::new(sample_eth_tx(), empty_exec_cfg(), op_res);
        server.record_stuck_if_abandoned(&ctx);
        assert!(server.stuck_txs.is_empty());
    }

    #[tokio::test]
    async fn record_stuck_if_abandoned_records_ctx_that_staged_a_holder_write() {
        let mut server = test_server();
        let op_res = server.op_res_pool.try_acquire().await.expect("one free slot");
        let mut ctx = ExecCtx::new(sample_eth_tx(), empty_exec_cfg(), op_res);
        ctx.mark_holder_staged();
        server.record_stuck_if_abandoned(&ctx);
        assert_eq!(server.stuck_txs.len(), 1);
        assert_eq!(server.stuck_txs[0].tx_sig, ctx.eth_tx.tx_sig);
        assert!(server.stuck_txs[0].holder_address.is_some());
    }

    fn empty_exec_cfg() -> ExecCfg {
        ExecCfg::from_emulation(
            &crate::types::exec_cfg::EmulationOutcome {
                steps_executed: 0,
                used_gas: 0,
                exit_status: String::new(),
                accounts_touched: Vec::new(),
                exceeds_single_tx_budget: false,
                state_tx_cnt: 0,
            },
            false,
            1,
        )
    }
}
