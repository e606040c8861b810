use std::sync::Arc;

use async_trait::async_trait;
use evm_proxy_lib::{
    chain_rpc::Rpc,
    config::Config,
    emulator::Emulator,
    errors::ProxyError,
    indexer_db::{BlockInfo, IndexerDb, LogEntry, TxInfo},
    instruction, mempool,
    rpc_worker::RpcWorker,
    types::{eth_tx::EthTx, exec_cfg::EmulationOutcome, holder::Holder, op_res::{OpRes, OpResId, OpResPool}},
};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};

/// Placeholder for the external emulation oracle (§1's non-goal on
/// emulation internals): always asks the caller to reschedule, since there
/// is nothing behind it yet. A deployment wires a real [`Emulator`] in here.
struct UnconfiguredEmulator;

#[async_trait]
impl Emulator for UnconfiguredEmulator {
    async fn emulate(&self, _tx: &EthTx) -> Result<EmulationOutcome, ProxyError> {
        Err(ProxyError::Reschedule)
    }
}

/// Placeholder for the historical indexer database (§1's non-goal on
/// ingestion/schema internals): reads as "nothing indexed yet" rather than
/// erroring, so `eth_getTransactionReceipt`-style lookups degrade to
/// "pending/unknown" instead of failing the request outright.
struct UnconfiguredIndexerDb;

#[async_trait]
impl IndexerDb for UnconfiguredIndexerDb {
    async fn get_tx_by_neon_sig(&self, _sig: &str) -> Result<Option<TxInfo>, ProxyError> {
        Ok(None)
    }
    async fn get_tx_list_by_block_slot(&self, _slot: u64) -> Result<Vec<TxInfo>, ProxyError> {
        Ok(Vec::new())
    }
    async fn get_block_by_hash(&self, _hash: &str) -> Result<Option<BlockInfo>, ProxyError> {
        Ok(None)
    }
    async fn get_block_by_slot(&self, _slot: u64) -> Result<Option<BlockInfo>, ProxyError> {
        Ok(None)
    }
    async fn get_latest_block(&self) -> Result<BlockInfo, ProxyError> {
        Ok(BlockInfo { slot: 0, hash: "0x0".to_owned(), parent_hash: "0x0".to_owned() })
    }
    async fn get_finalized_block(&self) -> Result<BlockInfo, ProxyError> {
        Ok(BlockInfo { slot: 0, hash: "0x0".to_owned(), parent_hash: "0x0".to_owned() })
    }
    async fn get_starting_block(&self) -> Result<BlockInfo, ProxyError> {
        Ok(BlockInfo { slot: 0, hash: "0x0".to_owned(), parent_hash: "0x0".to_owned() })
    }
    async fn get_log_list(
        &self,
        _from_slot: u64,
        _to_slot: u64,
        _addresses: &[String],
        _topics: &[String],
    ) -> Result<Vec<LogEntry>, ProxyError> {
        Ok(Vec::new())
    }
}

fn holder_address(program_id: &Pubkey, operator: &Pubkey, resource_idx: u32) -> Pubkey {
    Pubkey::find_program_address(&[b"holder", operator.as_ref(), &resource_idx.to_le_bytes()], program_id).0
}

fn build_op_res_pool(config: &Config) -> OpResPool {
    let signer = solana_sdk::signature::read_keypair_file(&config.keypair_path)
        .unwrap_or_else(|_| Keypair::new());
    let operator = signer.pubkey();
    let (treasury_pool_address, _bump) = instruction::treasury_pool_address(&config.evm_program_id, 0);
    let operator_ether_address = instruction::operator_ether_address(&operator);
    let (operator_neon_address, _bump) = instruction::ether_account_address(&config.evm_program_id, operator_ether_address);
    let holder_address = holder_address(&config.evm_program_id, &operator, 0);

    let resource = OpRes {
        id: OpResId { operator_idx: 0, resource_idx: 0 },
        signer,
        treasury_pool_index: 0,
        treasury_pool_address,
        holder_address,
        operator_neon_address,
        holder: Holder::new(holder_address),
    };
    OpResPool::new(vec![resource])
}

/// Everything an axum handler needs to answer a JSON-RPC call: the worker
/// it delegates to, plus the config the worker and mempool actor were built
/// from.
pub struct State {
    pub config: Config,
    pub worker: RpcWorker,
}

impl State {
    /// Spawns the mempool actor as a background task and wires a
    /// [`RpcWorker`] to talk to it. The actor outlives every individual
    /// request; it's only ever reached through the returned `State`'s
    /// `worker.mempool` handle.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let rpc: Arc<dyn Rpc> = Arc::new(solana_client::nonblocking::rpc_client::RpcClient::new_with_commitment(
            config.json_rpc_url.clone(),
            config.commitment,
        ));
        let emulator: Arc<dyn Emulator> = Arc::new(UnconfiguredEmulator);
        let db: Arc<dyn IndexerDb> = Arc::new(UnconfiguredIndexerDb);

        let op_res_pool = build_op_res_pool(&config);
        let (mempool_client, inbox) = mempool::client::channel(256);
        let server = mempool::MempoolServer::new(
            inbox,
            rpc.clone(),
            emulator,
            op_res_pool,
            config.chain_id,
            config.evm_program_id,
            config.treasury_pool_count,
        );
        tokio::spawn(server.run());

        let worker = RpcWorker::new(mempool_client, db, rpc, config.chain_id);

        Self { config, worker }
    }
}
