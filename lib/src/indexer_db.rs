//! The historical indexer database (§1, "the historical indexer's database
//! schema and ingestion workers") — an external collaborator whose query
//! surface is named in §6 but whose schema/ingestion is out of scope.
use async_trait::async_trait;

use crate::errors::ProxyError;

#[derive(Debug, Clone)]
pub struct TxInfo {
    pub tx_sig_hex: String,
    pub slot: u64,
    pub block_hash: String,
}

#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub slot: u64,
    pub hash: String,
    pub parent_hash: String,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<String>,
    pub data: Vec<u8>,
    pub neon_event_type: Option<i32>,
}

#[async_trait]
pub trait IndexerDb: Send + Sync {
    async fn get_tx_by_neon_sig(&self, sig: &str) -> Result<Option<TxInfo>, ProxyError>;
    async fn get_tx_list_by_block_slot(&self, slot: u64) -> Result<Vec<TxInfo>, ProxyError>;
    async fn get_block_by_hash(&self, hash: &str) -> Result<Option<BlockInfo>, ProxyError>;
    async fn get_block_by_slot(&self, slot: u64) -> Result<Option<BlockInfo>, ProxyError>;
    async fn get_latest_block(&self) -> Result<BlockInfo, ProxyError>;
    async fn get_finalized_block(&self) -> Result<BlockInfo, ProxyError>;
    async fn get_starting_block(&self) -> Result<BlockInfo, ProxyError>;
    async fn get_log_list(
        &self,
        from_slot: u64,
        to_slot: u64,
        addresses: &[String],
        topics: &[String],
    ) -> Result<Vec<LogEntry>, ProxyError>;
}
