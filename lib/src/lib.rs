pub mod cache;
pub mod chain_rpc;
pub mod config;
pub mod emulator;
pub mod errors;
pub mod indexer_db;
pub mod indexer_loop;
pub mod instruction;
pub mod mempool;
pub mod rpc_worker;
pub mod strategy;
pub mod types;
pub mod validator;

pub use config::Config;
pub use errors::ProxyError;

pub type ProxyResult<T> = Result<T, ProxyError>;
