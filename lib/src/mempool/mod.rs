//! Mempool Service (§4.5, C5): owns the [`crate::types::op_res::OpResPool`]
//! and runs the strategy ladder for each accepted tx. The RPC worker talks
//! to it only through [`crate::types::mempool_api::MPRequest`]/
//! [`MPResponse`]; grounded in the reference's `MemPoolService` driving
//! `NeonTxSendStrategyExecutor` per accepted tx.
pub mod client;
pub mod server;

pub use client::MempoolClient;
pub use server::MempoolServer;
