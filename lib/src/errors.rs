//! Error types
#![allow(clippy::use_self)]

use solana_client::client_error::ClientError as SolanaClientError;
use solana_sdk::program_error::ProgramError as SolanaProgramError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::SignerError as SolanaSignerError;
use thiserror::Error;

/// Errors that may be returned while admitting or executing a transaction.
///
/// The transport/terminal kinds (`Reschedule` through `InvalidParam`) follow
/// the propagation policy of §7: some are swallowed by a retrying caller,
/// some are returned to the RPC client verbatim, some are never user-visible.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Std IO Error
    #[error("Std I/O error. {0:?}")]
    StdIoError(#[from] std::io::Error),
    /// Solana program error
    #[error("Solana program error. {0:?}")]
    ProgramError(#[from] SolanaProgramError),
    /// Solana client error
    #[error("Solana client error. {0:?}")]
    ClientError(#[from] SolanaClientError),
    /// Solana signer error
    #[error("Solana signer error. {0:?}")]
    SignerError(#[from] SolanaSignerError),
    #[error("Hex error. {0}")]
    FromHexError(#[from] hex::FromHexError),
    #[error("Json error. {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Bincode error. {0}")]
    BincodeError(#[from] bincode::Error),
    #[error("Rlp decode error. {0}")]
    RlpDecodeError(#[from] rlp::DecoderError),

    #[error("Account not found {0:?}.")]
    AccountNotFound(Pubkey),
    #[error("Incorrect program {0:?}")]
    IncorrectProgram(Pubkey),

    /// §4.2 — signature does not recover a sender, or RLP is malformed.
    #[error("Invalid transaction: {0}")]
    InvalidTx(String),
    /// §4.2 / §7 — `state_tx_cnt > tx.nonce`.
    #[error("nonce too low: address {0}, tx: {1} state: {2}")]
    NonceTooLow(String, u64, u64),
    /// §4.2 / §7 — `state_tx_cnt < tx.nonce`.
    #[error("nonce too high: address {0}, tx: {1} state: {2}")]
    NonceTooHigh(String, u64, u64),
    /// §4.2 — `tx.gas_price < min_gas_price` and no gas-less permit applies.
    #[error("replacement transaction underpriced")]
    Underpriced,
    /// §4.2 — tx carries a chain id that is neither absent nor the current one.
    #[error("wrong chain id")]
    WrongChainId,
    /// §4.2 — sender balance below `gas_price * gas_limit + value`.
    #[error("insufficient funds for gas * price + value")]
    InsufficientFunds,
    /// §7 — propagated untouched by the ladder; caller re-queues after a backoff.
    #[error("reschedule")]
    Reschedule,
    /// §4.4 — a strategy declined applicability for a tx already underway.
    #[error("wrong strategy")]
    WrongStrategy,
    /// §4.4 step 3 — ladder exhausted with no applicable strategy.
    #[error("tx payload too large for any strategy")]
    BigTx,
    /// §4.4 step 2.d — `retry_on_fail` exhausted without reaching execution.
    #[error("no more retries")]
    NoMoreRetries,
    /// §6 — RPC-level semantic errors returned to the client verbatim.
    #[error("{0}")]
    EthereumError(String),
    /// §6 — parameter normalization failure, tagged with the offending field.
    #[error("invalid param {field}: {reason}")]
    InvalidParam { field: String, reason: String },
    #[error("already known")]
    AlreadyKnown,
    #[error("unknown error")]
    Unspecified,
}

impl ProxyError {
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            ProxyError::StdIoError(_) => 102,
            ProxyError::ProgramError(_) => 111,
            ProxyError::ClientError(_) => 113,
            ProxyError::SignerError(_) => 112,
            ProxyError::FromHexError(_) => 246,
            ProxyError::SerdeJson(_) => 254,
            ProxyError::BincodeError(_) => 257,
            ProxyError::RlpDecodeError(_) => 258,
            ProxyError::AccountNotFound(_) => 205,
            ProxyError::IncorrectProgram(_) => 203,
            ProxyError::InvalidTx(_) => 300,
            ProxyError::NonceTooLow(..) => 301,
            ProxyError::NonceTooHigh(..) => 302,
            ProxyError::Underpriced => 303,
            ProxyError::WrongChainId => 304,
            ProxyError::InsufficientFunds => 305,
            ProxyError::Reschedule => 306,
            ProxyError::WrongStrategy => 307,
            ProxyError::BigTx => 308,
            ProxyError::NoMoreRetries => 309,
            ProxyError::EthereumError(_) => 310,
            ProxyError::InvalidParam { .. } => 311,
            ProxyError::AlreadyKnown => 312,
            ProxyError::Unspecified => 255,
        }
    }

    /// True for the kinds §7 marks as not user-visible (retried transparently
    /// or resolved internally by the ladder/mempool).
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ProxyError::Reschedule | ProxyError::WrongStrategy | ProxyError::NonceTooHigh(..)
        )
    }
}
