//! Mempool Service Protocol (§4.5, C5): the tagged request/response union
//! the RPC worker and the mempool server exchange over a channel. Every
//! request gets exactly one reply; every request but `SendTransaction` is
//! idempotent (§4.5's exactly-once-effect note).
use crate::types::eth_tx::EthTx;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub type ReqId = u64;

/// Numeric tags are wire-stable (§4.5) — never renumber an existing
/// variant, only append.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[repr(u8)]
pub enum MPRequestCode {
    SendTransaction = 0,
    GetPendingTxNonce = 1,
    GetMempoolTxNonce = 2,
    GetTxByHash = 3,
    GetGasPrice = 4,
    GetStateTxCnt = 5,
    GetOperatorResourceList = 6,
    InitOperatorResource = 7,
    GetElfParamDict = 8,
    GetAltList = 9,
    DeactivateAltList = 10,
    CloseAltList = 11,
    GetStuckTxList = 12,
    /// A supplemental lifecycle request not part of the original numbered
    /// table, placed past the stable range so it never collides with a
    /// future addition to that table.
    FreeResource = 13,
}

#[derive(Debug, Clone)]
pub enum MPRequest {
    /// §4.5 — the one non-idempotent request: resubmitting the same
    /// `tx_sig` is expected to be deduplicated by the ladder, not the
    /// protocol layer.
    SendTransaction { req_id: ReqId, raw_tx: Vec<u8> },
    /// The next nonce a transaction from `sender` could use, counting
    /// mempool-pending transactions that have not yet landed on-Chain.
    GetPendingTxNonce { req_id: ReqId, sender: [u8; 20] },
    /// As [`Self::GetPendingTxNonce`], but counting only transactions the
    /// mempool itself is currently tracking (no on-Chain lookup).
    GetMempoolTxNonce { req_id: ReqId, sender: [u8; 20] },
    GetTxByHash { req_id: ReqId, tx_sig: [u8; 32] },
    GetGasPrice { req_id: ReqId },
    GetStateTxCnt { req_id: ReqId, sender: [u8; 20] },
    GetOperatorResourceList { req_id: ReqId },
    InitOperatorResource { req_id: ReqId, resource_id: u32 },
    GetElfParamDict { req_id: ReqId },
    GetAltList { req_id: ReqId, operator_key: Pubkey },
    DeactivateAltList { req_id: ReqId, tables: Vec<Pubkey> },
    CloseAltList { req_id: ReqId, tables: Vec<Pubkey> },
    GetStuckTxList { req_id: ReqId },
    FreeResource { req_id: ReqId, resource_id: u32, force_reinit: bool },
}

impl MPRequest {
    #[must_use]
    pub fn req_id(&self) -> ReqId {
        match self {
            MPRequest::SendTransaction { req_id, .. }
            | MPRequest::GetPendingTxNonce { req_id, .. }
            | MPRequest::GetMempoolTxNonce { req_id, .. }
            | MPRequest::GetTxByHash { req_id, .. }
            | MPRequest::GetGasPrice { req_id }
            | MPRequest::GetStateTxCnt { req_id, .. }
            | MPRequest::GetOperatorResourceList { req_id }
            | MPRequest::InitOperatorResource { req_id, .. }
            | MPRequest::GetElfParamDict { req_id }
            | MPRequest::GetAltList { req_id, .. }
            | MPRequest::DeactivateAltList { req_id, .. }
            | MPRequest::CloseAltList { req_id, .. }
            | MPRequest::GetStuckTxList { req_id }
            | MPRequest::FreeResource { req_id, .. } => *req_id,
        }
    }

    #[must_use]
    pub fn code(&self) -> MPRequestCode {
        match self {
            MPRequest::SendTransaction { .. } => MPRequestCode::SendTransaction,
            MPRequest::GetPendingTxNonce { .. } => MPRequestCode::GetPendingTxNonce,
            MPRequest::GetMempoolTxNonce { .. } => MPRequestCode::GetMempoolTxNonce,
            MPRequest::GetTxByHash { .. } => MPRequestCode::GetTxByHash,
            MPRequest::GetGasPrice { .. } => MPRequestCode::GetGasPrice,
            MPRequest::GetStateTxCnt { .. } => MPRequestCode::GetStateTxCnt,
            MPRequest::GetOperatorResourceList { .. } => MPRequestCode::GetOperatorResourceList,
            MPRequest::InitOperatorResource { .. } => MPRequestCode::InitOperatorResource,
            MPRequest::GetElfParamDict { .. } => MPRequestCode::GetElfParamDict,
            MPRequest::GetAltList { .. } => MPRequestCode::GetAltList,
            MPRequest::DeactivateAltList { .. } => MPRequestCode::DeactivateAltList,
            MPRequest::CloseAltList { .. } => MPRequestCode::CloseAltList,
            MPRequest::GetStuckTxList { .. } => MPRequestCode::GetStuckTxList,
            MPRequest::FreeResource { .. } => MPRequestCode::FreeResource,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTxStatus {
    Accepted,
    AlreadyKnown,
    NonceTooLow { tx_nonce: u64, state_nonce: u64 },
    Underpriced,
}

/// §4.5 `InitOperatorResource` reply shape — mirrors the reference's
/// distinct "go ahead and retry" (`Reschedule`) vs. "this resource's
/// on-chain state is corrupt, force-reinit" (`StuckTx`) outcomes, which a
/// plain bool can't tell apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOperatorResourceStatus {
    Success,
    Failed,
    Reschedule,
    StuckTx,
}

#[derive(Debug, Clone)]
pub enum MPResponse {
    SendTransaction { req_id: ReqId, status: SendTxStatus },
    PendingTxNonce { req_id: ReqId, nonce: u64 },
    MempoolTxNonce { req_id: ReqId, nonce: u64 },
    TxByHash { req_id: ReqId, tx: Option<EthTx> },
    GasPrice { req_id: ReqId, suggested_gas_price: u128, min_gas_price: u128 },
    StateTxCnt { req_id: ReqId, tx_cnt: u64 },
    OperatorResourceList { req_id: ReqId, resources: Vec<crate::types::op_res::OpResId> },
    InitOperatorResource { req_id: ReqId, status: InitOperatorResourceStatus, err: Option<String> },
    ElfParamDict { req_id: ReqId, params: std::collections::HashMap<String, String> },
    AltList { req_id: ReqId, tables: Vec<Pubkey> },
    DeactivateAltList { req_id: ReqId, deactivated: Vec<Pubkey> },
    CloseAltList { req_id: ReqId, closed: Vec<Pubkey> },
    StuckTxList { req_id: ReqId, stuck_txs: Vec<crate::types::stuck_tx::StuckTxRecord> },
    FreeResource { req_id: ReqId, ok: bool },
    /// A request that failed; carries the originating request's id so a
    /// correlating caller can still match it up (§4.5's exactly-one-reply
    /// contract holds even on error).
    Error { req_id: ReqId, message: String, code: i32 },
}

impl MPResponse {
    #[must_use]
    pub fn req_id(&self) -> ReqId {
        match self {
            MPResponse::SendTransaction { req_id, .. }
            | MPResponse::PendingTxNonce { req_id, .. }
            | MPResponse::MempoolTxNonce { req_id, .. }
            | MPResponse::TxByHash { req_id, .. }
            | MPResponse::GasPrice { req_id, .. }
            | MPResponse::StateTxCnt { req_id, .. }
            | MPResponse::OperatorResourceList { req_id, .. }
            | MPResponse::InitOperatorResource { req_id, .. }
            | MPResponse::ElfParamDict { req_id, .. }
            | MPResponse::AltList { req_id, .. }
            | MPResponse::DeactivateAltList { req_id, .. }
            | MPResponse::CloseAltList { req_id, .. }
            | MPResponse::StuckTxList { req_id, .. }
            | MPResponse::FreeResource { req_id, .. }
            | MPResponse::Error { req_id, .. } => *req_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_req_id_always_matches_request_req_id() {
        let request = MPRequest::GetGasPrice { req_id: 42 };
        let response = MPResponse::GasPrice { req_id: request.req_id(), suggested_gas_price: 1, min_gas_price: 1 };
        assert_eq!(request.req_id(), response.req_id());
    }

    #[test]
    fn request_code_matches_variant() {
        let request = MPRequest::FreeResource { req_id: 1, resource_id: 0, force_reinit: true };
        assert_eq!(request.code(), MPRequestCode::FreeResource);
    }

    #[test]
    fn request_codes_are_wire_stable() {
        assert_eq!(MPRequestCode::SendTransaction as u8, 0);
        assert_eq!(MPRequestCode::GetPendingTxNonce as u8, 1);
        assert_eq!(MPRequestCode::GetMempoolTxNonce as u8, 2);
        assert_eq!(MPRequestCode::GetTxByHash as u8, 3);
        assert_eq!(MPRequestCode::GetGasPrice as u8, 4);
        assert_eq!(MPRequestCode::GetStateTxCnt as u8, 5);
        assert_eq!(MPRequestCode::GetOperatorResourceList as u8, 6);
        assert_eq!(MPRequestCode::InitOperatorResource as u8, 7);
        assert_eq!(MPRequestCode::GetElfParamDict as u8, 8);
        assert_eq!(MPRequestCode::GetAltList as u8, 9);
        assert_eq!(MPRequestCode::DeactivateAltList as u8, 10);
        assert_eq!(MPRequestCode::CloseAltList as u8, 11);
        assert_eq!(MPRequestCode::GetStuckTxList as u8, 12);
        assert_eq!(MPRequestCode::FreeResource as u8, 13);
    }
}
