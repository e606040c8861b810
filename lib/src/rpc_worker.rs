//! RPC Worker (§4.6, C6): translates a single JSON-RPC call into calls
//! against the mempool actor, the historical indexer database, and the
//! Chain RPC, and maps the result back into JSON-RPC-shaped values.
//! Grounded in `neon_rpc_api_worker.py`'s `NeonRpcApiWorker`.
use std::sync::{atomic::{AtomicU64, Ordering}, Arc};

use serde_json::{json, Value};

use crate::{
    cache::{EvmParamCache, GasPrice, GasPriceCache},
    chain_rpc::Rpc,
    errors::ProxyError,
    indexer_db::IndexerDb,
    mempool::MempoolClient,
    types::{
        eth_tx::EthTx,
        mempool_api::{MPRequest, MPResponse, SendTxStatus},
    },
};

/// This proxy's own `(major, minor)`, compared against the Chain program's
/// `NEON_EVM_VERSION` by [`EvmParamCache::method_is_allowed`] (§4.8).
pub const PROXY_EVM_VERSION: (u32, u32) = (1, 14);

/// §4.6 — block tags the worker resolves against the indexer or Chain RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
    Finalized,
    Safe,
    Earliest,
    Number(u64),
}

/// Parses an `eth_*` block tag parameter: one of the named literals, or a
/// `0x`-prefixed block number.
///
/// # Errors
/// Returns [`ProxyError::InvalidParam`] for anything else.
pub fn process_block_tag(tag: &str) -> Result<BlockTag, ProxyError> {
    match tag {
        "latest" => Ok(BlockTag::Latest),
        "pending" => Ok(BlockTag::Pending),
        "finalized" => Ok(BlockTag::Finalized),
        "safe" => Ok(BlockTag::Safe),
        "earliest" => Ok(BlockTag::Earliest),
        hex_or_dec => {
            let stripped = hex_or_dec.strip_prefix("0x").ok_or_else(|| ProxyError::InvalidParam {
                field: "tag".to_owned(),
                reason: format!("'{hex_or_dec}' is not a known block tag or 0x-number"),
            })?;
            let slot = u64::from_str_radix(stripped, 16).map_err(|_| ProxyError::InvalidParam {
                field: "tag".to_owned(),
                reason: format!("'{hex_or_dec}' is not valid hex"),
            })?;
            Ok(BlockTag::Number(slot))
        }
    }
}

/// §4.6 — rejects tags the worker never supports: anything but the five
/// named literals or a `0x`-number is malformed input, not a missing block.
pub fn validate_block_tag(tag: &str) -> Result<(), ProxyError> {
    process_block_tag(tag).map(|_| ())
}

/// Strips an optional `0x` prefix and decodes the remaining hex digits.
///
/// # Errors
/// Returns [`ProxyError::FromHexError`] on malformed hex.
pub fn normalize_hex(value: &str) -> Result<Vec<u8>, ProxyError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let padded = if stripped.len() % 2 == 1 { format!("0{stripped}") } else { stripped.to_owned() };
    Ok(hex::decode(padded)?)
}

/// Decodes and EIP-55 checksums a `0x`-prefixed 20-byte Ethereum address.
///
/// # Errors
/// Returns [`ProxyError::InvalidParam`] if the decoded length isn't 20 bytes.
pub fn normalize_address(value: &str) -> Result<[u8; 20], ProxyError> {
    let bytes = normalize_hex(value)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| ProxyError::InvalidParam {
        field: "address".to_owned(),
        reason: format!("expected 20 bytes, got {}", bytes.len()),
    })
}

/// EIP-55 mixed-case checksum encoding of an address.
#[must_use]
pub fn checksum_address(address: [u8; 20]) -> String {
    let lower = hex::encode(address);
    let digest = solana_sdk::keccak::hash(lower.as_bytes()).to_bytes();

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        if c.is_ascii_digit() {
            out.push(c);
            continue;
        }
        let nibble = if i % 2 == 0 { digest[i / 2] >> 4 } else { digest[i / 2] & 0x0f };
        if nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Decodes a `0x`-prefixed, 32-byte log topic.
///
/// # Errors
/// Returns [`ProxyError::InvalidParam`] if the decoded length isn't 32 bytes.
pub fn normalize_topic(value: &str) -> Result<[u8; 32], ProxyError> {
    let bytes = normalize_hex(value)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| ProxyError::InvalidParam {
        field: "topic".to_owned(),
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })
}

/// Decodes a `0x`-prefixed, 32-byte Neon transaction signature.
///
/// # Errors
/// Returns [`ProxyError::InvalidParam`] if the decoded length isn't 32 bytes.
pub fn normalize_tx_id(value: &str) -> Result<[u8; 32], ProxyError> {
    let bytes = normalize_hex(value)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| ProxyError::InvalidParam {
        field: "tx_id".to_owned(),
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })
}

/// int -> name map for the Chain program's EVM event log codes (§4.6).
#[must_use]
pub fn decode_event_type(code: i32) -> &'static str {
    match code {
        1 => "LOG",
        101 => "ENTER CALL",
        102 => "ENTER CALLCODE",
        103 => "ENTER STATICCALL",
        104 => "ENTER DELEGATECALL",
        105 => "ENTER CREATE",
        106 => "ENTER CREATE2",
        201 => "EXIT STOP",
        202 => "EXIT RETURN",
        203 => "EXIT SELFDESTRUCT",
        204 => "EXIT REVERT",
        300 => "RETURN",
        301 => "CANCEL",
        _ => "UNKNOWN",
    }
}

/// Gas-less tx eligibility (§4.6): small-nonce, small-gas transactions from
/// accounts holding a gas tank permit are allowed through with a gas price
/// of zero. The permit lookup itself is an external collaborator — this
/// only encodes the nonce/gas bound the original checks before calling it.
#[must_use]
pub fn within_gas_less_bounds(tx: &EthTx, max_nonce: u64, max_gas: u128) -> bool {
    tx.nonce <= max_nonce && u128::try_from(tx.gas_limit).unwrap_or(u128::MAX) <= max_gas
}

fn next_req_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// §4.6, C6 — the JSON-RPC worker. Holds no transaction-execution logic of
/// its own: every state-changing or chain-reading call is delegated to the
/// mempool actor, the indexer, or the Chain RPC.
pub struct RpcWorker {
    pub mempool: MempoolClient,
    pub db: Arc<dyn IndexerDb>,
    pub rpc: Arc<dyn Rpc>,
    pub chain_id: u64,
    pub gas_less_tx_max_nonce: u64,
    pub gas_less_tx_max_gas: u64,
    gas_price_cache: GasPriceCache,
    evm_param_cache: EvmParamCache,
}

impl RpcWorker {
    #[must_use]
    pub fn new(mempool: MempoolClient, db: Arc<dyn IndexerDb>, rpc: Arc<dyn Rpc>, chain_id: u64) -> Self {
        Self {
            mempool,
            db,
            rpc,
            chain_id,
            gas_less_tx_max_nonce: 5,
            gas_less_tx_max_gas: 10_000_000_000,
            gas_price_cache: GasPriceCache::new(),
            evm_param_cache: EvmParamCache::new(),
        }
    }

    /// §4.8 — whether `method` may currently be served: always-allowed
    /// read-only methods need only the EVM params to be known at all;
    /// anything else also needs `NEON_EVM_VERSION` to agree with this
    /// proxy's own version on major.minor.
    #[must_use]
    pub fn is_method_allowed(&self, method: &str) -> bool {
        self.evm_param_cache.method_is_allowed(method, PROXY_EVM_VERSION)
    }

    #[must_use]
    pub fn eth_chain_id(&self) -> Value {
        json!(format!("0x{:x}", self.chain_id))
    }

    #[must_use]
    pub fn net_version(&self) -> Value {
        json!(self.chain_id.to_string())
    }

    /// # Errors
    /// Returns [`ProxyError::Reschedule`] if the mempool actor is unreachable.
    pub async fn eth_gas_price(&self) -> Result<Value, ProxyError> {
        let price = self.fetch_gas_price().await?;
        Ok(json!(format!("0x{:x}", price.suggested_gas_price)))
    }

    /// The `neon_gasPrice` extension additionally reports the floor below
    /// which a non-gas-less tx is rejected as underpriced.
    ///
    /// # Errors
    /// Returns [`ProxyError::Reschedule`] if the mempool actor is unreachable.
    pub async fn neon_gas_price(&self) -> Result<Value, ProxyError> {
        let price = self.fetch_gas_price().await?;
        Ok(json!({
            "gasPrice": format!("0x{:x}", price.suggested_gas_price),
            "suggestedGasPrice": format!("0x{:x}", price.suggested_gas_price),
            "minAcceptableGasPrice": format!("0x{:x}", price.min_gas_price),
            "minExecutableGasPrice": format!("0x{:x}", price.min_executable_gas_price),
        }))
    }

    /// §4.8 — refreshed at most once per wall-clock second; a failed
    /// mempool round trip falls back to the last price obtained instead of
    /// failing the caller, unless no price has ever been cached.
    async fn fetch_gas_price(&self) -> Result<GasPrice, ProxyError> {
        self.gas_price_cache
            .get_or_refresh(|| async {
                let response = self.mempool.call(MPRequest::GetGasPrice { req_id: next_req_id() }).await?;
                match response {
                    MPResponse::GasPrice { suggested_gas_price, min_gas_price, .. } => Ok(GasPrice {
                        suggested_gas_price,
                        min_gas_price,
                        min_executable_gas_price: min_gas_price,
                    }),
                    MPResponse::Error { message, .. } => Err(ProxyError::EthereumError(message)),
                    _ => Err(ProxyError::Unspecified),
                }
            })
            .await
    }

    /// §4.8 — same TTL-by-second contract as [`Self::fetch_gas_price`], over
    /// `GetElfParamDict`. Used by [`Self::is_method_allowed`] to gate the
    /// write path on proxy/EVM version compatibility.
    pub async fn refresh_evm_params(&self) -> Result<std::collections::HashMap<String, String>, ProxyError> {
        self.evm_param_cache
            .get_or_refresh(|| async {
                let response = self.mempool.call(MPRequest::GetElfParamDict { req_id: next_req_id() }).await?;
                match response {
                    MPResponse::ElfParamDict { params, .. } => Ok(params),
                    MPResponse::Error { message, .. } => Err(ProxyError::EthereumError(message)),
                    _ => Err(ProxyError::Unspecified),
                }
            })
            .await
    }

    /// # Errors
    /// Returns [`ProxyError::InvalidParam`] for a malformed tag or address.
    pub async fn eth_get_balance(&self, address: &str, tag: &str) -> Result<Value, ProxyError> {
        let address = normalize_address(address)?;
        // §4.6 — an absent account reads as a zero balance rather than an
        // error, matching `_get_zero_balance`.
        validate_block_tag(tag)?;
        match self.rpc.get_balance(&pubkey_for_neon_account(&address)).await {
            Ok(lamports) => Ok(json!(format!("0x{:x}", lamports))),
            Err(err) if err.to_string().contains("AccountNotFound") => Ok(json!("0x0")),
            Err(err) => Err(ProxyError::from(err)),
        }
    }

    /// §4.6/§6 — tag dispatch: `pending` takes the max of the on-Chain nonce
    /// and the mempool's pending-tx nonce; `latest` takes the max of the
    /// on-Chain nonce and the mempool's any-state nonce; `finalized`/`safe`
    /// return the finalized on-Chain nonce with no mempool contribution;
    /// anything else (a specific block tag) returns the confirmed on-Chain
    /// nonce alone.
    ///
    /// # Errors
    /// Returns [`ProxyError::InvalidParam`] for a malformed tag/address.
    pub async fn eth_get_transaction_count(&self, address: &str, tag: &str) -> Result<Value, ProxyError> {
        let block_tag = process_block_tag(tag)?;
        let address = normalize_address(address)?;

        let state_tx_cnt = match self
            .mempool
            .call(MPRequest::GetStateTxCnt { req_id: next_req_id(), sender: address })
            .await
        {
            Ok(MPResponse::StateTxCnt { tx_cnt, .. }) => tx_cnt,
            _ => 0,
        };

        let mempool_nonce = match block_tag {
            BlockTag::Pending => {
                match self
                    .mempool
                    .call(MPRequest::GetPendingTxNonce { req_id: next_req_id(), sender: address })
                    .await
                {
                    Ok(MPResponse::PendingTxNonce { nonce, .. }) => Some(nonce),
                    _ => None,
                }
            }
            BlockTag::Latest => {
                match self
                    .mempool
                    .call(MPRequest::GetMempoolTxNonce { req_id: next_req_id(), sender: address })
                    .await
                {
                    Ok(MPResponse::MempoolTxNonce { nonce, .. }) => Some(nonce),
                    _ => None,
                }
            }
            BlockTag::Finalized | BlockTag::Safe | BlockTag::Earliest | BlockTag::Number(_) => None,
        };

        let tx_count = state_tx_cnt.max(mempool_nonce.unwrap_or(0));
        Ok(json!(format!("0x{:x}", tx_count)))
    }

    /// # Errors
    /// Returns [`ProxyError::ClientError`] on an unreachable Chain RPC.
    pub async fn eth_block_number(&self) -> Result<Value, ProxyError> {
        let block = self.db.get_latest_block().await?;
        Ok(json!(format!("0x{:x}", block.slot)))
    }

    /// # Errors
    /// Propagates indexer/mempool errors; returns `Ok(None)` if the tx is
    /// unknown to both the indexer and the mempool.
    pub async fn eth_get_transaction_receipt(&self, tx_sig: &str) -> Result<Option<Value>, ProxyError> {
        let sig = normalize_tx_id(tx_sig)?;
        let hex_sig = format!("0x{}", hex::encode(sig));

        let Some(tx) = self.db.get_tx_by_neon_sig(&hex_sig).await? else {
            return Ok(None);
        };

        let log_list = self.db.get_log_list(tx.slot, tx.slot, &[], &[]).await?;
        let logs: Vec<Value> = log_list
            .iter()
            .map(|log| {
                json!({
                    "address": log.address,
                    "topics": log.topics,
                    "data": format!("0x{}", hex::encode(&log.data)),
                    "neonEventType": log.neon_event_type.map(decode_event_type),
                })
            })
            .collect();

        Ok(Some(json!({
            "transactionHash": tx.tx_sig_hex,
            "blockHash": tx.block_hash,
            "blockNumber": format!("0x{:x}", tx.slot),
            "logs": logs,
            "logsBloom": format!("0x{}", "0".repeat(512)),
        })))
    }

    /// Decodes a raw signed transaction and forwards it to the mempool
    /// actor, translating its `SendTxStatus` the way `eth_sendRawTransaction`
    /// does: `Accepted`/`AlreadyKnown` return the tx hash, `Underpriced` and
    /// `NonceTooLow` become Ethereum-shaped errors, anything else is an
    /// opaque `"unknown error"`.
    ///
    /// # Errors
    /// Returns [`ProxyError::InvalidTx`] if `raw_tx` doesn't decode, or an
    /// [`ProxyError::EthereumError`]/[`ProxyError::NonceTooLow`] translating
    /// the mempool's rejection.
    pub async fn eth_send_raw_transaction(&self, raw_tx: &str) -> Result<Value, ProxyError> {
        let raw = normalize_hex(raw_tx)?;
        let tx = EthTx::from_rlp(&raw)?;
        let hex_sig = format!("0x{}", hex::encode(tx.tx_sig));

        let response = self.mempool.call(MPRequest::SendTransaction { req_id: next_req_id(), raw_tx: raw }).await?;

        match response {
            MPResponse::SendTransaction { status: SendTxStatus::Accepted | SendTxStatus::AlreadyKnown, .. } => {
                Ok(json!(hex_sig))
            }
            MPResponse::SendTransaction { status: SendTxStatus::Underpriced, .. } => {
                Err(ProxyError::EthereumError("replacement transaction underpriced".to_owned()))
            }
            MPResponse::SendTransaction { status: SendTxStatus::NonceTooLow { tx_nonce, state_nonce }, .. } => {
                let sender = hex::encode(tx.recover_sender()?);
                Err(ProxyError::NonceTooLow(sender, tx_nonce, state_nonce))
            }
            MPResponse::Error { message, .. } => Err(ProxyError::EthereumError(message)),
            _ => Err(ProxyError::EthereumError("unknown error".to_owned())),
        }
    }

    /// # Errors
    /// Returns [`ProxyError::InvalidParam`] for a malformed `from_block`/`to_block`.
    pub async fn eth_get_logs(
        &self,
        from_block: &str,
        to_block: &str,
        addresses: &[String],
        topics: &[String],
    ) -> Result<Value, ProxyError> {
        let from_slot = self.resolve_log_slot(from_block).await?;
        let to_slot = self.resolve_log_slot(to_block).await?;

        for topic in topics {
            normalize_topic(topic)?;
        }
        let addresses: Vec<[u8; 20]> = addresses.iter().map(|a| normalize_address(a)).collect::<Result<_, _>>()?;
        let address_strings: Vec<String> = addresses.iter().map(|a| format!("0x{}", hex::encode(a))).collect();

        let logs = self.db.get_log_list(from_slot, to_slot, &address_strings, topics).await?;
        let out: Vec<Value> = logs
            .iter()
            .map(|log| {
                json!({
                    "address": log.address,
                    "topics": log.topics,
                    "data": format!("0x{}", hex::encode(&log.data)),
                })
            })
            .collect();
        Ok(json!(out))
    }

    async fn resolve_log_slot(&self, tag: &str) -> Result<u64, ProxyError> {
        match process_block_tag(tag)? {
            BlockTag::Number(slot) => Ok(slot),
            BlockTag::Earliest => Ok(self.db.get_starting_block().await?.slot),
            BlockTag::Finalized | BlockTag::Safe => Ok(self.db.get_finalized_block().await?.slot),
            BlockTag::Latest | BlockTag::Pending => Ok(self.db.get_latest_block().await?.slot),
        }
    }
}

/// Neon accounts are keyed by a Chain PDA derived from the 20-byte Ethereum
/// address; this worker only needs a stable, deterministic placeholder
/// mapping for the accounts it queries balances/nonces for directly.
fn pubkey_for_neon_account(address: &[u8; 20]) -> solana_sdk::pubkey::Pubkey {
    let mut seed = [0u8; 32];
    seed[12..32].copy_from_slice(address);
    solana_sdk::pubkey::Pubkey::new_from_array(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_block_tag_recognizes_named_literals() {
        assert_eq!(process_block_tag("latest").unwrap(), BlockTag::Latest);
        assert_eq!(process_block_tag("pending").unwrap(), BlockTag::Pending);
        assert_eq!(process_block_tag("0x10").unwrap(), BlockTag::Number(16));
    }

    #[test]
    fn process_block_tag_rejects_garbage() {
        assert!(process_block_tag("soon").is_err());
    }

    #[test]
    fn normalize_hex_accepts_with_and_without_prefix() {
        assert_eq!(normalize_hex("0x0a").unwrap(), vec![0x0a]);
        assert_eq!(normalize_hex("0a").unwrap(), vec![0x0a]);
    }

    #[test]
    fn normalize_address_rejects_wrong_length() {
        assert!(normalize_address("0x1234").is_err());
    }

    #[test]
    fn checksum_address_matches_known_eip55_vector() {
        let address: [u8; 20] = hex::decode("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap().try_into().unwrap();
        assert_eq!(checksum_address(address), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn decode_event_type_maps_known_codes_and_falls_back() {
        assert_eq!(decode_event_type(1), "LOG");
        assert_eq!(decode_event_type(301), "CANCEL");
        assert_eq!(decode_event_type(9999), "UNKNOWN");
    }

    fn signed_tx_rlp(nonce: u64, gas_limit: u64, chain_id: u64, key: &libsecp256k1::SecretKey) -> Vec<u8> {
        let mut unsigned = rlp::RlpStream::new_list(9);
        unsigned.append(&nonce);
        unsigned.append(&1_000_000_000u64);
        unsigned.append(&gas_limit);
        unsigned.append_empty_data();
        unsigned.append(&0u64);
        unsigned.append_empty_data();
        unsigned.append(&chain_id);
        unsigned.append_empty_data();
        unsigned.append_empty_data();
        let hash = solana_sdk::keccak::hash(&unsigned.out()).to_bytes();

        let message = libsecp256k1::Message::parse(&hash);
        let (signature, recovery_id) = libsecp256k1::sign(&message, key);
        let sig_bytes = signature.serialize();
        let v = chain_id * 2 + 35 + u64::from(recovery_id.serialize());

        let mut signed = rlp::RlpStream::new_list(9);
        signed.append(&nonce);
        signed.append(&1_000_000_000u64);
        signed.append(&gas_limit);
        signed.append_empty_data();
        signed.append(&0u64);
        signed.append_empty_data();
        signed.append(&v);
        signed.append(&sig_bytes[0..32].to_vec());
        signed.append(&sig_bytes[32..64].to_vec());
        signed.out().to_vec()
    }

    #[test]
    fn gas_less_bounds_reject_past_nonce_ceiling() {
        let key = libsecp256k1::SecretKey::parse(&[9u8; 32]).unwrap();
        let within = EthTx::from_rlp(&signed_tx_rlp(1, 21_000, 245_022_940, &key)).unwrap();
        let beyond = EthTx::from_rlp(&signed_tx_rlp(50, 21_000, 245_022_940, &key)).unwrap();

        assert!(within_gas_less_bounds(&within, 5, 10_000_000_000));
        assert!(!within_gas_less_bounds(&beyond, 5, 10_000_000_000));
    }

    #[test]
    fn gas_less_bounds_reject_past_gas_ceiling() {
        let key = libsecp256k1::SecretKey::parse(&[9u8; 32]).unwrap();
        let too_much_gas = EthTx::from_rlp(&signed_tx_rlp(1, 50_000_000, 245_022_940, &key)).unwrap();
        assert!(!within_gas_less_bounds(&too_much_gas, 5, 10_000_000));
    }

    struct UnreachableDb;

    #[async_trait::async_trait]
    impl IndexerDb for UnreachableDb {
        async fn get_tx_by_neon_sig(&self, _sig: &str) -> Result<Option<crate::indexer_db::TxInfo>, ProxyError> {
            unreachable!("not exercised by this test")
        }
        async fn get_tx_list_by_block_slot(&self, _slot: u64) -> Result<Vec<crate::indexer_db::TxInfo>, ProxyError> {
            unreachable!("not exercised by this test")
        }
        async fn get_block_by_hash(&self, _hash: &str) -> Result<Option<crate::indexer_db::BlockInfo>, ProxyError> {
            unreachable!("not exercised by this test")
        }
        async fn get_block_by_slot(&self, _slot: u64) -> Result<Option<crate::indexer_db::BlockInfo>, ProxyError> {
            unreachable!("not exercised by this test")
        }
        async fn get_latest_block(&self) -> Result<crate::indexer_db::BlockInfo, ProxyError> {
            unreachable!("not exercised by this test")
        }
        async fn get_finalized_block(&self) -> Result<crate::indexer_db::BlockInfo, ProxyError> {
            unreachable!("not exercised by this test")
        }
        async fn get_starting_block(&self) -> Result<crate::indexer_db::BlockInfo, ProxyError> {
            unreachable!("not exercised by this test")
        }
        async fn get_log_list(
            &self,
            _from_slot: u64,
            _to_slot: u64,
            _addresses: &[String],
            _topics: &[String],
        ) -> Result<Vec<crate::indexer_db::LogEntry>, ProxyError> {
            unreachable!("not exercised by this test")
        }
    }

    struct UnreachableRpc;

    #[async_trait::async_trait]
    impl Rpc for UnreachableRpc {
        fn commitment(&self) -> solana_sdk::commitment_config::CommitmentConfig {
            solana_sdk::commitment_config::CommitmentConfig::confirmed()
        }
        async fn get_account(
            &self,
            _key: &solana_sdk::pubkey::Pubkey,
        ) -> solana_client::client_error::Result<Option<solana_sdk::account::Account>> {
            unreachable!("not exercised by this test")
        }
        async fn get_multiple_accounts(
            &self,
            _keys: &[solana_sdk::pubkey::Pubkey],
        ) -> solana_client::client_error::Result<Vec<Option<solana_sdk::account::Account>>> {
            unreachable!("not exercised by this test")
        }
        async fn get_balance(&self, _key: &solana_sdk::pubkey::Pubkey) -> solana_client::client_error::Result<u64> {
            unreachable!("not exercised by this test")
        }
        async fn get_slot(&self) -> solana_client::client_error::Result<solana_sdk::clock::Slot> {
            unreachable!("not exercised by this test")
        }
        async fn get_latest_blockhash(&self) -> solana_client::client_error::Result<solana_sdk::hash::Hash> {
            unreachable!("not exercised by this test")
        }
        async fn get_signature_status(
            &self,
            _signature: &solana_sdk::signature::Signature,
        ) -> solana_client::client_error::Result<Option<bool>> {
            unreachable!("not exercised by this test")
        }
        async fn get_cluster_nodes_count(&self) -> solana_client::client_error::Result<usize> {
            unreachable!("not exercised by this test")
        }
        async fn send_transaction(
            &self,
            _transaction: &solana_sdk::transaction::Transaction,
        ) -> solana_client::client_error::Result<solana_sdk::signature::Signature> {
            unreachable!("not exercised by this test")
        }
        async fn send_versioned_transaction(
            &self,
            _transaction: &solana_sdk::transaction::VersionedTransaction,
        ) -> solana_client::client_error::Result<solana_sdk::signature::Signature> {
            unreachable!("not exercised by this test")
        }
    }

    fn test_worker(mempool: crate::mempool::MempoolClient) -> RpcWorker {
        RpcWorker::new(mempool, Arc::new(UnreachableDb), Arc::new(UnreachableRpc), 245_022_940)
    }

    /// §4.8 — `is_method_allowed` denies everything until the EVM-param
    /// cache has been populated at least once, then gates the write path
    /// on version agreement while always-allowed reads stay open.
    #[tokio::test]
    async fn evm_param_cache_gates_api_visibility_end_to_end() {
        let (client, mut inbox) = crate::mempool::channel(4);
        let worker = test_worker(client);

        assert!(!worker.is_method_allowed("eth_getBalance"));
        assert!(!worker.is_method_allowed("eth_sendRawTransaction"));

        let responder = tokio::spawn(async move {
            let envelope = inbox.recv().await.expect("worker sends exactly one request");
            let mut params = std::collections::HashMap::new();
            params.insert("NEON_EVM_VERSION".to_owned(), format!("{}.{}.3", PROXY_EVM_VERSION.0, PROXY_EVM_VERSION.1));
            let _ = envelope.reply.send(MPResponse::ElfParamDict { req_id: envelope.request.req_id(), params });
        });

        worker.refresh_evm_params().await.expect("mempool round trip succeeds");
        responder.await.unwrap();

        assert!(worker.is_method_allowed("eth_getBalance"));
        assert!(worker.is_method_allowed("eth_sendRawTransaction"));
    }
}
