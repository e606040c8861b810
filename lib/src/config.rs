use std::{env, str::FromStr, sync::Arc};

use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Keypair};

use crate::errors::ProxyError;

/// Resolution policy for [`Config::start_slot`], see §4.7 / §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartSlot {
    Latest,
    Continue,
    Number(u64),
}

impl FromStr for StartSlot {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "LATEST" => StartSlot::Latest,
            "CONTINUE" => StartSlot::Continue,
            n => n
                .parse::<u64>()
                .map(StartSlot::Number)
                .unwrap_or(StartSlot::Latest),
        })
    }
}

#[derive(Debug)]
pub struct Config {
    pub evm_program_id: Pubkey,
    pub fee_payer: Option<Arc<Keypair>>,
    pub commitment: CommitmentConfig,
    pub json_rpc_url: String,
    pub keypair_path: String,

    /// §4.1 — modulus for `treasury_pool_index`.
    pub treasury_pool_count: u32,

    /// §6 / §4.7 — indexer start-slot resolution policy.
    pub start_slot: StartSlot,
    /// §4.7 — sleep between indexer loop iterations.
    pub indexer_check_msec: u64,
    /// §4.4 — retries per strategy before `NoMoreRetries`.
    pub retry_on_fail: u32,

    pub gas_less_tx_max_nonce: u64,
    pub gas_less_tx_max_gas: u64,

    pub enable_send_tx_api: bool,
    pub enable_private_api: bool,
    pub use_earliest_block_if_0_passed: bool,

    /// Current chain id, used by the validator's `WrongChainId` check.
    pub chain_id: u64,
    pub min_gas_price: u64,
}

impl Config {
    /// # Errors
    /// Returns an error if `EVM_PROGRAM_ID` is missing or not a valid pubkey.
    pub fn from_environment() -> Result<Self, ProxyError> {
        let evm_program_id = env::var("EVM_PROGRAM_ID")
            .ok()
            .and_then(|v| Pubkey::from_str(&v).ok())
            .ok_or_else(|| ProxyError::InvalidParam {
                field: "EVM_PROGRAM_ID".to_owned(),
                reason: "must be set to a valid pubkey".to_owned(),
            })?;

        let commitment = env::var("COMMITMENT")
            .ok()
            .and_then(|v| CommitmentConfig::from_str(&v).ok())
            .unwrap_or_else(CommitmentConfig::confirmed);

        let json_rpc_url = env::var("SOLANA_URL").expect("solana url variable must be set");
        let keypair_path = env::var("KEYPAIR").expect("keypair variable must be set");

        let fee_payer = env::var("FEEPAIR")
            .ok()
            .and_then(|path| solana_sdk::signature::read_keypair_file(path).ok())
            .map(Arc::new);

        let treasury_pool_count = env_parse_or("NEON_POOL_COUNT", 128);

        let start_slot = env::var("START_SLOT")
            .ok()
            .and_then(|v| StartSlot::from_str(&v).ok())
            .unwrap_or(StartSlot::Latest);
        let indexer_check_msec = env_parse_or("INDEXER_CHECK_MSEC", 200);
        let retry_on_fail = env_parse_or("RETRY_ON_FAIL", 10);

        let gas_less_tx_max_nonce = env_parse_or("GAS_LESS_TX_MAX_NONCE", 5);
        let gas_less_tx_max_gas = env_parse_or("GAS_LESS_TX_MAX_GAS", 10_000_000_000_u64);

        let enable_send_tx_api = env_bool_or("ENABLE_SEND_TX_API", true);
        let enable_private_api = env_bool_or("ENABLE_PRIVATE_API", false);
        let use_earliest_block_if_0_passed = env_bool_or("USE_EARLIEST_BLOCK_IF_0_PASSED", false);

        let chain_id = env_parse_or("NEON_CHAIN_ID", 245_022_940_u64);
        let min_gas_price = env_parse_or("MIN_GAS_PRICE", 0_u64);

        Ok(Self {
            evm_program_id,
            fee_payer,
            commitment,
            json_rpc_url,
            keypair_path,
            treasury_pool_count,
            start_slot,
            indexer_check_msec,
            retry_on_fail,
            gas_less_tx_max_nonce,
            gas_less_tx_max_gas,
            enable_send_tx_api,
            enable_private_api,
            use_earliest_block_if_0_passed,
            chain_id,
            min_gas_price,
        })
    }
}

fn env_parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool_or(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_slot_parses_known_literals() {
        assert_eq!(StartSlot::from_str("LATEST").unwrap(), StartSlot::Latest);
        assert_eq!(
            StartSlot::from_str("CONTINUE").unwrap(),
            StartSlot::Continue
        );
        assert_eq!(
            StartSlot::from_str("12345").unwrap(),
            StartSlot::Number(12345)
        );
    }

    #[test]
    fn start_slot_falls_back_to_latest_on_garbage() {
        assert_eq!(StartSlot::from_str("banana").unwrap(), StartSlot::Latest);
    }
}
