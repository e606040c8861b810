//! Transaction Validator (§4.2, C2): the `precheck` gate every incoming
//! raw tx passes through before it's handed to the strategy ladder.
use crate::{chain_rpc::Rpc, errors::ProxyError, types::eth_tx::EthTx};

/// Minimum gas price accepted when a tx doesn't qualify for a gas-less
/// permit. Populated from the [`crate::cache::GasPriceCache`] rather than
/// fixed, but given here as the explicit argument `precheck` needs so it
/// stays independent of cache internals.
pub struct PrecheckParams {
    pub chain_id: u64,
    pub min_gas_price: u128,
    pub state_tx_cnt: u64,
    pub sender_balance: ethnum::U256,
    /// Set once the caller has confirmed `tx` qualifies for a gas tank
    /// permit (small nonce, small gas limit — see
    /// `rpc_worker::within_gas_less_bounds`); skips the underpriced check
    /// entirely when set, per §4.2's "and no gas-less permit" carve-out.
    pub gas_less_permit: bool,
}

/// §4.2 — runs every check in order and returns the first failure. Callers
/// that need to keep going after a soft failure (e.g. `NonceTooHigh`,
/// which only means "not yet", not "never") inspect
/// [`ProxyError::is_internal`].
///
/// # Errors
/// - [`ProxyError::InvalidTx`] if the signature doesn't recover.
/// - [`ProxyError::WrongChainId`] if the tx names a chain id other than
///   this one and isn't chain-id-less.
/// - [`ProxyError::NonceTooLow`] / [`ProxyError::NonceTooHigh`] on a nonce
///   mismatch against `state_tx_cnt`.
/// - [`ProxyError::Underpriced`] if `gas_price < min_gas_price`.
/// - [`ProxyError::InsufficientFunds`] if the sender can't cover
///   `gas_price * gas_limit + value`.
pub fn precheck(eth_tx: &EthTx, params: &PrecheckParams) -> Result<(), ProxyError> {
    let sender = eth_tx.recover_sender()?;

    if let Some(tx_chain_id) = eth_tx.chain_id {
        if tx_chain_id != params.chain_id {
            return Err(ProxyError::WrongChainId);
        }
    }

    if eth_tx.nonce < params.state_tx_cnt {
        return Err(ProxyError::NonceTooLow(hex::encode(sender), eth_tx.nonce, params.state_tx_cnt));
    }
    if eth_tx.nonce > params.state_tx_cnt {
        return Err(ProxyError::NonceTooHigh(hex::encode(sender), eth_tx.nonce, params.state_tx_cnt));
    }

    if !params.gas_less_permit && ethnum::U256::from(params.min_gas_price) > eth_tx.gas_price {
        return Err(ProxyError::Underpriced);
    }

    let required = eth_tx.gas_price.saturating_mul(eth_tx.gas_limit).saturating_add(eth_tx.value);
    if required > params.sender_balance {
        return Err(ProxyError::InsufficientFunds);
    }

    Ok(())
}

/// Fetches `state_tx_cnt` and the sender's balance from the Chain and runs
/// [`precheck`]. Split out so the ladder can call the pure function
/// directly when it already has these values cached.
pub async fn precheck_against_chain(
    eth_tx: &EthTx,
    chain_id: u64,
    min_gas_price: u128,
    state_tx_cnt: u64,
    gas_less_permit: bool,
    rpc: &dyn Rpc,
    sender_ether_account: &solana_sdk::pubkey::Pubkey,
) -> Result<(), ProxyError> {
    let balance = rpc.get_balance(sender_ether_account).await?;
    let params = PrecheckParams {
        chain_id,
        min_gas_price,
        state_tx_cnt,
        sender_balance: ethnum::U256::from(balance),
        gas_less_permit,
    };
    precheck(eth_tx, &params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_tx(nonce: u64, chain_id: u64, gas_price: u64, gas_limit: u64, value: u64) -> EthTx {
        let key = libsecp256k1::SecretKey::parse(&[5u8; 32]).unwrap();
        let mut unsigned = rlp::RlpStream::new_list(9);
        unsigned.append(&nonce);
        unsigned.append(&gas_price);
        unsigned.append(&gas_limit);
        unsigned.append_empty_data();
        unsigned.append(&value);
        unsigned.append_empty_data();
        unsigned.append(&chain_id);
        unsigned.append_empty_data();
        unsigned.append_empty_data();
        let hash = solana_sdk::keccak::hash(&unsigned.out()).to_bytes();
        let message = libsecp256k1::Message::parse(&hash);
        let (signature, recovery_id) = libsecp256k1::sign(&message, &key);
        let sig_bytes = signature.serialize();
        let r = ethnum::U256::from_be_bytes(sig_bytes[0..32].try_into().unwrap());
        let s = ethnum::U256::from_be_bytes(sig_bytes[32..64].try_into().unwrap());
        let v = ethnum::U256::from(chain_id) * ethnum::U256::from(2_u8)
            + ethnum::U256::from(35_u8)
            + ethnum::U256::from(recovery_id.serialize());

        let mut signed = rlp::RlpStream::new_list(9);
        signed.append(&nonce);
        signed.append(&gas_price);
        signed.append(&gas_limit);
        signed.append_empty_data();
        signed.append(&value);
        signed.append_empty_data();
        signed.append(&v.to_be_bytes().to_vec());
        signed.append(&r.to_be_bytes().to_vec());
        signed.append(&s.to_be_bytes().to_vec());
        EthTx::from_rlp(&signed.out()).unwrap()
    }

    #[test]
    fn rejects_wrong_chain_id() {
        let tx = signed_tx(0, 999, 1_000_000_000, 21_000, 0);
        let params = PrecheckParams {
            chain_id: 245_022_940,
            min_gas_price: 0,
            state_tx_cnt: 0,
            sender_balance: ethnum::U256::MAX,
            gas_less_permit: false,
        };
        assert!(matches!(precheck(&tx, &params), Err(ProxyError::WrongChainId)));
    }

    #[test]
    fn rejects_nonce_mismatch_both_directions() {
        let tx = signed_tx(5, 245_022_940, 1_000_000_000, 21_000, 0);
        let too_low = PrecheckParams {
            chain_id: 245_022_940,
            min_gas_price: 0,
            state_tx_cnt: 3,
            sender_balance: ethnum::U256::MAX,
            gas_less_permit: false,
        };
        assert!(matches!(precheck(&tx, &too_low), Err(ProxyError::NonceTooLow(..))));

        let too_high = PrecheckParams { state_tx_cnt: 7, ..too_low };
        assert!(matches!(precheck(&tx, &too_high), Err(ProxyError::NonceTooHigh(..))));
    }

    #[test]
    fn rejects_underpriced_and_insufficient_funds() {
        let tx = signed_tx(0, 245_022_940, 10, 21_000, 1_000);
        let underpriced = PrecheckParams {
            chain_id: 245_022_940,
            min_gas_price: 1_000,
            state_tx_cnt: 0,
            sender_balance: ethnum::U256::MAX,
            gas_less_permit: false,
        };
        assert!(matches!(precheck(&tx, &underpriced), Err(ProxyError::Underpriced)));

        let poor = PrecheckParams { min_gas_price: 0, sender_balance: ethnum::U256::from(1_u8), ..underpriced };
        assert!(matches!(precheck(&tx, &poor), Err(ProxyError::InsufficientFunds)));
    }

    #[test]
    fn gas_less_permit_waives_the_underpriced_check() {
        let tx = signed_tx(0, 245_022_940, 0, 21_000, 0);
        let params = PrecheckParams {
            chain_id: 245_022_940,
            min_gas_price: 1_000,
            state_tx_cnt: 0,
            sender_balance: ethnum::U256::MAX,
            gas_less_permit: true,
        };
        assert!(precheck(&tx, &params).is_ok());
    }

    #[test]
    fn accepts_well_formed_tx() {
        let tx = signed_tx(0, 245_022_940, 1_000_000_000, 21_000, 0);
        let params = PrecheckParams {
            chain_id: 245_022_940,
            min_gas_price: 0,
            state_tx_cnt: 0,
            sender_balance: ethnum::U256::MAX,
            gas_less_permit: false,
        };
        assert!(precheck(&tx, &params).is_ok());
    }
}
