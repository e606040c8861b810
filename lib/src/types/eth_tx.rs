//! `EthTx` (§3): an RLP-decoded, signed Ethereum transaction plus the fields
//! derived from it once, at decode time.
use ethnum::U256;
use rlp::{Decodable, DecoderError, Rlp};
use solana_sdk::keccak;

use crate::errors::ProxyError;

#[derive(Debug, Clone)]
pub struct EthTx {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: Option<[u8; 20]>,
    pub value: U256,
    pub calldata: Vec<u8>,
    pub v: U256,
    pub r: U256,
    pub s: U256,

    /// `None` for a pre-EIP-155 tx (`v` in `{27, 28}`).
    pub chain_id: Option<u64>,
    recovery_id: u8,

    /// keccak256 of the RLP-encoded signed transaction. Stable once computed
    /// — §3's invariant that `tx_sig` never changes across encode/decode
    /// round-trips.
    pub tx_sig: [u8; 32],
    signed_hash: [u8; 32],

    raw: Vec<u8>,
}

impl EthTx {
    /// # Errors
    /// Returns [`ProxyError::RlpDecodeError`] on malformed RLP and
    /// [`ProxyError::InvalidTx`] if the signature fields don't encode a
    /// legal `v`.
    pub fn from_rlp(raw: &[u8]) -> Result<Self, ProxyError> {
        let rlp = Rlp::new(raw);
        let mut tx = Self::decode(&rlp)?;
        tx.raw = raw.to_vec();
        tx.tx_sig = keccak::hash(raw).to_bytes();
        Ok(tx)
    }

    /// §3 — `treasury_pool_index = u32_le(tx_sig[0..4]) mod treasury_pool_max`.
    #[must_use]
    pub fn treasury_pool_index(&self, treasury_pool_max: u32) -> u32 {
        treasury_pool_index_for(&self.tx_sig, treasury_pool_max)
    }

    /// Recovers the sender address from `(r, s, recovery_id)` over the
    /// EIP-155 signing hash. Returns [`ProxyError::InvalidTx`] if the
    /// signature does not recover to a valid public key.
    pub fn recover_sender(&self) -> Result<[u8; 20], ProxyError> {
        let mut sig_bytes = [0u8; 64];
        sig_bytes[0..32].copy_from_slice(&self.r.to_be_bytes());
        sig_bytes[32..64].copy_from_slice(&self.s.to_be_bytes());

        let signature = libsecp256k1::Signature::parse_standard(&sig_bytes)
            .map_err(|_| ProxyError::InvalidTx("malformed signature".to_owned()))?;
        let recovery_id = libsecp256k1::RecoveryId::parse(self.recovery_id)
            .map_err(|_| ProxyError::InvalidTx("invalid recovery id".to_owned()))?;
        let message = libsecp256k1::Message::parse(&self.signed_hash);

        let public_key = libsecp256k1::recover(&message, &signature, &recovery_id)
            .map_err(|_| ProxyError::InvalidTx("signature does not recover".to_owned()))?;

        let hash = keccak::hash(&public_key.serialize()[1..]).to_bytes();
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..32]);
        Ok(address)
    }

    #[must_use]
    pub fn calldata_len(&self) -> usize {
        self.calldata.len()
    }

    /// The RLP-encoded signed transaction bytes, exactly as decoded — the
    /// payload appended verbatim into `TxExecFromData`/`TxStepFromData`
    /// instructions (§4.1).
    #[must_use]
    pub fn raw_rlp(&self) -> &[u8] {
        &self.raw
    }
}

impl Decodable for EthTx {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if !rlp.is_list() {
            return Err(DecoderError::RlpExpectedToBeList);
        }
        if rlp.item_count()? != 9 {
            return Err(DecoderError::RlpIncorrectListLen);
        }

        let nonce: u64 = rlp.val_at(0)?;
        let gas_price = u256_at(rlp, 1)?;
        let gas_limit = u256_at(rlp, 2)?;
        let to = {
            let field = rlp.at(3)?;
            if field.is_empty() {
                None
            } else {
                let bytes = field.data()?;
                if bytes.len() != 20 {
                    return Err(DecoderError::RlpInvalidLength);
                }
                let mut addr = [0u8; 20];
                addr.copy_from_slice(bytes);
                Some(addr)
            }
        };
        let value = u256_at(rlp, 4)?;
        let calldata = rlp.at(5)?.data()?.to_vec();
        let v = u256_at(rlp, 6)?;
        let r = u256_at(rlp, 7)?;
        let s = u256_at(rlp, 8)?;

        let (chain_id, recovery_id) = if v >= U256::from(35_u8) {
            let chain_id = (v - U256::from(35_u8)) / U256::from(2_u8);
            let recovery_id = u8::from((v.clone() - U256::from(35_u8)) % U256::from(2_u8) == U256::ONE);
            (Some(u64::try_from(chain_id).map_err(|_| DecoderError::RlpInvalidLength)?), recovery_id)
        } else if v == U256::from(27_u8) {
            (None, 0u8)
        } else if v == U256::from(28_u8) {
            (None, 1u8)
        } else {
            return Err(DecoderError::RlpInvalidLength);
        };

        let signed_hash = signing_hash(rlp, chain_id)?;

        Ok(Self {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            calldata,
            v,
            r,
            s,
            chain_id,
            recovery_id,
            tx_sig: [0u8; 32],
            signed_hash,
            raw: Vec::new(),
        })
    }
}

/// §3 — shared by [`EthTx::treasury_pool_index`] and the stuck-tx resume
/// path, which only has a bare `tx_sig` to work from.
#[must_use]
pub fn treasury_pool_index_for(tx_sig: &[u8; 32], treasury_pool_max: u32) -> u32 {
    let first4: [u8; 4] = tx_sig[0..4].try_into().expect("4 bytes");
    u32::from_le_bytes(first4) % treasury_pool_max
}

fn u256_at(rlp: &Rlp, index: usize) -> Result<U256, DecoderError> {
    let bytes = rlp.at(index)?.data()?;
    if bytes.len() > 32 {
        return Err(DecoderError::RlpInvalidLength);
    }
    let mut buf = [0u8; 32];
    buf[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(U256::from_be_bytes(buf))
}

/// Rebuilds the EIP-155 signing payload (the 9 fields with `v` replaced by
/// `chain_id`/empty `r`/`s` when a chain id is present) and hashes it.
fn signing_hash(rlp: &Rlp, chain_id: Option<u64>) -> Result<[u8; 32], DecoderError> {
    let mut stream = rlp::RlpStream::new_list(if chain_id.is_some() { 9 } else { 6 });
    stream.append(&rlp.val_at::<u64>(0)?);
    stream.append_raw(rlp.at(1)?.as_raw(), 1);
    stream.append_raw(rlp.at(2)?.as_raw(), 1);
    stream.append_raw(rlp.at(3)?.as_raw(), 1);
    stream.append_raw(rlp.at(4)?.as_raw(), 1);
    stream.append_raw(rlp.at(5)?.as_raw(), 1);

    if let Some(chain_id) = chain_id {
        stream.append(&chain_id);
        stream.append_empty_data();
        stream.append_empty_data();
    }

    Ok(keccak::hash(&stream.out()).to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_tx_rlp(nonce: u64, chain_id: u64, key: &libsecp256k1::SecretKey) -> Vec<u8> {
        let mut unsigned = rlp::RlpStream::new_list(9);
        unsigned.append(&nonce);
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
        let (signature, recovery_id) = libsecp256k1::sign(&message, key);
        let sig_bytes = signature.serialize();
        let r = U256::from_be_bytes(sig_bytes[0..32].try_into().unwrap());
        let s = U256::from_be_bytes(sig_bytes[32..64].try_into().unwrap());
        let v = U256::from(chain_id) * U256::from(2_u8)
            + U256::from(35_u8)
            + U256::from(recovery_id.serialize());

        let mut signed = rlp::RlpStream::new_list(9);
        signed.append(&nonce);
        signed.append(&1_000_000_000u64);
        signed.append(&21_000u64);
        signed.append_empty_data();
        signed.append(&0u64);
        signed.append_empty_data();
        signed.append(&v.to_be_bytes().to_vec());
        signed.append(&r.to_be_bytes().to_vec());
        signed.append(&s.to_be_bytes().to_vec());
        signed.out().to_vec()
    }

    #[test]
    fn tx_sig_is_keccak_of_rlp_and_stable_across_decode() {
        let key = libsecp256k1::SecretKey::parse(&[7u8; 32]).unwrap();
        let raw = signed_tx_rlp(0, 245_022_940, &key);

        let tx1 = EthTx::from_rlp(&raw).unwrap();
        let tx2 = EthTx::from_rlp(&raw).unwrap();

        assert_eq!(tx1.tx_sig, keccak::hash(&raw).to_bytes());
        assert_eq!(tx1.tx_sig, tx2.tx_sig);
    }

    #[test]
    fn recovers_sender_that_signed_the_tx() {
        let key = libsecp256k1::SecretKey::parse(&[11u8; 32]).unwrap();
        let public = libsecp256k1::PublicKey::from_secret_key(&key);
        let expected_hash = keccak::hash(&public.serialize()[1..]).to_bytes();
        let expected_address: [u8; 20] = expected_hash[12..32].try_into().unwrap();

        let raw = signed_tx_rlp(3, 245_022_940, &key);
        let tx = EthTx::from_rlp(&raw).unwrap();

        assert_eq!(tx.recover_sender().unwrap(), expected_address);
        assert_eq!(tx.chain_id, Some(245_022_940));
        assert_eq!(tx.nonce, 3);
    }

    #[test]
    fn treasury_pool_index_is_modulus_of_first_four_sig_bytes() {
        let key = libsecp256k1::SecretKey::parse(&[3u8; 32]).unwrap();
        let raw = signed_tx_rlp(9, 245_022_940, &key);
        let tx = EthTx::from_rlp(&raw).unwrap();

        let expected = u32::from_le_bytes(tx.tx_sig[0..4].try_into().unwrap()) % 128;
        assert_eq!(tx.treasury_pool_index(128), expected);
    }
}
