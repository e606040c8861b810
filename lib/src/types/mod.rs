pub mod alt;
pub mod eth_tx;
pub mod exec_cfg;
pub mod exec_ctx;
pub mod holder;
pub mod mempool_api;
pub mod op_res;
pub mod stuck_tx;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// A `Pubkey` serialized as base58, the wire format every mempool request
/// and response in §4.5 uses for account identities.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PubkeyBase58(pub Pubkey);

impl AsRef<Pubkey> for PubkeyBase58 {
    fn as_ref(&self) -> &Pubkey {
        &self.0
    }
}

impl From<Pubkey> for PubkeyBase58 {
    fn from(value: Pubkey) -> Self {
        Self(value)
    }
}

impl From<PubkeyBase58> for Pubkey {
    fn from(value: PubkeyBase58) -> Self {
        value.0
    }
}

impl Serialize for PubkeyBase58 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bs58 = bs58::encode(&self.0).into_string();
        serializer.serialize_str(&bs58)
    }
}

impl<'de> Deserialize<'de> for PubkeyBase58 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StringVisitor;

        impl<'de> serde::de::Visitor<'de> for StringVisitor {
            type Value = Pubkey;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a base58-encoded pubkey")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Pubkey::from_str(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(StringVisitor).map(Self)
    }
}
