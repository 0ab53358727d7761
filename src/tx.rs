//! Administrative transactions handled by the change transactor.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ledger::{serde_hash, AccountId, Amount, Hash};

pub type TxId = Hash;

/// Transaction type codes on the wire.
pub const TT_AMENDMENT: u16 = 100;
pub const TT_FEE: u16 = 101;
pub const TT_DIVIDEND: u16 = 181;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxBody {
    Amendment {
        #[serde(with = "serde_hash")]
        amendment: Hash,
    },
    Fee {
        base_fee: u64,
        reference_fee_units: u32,
        reserve_base: u32,
        reserve_increment: u32,
    },
    Dividend {
        dividend_time: u32,
        total_coins: u64,
        total_coins_secondary: u64,
    },
    /// Any transaction type this transactor does not handle.
    Other { tx_type: u16 },
}

impl TxBody {
    pub fn tx_type(&self) -> u16 {
        match self {
            TxBody::Amendment { .. } => TT_AMENDMENT,
            TxBody::Fee { .. } => TT_FEE,
            TxBody::Dividend { .. } => TT_DIVIDEND,
            TxBody::Other { tx_type } => *tx_type,
        }
    }
}

/// A change transaction: common envelope fields plus a typed body.
///
/// Pseudo-transactions injected by validators carry the zero account, no
/// signature, sequence zero and no fee; anything else is rejected during
/// the pre-checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTransaction {
    pub account: AccountId,
    #[serde(default, with = "hex_bytes")]
    pub signing_pub_key: Vec<u8>,
    #[serde(default, with = "hex_bytes")]
    pub signature: Vec<u8>,
    #[serde(default)]
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_txn_id: Option<TxId>,
    #[serde(default)]
    pub fee: Amount,
    /// Account id recovered from the signing key.
    pub source_account: AccountId,
    pub body: TxBody,
}

impl ChangeTransaction {
    fn pseudo(body: TxBody) -> Self {
        Self {
            account: AccountId::ZERO,
            signing_pub_key: Vec::new(),
            signature: Vec::new(),
            sequence: 0,
            previous_txn_id: None,
            fee: 0,
            source_account: AccountId::ZERO,
            body,
        }
    }

    pub fn amendment(amendment: Hash) -> Self {
        Self::pseudo(TxBody::Amendment { amendment })
    }

    pub fn fee(
        base_fee: u64,
        reference_fee_units: u32,
        reserve_base: u32,
        reserve_increment: u32,
    ) -> Self {
        Self::pseudo(TxBody::Fee {
            base_fee,
            reference_fee_units,
            reserve_base,
            reserve_increment,
        })
    }

    pub fn dividend(dividend_time: u32, total_coins: u64, total_coins_secondary: u64) -> Self {
        Self::pseudo(TxBody::Dividend {
            dividend_time,
            total_coins,
            total_coins_secondary,
        })
    }

    pub fn tx_type(&self) -> u16 {
        self.body.tx_type()
    }

    /// Canonical encoding: JSON with fields in declaration order.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"TXN\0");
        buf.extend_from_slice(&self.tx_type().to_be_bytes());
        // Serializing a plain struct of integers, byte strings and enums
        // cannot fail.
        if let Ok(json) = serde_json::to_vec(self) {
            buf.extend(json);
        }
        buf
    }

    pub fn id(&self) -> TxId {
        Sha256::digest(self.encode()).into()
    }
}

mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded.trim()).map_err(D::Error::custom)
    }
}
