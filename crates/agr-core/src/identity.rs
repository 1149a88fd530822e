//! # Chain Identifiers
//!
//! Newtype wrappers for transaction ids and output references.
//!
//! ## Security Invariant
//!
//! Every prior-state check in the validator compares a full `OutPoint`
//! (transaction id *and* output index). Keeping the pair as its own type
//! makes it impossible to compare only the txid by accident.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CodecError;

/// A 32-byte transaction identifier (SHA-256 of the transaction encoding).
///
/// The all-zero id is the "null" id, used in payloads to mean "no reference".
/// Serializes as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    /// The null id.
    pub const NULL: TxId = TxId([0u8; 32]);

    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the null id.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// `None` for the null id, `Some(self)` otherwise.
    pub fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }

    /// Render as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(s.trim()).map_err(|e| CodecError::Hex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CodecError::InvalidLength {
                field: "txid",
                len: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TxId({}...)", hex::encode(&self.0[..4]))
    }
}

impl std::str::FromStr for TxId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Reference to a specific output of a specific transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction holding the output.
    pub txid: TxId,
    /// Output index within that transaction.
    pub vout: u32,
}

impl OutPoint {
    /// Create an outpoint.
    pub fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.txid, self.vout)
    }
}
