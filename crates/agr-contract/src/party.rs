//! # Party Keys
//!
//! Offer parties are identified by a key carried in the payload. Two kinds
//! exist on the wire: a 32-byte Ed25519 public key, or an arbitrary script.
//! Only public keys can be checked for eligibility; script keys decode so
//! that payloads stay forward compatible, and the validator rejects them
//! with a dedicated error.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use agr_crypto::PublicKey;

/// Key identifying an offer party.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartyKey {
    /// Ed25519 public key.
    Pubkey(PublicKey),
    /// Script key. Not yet supported by eligibility checks.
    Script(Vec<u8>),
}

impl PartyKey {
    /// Classify encoded key bytes; empty bytes mean "no key".
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        match bytes.len() {
            0 => None,
            PublicKey::LEN => PublicKey::from_slice(&bytes).ok().map(PartyKey::Pubkey),
            _ => Some(PartyKey::Script(bytes)),
        }
    }

    /// Encoded key bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PartyKey::Pubkey(pk) => pk.as_bytes().to_vec(),
            PartyKey::Script(s) => s.clone(),
        }
    }

    /// The public key, if this is one.
    pub fn as_pubkey(&self) -> Option<&PublicKey> {
        match self {
            PartyKey::Pubkey(pk) => Some(pk),
            PartyKey::Script(_) => None,
        }
    }

    /// Whether this is `key`.
    pub fn is(&self, key: &PublicKey) -> bool {
        self.as_pubkey() == Some(key)
    }
}

impl From<PublicKey> for PartyKey {
    fn from(pk: PublicKey) -> Self {
        PartyKey::Pubkey(pk)
    }
}

impl std::fmt::Display for PartyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl Serialize for PartyKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PartyKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        PartyKey::from_bytes(bytes).ok_or_else(|| serde::de::Error::custom("empty party key"))
    }
}
