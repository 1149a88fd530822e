//! # Addresses
//!
//! An address is a short, printable digest of a lock script, used as the
//! key of the host's address index. Pay-to-pubkey scripts map to `R…`
//! addresses and contract conditions to `C…` addresses; data carriers have
//! no address.

use serde::{Deserialize, Serialize};

use agr_core::sha256;
use agr_crypto::PublicKey;

use crate::tx::{Condition, Script};

/// Hex characters of script digest kept in an address.
const DIGEST_CHARS: usize = 40;

/// Printable address of a lock script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Address of `script`, or `None` for a data carrier.
    pub fn for_script(script: &Script) -> Option<Self> {
        let prefix = match script {
            Script::PayToPubkey { .. } => 'R',
            Script::Condition(_) => 'C',
            Script::OpReturn { .. } => return None,
        };
        Some(Self(Self::encode(prefix, script)))
    }

    /// Normal address of a key.
    pub fn pubkey(key: &PublicKey) -> Self {
        Self(Self::encode('R', &Script::pubkey(*key)))
    }

    /// Address of a contract condition.
    pub fn condition(cond: &Condition) -> Self {
        Self(Self::encode('C', &Script::Condition(cond.clone())))
    }

    fn encode(prefix: char, script: &Script) -> String {
        let digest = hex::encode(sha256(&script.to_bytes()));
        format!("{prefix}{}", &digest[..DIGEST_CHARS])
    }

    /// Whether this is a condition address.
    pub fn is_condition(&self) -> bool {
        self.0.starts_with('C')
    }

    /// The printable form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid_prefix = s.starts_with('R') || s.starts_with('C');
        let body_ok = s.len() == DIGEST_CHARS + 1 && s[1..].bytes().all(|b| b.is_ascii_hexdigit());
        if valid_prefix && body_ok {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("malformed address: {s}"))
        }
    }
}
