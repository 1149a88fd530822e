//! # Deterministic Key Derivation
//!
//! The Agreements module locks escrow to keys that every node can
//! recompute from public data:
//!
//! - the **global key**, seeded by SHA-256 of [`MODULE_NAME`];
//! - a **tweaked key** per accepted offer, seeded by
//!   `SHA-256(TWEAK_DOMAIN ‖ global pubkey ‖ txid)`.
//!
//! ## Security Invariant
//!
//! Possession of these private keys grants nothing. The consensus validator
//! decides which spends of a module-locked output are valid; the signature
//! only proves the spend was assembled by someone running the derivation.

use agr_core::{sha256, sha256_concat, TxId};

use crate::ed25519::{KeyPair, PublicKey};

/// Name the global key is derived from.
pub const MODULE_NAME: &str = "agreements";

/// Domain separator for txid-tweaked keys.
pub const TWEAK_DOMAIN: &[u8] = b"agr/tweak/v1";

/// The module-wide global key pair.
pub fn global_keypair() -> KeyPair {
    KeyPair::from_seed(&sha256(MODULE_NAME.as_bytes()))
}

/// The key pair tweaked from `txid` under `global`.
pub fn tweaked_keypair(global: &PublicKey, txid: &TxId) -> KeyPair {
    let seed = sha256_concat(&[TWEAK_DOMAIN, global.as_bytes(), txid.as_bytes()]);
    KeyPair::from_seed(&seed)
}
