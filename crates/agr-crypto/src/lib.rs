//! # agr-crypto — Cryptographic Primitives
//!
//! Provides the key material used by the Agreements module:
//!
//! - **Ed25519** keys and signatures. Signing input is a [`SigHash`], never
//!   raw bytes, so every signature commits to a full transaction digest.
//! - **Global key** derived from the module name. Both halves are public:
//!   the global key is a shared lock that *any* node can sign for, and the
//!   validator, not the signature, decides who may spend it.
//! - **Tweaked keys** derived from a transaction id, giving each agreement
//!   a unique event-chain address without a registry.
//!
//! ## Crate Policy
//!
//! - Depends only on `agr-core` internally.
//! - Tests use real Ed25519, never mocks.

pub mod derive;
pub mod ed25519;
pub mod error;

pub use derive::{global_keypair, tweaked_keypair, MODULE_NAME};
pub use ed25519::{KeyPair, PublicKey, SigHash, Signature};
pub use error::CryptoError;
