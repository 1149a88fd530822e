//! # Cryptographic Error Types

use thiserror::Error;

/// Errors from key parsing and signature verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("Ed25519 verification failed: {0}")]
    VerificationFailed(String),

    /// Bytes do not form a valid Ed25519 public key.
    #[error("invalid Ed25519 public key: {0}")]
    InvalidPublicKey(String),

    /// Bytes do not form a valid secret key seed.
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(String),
}
