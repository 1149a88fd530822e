//! # Error Types — Shared Error Hierarchy
//!
//! Errors that are meaningful to more than one crate. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! - Decoding errors carry the field being read and how many bytes were
//!   missing, so a rejected payload can be diagnosed from the message alone.
//! - Configuration errors distinguish unreadable input from values that parse
//!   but violate a parameter invariant.

use thiserror::Error;

/// Failure while decoding a binary transaction or op-return payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before the field could be read.
    #[error("unexpected end of data reading {field}: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Field being decoded.
        field: &'static str,
        /// Bytes required.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// Bytes were left over after the last field.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// A length prefix exceeded what the buffer could possibly hold.
    #[error("length prefix {len} for {field} exceeds remaining {remaining} bytes")]
    LengthOverflow {
        /// Field being decoded.
        field: &'static str,
        /// Declared length.
        len: u64,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A fixed-size field had the wrong length.
    #[error("invalid length {len} for {field}")]
    InvalidLength {
        /// Field being decoded.
        field: &'static str,
        /// Length found.
        len: usize,
    },

    /// The payload belongs to a different contract module.
    #[error("eval code mismatch: expected {expected:#04x}, found {found:#04x}")]
    WrongEvalCode {
        /// This module's eval code.
        expected: u8,
        /// Eval code found in the payload.
        found: u8,
    },

    /// The function id byte is not one this module defines.
    #[error("unknown function id {0:#04x}")]
    UnknownFuncId(u8),

    /// The payload decoded to a different function id than requested.
    #[error("expected function id '{expected}', found '{found}'")]
    FuncIdMismatch {
        /// Function id the caller asked for.
        expected: char,
        /// Function id present in the payload.
        found: char,
    },

    /// A variant tag inside the encoding was not recognised.
    #[error("invalid tag {tag:#04x} for {field}")]
    InvalidTag {
        /// Field being decoded.
        field: &'static str,
        /// Tag byte found.
        tag: u8,
    },

    /// A compact-size prefix used a longer form than necessary.
    #[error("non-canonical compact size for {0}")]
    NonCanonical(&'static str),

    /// Hex text could not be decoded.
    #[error("hex decode error: {0}")]
    Hex(String),
}

/// Failure while loading or checking consensus parameters.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The parameter file could not be parsed.
    #[error("failed to parse parameters: {0}")]
    Parse(String),

    /// A parameter value violates an invariant.
    #[error("invalid parameter {name}: {reason}")]
    Invalid {
        /// Parameter name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
