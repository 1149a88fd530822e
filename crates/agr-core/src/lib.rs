//! # agr-core — Foundational Types for the Agreements Module
//!
//! This crate is the leaf of the workspace dependency graph. It defines the
//! primitives every other crate builds on:
//!
//! 1. **Identifier newtypes.** `TxId` and `OutPoint` are distinct types; a
//!    transaction id can never be confused with raw bytes or an amount.
//!
//! 2. **Compact binary encoding.** `ByteWriter` / `ByteReader` implement the
//!    little-endian, compact-size-prefixed field encoding used by both the
//!    transaction serializer and the op-return payload codec. Readers are
//!    strict: a short read is an error, never a default value.
//!
//! 3. **Consensus parameters.** `ConsensusParams` carries the fee, marker,
//!    expiry and size limits. `Default` is the production parameter set.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `agr-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod digest;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod params;

pub use digest::{sha256, sha256_concat};
pub use encoding::{ByteReader, ByteWriter};
pub use error::{CodecError, ConfigError};
pub use identity::{OutPoint, TxId};
pub use params::{Amount, ConsensusParams, AGREEMENTS_VERSION, EVAL_AGREEMENTS};
