//! # agr-cli — Command Line for the Agreements Module
//!
//! Provides the `agr` binary:
//!
//! - `agr keygen`: Ed25519 key files.
//! - `agr chain ...`: maintenance of a local reference chain (JSON file).
//! - `agr agreement*`: every Agreements RPC method, printing its JSON
//!   result object.
//!
//! ```bash
//! agr keygen --prefix alice
//! agr chain fund $(cat alice.pub) 1000000
//! agr --key alice.key agreementcreate $(cat bob.pub) --name lease --broadcast --mine
//! agr agreementofferlist
//! ```

pub mod chain;
pub mod config;
pub mod keygen;
pub mod rpc;

pub use config::{CliContext, Session, DEFAULT_CHAIN_FILE};
