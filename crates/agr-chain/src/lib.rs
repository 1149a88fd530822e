//! # agr-chain — Reference UTXO Host
//!
//! The Agreements module consumes a host chain through a narrow interface.
//! This crate defines that interface and a reference implementation:
//!
//! - [`tx`]: transactions, inputs with witnesses, outputs locked by
//!   pay-to-pubkey, contract conditions or data carriers.
//! - [`address`]: printable script digests keyed by the address index.
//! - [`view::ChainView`]: the read-only queries a contract module may make.
//! - [`validator::ContractValidator`]: the consensus hook a module provides.
//! - [`memory::MemoryChain`]: an in-memory ledger that enforces the generic
//!   UTXO rules and dispatches contract validators.
//!
//! ## Crate Policy
//!
//! - `MemoryChain` is a host double for tests and the CLI. It has no
//!   networking, mempool policy or fork choice.
//! - Contract validators receive `&dyn ChainView` and cannot mutate state.

pub mod address;
pub mod error;
pub mod memory;
pub mod sign;
pub mod tx;
pub mod validator;
pub mod view;

pub use address::Address;
pub use error::ChainError;
pub use memory::{BlockRecord, ChainState, MemoryChain};
pub use sign::{sign_input, sign_with};
pub use tx::{Condition, Script, Transaction, TxIn, TxOut, Witness};
pub use validator::{ContractValidator, Rejection};
pub use view::{AddressOutput, ChainView, SpendRecord, TxRecord};
