//! # Contract Validator Dispatch
//!
//! A contract module plugs into the host by implementing
//! [`ContractValidator`]. The host calls it for every transaction that
//! touches the module's eval code, after the generic UTXO checks (prevouts
//! exist, signatures verify, no double spend) have passed.

use crate::tx::Transaction;
use crate::view::ChainView;

/// Boxed rejection reason returned by a contract module.
pub type Rejection = Box<dyn std::error::Error + Send + Sync>;

/// Consensus hook of one contract module.
pub trait ContractValidator: Send + Sync {
    /// Eval code whose conditions and payloads this module owns.
    fn eval_code(&self) -> u8;

    /// Accept or reject `tx` against the current state of `chain`.
    ///
    /// Must be deterministic and must not rely on state outside `chain`.
    fn validate(&self, chain: &dyn ChainView, tx: &Transaction) -> Result<(), Rejection>;
}
