//! # agr-contract — The Agreements Module
//!
//! Two-party agreements on a UTXO host. An offer proposes terms; accepting
//! it escrows a deposit and starts an event chain (dispute, cancellation,
//! resolution, close, amendment) linked through a baton output.
//!
//! ## Layers
//!
//! - [`codec`]: op-return payloads, one per function id, and the decoder
//!   that identifies them.
//! - [`address`]: the module's global escrow lock and per-agreement event
//!   locks.
//! - [`validate`]: the consensus validator ([`AgreementsValidator`]), the
//!   sole authority on which transitions are legal.
//! - [`walker`]: event-chain traversal for builders and reports.
//! - [`builder`]: client-side transaction construction.
//! - [`query`] and [`rpc`]: reporting and JSON result objects.
//!
//! ## Security Invariant
//!
//! The validator checks each transaction against the exact outputs it
//! spends and the confirmed transactions they came from. It never consults
//! the walker, so a builder bug or an unusual history cannot widen what
//! consensus accepts.

pub mod address;
pub mod builder;
pub mod codec;
pub mod error;
pub mod party;
pub mod query;
pub mod rpc;
pub mod validate;
pub mod walker;

#[cfg(test)]
mod testkit;

pub use builder::{BuildContext, BuiltTx, OfferTerms};
pub use codec::{
    decode_agreement_opret, AgreementOp, DisputeFlags, FuncId, OfferData, OfferFlags, Payload,
};
pub use error::{BuilderError, ErrorCategory, QueryError, ValidationError, WalkError};
pub use party::PartyKey;
pub use validate::{agreements_validate, AgreementsValidator};
pub use walker::{find_latest_agreement_event, get_accepted_offer_tx, LatestEvent};
