//! # Host Error Types

use thiserror::Error;

use agr_core::{Amount, CodecError, OutPoint, TxId};

/// Reasons the reference host refuses a transaction or an operation.
#[derive(Error, Debug)]
pub enum ChainError {
    /// A non-coinbase transaction had no inputs.
    #[error("transaction has no inputs")]
    NoInputs,

    /// A transaction had no outputs.
    #[error("transaction has no outputs")]
    NoOutputs,

    /// The transaction is already known.
    #[error("transaction {0} already known")]
    Duplicate(TxId),

    /// An input refers to an output that does not exist.
    #[error("input {vin} spends unknown output {outpoint}")]
    UnknownPrevout {
        /// Input index.
        vin: usize,
        /// Missing output.
        outpoint: OutPoint,
    },

    /// An input refers to an unspendable data carrier.
    #[error("input {vin} spends op_return output {outpoint}")]
    SpendsOpReturn {
        /// Input index.
        vin: usize,
        /// Data-carrier output.
        outpoint: OutPoint,
    },

    /// An output was already spent by another transaction.
    #[error("input {vin} double-spends {outpoint}, already spent by {spender}")]
    DoubleSpend {
        /// Input index.
        vin: usize,
        /// Contested output.
        outpoint: OutPoint,
        /// Transaction that spent it first.
        spender: TxId,
    },

    /// Two inputs of one transaction spend the same output.
    #[error("output {0} spent twice within one transaction")]
    DuplicateInput(OutPoint),

    /// An input carries no signature.
    #[error("input {0} is not signed")]
    MissingWitness(usize),

    /// The signing key is not allowed by the spent output's lock.
    #[error("input {0} signed by a key the output lock does not allow")]
    UnauthorizedKey(usize),

    /// The signature does not verify.
    #[error("input {vin} has an invalid signature: {reason}")]
    BadSignature {
        /// Input index.
        vin: usize,
        /// Verifier message.
        reason: String,
    },

    /// An output has a negative value.
    #[error("output {0} has a negative value")]
    NegativeValue(usize),

    /// Outputs spend more than the inputs provide.
    #[error("outputs {outputs} exceed inputs {inputs}")]
    InsufficientInputs {
        /// Sum of input values.
        inputs: Amount,
        /// Sum of output values.
        outputs: Amount,
    },

    /// A contract condition is touched but no validator owns its eval code.
    #[error("no validator registered for eval code {0:#04x}")]
    NoValidator(u8),

    /// A contract validator rejected the transaction.
    #[error("eval code {eval_code:#04x} rejected transaction: {reason}")]
    ContractRejected {
        /// Module that rejected.
        eval_code: u8,
        /// Module's rejection message.
        reason: String,
    },

    /// Unknown transaction id.
    #[error("transaction {0} not found")]
    UnknownTransaction(TxId),

    /// Notarization requested above the tip.
    #[error("cannot notarize height {height} above tip {tip}")]
    NotarizeBeyondTip {
        /// Requested height.
        height: u32,
        /// Current tip.
        tip: u32,
    },

    /// Funding with a non-positive amount.
    #[error("funding amount must be positive, got {0}")]
    InvalidFunding(Amount),

    /// Persisted chain state could not be read or written.
    #[error("chain state error: {0}")]
    State(String),

    /// Binary decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ChainError {
    /// The contract module's message, when a validator rejected.
    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            ChainError::ContractRejected { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
