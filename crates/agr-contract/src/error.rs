//! # Agreements Error Types
//!
//! - [`ValidationError`]: consensus rejections. Every rule has its own
//!   variant and message, so a rejected transaction names the rule it broke.
//! - [`BuilderError`]: local precondition failures raised before a
//!   transaction is assembled.
//! - [`WalkError`]: event-chain traversal failures.
//! - [`QueryError`]: reporting failures.

use serde::Serialize;
use thiserror::Error;

use agr_core::{Amount, CodecError, OutPoint, TxId};

/// Coarse class of a consensus rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed payload, missing or misplaced inputs and outputs.
    Structural,
    /// A referenced transaction is missing, unconfirmed or of the wrong kind.
    Referential,
    /// The wrong key signed, or a timing or permission rule is unmet.
    Eligibility,
    /// An escrow or payment amount is wrong.
    Amount,
}

/// Reasons the Agreements validator rejects a transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    // ─── Structural ─────────────────────────────────────────────────
    /// The transaction has no outputs.
    #[error("transaction has no outputs")]
    NoOutputs,

    /// The last output is not a data carrier.
    #[error("last output must carry the agreements payload")]
    MissingOpReturn,

    /// A data carrier appears before the last output.
    #[error("unexpected op_return at vout {0}")]
    ExtraOpReturn(usize),

    /// The payload exceeds the size limit.
    #[error("op_return of {size} bytes exceeds limit of {max}")]
    OpReturnTooLarge {
        /// Payload size.
        size: usize,
        /// Limit.
        max: usize,
    },

    /// The payload does not decode.
    #[error("invalid agreements payload: {0}")]
    MalformedPayload(CodecError),

    /// The payload version is not supported.
    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u8),

    /// A required contract input is absent.
    #[error("missing {what} input at vin {vin}")]
    MissingInput {
        /// Input index.
        vin: usize,
        /// Role of the input.
        what: &'static str,
    },

    /// A contract input spends something other than the expected output.
    #[error("vin {vin} must spend {what} {expected}, found {found}")]
    UnexpectedInput {
        /// Input index.
        vin: usize,
        /// Role of the input.
        what: &'static str,
        /// Required outpoint.
        expected: OutPoint,
        /// Spent outpoint.
        found: OutPoint,
    },

    /// An input past the fixed contract inputs spends module escrow.
    #[error("vin {0} spends agreements escrow outside its fixed position")]
    ForeignContractInput(usize),

    /// A required output is absent.
    #[error("missing {what} output at vout {vout}")]
    MissingOutput {
        /// Output index.
        vout: usize,
        /// Role of the output.
        what: &'static str,
    },

    /// An output is locked to the wrong script.
    #[error("{what} output at vout {vout} has the wrong lock")]
    WrongOutputLock {
        /// Output index.
        vout: usize,
        /// Role of the output.
        what: &'static str,
    },

    /// An output past the fixed outputs is locked to module escrow.
    #[error("vout {0} creates agreements escrow outside its fixed position")]
    UnexpectedContractOutput(usize),

    /// The spent event baton is not under the agreement's event lock.
    #[error("vin {0} does not spend the agreement's event output")]
    WrongEventLock(usize),

    /// Flag bits outside the defined set.
    #[error("unknown flag bits {0:#04x}")]
    UnknownFlags(u8),

    /// The close flag without the amendment flag.
    #[error("close flag requires the amendment flag")]
    CloseWithoutAmendment,

    /// Name empty or too long.
    #[error("name length {len} outside 1..={max}")]
    InvalidName {
        /// Byte length.
        len: usize,
        /// Limit.
        max: usize,
    },

    /// Memo too long.
    #[error("memo length {len} exceeds {max}")]
    MemoTooLong {
        /// Byte length.
        len: usize,
        /// Limit.
        max: usize,
    },

    /// A dispute without grounds.
    #[error("dispute memo must not be empty")]
    EmptyMemo,

    /// Unlock conditions are reserved.
    #[error("unlock conditions are not supported")]
    UnlockConditionsUnsupported,

    /// Unlock transactions are reserved.
    #[error("unlock is not supported")]
    UnlockNotSupported,

    // ─── Referential ────────────────────────────────────────────────
    /// An input spends an output the host does not know.
    #[error("vin {vin} spends unknown output {outpoint}")]
    MissingPrevout {
        /// Input index.
        vin: usize,
        /// Missing outpoint.
        outpoint: OutPoint,
    },

    /// A referenced transaction does not exist.
    #[error("{what} {txid} not found")]
    ReferenceNotFound {
        /// Role of the reference.
        what: &'static str,
        /// Referenced id.
        txid: TxId,
    },

    /// A referenced transaction is not yet in a block.
    #[error("{what} {txid} is not confirmed")]
    ReferenceUnconfirmed {
        /// Role of the reference.
        what: &'static str,
        /// Referenced id.
        txid: TxId,
    },

    /// A referenced transaction carries a different function id.
    #[error("{what} {txid} is not a '{expected}' transaction")]
    ReferenceWrongType {
        /// Role of the reference.
        what: &'static str,
        /// Referenced id.
        txid: TxId,
        /// Function id required.
        expected: char,
    },

    /// A reference points at a different agreement than expected.
    #[error("{0} references a different agreement")]
    ReferenceMismatch(&'static str),

    /// The spent baton is not a live event of this agreement.
    #[error("attempting to spend an invalid previous event")]
    InvalidPreviousEvent,

    /// The spent baton's transaction is not yet in a block.
    #[error("previous event {0} is not confirmed")]
    PreviousEventUnconfirmed(TxId),

    /// The agreement has an open dispute.
    #[error("agreement is under dispute")]
    AgreementDisputed,

    /// The referenced agreement's deposit has been released.
    #[error("agreement {0} is no longer active")]
    AgreementClosed(TxId),

    /// An amendment offer without a reference agreement.
    #[error("amendment offer must reference an agreement")]
    MissingReference,

    /// A plain offer that references an agreement.
    #[error("only amendment offers may reference an agreement")]
    UnexpectedReference,

    /// A close transaction accepting an offer without both close flags.
    #[error("offer {0} is not a closing offer")]
    NotACloseOffer(TxId),

    /// An accept transaction consuming a closing offer.
    #[error("closing offer {0} must be accepted by a close transaction")]
    CloseOfferNotAcceptable(TxId),

    // ─── Eligibility ────────────────────────────────────────────────
    /// No normal input is signed by the required party.
    #[error("transaction is not signed by the {0}")]
    NotSignedBy(&'static str),

    /// A party key is a script key.
    #[error("{0} is a script key, which is not supported yet")]
    ScriptKeyUnsupported(&'static str),

    /// A party key is not a valid public key.
    #[error("invalid {0} public key")]
    InvalidPartyKey(&'static str),

    /// Source and destination are the same key.
    #[error("source and destination must differ")]
    SameParty,

    /// The arbitrator is also a party.
    #[error("arbitrator must differ from source and destination")]
    ArbitratorIsParty,

    /// An amendment names different parties than its agreement.
    #[error("offer parties do not match the referenced agreement")]
    PartiesMismatch,

    /// The claimant is not a party of the agreement.
    #[error("claimant is not a party of the agreement")]
    ClaimantNotParty,

    /// The agreement has no arbitrator.
    #[error("agreement has no arbitrator")]
    NoArbitrator,

    /// The agreement disabled disputes.
    #[error("disputes are disabled for this agreement")]
    DisputesDisabled,

    /// A final dispute cannot be cancelled.
    #[error("dispute is final and cannot be cancelled")]
    DisputeFinal,

    /// The source may not cancel a no-cancel offer.
    #[error("offer source cannot cancel a no-cancel offer")]
    OfferNotCancellable,

    /// The offer is too old to accept.
    #[error("offer has expired: {age_secs}s old, limit {max_secs}s")]
    OfferExpired {
        /// Estimated age.
        age_secs: u64,
        /// Expiry limit.
        max_secs: u64,
    },

    /// A notarization requirement is unmet.
    #[error("{0} is not notarized yet")]
    NotNotarized(&'static str),

    // ─── Amount ─────────────────────────────────────────────────────
    /// Inputs do not cover outputs and the fee.
    #[error("inputs {inputs} do not cover outputs {outputs} plus fee {fee}")]
    FeeNotCovered {
        /// Input total.
        inputs: Amount,
        /// Output total.
        outputs: Amount,
        /// Required fee.
        fee: Amount,
    },

    /// An output carries a negative value.
    #[error("output at vout {0} has a negative value")]
    NegativeOutput(usize),

    /// Input or output values do not fit in an amount.
    #[error("sum of {0} values overflows")]
    ValueOverflow(&'static str),

    /// An offer amount is below its minimum.
    #[error("{what} {amount} is below minimum {min}")]
    AmountTooLow {
        /// Which amount.
        what: &'static str,
        /// Offered value.
        amount: Amount,
        /// Minimum.
        min: Amount,
    },

    /// A negative payment.
    #[error("payment must not be negative, got {0}")]
    NegativePayment(Amount),

    /// An output holds the wrong value.
    #[error("{what} output at vout {vout} must hold exactly {expected}, found {found}")]
    WrongOutputValue {
        /// Output index.
        vout: usize,
        /// Role of the output.
        what: &'static str,
        /// Required value.
        expected: Amount,
        /// Actual value.
        found: Amount,
    },

    /// An output holds less than its minimum.
    #[error("{what} output at vout {vout} must hold at least {min}, found {found}")]
    OutputValueTooLow {
        /// Output index.
        vout: usize,
        /// Role of the output.
        what: &'static str,
        /// Minimum value.
        min: Amount,
        /// Actual value.
        found: Amount,
    },

    /// A close payout differs from the closing offer's payment.
    #[error("close payout {recorded} differs from offer payment {offered}")]
    PayoutMismatch {
        /// Payment in the closing offer.
        offered: Amount,
        /// Payout in the close payload.
        recorded: Amount,
    },

    /// A resolution payout outside `0..=deposit`.
    #[error("claimant payout {payout} outside 0..={deposit}")]
    PayoutOutOfRange {
        /// Requested payout.
        payout: Amount,
        /// Escrowed deposit.
        deposit: Amount,
    },
}

impl ValidationError {
    /// Coarse class of this rejection.
    pub fn category(&self) -> ErrorCategory {
        use ValidationError::*;
        match self {
            NoOutputs
            | MissingOpReturn
            | ExtraOpReturn(_)
            | OpReturnTooLarge { .. }
            | MalformedPayload(_)
            | UnsupportedVersion(_)
            | MissingInput { .. }
            | UnexpectedInput { .. }
            | ForeignContractInput(_)
            | MissingOutput { .. }
            | WrongOutputLock { .. }
            | UnexpectedContractOutput(_)
            | WrongEventLock(_)
            | UnknownFlags(_)
            | CloseWithoutAmendment
            | InvalidName { .. }
            | MemoTooLong { .. }
            | EmptyMemo
            | UnlockConditionsUnsupported
            | UnlockNotSupported => ErrorCategory::Structural,

            MissingPrevout { .. }
            | ReferenceNotFound { .. }
            | ReferenceUnconfirmed { .. }
            | ReferenceWrongType { .. }
            | ReferenceMismatch(_)
            | InvalidPreviousEvent
            | PreviousEventUnconfirmed(_)
            | AgreementDisputed
            | AgreementClosed(_)
            | MissingReference
            | UnexpectedReference
            | NotACloseOffer(_)
            | CloseOfferNotAcceptable(_) => ErrorCategory::Referential,

            NotSignedBy(_)
            | ScriptKeyUnsupported(_)
            | InvalidPartyKey(_)
            | SameParty
            | ArbitratorIsParty
            | PartiesMismatch
            | ClaimantNotParty
            | NoArbitrator
            | DisputesDisabled
            | DisputeFinal
            | OfferNotCancellable
            | OfferExpired { .. }
            | NotNotarized(_) => ErrorCategory::Eligibility,

            FeeNotCovered { .. }
            | NegativeOutput(_)
            | ValueOverflow(_)
            | AmountTooLow { .. }
            | NegativePayment(_)
            | WrongOutputValue { .. }
            | OutputValueTooLow { .. }
            | PayoutMismatch { .. }
            | PayoutOutOfRange { .. } => ErrorCategory::Amount,
        }
    }
}

/// Event-chain traversal failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalkError {
    /// Transaction unknown to the host.
    #[error("transaction {0} not found")]
    NotFound(TxId),

    /// Transaction not yet in a block.
    #[error("transaction {0} is not confirmed")]
    Unconfirmed(TxId),

    /// Transaction carries the wrong function id.
    #[error("transaction {txid} is not a '{expected}' transaction")]
    WrongType {
        /// Transaction id.
        txid: TxId,
        /// Function ids accepted at this step.
        expected: &'static str,
    },

    /// The chain exceeded the configured bound.
    #[error("event chain of agreement {agreement} exceeds {max} steps")]
    ChainTooLong {
        /// Agreement being walked.
        agreement: TxId,
        /// Step bound.
        max: usize,
    },
}

/// Local precondition failures in transaction builders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    /// A parameter is invalid on its own.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The caller is not the party the operation requires.
    #[error("caller is not the {0}")]
    WrongCaller(&'static str),

    /// A party uses a script key.
    #[error("{0} is a script key, which is not supported yet")]
    ScriptKeyUnsupported(&'static str),

    /// The offer was already accepted or cancelled.
    #[error("offer {0} is no longer open")]
    OfferNotOpen(TxId),

    /// The source may not cancel this offer.
    #[error("offer source cannot cancel a no-cancel offer")]
    OfferNotCancellable,

    /// The offer is too old to accept.
    #[error("offer has expired: {age_secs}s old, limit {max_secs}s")]
    OfferExpired {
        /// Estimated age.
        age_secs: u64,
        /// Expiry limit.
        max_secs: u64,
    },

    /// A notarization requirement is unmet.
    #[error("{0} is not notarized yet")]
    NotNotarized(&'static str),

    /// The agreement is not in a state that allows the operation.
    #[error("agreement {agreement} cannot accept this event: latest event is '{latest}'")]
    AgreementNotActive {
        /// Agreement id.
        agreement: TxId,
        /// Latest event's function id.
        latest: char,
    },

    /// The agreement has no arbitrator.
    #[error("agreement has no arbitrator")]
    NoArbitrator,

    /// The agreement disabled disputes.
    #[error("disputes are disabled for this agreement")]
    DisputesDisabled,

    /// The dispute is no longer open.
    #[error("dispute {0} is no longer open")]
    DisputeNotOpen(TxId),

    /// The dispute cannot be cancelled.
    #[error("dispute is final and cannot be cancelled")]
    DisputeFinal,

    /// A contract output to spend does not exist.
    #[error("output {0} not found")]
    OutputNotFound(OutPoint),

    /// The caller's normal outputs cannot fund the transaction.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        /// Amount required.
        needed: Amount,
        /// Amount available.
        available: Amount,
    },

    /// Unlock transactions are reserved.
    #[error("unlock is not supported")]
    UnlockUnsupported,

    /// Traversal of a referenced transaction failed.
    #[error(transparent)]
    Walk(#[from] WalkError),
}

/// Reporting failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Transaction unknown to the host.
    #[error("transaction {0} not found")]
    NotFound(TxId),

    /// Transaction is not an Agreements transaction.
    #[error("transaction {0} is not an agreements transaction")]
    NotAgreementsTx(TxId),

    /// Traversal failed.
    #[error(transparent)]
    Walk(#[from] WalkError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_message_is_exact() {
        assert_eq!(
            ValidationError::InvalidPreviousEvent.to_string(),
            "attempting to spend an invalid previous event"
        );
    }

    #[test]
    fn expiry_message_mentions_expiry() {
        let e = ValidationError::OfferExpired {
            age_secs: 7_776_060,
            max_secs: 7_776_000,
        };
        assert!(e.to_string().contains("expired"));
        assert_eq!(e.category(), ErrorCategory::Eligibility);
    }

    #[test]
    fn categories() {
        assert_eq!(
            ValidationError::MissingOpReturn.category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            ValidationError::InvalidPreviousEvent.category(),
            ErrorCategory::Referential
        );
        assert_eq!(
            ValidationError::PayoutOutOfRange {
                payout: 11,
                deposit: 10
            }
            .category(),
            ErrorCategory::Amount
        );
    }

    #[test]
    fn wrong_output_value_names_role() {
        let e = ValidationError::WrongOutputValue {
            vout: 1,
            what: "deposit",
            expected: 10_000,
            found: 9_999,
        };
        assert_eq!(
            e.to_string(),
            "deposit output at vout 1 must hold exactly 10000, found 9999"
        );
    }
}
