//! # Agreements Validator
//!
//! Consensus entry point. [`agreements_validate`] decides whether a
//! transaction is a valid Agreements state transition, reading prior state
//! through [`ChainView`] only.
//!
//! ## Security Invariant
//!
//! - Every contract input is compared with the exact outpoint it must
//!   spend. A lookalike output from another agreement or offer is rejected.
//! - Contract outputs sit at fixed positions with exact escrow values.
//!   Escrow outside those positions is rejected, in inputs and outputs.
//! - A baton is only accepted as "previous event" if its transaction is a
//!   confirmed `c`, `d` or `x` of the same agreement. Terminal events have
//!   no baton, so nothing can follow them.
//! - Only confirmed spends count as "spent" when judging whether an
//!   amended agreement is still open; the local mempool never decides.
//! - Value sums are overflow-checked and negative outputs are rejected, so
//!   every transaction gets a definite verdict.
//! - The walker is never consulted. Double-spend protection in the host
//!   guarantees the spent baton is the current one.
//!
//! ## Transaction Layouts
//!
//! | Id  | Contract inputs | Fixed outputs |
//! |-----|-----------------|---------------|
//! | `o` | none | 0: marker to global |
//! | `s` | 0: offer marker | none |
//! | `c` | 0: offer marker; amendments add 1: previous baton, 2: previous deposit | 0: baton, 1: deposit, 2: payment if > 0 |
//! | `t` | 0: baton, 1: deposit, 2: closing offer marker | 0: payout if > 0 |
//! | `d` | 0: baton | 0: dispute fee baton |
//! | `x` | 0: dispute baton | 0: baton |
//! | `r` | 0: dispute baton, 1: deposit | claimant payout if > 0, then defendant remainder if > 0 |
//!
//! The payload is always the last output.

use agr_chain::{ChainView, ContractValidator, Rejection, Script, Transaction, TxOut, TxRecord};
use agr_core::{Amount, ConsensusParams, OutPoint, TxId, AGREEMENTS_VERSION, EVAL_AGREEMENTS};
use agr_crypto::PublicKey;

use crate::address::{event_script, global_script, is_module_script};
use crate::codec::{
    decode_agreement_opret, AcceptData, AgreementOp, CloseData, DisputeData, DisputeFlags,
    FuncId, OfferData, OfferFlags, Payload, ResolveData, StopDisputeData, StopOfferData,
};
use crate::error::ValidationError;
use crate::party::PartyKey;
use crate::walker::tx_payload;

/// The Agreements module's host hook.
#[derive(Debug, Clone, Default)]
pub struct AgreementsValidator {
    params: ConsensusParams,
}

impl AgreementsValidator {
    /// Validator running with `params`.
    pub fn new(params: ConsensusParams) -> Self {
        Self { params }
    }

    /// Parameters in force.
    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }
}

impl ContractValidator for AgreementsValidator {
    fn eval_code(&self) -> u8 {
        EVAL_AGREEMENTS
    }

    fn validate(&self, chain: &dyn ChainView, tx: &Transaction) -> Result<(), Rejection> {
        agreements_validate(chain, &self.params, tx).map_err(Into::into)
    }
}

/// Accept or reject `tx` as an Agreements transition.
pub fn agreements_validate(
    chain: &dyn ChainView,
    params: &ConsensusParams,
    tx: &Transaction,
) -> Result<(), ValidationError> {
    let result = validate_inner(chain, params, tx);
    let txid = tx.txid();
    let func = tx
        .op_return()
        .and_then(decode_agreement_opret)
        .map(FuncId::as_char);
    match &result {
        Ok(()) => tracing::trace!(%txid, ?func, "agreements transaction valid"),
        Err(e) => tracing::debug!(
            %txid,
            ?func,
            category = ?e.category(),
            error = %e,
            "agreements transaction rejected"
        ),
    }
    result
}

fn validate_inner(
    chain: &dyn ChainView,
    params: &ConsensusParams,
    tx: &Transaction,
) -> Result<(), ValidationError> {
    let payload = check_structure(params, tx)?;
    let v = Validation::load(chain, params, tx)?;
    v.check_fee()?;
    match &payload.op {
        AgreementOp::Offer(d) => v.offer(d),
        AgreementOp::StopOffer(d) => v.stop_offer(d),
        AgreementOp::Accept(d) => v.accept(d),
        AgreementOp::Close(d) => v.close(d),
        AgreementOp::Dispute(d) => v.dispute(d),
        AgreementOp::StopDispute(d) => v.stop_dispute(d),
        AgreementOp::Resolve(d) => v.resolve(d),
        AgreementOp::Unlock(_) => Err(ValidationError::UnlockNotSupported),
    }
}

/// Output count, payload placement and size, decoding, version.
fn check_structure(params: &ConsensusParams, tx: &Transaction) -> Result<Payload, ValidationError> {
    let last = tx.outputs.len().checked_sub(1).ok_or(ValidationError::NoOutputs)?;
    if let Some(vout) = tx.outputs[..last]
        .iter()
        .position(|o| o.script.op_return_data().is_some())
    {
        return Err(ValidationError::ExtraOpReturn(vout));
    }
    let data = tx.outputs[last]
        .script
        .op_return_data()
        .ok_or(ValidationError::MissingOpReturn)?;
    if data.len() > params.max_opret_size {
        return Err(ValidationError::OpReturnTooLarge {
            size: data.len(),
            max: params.max_opret_size,
        });
    }
    let payload = Payload::decode(data).map_err(ValidationError::MalformedPayload)?;
    if payload.version != AGREEMENTS_VERSION {
        return Err(ValidationError::UnsupportedVersion(payload.version));
    }
    Ok(payload)
}

/// Required value of a fixed output.
#[derive(Debug, Clone, Copy)]
enum Value {
    Exact(Amount),
    AtLeast(Amount),
}

/// The accept transaction of an agreement and the terms it accepted.
struct Agreement {
    txid: TxId,
    offer_txid: TxId,
    offer: OfferData,
}

struct Validation<'a> {
    chain: &'a dyn ChainView,
    params: &'a ConsensusParams,
    tx: &'a Transaction,
    prevouts: Vec<TxOut>,
}

impl<'a> Validation<'a> {
    fn load(
        chain: &'a dyn ChainView,
        params: &'a ConsensusParams,
        tx: &'a Transaction,
    ) -> Result<Self, ValidationError> {
        let prevouts = tx
            .inputs
            .iter()
            .enumerate()
            .map(|(vin, input)| {
                chain
                    .prevout(&input.prevout)
                    .ok_or(ValidationError::MissingPrevout {
                        vin,
                        outpoint: input.prevout,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            chain,
            params,
            tx,
            prevouts,
        })
    }

    fn check_fee(&self) -> Result<(), ValidationError> {
        if let Some(vout) = self.tx.outputs.iter().position(|o| o.value < 0) {
            return Err(ValidationError::NegativeOutput(vout));
        }
        let inputs = self
            .prevouts
            .iter()
            .try_fold(0 as Amount, |acc, o| acc.checked_add(o.value))
            .ok_or(ValidationError::ValueOverflow("input"))?;
        let outputs = self
            .tx
            .output_total()
            .ok_or(ValidationError::ValueOverflow("output"))?;
        let required = outputs
            .checked_add(self.params.tx_fee)
            .ok_or(ValidationError::ValueOverflow("output"))?;
        if inputs < required {
            return Err(ValidationError::FeeNotCovered {
                inputs,
                outputs,
                fee: self.params.tx_fee,
            });
        }
        Ok(())
    }

    // ─── Inputs ─────────────────────────────────────────────────────

    /// Value of inputs spending `key`'s normal outputs.
    fn normal_inputs_of(&self, key: &PublicKey) -> Amount {
        self.prevouts
            .iter()
            .filter(|o| o.script.as_pubkey() == Some(key))
            .map(|o| o.value)
            .sum()
    }

    fn signed_by(&self, party: &PartyKey, role: &'static str) -> Result<bool, ValidationError> {
        match party {
            PartyKey::Pubkey(pk) => Ok(self.normal_inputs_of(pk) > 0),
            PartyKey::Script(_) => Err(ValidationError::ScriptKeyUnsupported(role)),
        }
    }

    fn require_signer(&self, party: &PartyKey, role: &'static str) -> Result<(), ValidationError> {
        if self.signed_by(party, role)? {
            Ok(())
        } else {
            Err(ValidationError::NotSignedBy(role))
        }
    }

    fn expect_input(
        &self,
        vin: usize,
        expected: OutPoint,
        what: &'static str,
    ) -> Result<(), ValidationError> {
        let input = self
            .tx
            .inputs
            .get(vin)
            .ok_or(ValidationError::MissingInput { vin, what })?;
        if input.prevout != expected {
            return Err(ValidationError::UnexpectedInput {
                vin,
                what,
                expected,
                found: input.prevout,
            });
        }
        Ok(())
    }

    /// Inputs from `first` on must not spend module escrow.
    fn no_contract_inputs_from(&self, first: usize) -> Result<(), ValidationError> {
        match self
            .prevouts
            .iter()
            .enumerate()
            .skip(first)
            .find(|(_, o)| is_module_script(&o.script))
        {
            Some((vin, _)) => Err(ValidationError::ForeignContractInput(vin)),
            None => Ok(()),
        }
    }

    // ─── Outputs ────────────────────────────────────────────────────

    fn expect_output(
        &self,
        vout: usize,
        what: &'static str,
        value: Value,
        script: &Script,
    ) -> Result<(), ValidationError> {
        let last = self.tx.outputs.len() - 1;
        let out = self
            .tx
            .outputs
            .get(vout)
            .filter(|_| vout < last)
            .ok_or(ValidationError::MissingOutput { vout, what })?;
        if &out.script != script {
            return Err(ValidationError::WrongOutputLock { vout, what });
        }
        match value {
            Value::Exact(expected) if out.value != expected => {
                Err(ValidationError::WrongOutputValue {
                    vout,
                    what,
                    expected,
                    found: out.value,
                })
            }
            Value::AtLeast(min) if out.value < min => Err(ValidationError::OutputValueTooLow {
                vout,
                what,
                min,
                found: out.value,
            }),
            _ => Ok(()),
        }
    }

    /// Outputs from `first` up to the payload must not create module escrow.
    fn no_contract_outputs_from(&self, first: usize) -> Result<(), ValidationError> {
        let last = self.tx.outputs.len() - 1;
        for vout in first..last {
            if is_module_script(&self.tx.outputs[vout].script) {
                return Err(ValidationError::UnexpectedContractOutput(vout));
            }
        }
        Ok(())
    }

    fn pay_to(&self, party: &PartyKey, role: &'static str) -> Result<Script, ValidationError> {
        party
            .as_pubkey()
            .map(|pk| Script::pubkey(*pk))
            .ok_or(ValidationError::ScriptKeyUnsupported(role))
    }

    // ─── References ─────────────────────────────────────────────────

    fn confirmed(&self, txid: &TxId, what: &'static str) -> Result<TxRecord, ValidationError> {
        let record = self
            .chain
            .transaction(txid)
            .ok_or(ValidationError::ReferenceNotFound { what, txid: *txid })?;
        if !record.is_confirmed() {
            return Err(ValidationError::ReferenceUnconfirmed { what, txid: *txid });
        }
        Ok(record)
    }

    fn load_op(
        &self,
        txid: &TxId,
        what: &'static str,
        expected: FuncId,
    ) -> Result<(TxRecord, AgreementOp), ValidationError> {
        let record = self.confirmed(txid, what)?;
        match tx_payload(&record.tx) {
            Ok(p) if p.op.func_id() == expected => Ok((record, p.op)),
            _ => Err(ValidationError::ReferenceWrongType {
                what,
                txid: *txid,
                expected: expected.as_char(),
            }),
        }
    }

    fn load_offer(
        &self,
        txid: &TxId,
        what: &'static str,
    ) -> Result<(TxRecord, OfferData), ValidationError> {
        match self.load_op(txid, what, FuncId::Offer)? {
            (record, AgreementOp::Offer(offer)) => Ok((record, offer)),
            _ => Err(ValidationError::ReferenceWrongType {
                what,
                txid: *txid,
                expected: 'o',
            }),
        }
    }

    fn load_agreement(&self, txid: &TxId) -> Result<Agreement, ValidationError> {
        let offer_txid = match self.load_op(txid, "agreement", FuncId::Accept)? {
            (_, AgreementOp::Accept(d)) => d.offer_txid,
            _ => {
                return Err(ValidationError::ReferenceWrongType {
                    what: "agreement",
                    txid: *txid,
                    expected: 'c',
                })
            }
        };
        let (_, offer) = self.load_offer(&offer_txid, "accepted offer")?;
        Ok(Agreement {
            txid: *txid,
            offer_txid,
            offer,
        })
    }

    fn load_dispute(
        &self,
        txid: &TxId,
        agreement: &Agreement,
    ) -> Result<DisputeData, ValidationError> {
        match self.load_op(txid, "dispute", FuncId::Dispute)? {
            (_, AgreementOp::Dispute(d)) if d.agreement_txid == agreement.txid => Ok(d),
            (_, AgreementOp::Dispute(_)) => Err(ValidationError::ReferenceMismatch("dispute")),
            _ => Err(ValidationError::ReferenceWrongType {
                what: "dispute",
                txid: *txid,
                expected: 'd',
            }),
        }
    }

    /// Check that input `vin` spends a live, undisputed baton of
    /// `agreement`; returns the previous event's transaction.
    fn previous_event(&self, vin: usize, agreement: &Agreement) -> Result<TxRecord, ValidationError> {
        let outpoint = self
            .tx
            .inputs
            .get(vin)
            .ok_or(ValidationError::MissingInput {
                vin,
                what: "previous event",
            })?
            .prevout;
        if outpoint.vout != 0 {
            return Err(ValidationError::InvalidPreviousEvent);
        }
        let record = self
            .chain
            .transaction(&outpoint.txid)
            .ok_or(ValidationError::InvalidPreviousEvent)?;
        if !record.is_confirmed() {
            return Err(ValidationError::PreviousEventUnconfirmed(outpoint.txid));
        }
        let payload = tx_payload(&record.tx).map_err(|_| ValidationError::InvalidPreviousEvent)?;
        let func = match &payload.op {
            AgreementOp::Accept(_) if outpoint.txid == agreement.txid => FuncId::Accept,
            AgreementOp::Dispute(d) if d.agreement_txid == agreement.txid => FuncId::Dispute,
            AgreementOp::StopDispute(d) if d.agreement_txid == agreement.txid => {
                FuncId::StopDispute
            }
            _ => return Err(ValidationError::InvalidPreviousEvent),
        };
        if self.prevouts[vin].script != event_script(&agreement.offer_txid) {
            return Err(ValidationError::WrongEventLock(vin));
        }
        if func == FuncId::Dispute {
            return Err(ValidationError::AgreementDisputed);
        }
        Ok(record)
    }

    fn check_not_expired(&self, offer_height: u32) -> Result<(), ValidationError> {
        let age_secs = self
            .params
            .elapsed_secs(offer_height, self.chain.tip_height());
        if age_secs > self.params.offer_expiry_secs {
            return Err(ValidationError::OfferExpired {
                age_secs,
                max_secs: self.params.offer_expiry_secs,
            });
        }
        Ok(())
    }

    fn check_notarized(&self, record: &TxRecord, what: &'static str) -> Result<(), ValidationError> {
        match record.height {
            Some(h) if self.chain.is_notarized(h) => Ok(()),
            _ => Err(ValidationError::NotNotarized(what)),
        }
    }

    fn check_memo(&self, memo: &str) -> Result<(), ValidationError> {
        if memo.len() > self.params.max_memo_len {
            return Err(ValidationError::MemoTooLong {
                len: memo.len(),
                max: self.params.max_memo_len,
            });
        }
        Ok(())
    }

    // ─── Transitions ────────────────────────────────────────────────

    fn offer(&self, d: &OfferData) -> Result<(), ValidationError> {
        self.no_contract_inputs_from(0)?;

        let source = valid_pubkey(&d.source, "source")?;
        let destination = valid_pubkey(&d.destination, "destination")?;
        if source == destination {
            return Err(ValidationError::SameParty);
        }
        self.require_signer(&d.source, "source")?;
        if let Some(arbitrator) = &d.arbitrator {
            let arbitrator = valid_pubkey(arbitrator, "arbitrator")?;
            if arbitrator == source || arbitrator == destination {
                return Err(ValidationError::ArbitratorIsParty);
            }
        }

        if !OfferFlags::all().contains(d.flags) {
            return Err(ValidationError::UnknownFlags(d.flags.bits()));
        }
        if d.flags.contains(OfferFlags::CLOSE) && !d.flags.contains(OfferFlags::AMENDMENT) {
            return Err(ValidationError::CloseWithoutAmendment);
        }

        let min = self.params.marker_value;
        if d.deposit < min {
            return Err(ValidationError::AmountTooLow {
                what: "deposit",
                amount: d.deposit,
                min,
            });
        }
        if d.dispute_fee < min {
            return Err(ValidationError::AmountTooLow {
                what: "dispute fee",
                amount: d.dispute_fee,
                min,
            });
        }
        if d.payment < 0 {
            return Err(ValidationError::NegativePayment(d.payment));
        }
        if d.name.is_empty() || d.name.len() > self.params.max_name_len {
            return Err(ValidationError::InvalidName {
                len: d.name.len(),
                max: self.params.max_name_len,
            });
        }
        self.check_memo(&d.memo)?;
        if !d.unlock_conditions.is_empty() {
            return Err(ValidationError::UnlockConditionsUnsupported);
        }

        if d.flags.contains(OfferFlags::AMENDMENT) {
            let ref_txid = d.ref_agreement.ok_or(ValidationError::MissingReference)?;
            let agreement = self.load_agreement(&ref_txid)?;
            if self
                .chain
                .spender(&OutPoint::new(ref_txid, 1))
                .is_some_and(|spend| spend.height.is_some())
            {
                return Err(ValidationError::AgreementClosed(ref_txid));
            }
            let (a, b) = (&agreement.offer.source, &agreement.offer.destination);
            let same = (&d.source == a && &d.destination == b)
                || (&d.source == b && &d.destination == a);
            if !same {
                return Err(ValidationError::PartiesMismatch);
            }
        } else if d.ref_agreement.is_some() {
            return Err(ValidationError::UnexpectedReference);
        }

        self.expect_output(0, "marker", Value::AtLeast(min), &global_script())?;
        self.no_contract_outputs_from(1)
    }

    fn stop_offer(&self, d: &StopOfferData) -> Result<(), ValidationError> {
        let (_, offer) = self.load_offer(&d.offer_txid, "offer")?;
        self.expect_input(0, OutPoint::new(d.offer_txid, 0), "offer marker")?;
        self.no_contract_inputs_from(1)?;
        self.check_memo(&d.memo)?;

        if !self.signed_by(&offer.destination, "destination")? {
            if !self.signed_by(&offer.source, "source")? {
                return Err(ValidationError::NotSignedBy("offer source or destination"));
            }
            if offer.flags.contains(OfferFlags::NOCANCEL) {
                return Err(ValidationError::OfferNotCancellable);
            }
        }
        self.no_contract_outputs_from(0)
    }

    fn accept(&self, d: &AcceptData) -> Result<(), ValidationError> {
        let (offer_record, offer) = self.load_offer(&d.offer_txid, "offer")?;
        self.expect_input(0, OutPoint::new(d.offer_txid, 0), "offer marker")?;
        if offer.flags.contains(OfferFlags::CLOSE) {
            return Err(ValidationError::CloseOfferNotAcceptable(d.offer_txid));
        }
        self.check_not_expired(offer_record.height.unwrap_or_default())?;
        let await_notaries = offer.flags.contains(OfferFlags::AWAITNOTARIES);
        if await_notaries {
            self.check_notarized(&offer_record, "offer")?;
        }
        self.require_signer(&offer.destination, "destination")?;

        let mut contract_inputs = 1;
        if offer.flags.contains(OfferFlags::AMENDMENT) {
            let ref_txid = offer.ref_agreement.ok_or(ValidationError::MissingReference)?;
            let previous = self.load_agreement(&ref_txid)?;
            let event = self.previous_event(1, &previous)?;
            if await_notaries {
                self.check_notarized(&event, "previous event")?;
            }
            self.expect_input(2, OutPoint::new(ref_txid, 1), "agreement deposit")?;
            contract_inputs = 3;
        }
        self.no_contract_inputs_from(contract_inputs)?;

        let marker = self.params.marker_value;
        self.expect_output(0, "baton", Value::Exact(marker), &event_script(&d.offer_txid))?;
        self.expect_output(1, "deposit", Value::Exact(offer.deposit), &global_script())?;
        let mut fixed = 2;
        if offer.payment > 0 {
            let to_source = self.pay_to(&offer.source, "source")?;
            self.expect_output(2, "payment", Value::Exact(offer.payment), &to_source)?;
            fixed = 3;
        }
        self.no_contract_outputs_from(fixed)
    }

    fn close(&self, d: &CloseData) -> Result<(), ValidationError> {
        let agreement = self.load_agreement(&d.agreement_txid)?;
        let (offer_record, offer) = self.load_offer(&d.offer_txid, "closing offer")?;
        if !offer
            .flags
            .contains(OfferFlags::AMENDMENT | OfferFlags::CLOSE)
        {
            return Err(ValidationError::NotACloseOffer(d.offer_txid));
        }
        if offer.ref_agreement != Some(d.agreement_txid) {
            return Err(ValidationError::ReferenceMismatch("closing offer"));
        }
        if offer.payment != d.payout {
            return Err(ValidationError::PayoutMismatch {
                offered: offer.payment,
                recorded: d.payout,
            });
        }
        self.check_not_expired(offer_record.height.unwrap_or_default())?;

        let event = self.previous_event(0, &agreement)?;
        if offer.flags.contains(OfferFlags::AWAITNOTARIES) {
            self.check_notarized(&offer_record, "offer")?;
            self.check_notarized(&event, "previous event")?;
        }
        self.expect_input(1, OutPoint::new(agreement.txid, 1), "agreement deposit")?;
        self.expect_input(2, OutPoint::new(d.offer_txid, 0), "closing offer marker")?;
        self.no_contract_inputs_from(3)?;
        self.require_signer(&offer.destination, "destination")?;

        let mut fixed = 0;
        if d.payout > 0 {
            let to_source = self.pay_to(&offer.source, "source")?;
            self.expect_output(0, "payout", Value::Exact(d.payout), &to_source)?;
            fixed = 1;
        }
        self.no_contract_outputs_from(fixed)
    }

    fn dispute(&self, d: &DisputeData) -> Result<(), ValidationError> {
        let agreement = self.load_agreement(&d.agreement_txid)?;
        let terms = &agreement.offer;
        if !DisputeFlags::all().contains(d.flags) {
            return Err(ValidationError::UnknownFlags(d.flags.bits()));
        }
        if d.memo.is_empty() {
            return Err(ValidationError::EmptyMemo);
        }
        self.check_memo(&d.memo)?;
        if terms.arbitrator.is_none() {
            return Err(ValidationError::NoArbitrator);
        }
        if terms.flags.contains(OfferFlags::NODISPUTES) {
            return Err(ValidationError::DisputesDisabled);
        }
        if d.claimant != terms.source && d.claimant != terms.destination {
            return Err(ValidationError::ClaimantNotParty);
        }
        self.require_signer(&d.claimant, "claimant")?;

        self.previous_event(0, &agreement)?;
        self.no_contract_inputs_from(1)?;

        self.expect_output(
            0,
            "dispute fee",
            Value::Exact(terms.dispute_fee),
            &event_script(&agreement.offer_txid),
        )?;
        self.no_contract_outputs_from(1)
    }

    fn stop_dispute(&self, d: &StopDisputeData) -> Result<(), ValidationError> {
        let agreement = self.load_agreement(&d.agreement_txid)?;
        let dispute = self.load_dispute(&d.dispute_txid, &agreement)?;
        self.expect_input(0, OutPoint::new(d.dispute_txid, 0), "dispute")?;
        self.no_contract_inputs_from(1)?;
        self.check_memo(&d.memo)?;
        if dispute.flags.contains(DisputeFlags::FINAL) {
            return Err(ValidationError::DisputeFinal);
        }

        let by_claimant = self.signed_by(&dispute.claimant, "claimant")?;
        let by_arbitrator = match &agreement.offer.arbitrator {
            Some(arbitrator) => self.signed_by(arbitrator, "arbitrator")?,
            None => false,
        };
        if !by_claimant && !by_arbitrator {
            return Err(ValidationError::NotSignedBy("claimant or arbitrator"));
        }

        self.expect_output(
            0,
            "baton",
            Value::Exact(self.params.marker_value),
            &event_script(&agreement.offer_txid),
        )?;
        self.no_contract_outputs_from(1)
    }

    fn resolve(&self, d: &ResolveData) -> Result<(), ValidationError> {
        let agreement = self.load_agreement(&d.agreement_txid)?;
        let terms = &agreement.offer;
        let dispute = self.load_dispute(&d.dispute_txid, &agreement)?;
        self.expect_input(0, OutPoint::new(d.dispute_txid, 0), "dispute")?;
        self.expect_input(1, OutPoint::new(agreement.txid, 1), "agreement deposit")?;
        self.no_contract_inputs_from(2)?;
        self.check_memo(&d.memo)?;

        let arbitrator = terms.arbitrator.as_ref().ok_or(ValidationError::NoArbitrator)?;
        self.require_signer(arbitrator, "arbitrator")?;

        let deposit = terms.deposit;
        if d.claimant_payout < 0 || d.claimant_payout > deposit {
            return Err(ValidationError::PayoutOutOfRange {
                payout: d.claimant_payout,
                deposit,
            });
        }
        let defendant = if dispute.claimant == terms.source {
            &terms.destination
        } else {
            &terms.source
        };

        let mut vout = 0;
        if d.claimant_payout > 0 {
            let to_claimant = self.pay_to(&dispute.claimant, "claimant")?;
            self.expect_output(vout, "claimant payout", Value::Exact(d.claimant_payout), &to_claimant)?;
            vout += 1;
        }
        let remainder = deposit - d.claimant_payout;
        if remainder > 0 {
            let to_defendant = self.pay_to(defendant, "defendant")?;
            self.expect_output(vout, "defendant payout", Value::Exact(remainder), &to_defendant)?;
            vout += 1;
        }
        self.no_contract_outputs_from(vout)
    }
}

fn valid_pubkey(party: &PartyKey, role: &'static str) -> Result<PublicKey, ValidationError> {
    match party {
        PartyKey::Pubkey(pk) if pk.is_valid() => Ok(*pk),
        PartyKey::Pubkey(_) => Err(ValidationError::InvalidPartyKey(role)),
        PartyKey::Script(_) => Err(ValidationError::ScriptKeyUnsupported(role)),
    }
}
