//! Offer builders: new agreements, amendments, closes, cancellation.

use serde::{Deserialize, Serialize};

use agr_core::{Amount, OutPoint, TxId};
use agr_crypto::PublicKey;

use super::{echo, party_pubkey, BuildContext, BuiltTx, Draft};
use crate::address::global_script;
use crate::codec::{AgreementOp, OfferData, OfferFlags, StopOfferData};
use crate::error::BuilderError;
use crate::party::PartyKey;
use crate::walker::{load_agreement, load_offer};

/// Terms of a new or amending offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTerms {
    /// Dispute arbitrator.
    pub arbitrator: Option<PublicKey>,
    /// Terms switches; the amendment and close bits are set by the builder.
    pub flags: OfferFlags,
    /// Deposit escrowed on acceptance; zero means the marker value.
    pub deposit: Amount,
    /// Paid to the offeror on acceptance.
    pub payment: Amount,
    /// Dispute fee; zero means the marker value.
    pub dispute_fee: Amount,
    /// Short title.
    pub name: String,
    /// Free text.
    pub memo: String,
}

impl OfferTerms {
    /// Minimal terms: no arbitrator, marker-sized deposit and fee, no payment.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            arbitrator: None,
            flags: OfferFlags::NOUNLOCK,
            deposit: 0,
            payment: 0,
            dispute_fee: 0,
            name: name.into(),
            memo: String::new(),
        }
    }
}

fn check_terms(ctx: &BuildContext<'_>, d: &OfferData) -> Result<(), BuilderError> {
    let invalid = |name: &'static str, reason: String| BuilderError::InvalidParameter { name, reason };
    if d.source == d.destination {
        return Err(invalid("destination", "must differ from the source".into()));
    }
    if let Some(arbitrator) = &d.arbitrator {
        if *arbitrator == d.source || *arbitrator == d.destination {
            return Err(invalid("arbitrator", "must not be a party".into()));
        }
    }
    if !OfferFlags::all().contains(d.flags) {
        return Err(invalid("flags", format!("unknown bits {:#04x}", d.flags.bits())));
    }
    let min = ctx.params.marker_value;
    if d.deposit < min {
        return Err(invalid("deposit", format!("{} below minimum {min}", d.deposit)));
    }
    if d.dispute_fee < min {
        return Err(invalid("dispute_fee", format!("{} below minimum {min}", d.dispute_fee)));
    }
    if d.payment < 0 {
        return Err(invalid("payment", "must not be negative".into()));
    }
    if d.name.is_empty() || d.name.len() > ctx.params.max_name_len {
        return Err(invalid(
            "name",
            format!("length {} outside 1..={}", d.name.len(), ctx.params.max_name_len),
        ));
    }
    ctx.check_memo(&d.memo)
}

fn build_offer(ctx: &BuildContext<'_>, data: OfferData, kind: &str) -> Result<BuiltTx, BuilderError> {
    check_terms(ctx, &data)?;
    let echo = echo(kind, &data);
    let mut draft = Draft::new();
    draft.pay(ctx.params.marker_value, global_script());
    tracing::debug!(
        kind,
        deposit = data.deposit,
        payment = data.payment,
        flags = data.flags.bits(),
        "building offer"
    );
    draft.finish(ctx, AgreementOp::Offer(data), echo)
}

fn offer_data(
    ctx: &BuildContext<'_>,
    destination: PublicKey,
    terms: &OfferTerms,
    flags: OfferFlags,
    ref_agreement: Option<TxId>,
) -> OfferData {
    let or_marker = |v: Amount| if v == 0 { ctx.params.marker_value } else { v };
    OfferData {
        source: PartyKey::Pubkey(ctx.caller),
        destination: PartyKey::Pubkey(destination),
        arbitrator: terms.arbitrator.map(PartyKey::Pubkey),
        flags,
        ref_agreement,
        deposit: or_marker(terms.deposit),
        payment: terms.payment,
        dispute_fee: or_marker(terms.dispute_fee),
        name: terms.name.clone(),
        memo: terms.memo.clone(),
        unlock_conditions: Vec::new(),
    }
}

/// Offer a new agreement to `destination`.
pub fn agreement_create(
    ctx: &BuildContext<'_>,
    destination: &PublicKey,
    terms: &OfferTerms,
) -> Result<BuiltTx, BuilderError> {
    if terms.flags.intersects(OfferFlags::AMENDMENT | OfferFlags::CLOSE) {
        return Err(BuilderError::InvalidParameter {
            name: "flags",
            reason: "amendment and close offers reference an agreement".into(),
        });
    }
    let data = offer_data(ctx, *destination, terms, terms.flags, None);
    build_offer(ctx, data, "offer")
}

/// The other party of a live agreement the caller belongs to.
fn counterparty(ctx: &BuildContext<'_>, agreement_txid: &TxId) -> Result<PublicKey, BuilderError> {
    let agreement = load_agreement(ctx.chain, agreement_txid)?;
    ctx.active_baton(agreement_txid)?;
    let other = if ctx.is_caller(&agreement.offer.source) {
        &agreement.offer.destination
    } else if ctx.is_caller(&agreement.offer.destination) {
        &agreement.offer.source
    } else {
        return Err(BuilderError::WrongCaller("agreement party"));
    };
    party_pubkey(other, "counterparty")
}

/// Offer replacement terms for an agreement to its other party.
pub fn agreement_amend(
    ctx: &BuildContext<'_>,
    agreement_txid: &TxId,
    terms: &OfferTerms,
) -> Result<BuiltTx, BuilderError> {
    let destination = counterparty(ctx, agreement_txid)?;
    let flags = (terms.flags | OfferFlags::AMENDMENT) - OfferFlags::CLOSE;
    let data = offer_data(ctx, destination, terms, flags, Some(*agreement_txid));
    build_offer(ctx, data, "amendment")
}

/// Offer to close an agreement, asking `payment` from the other party.
pub fn agreement_close(
    ctx: &BuildContext<'_>,
    agreement_txid: &TxId,
    payment: Amount,
    name: &str,
    memo: &str,
) -> Result<BuiltTx, BuilderError> {
    let destination = counterparty(ctx, agreement_txid)?;
    let terms = OfferTerms {
        payment,
        memo: memo.to_string(),
        ..OfferTerms::new(name)
    };
    let flags = OfferFlags::AMENDMENT | OfferFlags::CLOSE | OfferFlags::NOUNLOCK;
    let data = offer_data(ctx, destination, &terms, flags, Some(*agreement_txid));
    build_offer(ctx, data, "close")
}

#[derive(Serialize)]
struct StopOfferEcho<'a> {
    offer_txid: TxId,
    memo: &'a str,
}

/// Withdraw (as source) or decline (as destination) an open offer.
pub fn agreement_stop_offer(
    ctx: &BuildContext<'_>,
    offer_txid: &TxId,
    memo: &str,
) -> Result<BuiltTx, BuilderError> {
    let accepted = load_offer(ctx.chain, *offer_txid)?;
    let offer = &accepted.offer;
    let marker = OutPoint::new(*offer_txid, 0);
    if ctx.chain.spender(&marker).is_some() {
        return Err(BuilderError::OfferNotOpen(*offer_txid));
    }
    if !ctx.is_caller(&offer.destination) {
        if !ctx.is_caller(&offer.source) {
            return Err(BuilderError::WrongCaller("offer source or destination"));
        }
        if offer.flags.contains(OfferFlags::NOCANCEL) {
            return Err(BuilderError::OfferNotCancellable);
        }
    }
    ctx.check_memo(memo)?;

    let echo = echo(
        "stop_offer",
        &StopOfferEcho {
            offer_txid: *offer_txid,
            memo,
        },
    );
    let mut draft = Draft::new();
    draft.spend(ctx, marker)?;
    draft.finish(
        ctx,
        AgreementOp::StopOffer(StopOfferData {
            offer_txid: *offer_txid,
            memo: memo.to_string(),
        }),
        echo,
    )
}
