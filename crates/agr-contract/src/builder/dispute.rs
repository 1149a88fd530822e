//! Dispute lifecycle builders.

use serde::Serialize;

use agr_chain::Script;
use agr_core::{Amount, OutPoint, TxId};

use super::{echo, party_pubkey, BuildContext, BuiltTx, Draft};
use crate::address::event_script;
use crate::codec::{
    AgreementOp, DisputeData, DisputeFlags, OfferFlags, ResolveData, StopDisputeData,
};
use crate::error::BuilderError;
use crate::party::PartyKey;
use crate::walker::{load_agreement, load_dispute, AgreementRecord};

#[derive(Serialize)]
struct DisputeEcho<'a> {
    agreement_txid: TxId,
    is_final: bool,
    memo: &'a str,
}

/// Open a dispute on an active agreement as one of its parties.
pub fn agreement_dispute(
    ctx: &BuildContext<'_>,
    agreement_txid: &TxId,
    flags: DisputeFlags,
    memo: &str,
) -> Result<BuiltTx, BuilderError> {
    let agreement = load_agreement(ctx.chain, agreement_txid)?;
    let terms = &agreement.offer;
    if !ctx.is_caller(&terms.source) && !ctx.is_caller(&terms.destination) {
        return Err(BuilderError::WrongCaller("agreement party"));
    }
    if terms.arbitrator.is_none() {
        return Err(BuilderError::NoArbitrator);
    }
    if terms.flags.contains(OfferFlags::NODISPUTES) {
        return Err(BuilderError::DisputesDisabled);
    }
    if !DisputeFlags::all().contains(flags) {
        return Err(BuilderError::InvalidParameter {
            name: "flags",
            reason: format!("unknown bits {:#04x}", flags.bits()),
        });
    }
    if memo.is_empty() {
        return Err(BuilderError::InvalidParameter {
            name: "memo",
            reason: "a dispute must state its grounds".into(),
        });
    }
    ctx.check_memo(memo)?;
    let baton = ctx.active_baton(agreement_txid)?;

    let echo = echo(
        "dispute",
        &DisputeEcho {
            agreement_txid: *agreement_txid,
            is_final: flags.contains(DisputeFlags::FINAL),
            memo,
        },
    );
    let mut draft = Draft::new();
    draft.spend(ctx, OutPoint::new(baton.txid, 0))?;
    draft.pay(terms.dispute_fee, event_script(&agreement.offer_txid));
    tracing::debug!(agreement = %agreement_txid, previous = %baton.txid, "opening dispute");
    draft.finish(
        ctx,
        AgreementOp::Dispute(DisputeData {
            agreement_txid: *agreement_txid,
            claimant: PartyKey::Pubkey(ctx.caller),
            flags,
            memo: memo.to_string(),
        }),
        echo,
    )
}

/// A dispute whose baton is still unspent, with its agreement.
fn open_dispute(
    ctx: &BuildContext<'_>,
    dispute_txid: &TxId,
) -> Result<(DisputeData, AgreementRecord), BuilderError> {
    let dispute = load_dispute(ctx.chain, dispute_txid)?;
    if ctx
        .chain
        .spender(&OutPoint::new(*dispute_txid, 0))
        .is_some()
    {
        return Err(BuilderError::DisputeNotOpen(*dispute_txid));
    }
    let agreement = load_agreement(ctx.chain, &dispute.agreement_txid)?;
    Ok((dispute, agreement))
}

#[derive(Serialize)]
struct StopDisputeEcho<'a> {
    agreement_txid: TxId,
    dispute_txid: TxId,
    memo: &'a str,
}

/// Withdraw an open, non-final dispute as its claimant or the arbitrator.
pub fn agreement_stop_dispute(
    ctx: &BuildContext<'_>,
    dispute_txid: &TxId,
    memo: &str,
) -> Result<BuiltTx, BuilderError> {
    let (dispute, agreement) = open_dispute(ctx, dispute_txid)?;
    if dispute.flags.contains(DisputeFlags::FINAL) {
        return Err(BuilderError::DisputeFinal);
    }
    let is_arbitrator = agreement
        .offer
        .arbitrator
        .as_ref()
        .is_some_and(|a| ctx.is_caller(a));
    if !ctx.is_caller(&dispute.claimant) && !is_arbitrator {
        return Err(BuilderError::WrongCaller("claimant or arbitrator"));
    }
    ctx.check_memo(memo)?;

    let echo = echo(
        "stop_dispute",
        &StopDisputeEcho {
            agreement_txid: agreement.txid,
            dispute_txid: *dispute_txid,
            memo,
        },
    );
    let mut draft = Draft::new();
    draft.spend(ctx, OutPoint::new(*dispute_txid, 0))?;
    draft.pay(ctx.params.marker_value, event_script(&agreement.offer_txid));
    draft.finish(
        ctx,
        AgreementOp::StopDispute(StopDisputeData {
            agreement_txid: agreement.txid,
            dispute_txid: *dispute_txid,
            memo: memo.to_string(),
        }),
        echo,
    )
}

#[derive(Serialize)]
struct ResolveEcho<'a> {
    agreement_txid: TxId,
    dispute_txid: TxId,
    claimant_payout: Amount,
    defendant_payout: Amount,
    memo: &'a str,
}

/// Settle an open dispute as the arbitrator, splitting the deposit.
pub fn agreement_resolve(
    ctx: &BuildContext<'_>,
    dispute_txid: &TxId,
    claimant_payout: Amount,
    memo: &str,
) -> Result<BuiltTx, BuilderError> {
    let (dispute, agreement) = open_dispute(ctx, dispute_txid)?;
    let terms = &agreement.offer;
    let arbitrator = terms.arbitrator.as_ref().ok_or(BuilderError::NoArbitrator)?;
    if !ctx.is_caller(arbitrator) {
        return Err(BuilderError::WrongCaller("arbitrator"));
    }
    let deposit = agreement.deposit();
    if !(0..=deposit).contains(&claimant_payout) {
        return Err(BuilderError::InvalidParameter {
            name: "claimant_payout",
            reason: format!("{claimant_payout} outside 0..={deposit}"),
        });
    }
    ctx.check_memo(memo)?;
    let defendant = if dispute.claimant == terms.source {
        &terms.destination
    } else {
        &terms.source
    };
    let remainder = deposit - claimant_payout;

    let echo = echo(
        "resolve",
        &ResolveEcho {
            agreement_txid: agreement.txid,
            dispute_txid: *dispute_txid,
            claimant_payout,
            defendant_payout: remainder,
            memo,
        },
    );
    let mut draft = Draft::new();
    draft.spend(ctx, OutPoint::new(*dispute_txid, 0))?;
    draft.spend(ctx, OutPoint::new(agreement.txid, 1))?;
    if claimant_payout > 0 {
        let to = party_pubkey(&dispute.claimant, "claimant")?;
        draft.pay(claimant_payout, Script::pubkey(to));
    }
    if remainder > 0 {
        let to = party_pubkey(defendant, "defendant")?;
        draft.pay(remainder, Script::pubkey(to));
    }
    tracing::debug!(dispute = %dispute_txid, claimant_payout, remainder, "resolving dispute");
    draft.finish(
        ctx,
        AgreementOp::Resolve(ResolveData {
            agreement_txid: agreement.txid,
            dispute_txid: *dispute_txid,
            claimant_payout,
            memo: memo.to_string(),
        }),
        echo,
    )
}

/// Unlock is reserved; the validator rejects every `u` transaction.
pub fn agreement_unlock(_ctx: &BuildContext<'_>, _agreement_txid: &TxId) -> Result<BuiltTx, BuilderError> {
    Err(BuilderError::UnlockUnsupported)
}
