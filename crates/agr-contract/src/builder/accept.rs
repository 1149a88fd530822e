//! Acceptance: a plain or amending offer becomes an agreement (`c`); a
//! closing offer ends one (`t`).

use serde::Serialize;

use agr_chain::Script;
use agr_core::{OutPoint, TxId};

use super::{echo, party_pubkey, BuildContext, BuiltTx, Draft};
use crate::address::{event_script, global_script};
use crate::codec::{AcceptData, AgreementOp, CloseData, OfferFlags};
use crate::error::BuilderError;
use crate::walker::{load_offer, AcceptedOffer, LatestEvent};

#[derive(Serialize)]
struct AcceptEcho {
    offer_txid: TxId,
    ref_agreement: Option<TxId>,
    closes: bool,
}

/// Accept an open offer addressed to the caller.
pub fn agreement_accept(ctx: &BuildContext<'_>, offer_txid: &TxId) -> Result<BuiltTx, BuilderError> {
    let accepted = load_offer(ctx.chain, *offer_txid)?;
    let offer = &accepted.offer;
    let marker = OutPoint::new(*offer_txid, 0);
    if ctx.chain.spender(&marker).is_some() {
        return Err(BuilderError::OfferNotOpen(*offer_txid));
    }
    if !ctx.is_caller(&offer.destination) {
        return Err(BuilderError::WrongCaller("offer destination"));
    }
    let offer_height = ctx
        .chain
        .transaction(offer_txid)
        .and_then(|r| r.height)
        .unwrap_or_default();
    ctx.check_offer_age(offer_height)?;
    let await_notaries = offer.flags.contains(OfferFlags::AWAITNOTARIES);
    if await_notaries && !ctx.chain.is_tx_notarized(offer_txid) {
        return Err(BuilderError::NotNotarized("offer"));
    }

    let previous = match offer.ref_agreement {
        Some(agreement_txid) if offer.flags.contains(OfferFlags::AMENDMENT) => {
            let baton = ctx.active_baton(&agreement_txid)?;
            if await_notaries && !ctx.chain.is_tx_notarized(&baton.txid) {
                return Err(BuilderError::NotNotarized("previous event"));
            }
            Some((agreement_txid, baton))
        }
        _ => None,
    };

    let echo = echo(
        "accept",
        &AcceptEcho {
            offer_txid: *offer_txid,
            ref_agreement: offer.ref_agreement,
            closes: offer.flags.contains(OfferFlags::CLOSE),
        },
    );
    match previous {
        Some((agreement_txid, baton)) if offer.flags.contains(OfferFlags::CLOSE) => {
            close(ctx, &accepted, agreement_txid, baton, echo)
        }
        _ => accept(ctx, &accepted, previous, echo),
    }
}

fn accept(
    ctx: &BuildContext<'_>,
    accepted: &AcceptedOffer,
    previous: Option<(TxId, LatestEvent)>,
    echo: serde_json::Value,
) -> Result<BuiltTx, BuilderError> {
    let offer = &accepted.offer;
    let mut draft = Draft::new();
    draft.spend(ctx, OutPoint::new(accepted.offer_txid, 0))?;
    if let Some((agreement_txid, baton)) = previous {
        draft.spend(ctx, OutPoint::new(baton.txid, 0))?;
        draft.spend(ctx, OutPoint::new(agreement_txid, 1))?;
        tracing::debug!(agreement = %agreement_txid, "accepting amendment");
    }
    draft.pay(ctx.params.marker_value, event_script(&accepted.offer_txid));
    draft.pay(offer.deposit, global_script());
    if offer.payment > 0 {
        let source = party_pubkey(&offer.source, "source")?;
        draft.pay(offer.payment, Script::pubkey(source));
    }
    draft.finish(
        ctx,
        AgreementOp::Accept(AcceptData {
            offer_txid: accepted.offer_txid,
        }),
        echo,
    )
}

fn close(
    ctx: &BuildContext<'_>,
    accepted: &AcceptedOffer,
    agreement_txid: TxId,
    baton: LatestEvent,
    echo: serde_json::Value,
) -> Result<BuiltTx, BuilderError> {
    let offer = &accepted.offer;
    let mut draft = Draft::new();
    draft.spend(ctx, OutPoint::new(baton.txid, 0))?;
    draft.spend(ctx, OutPoint::new(agreement_txid, 1))?;
    draft.spend(ctx, OutPoint::new(accepted.offer_txid, 0))?;
    if offer.payment > 0 {
        let source = party_pubkey(&offer.source, "source")?;
        draft.pay(offer.payment, Script::pubkey(source));
    }
    tracing::debug!(agreement = %agreement_txid, payout = offer.payment, "closing agreement");
    draft.finish(
        ctx,
        AgreementOp::Close(CloseData {
            agreement_txid,
            offer_txid: accepted.offer_txid,
            payout: offer.payment,
        }),
        echo,
    )
}
