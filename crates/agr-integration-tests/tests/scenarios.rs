//! End-to-end agreement lifecycles between Alice (offeror), Bob (signer)
//! and Carol (arbitrator).

mod common;

use agr_chain::{sign_input, sign_with, Address, ChainView, Script, Transaction, TxIn, TxOut};
use agr_contract::address::{event_script, global_script, global_signer, is_module_script};
use agr_contract::builder::{
    agreement_accept, agreement_close, agreement_dispute, agreement_resolve, agreement_stop_offer,
};
use agr_contract::codec::{decode_offer_opret, StopOfferData};
use agr_contract::query::{agreement_summary, AgreementStatus};
use agr_contract::{AgreementOp, BuilderError, DisputeFlags, OfferFlags, OfferTerms, PartyKey};
use agr_core::OutPoint;

use common::{Who, World};

// ---------------------------------------------------------------------------
// Scenario A: offer and acceptance
// ---------------------------------------------------------------------------

#[test]
fn offer_accepted_by_destination_creates_agreement() {
    let mut w = World::new();
    let offer = w.offer(&OfferTerms::new("lease"));

    let record = w.chain.transaction(&offer).unwrap();
    let data = decode_offer_opret(record.tx.op_return().unwrap()).unwrap();
    assert_eq!(data.deposit, 10_000);
    assert_eq!(data.payment, 0);
    assert_eq!(data.dispute_fee, 10_000);
    assert!(data.flags.contains(OfferFlags::NOUNLOCK));

    let agreement = w.run(Who::Bob, |ctx| agreement_accept(ctx, &offer));

    let summary = agreement_summary(&w.chain, &w.params, &agreement).unwrap();
    assert_eq!(summary.source, PartyKey::Pubkey(w.pk(Who::Alice)));
    assert_eq!(summary.destination, PartyKey::Pubkey(w.pk(Who::Bob)));
    assert_eq!(summary.offer_txid, offer);
    assert_eq!(summary.status, AgreementStatus::Active);

    let deposit = w.output(&agreement, 1);
    assert_eq!(deposit.value, 10_000);
    assert_eq!(deposit.script, global_script());
    let baton = w.output(&agreement, 0);
    assert_eq!(baton.script, event_script(&offer));
    assert!(w.is_spent(&offer, 0));
}

#[test]
fn only_destination_may_accept() {
    let mut w = World::new();
    let offer = w.offer(&OfferTerms::new("lease"));
    let err = agreement_accept(&w.ctx(Who::Carol), &offer).unwrap_err();
    assert_eq!(err, BuilderError::WrongCaller("offer destination"));
}

// ---------------------------------------------------------------------------
// Scenario B: closing by mutual agreement
// ---------------------------------------------------------------------------

#[test]
fn close_pays_requested_amount_to_offeror() {
    let mut w = World::new();
    let (_, agreement) = w.agreement(&OfferTerms::new("lease"));

    let close_offer =
        w.run(Who::Alice, |ctx| agreement_close(ctx, &agreement, 5_000, "settle", ""));
    let close = w.run(Who::Bob, |ctx| agreement_accept(ctx, &close_offer));

    let tx = w.chain.transaction(&close).unwrap().tx;
    assert_eq!(tx.outputs[0].value, 5_000);
    assert_eq!(tx.outputs[0].script, Script::pubkey(w.pk(Who::Alice)));
    assert_eq!(w.paid_to(&close, Who::Alice), vec![5_000]);
    // Payout, caller change, payload.
    assert_eq!(tx.outputs.len(), 3);
    assert!(!tx.outputs.iter().any(|o| is_module_script(&o.script)));

    assert!(w.is_spent(&agreement, 0));
    assert!(w.is_spent(&agreement, 1));
    assert!(w.is_spent(&close_offer, 0));
    let summary = agreement_summary(&w.chain, &w.params, &agreement).unwrap();
    assert_eq!(summary.status, AgreementStatus::Closed { by: close });
}

// ---------------------------------------------------------------------------
// Scenario C: dispute and arbitration
// ---------------------------------------------------------------------------

#[test]
fn arbitrator_splits_deposit_between_claimant_and_defendant() {
    let mut w = World::new();
    let terms = w.arbitrated_terms("lease");
    let (offer, agreement) = w.agreement(&terms);

    let dispute = w.run(Who::Bob, |ctx| {
        agreement_dispute(ctx, &agreement, DisputeFlags::empty(), "goods never arrived")
    });
    let fee = w.output(&dispute, 0);
    assert_eq!(fee.value, 10_000);
    assert_eq!(fee.script, event_script(&offer));
    assert_eq!(
        agreement_summary(&w.chain, &w.params, &agreement).unwrap().status,
        AgreementStatus::Disputed { dispute }
    );

    let resolve = w.run(Who::Carol, |ctx| agreement_resolve(ctx, &dispute, 3_000, "split"));
    // Bob claimed, so Bob receives the claimant share and Alice the rest.
    assert_eq!(w.paid_to(&resolve, Who::Bob), vec![3_000]);
    assert_eq!(w.paid_to(&resolve, Who::Alice), vec![7_000]);
    assert!(w.is_spent(&dispute, 0));
    assert!(w.is_spent(&agreement, 1));
    assert_eq!(
        agreement_summary(&w.chain, &w.params, &agreement).unwrap().status,
        AgreementStatus::Resolved { by: resolve }
    );
}

#[test]
fn dispute_needs_an_arbitrator() {
    let mut w = World::new();
    let (_, agreement) = w.agreement(&OfferTerms::new("lease"));
    let err =
        agreement_dispute(&w.ctx(Who::Bob), &agreement, DisputeFlags::empty(), "late").unwrap_err();
    assert_eq!(err, BuilderError::NoArbitrator);
}

// ---------------------------------------------------------------------------
// Scenario D: no-cancel offers
// ---------------------------------------------------------------------------

/// Alice spends the offer marker herself, bypassing the builder's checks.
fn source_cancel_tx(w: &World, offer: &agr_core::TxId) -> Transaction {
    let alice = w.pk(Who::Alice);
    let coin = w
        .chain
        .address_unspent(&Address::pubkey(&alice))
        .into_iter()
        .find(|o| o.height.is_some())
        .unwrap();
    let mut tx = Transaction::new();
    tx.inputs.push(TxIn::new(OutPoint::new(*offer, 0)));
    tx.inputs.push(TxIn::new(coin.outpoint));
    let change = coin.value + w.params.marker_value - w.params.tx_fee;
    tx.outputs.push(TxOut::new(change, Script::pubkey(alice)));
    let op = AgreementOp::StopOffer(StopOfferData {
        offer_txid: *offer,
        memo: "changed my mind".into(),
    });
    tx.outputs.push(TxOut::new(0, Script::op_return(op.encode())));
    sign_input(&mut tx, 0, &global_signer());
    sign_with(&mut tx, &w.chain, w.key(Who::Alice));
    tx
}

#[test]
fn no_cancel_offer_refuses_source_but_not_destination() {
    let mut w = World::new();
    let terms = OfferTerms {
        flags: OfferFlags::NOUNLOCK | OfferFlags::NOCANCEL,
        ..OfferTerms::new("lease")
    };
    let offer = w.offer(&terms);

    let err = agreement_stop_offer(&w.ctx(Who::Alice), &offer, "").unwrap_err();
    assert_eq!(err, BuilderError::OfferNotCancellable);

    let tx = source_cancel_tx(&w, &offer);
    let err = w.chain.submit(tx).unwrap_err();
    assert_eq!(
        err.rejection_reason(),
        Some("offer source cannot cancel a no-cancel offer")
    );
    assert!(!w.is_spent(&offer, 0));

    let stop = w.run(Who::Bob, |ctx| agreement_stop_offer(ctx, &offer, "declined"));
    assert_eq!(
        w.chain.spender(&OutPoint::new(offer, 0)).unwrap().txid,
        stop
    );
}

#[test]
fn plain_offer_can_be_withdrawn_by_source() {
    let mut w = World::new();
    let offer = w.offer(&OfferTerms::new("lease"));
    let tx = source_cancel_tx(&w, &offer);
    w.chain.submit(tx).unwrap();
    w.chain.mine_block();
    assert!(w.is_spent(&offer, 0));
    let err = agreement_accept(&w.ctx(Who::Bob), &offer).unwrap_err();
    assert_eq!(err, BuilderError::OfferNotOpen(offer));
}
