//! Consensus properties that hold across transactions: terminal events,
//! single-spend batons, offer expiry, amendments and notarization gates.

mod common;

use agr_chain::{sign_with, ChainError, ChainView, Script, Transaction, TxIn, TxOut};
use agr_contract::address::event_script;
use agr_contract::builder::{
    agreement_accept, agreement_amend, agreement_close, agreement_dispute, agreement_resolve,
    agreement_stop_dispute,
};
use agr_contract::codec::DisputeData;
use agr_contract::query::{agreement_references, agreement_summary, AgreementStatus};
use agr_contract::walker::find_latest_agreement_event;
use agr_contract::{AgreementOp, BuilderError, DisputeFlags, FuncId, OfferFlags, OfferTerms, PartyKey};
use agr_core::{OutPoint, TxId};

use common::{Who, World};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `who` tries to dispute `agreement` by spending output 0 of `baton_tx`.
fn dispute_spending(w: &World, who: Who, agreement: &TxId, offer: &TxId, baton_tx: &TxId) -> Transaction {
    let baton = OutPoint::new(*baton_tx, 0);
    let baton_value = w.output(baton_tx, 0).value;
    let coin = w
        .chain
        .address_unspent(&agr_chain::Address::pubkey(&w.pk(who)))
        .into_iter()
        .find(|o| o.height.is_some() && o.outpoint != baton)
        .unwrap();
    let fee = 10_000;
    let mut tx = Transaction::new();
    tx.inputs.push(TxIn::new(baton));
    tx.inputs.push(TxIn::new(coin.outpoint));
    tx.outputs.push(TxOut::new(fee, event_script(offer)));
    let change = baton_value + coin.value - fee - w.params.tx_fee;
    tx.outputs.push(TxOut::new(change, Script::pubkey(w.pk(who))));
    let op = AgreementOp::Dispute(DisputeData {
        agreement_txid: *agreement,
        claimant: PartyKey::Pubkey(w.pk(who)),
        flags: DisputeFlags::empty(),
        memo: "reopen".into(),
    });
    tx.outputs.push(TxOut::new(0, Script::op_return(op.encode())));
    sign_with(&mut tx, &w.chain, w.key(who));
    tx
}

fn rejection(err: ChainError) -> String {
    err.rejection_reason()
        .map(str::to_string)
        .unwrap_or_else(|| panic!("expected a contract rejection, got {err}"))
}

// ---------------------------------------------------------------------------
// Terminal finality
// ---------------------------------------------------------------------------

#[test]
fn resolved_agreement_cannot_take_new_events() {
    let mut w = World::new();
    let terms = w.arbitrated_terms("lease");
    let (offer, agreement) = w.agreement(&terms);
    let dispute = w.run(Who::Bob, |ctx| {
        agreement_dispute(ctx, &agreement, DisputeFlags::empty(), "late")
    });
    let resolve = w.run(Who::Carol, |ctx| agreement_resolve(ctx, &dispute, 10_000, "bob wins"));

    // Output 0 of the resolve is Bob's payout; spending it as a baton fails.
    let tx = dispute_spending(&w, Who::Bob, &agreement, &offer, &resolve);
    let err = w.chain.submit(tx).unwrap_err();
    assert_eq!(rejection(err), "attempting to spend an invalid previous event");

    let err = agreement_dispute(&w.ctx(Who::Bob), &agreement, DisputeFlags::empty(), "again")
        .unwrap_err();
    assert_eq!(
        err,
        BuilderError::AgreementNotActive {
            agreement,
            latest: 'r'
        }
    );
}

#[test]
fn closed_agreement_cannot_take_new_events() {
    let mut w = World::new();
    let terms = w.arbitrated_terms("lease");
    let (offer, agreement) = w.agreement(&terms);
    let close_offer = w.run(Who::Alice, |ctx| agreement_close(ctx, &agreement, 2_500, "done", ""));
    let close = w.run(Who::Bob, |ctx| agreement_accept(ctx, &close_offer));

    let tx = dispute_spending(&w, Who::Alice, &agreement, &offer, &close);
    let err = w.chain.submit(tx).unwrap_err();
    assert_eq!(rejection(err), "attempting to spend an invalid previous event");
    let latest = find_latest_agreement_event(&w.chain, &w.params, &agreement).unwrap();
    assert_eq!(latest.func, FuncId::Close);
    assert!(latest.func.is_terminal());
}

// ---------------------------------------------------------------------------
// At most one current state
// ---------------------------------------------------------------------------

#[test]
fn competing_events_cannot_both_spend_the_baton() {
    let mut w = World::new();
    let terms = w.arbitrated_terms("lease");
    let (_, agreement) = w.agreement(&terms);

    let bob = agreement_dispute(&w.ctx(Who::Bob), &agreement, DisputeFlags::empty(), "late")
        .unwrap();
    let alice = agreement_dispute(&w.ctx(Who::Alice), &agreement, DisputeFlags::empty(), "unpaid")
        .unwrap();
    let first = w.try_submit(Who::Bob, bob).unwrap();
    let err = w.try_submit(Who::Alice, alice).unwrap_err();
    match err {
        ChainError::DoubleSpend { outpoint, spender, .. } => {
            assert_eq!(outpoint, OutPoint::new(agreement, 0));
            assert_eq!(spender, first);
        }
        other => panic!("expected a double spend, got {other}"),
    }
    w.chain.mine_block();
    let latest = find_latest_agreement_event(&w.chain, &w.params, &agreement).unwrap();
    assert_eq!(latest.txid, first);
}

// ---------------------------------------------------------------------------
// Offer expiry
// ---------------------------------------------------------------------------

#[test]
fn accept_after_expiry_is_rejected() {
    let mut w = World::new();
    let offer = w.offer(&OfferTerms::new("lease"));
    let built = agreement_accept(&w.ctx(Who::Bob), &offer).unwrap();

    let limit = w.params.offer_expiry_blocks() as u32;
    assert_eq!(limit, 129_600);
    w.chain.advance(limit + 1);

    let err = agreement_accept(&w.ctx(Who::Bob), &offer).unwrap_err();
    assert!(matches!(err, BuilderError::OfferExpired { .. }));

    let err = w.try_submit(Who::Bob, built).unwrap_err();
    assert!(rejection(err).contains("expired"));
}

#[test]
fn accept_at_the_expiry_limit_is_allowed() {
    let mut w = World::new();
    let offer = w.offer(&OfferTerms::new("lease"));
    let limit = w.params.offer_expiry_blocks() as u32;
    w.chain.advance(limit);
    w.run(Who::Bob, |ctx| agreement_accept(ctx, &offer));
    assert!(w.is_spent(&offer, 0));
}

// ---------------------------------------------------------------------------
// Amendments
// ---------------------------------------------------------------------------

#[test]
fn amendment_moves_deposit_to_new_agreement() {
    let mut w = World::new();
    let terms = w.arbitrated_terms("lease");
    let (_, old) = w.agreement(&terms);

    let amended_terms = OfferTerms {
        deposit: 25_000,
        ..w.arbitrated_terms("lease v2")
    };
    let amendment = w.run(Who::Bob, |ctx| agreement_amend(ctx, &old, &amended_terms));
    // Bob offered the amendment, so Alice accepts it.
    let new = w.run(Who::Alice, |ctx| agreement_accept(ctx, &amendment));

    assert!(w.is_spent(&old, 0));
    assert!(w.is_spent(&old, 1));
    assert_eq!(w.output(&new, 1).value, 25_000);

    let old_summary = agreement_summary(&w.chain, &w.params, &old).unwrap();
    assert_eq!(old_summary.status, AgreementStatus::Amended { by: new });
    let new_summary = agreement_summary(&w.chain, &w.params, &new).unwrap();
    assert_eq!(new_summary.status, AgreementStatus::Active);
    assert_eq!(new_summary.amends, Some(old));
    assert_eq!(new_summary.source, PartyKey::Pubkey(w.pk(Who::Bob)));
    assert!(new_summary.flags.contains(OfferFlags::AMENDMENT));

    let refs = agreement_references(&w.chain, &old).unwrap();
    assert_eq!(refs.offers, vec![amendment]);
    assert_eq!(refs.agreements, vec![new]);
}

#[test]
fn disputed_agreement_cannot_be_amended() {
    let mut w = World::new();
    let terms = w.arbitrated_terms("lease");
    let (_, agreement) = w.agreement(&terms);
    w.run(Who::Alice, |ctx| {
        agreement_dispute(ctx, &agreement, DisputeFlags::empty(), "unpaid")
    });
    let err = agreement_amend(&w.ctx(Who::Bob), &agreement, &OfferTerms::new("v2")).unwrap_err();
    assert_eq!(
        err,
        BuilderError::AgreementNotActive {
            agreement,
            latest: 'd'
        }
    );
}

// ---------------------------------------------------------------------------
// Disputes
// ---------------------------------------------------------------------------

#[test]
fn withdrawn_dispute_reactivates_agreement() {
    let mut w = World::new();
    let terms = w.arbitrated_terms("lease");
    let (offer, agreement) = w.agreement(&terms);
    let dispute = w.run(Who::Alice, |ctx| {
        agreement_dispute(ctx, &agreement, DisputeFlags::empty(), "unpaid")
    });
    let stop = w.run(Who::Alice, |ctx| agreement_stop_dispute(ctx, &dispute, "paid now"));
    assert_eq!(w.output(&stop, 0).value, w.params.marker_value);
    assert_eq!(w.output(&stop, 0).script, event_script(&offer));
    assert_eq!(
        agreement_summary(&w.chain, &w.params, &agreement).unwrap().status,
        AgreementStatus::Active
    );

    // The next dispute spends the cancellation's baton.
    let second = w.run(Who::Bob, |ctx| {
        agreement_dispute(ctx, &agreement, DisputeFlags::empty(), "late again")
    });
    let spent = w.chain.transaction(&second).unwrap().tx.inputs[0].prevout;
    assert_eq!(spent, OutPoint::new(stop, 0));
}

#[test]
fn final_dispute_can_only_be_resolved() {
    let mut w = World::new();
    let terms = w.arbitrated_terms("lease");
    let (_, agreement) = w.agreement(&terms);
    let dispute = w.run(Who::Bob, |ctx| {
        agreement_dispute(ctx, &agreement, DisputeFlags::FINAL, "fraud")
    });
    let err = agreement_stop_dispute(&w.ctx(Who::Carol), &dispute, "").unwrap_err();
    assert_eq!(err, BuilderError::DisputeFinal);
    w.run(Who::Carol, |ctx| agreement_resolve(ctx, &dispute, 0, "no merit"));
    let status = agreement_summary(&w.chain, &w.params, &agreement).unwrap().status;
    assert!(!status.is_live());
}

#[test]
fn no_disputes_flag_is_enforced() {
    let mut w = World::new();
    let terms = OfferTerms {
        flags: OfferFlags::NOUNLOCK | OfferFlags::NODISPUTES,
        ..w.arbitrated_terms("lease")
    };
    let (_, agreement) = w.agreement(&terms);
    let err = agreement_dispute(&w.ctx(Who::Bob), &agreement, DisputeFlags::empty(), "late")
        .unwrap_err();
    assert_eq!(err, BuilderError::DisputesDisabled);
}

// ---------------------------------------------------------------------------
// Notarization
// ---------------------------------------------------------------------------

#[test]
fn await_notaries_gates_acceptance() {
    let mut w = World::new();
    let terms = OfferTerms {
        flags: OfferFlags::NOUNLOCK | OfferFlags::AWAITNOTARIES,
        ..OfferTerms::new("lease")
    };
    let offer = w.offer(&terms);
    let err = agreement_accept(&w.ctx(Who::Bob), &offer).unwrap_err();
    assert_eq!(err, BuilderError::NotNotarized("offer"));

    let tip = w.chain.tip_height();
    w.chain.notarize(tip).unwrap();
    w.run(Who::Bob, |ctx| agreement_accept(ctx, &offer));
    assert!(w.is_spent(&offer, 0));
}
