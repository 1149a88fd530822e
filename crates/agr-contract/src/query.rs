//! # Agreements Reporting
//!
//! Read-only views over chain state: per-transaction descriptions, event
//! logs, amendment references and per-key inventories. Discovery goes
//! through the global address index, which every offer (its marker) and
//! every agreement (its deposit) pays into.
//!
//! Reports follow the walker: confirmed history only, bounded by
//! `max_event_chain`.

use serde::Serialize;

use agr_chain::ChainView;
use agr_core::{Amount, ConsensusParams, OutPoint, TxId};
use agr_crypto::PublicKey;

use crate::address::global_address;
use crate::codec::{AgreementOp, FuncId, OfferData, OfferFlags};
use crate::error::QueryError;
use crate::party::PartyKey;
use crate::walker::{
    agreement_events, find_latest_agreement_event, load_agreement, load_offer, tx_payload,
    EventEntry, LatestEvent,
};

/// Where an offer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OfferStatus {
    /// Marker unspent.
    Open,
    /// Accepted by an accept or close transaction.
    Accepted {
        /// Accepting transaction.
        by: TxId,
    },
    /// Withdrawn or declined.
    Cancelled {
        /// Cancelling transaction.
        by: TxId,
    },
}

/// Where an agreement stands, read from its latest event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgreementStatus {
    /// No open dispute; deposit escrowed.
    Active,
    /// A dispute is open.
    Disputed {
        /// The open dispute.
        dispute: TxId,
    },
    /// Closed by mutual agreement.
    Closed {
        /// Close transaction.
        by: TxId,
    },
    /// Settled by the arbitrator.
    Resolved {
        /// Resolve transaction.
        by: TxId,
    },
    /// Replaced by an amendment.
    Amended {
        /// The replacing agreement.
        by: TxId,
    },
}

impl AgreementStatus {
    fn from_latest(agreement_txid: &TxId, latest: &LatestEvent) -> Self {
        match latest.func {
            FuncId::Accept if latest.txid == *agreement_txid => Self::Active,
            FuncId::Accept => Self::Amended { by: latest.txid },
            FuncId::Dispute => Self::Disputed {
                dispute: latest.txid,
            },
            FuncId::Close => Self::Closed { by: latest.txid },
            FuncId::Resolve => Self::Resolved { by: latest.txid },
            _ => Self::Active,
        }
    }

    /// Whether the agreement still holds its deposit.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Disputed { .. })
    }
}

/// Summary of an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgreementSummary {
    /// Agreement id.
    pub txid: TxId,
    /// Height of the accept transaction.
    pub height: u32,
    /// Accepted offer.
    pub offer_txid: TxId,
    /// Offeror.
    pub source: PartyKey,
    /// Signer.
    pub destination: PartyKey,
    /// Arbitrator, if any.
    pub arbitrator: Option<PartyKey>,
    /// Agreement this one amended.
    pub amends: Option<TxId>,
    /// Escrowed deposit.
    pub deposit: Amount,
    /// Fee to open a dispute.
    pub dispute_fee: Amount,
    /// Terms switches.
    pub flags: OfferFlags,
    /// Title.
    pub name: String,
    /// Free text.
    pub memo: String,
    /// Current state.
    pub status: AgreementStatus,
    /// Latest confirmed event.
    pub latest_event: LatestEvent,
}

/// Description of one Agreements transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxInfo {
    /// An offer.
    Offer {
        /// Offer id.
        txid: TxId,
        /// Height, `None` while unconfirmed.
        height: Option<u32>,
        /// Terms.
        offer: OfferData,
        /// Current status.
        status: OfferStatus,
    },
    /// An agreement.
    Agreement(AgreementSummary),
    /// Any other event.
    Event {
        /// Event id.
        txid: TxId,
        /// Height, `None` while unconfirmed.
        height: Option<u32>,
        /// Decoded payload.
        op: AgreementOp,
    },
}

fn offer_status(chain: &dyn ChainView, offer_txid: &TxId) -> OfferStatus {
    let Some(spend) = chain.spender(&OutPoint::new(*offer_txid, 0)) else {
        return OfferStatus::Open;
    };
    let func = chain
        .transaction(&spend.txid)
        .and_then(|r| tx_payload(&r.tx).ok())
        .map(|p| p.op.func_id());
    match func {
        Some(FuncId::Accept) | Some(FuncId::Close) => OfferStatus::Accepted { by: spend.txid },
        _ => OfferStatus::Cancelled { by: spend.txid },
    }
}

/// Summary of a confirmed agreement.
pub fn agreement_summary(
    chain: &dyn ChainView,
    params: &ConsensusParams,
    agreement_txid: &TxId,
) -> Result<AgreementSummary, QueryError> {
    let record = load_agreement(chain, agreement_txid)?;
    let latest = find_latest_agreement_event(chain, params, agreement_txid)?;
    let terms = record.offer;
    Ok(AgreementSummary {
        txid: record.txid,
        height: record.height,
        offer_txid: record.offer_txid,
        source: terms.source,
        destination: terms.destination,
        arbitrator: terms.arbitrator,
        amends: terms.ref_agreement,
        deposit: terms.deposit,
        dispute_fee: terms.dispute_fee,
        flags: terms.flags,
        name: terms.name,
        memo: terms.memo,
        status: AgreementStatus::from_latest(agreement_txid, &latest),
        latest_event: latest,
    })
}

/// Describe any Agreements transaction.
pub fn agreement_info(
    chain: &dyn ChainView,
    params: &ConsensusParams,
    txid: &TxId,
) -> Result<TxInfo, QueryError> {
    let record = chain.transaction(txid).ok_or(QueryError::NotFound(*txid))?;
    let payload = tx_payload(&record.tx).map_err(|_| QueryError::NotAgreementsTx(*txid))?;
    let info = match payload.op {
        AgreementOp::Offer(offer) => TxInfo::Offer {
            txid: *txid,
            height: record.height,
            offer,
            status: offer_status(chain, txid),
        },
        AgreementOp::Accept(_) if record.is_confirmed() => {
            TxInfo::Agreement(agreement_summary(chain, params, txid)?)
        }
        op => TxInfo::Event {
            txid: *txid,
            height: record.height,
            op,
        },
    };
    Ok(info)
}

/// Events of an agreement after its creation.
///
/// `filter` keeps one function id; `samples` (when non-zero) caps the
/// result after ordering; `reverse` lists newest first.
pub fn agreement_event_log(
    chain: &dyn ChainView,
    params: &ConsensusParams,
    agreement_txid: &TxId,
    filter: Option<FuncId>,
    samples: usize,
    reverse: bool,
) -> Result<Vec<EventEntry>, QueryError> {
    let mut events = agreement_events(chain, params, agreement_txid)?;
    if let Some(func) = filter {
        events.retain(|e| e.func == func);
    }
    if reverse {
        events.reverse();
    }
    if samples > 0 {
        events.truncate(samples);
    }
    Ok(events)
}

/// Confirmed module transactions paying into the global address, in chain
/// order, each listed once.
fn global_txids(chain: &dyn ChainView) -> Vec<TxId> {
    let mut txids: Vec<TxId> = Vec::new();
    for output in chain.address_outputs(&global_address()) {
        if output.height.is_some() && !txids.contains(&output.outpoint.txid) {
            txids.push(output.outpoint.txid);
        }
    }
    txids
}

fn global_ops(chain: &dyn ChainView) -> impl Iterator<Item = (TxId, AgreementOp)> + '_ {
    global_txids(chain).into_iter().filter_map(move |txid| {
        let record = chain.transaction(&txid)?;
        let payload = tx_payload(&record.tx).ok()?;
        Some((txid, payload.op))
    })
}

/// Every confirmed agreement, oldest first.
pub fn agreement_list(chain: &dyn ChainView) -> Vec<TxId> {
    global_ops(chain)
        .filter(|(_, op)| matches!(op, AgreementOp::Accept(_)))
        .map(|(txid, _)| txid)
        .collect()
}

/// Every confirmed offer whose marker is unspent, oldest first.
pub fn agreement_offer_list(chain: &dyn ChainView) -> Vec<TxId> {
    global_ops(chain)
        .filter(|(txid, op)| {
            matches!(op, AgreementOp::Offer(_))
                && chain.spender(&OutPoint::new(*txid, 0)).is_none()
        })
        .map(|(txid, _)| txid)
        .collect()
}

/// Offers and agreements that amend or close `agreement_txid`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct References {
    /// Offers referencing the agreement.
    pub offers: Vec<TxId>,
    /// Agreements created by accepting one of those offers.
    pub agreements: Vec<TxId>,
}

/// Offers and agreements referencing an agreement.
pub fn agreement_references(
    chain: &dyn ChainView,
    agreement_txid: &TxId,
) -> Result<References, QueryError> {
    load_agreement(chain, agreement_txid)?;
    let mut refs = References::default();
    for (txid, op) in global_ops(chain) {
        match op {
            AgreementOp::Offer(offer) if offer.ref_agreement == Some(*agreement_txid) => {
                refs.offers.push(txid);
            }
            AgreementOp::Accept(accept) => {
                let amends = load_offer(chain, accept.offer_txid)
                    .map(|a| a.offer.ref_agreement == Some(*agreement_txid))
                    .unwrap_or(false);
                if amends {
                    refs.agreements.push(txid);
                }
            }
            _ => {}
        }
    }
    Ok(refs)
}

/// What a key is involved in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory {
    /// Open offers the key made.
    pub offers_sent: Vec<TxId>,
    /// Open offers addressed to the key.
    pub offers_received: Vec<TxId>,
    /// Live agreements the key is a party to.
    pub agreements: Vec<TxId>,
    /// Live agreements the key arbitrates.
    pub arbitrating: Vec<TxId>,
    /// Agreements involving the key whose history could not be read.
    pub unreadable: Vec<TxId>,
}

/// Open offers and live agreements involving `pubkey`.
pub fn agreement_inventory(
    chain: &dyn ChainView,
    params: &ConsensusParams,
    pubkey: &PublicKey,
) -> Result<Inventory, QueryError> {
    let mut inv = Inventory::default();
    for (txid, op) in global_ops(chain) {
        match op {
            AgreementOp::Offer(offer) => {
                if chain.spender(&OutPoint::new(txid, 0)).is_some() {
                    continue;
                }
                if offer.source.is(pubkey) {
                    inv.offers_sent.push(txid);
                }
                if offer.destination.is(pubkey) {
                    inv.offers_received.push(txid);
                }
            }
            AgreementOp::Accept(_) => {
                let summary = match agreement_summary(chain, params, &txid) {
                    Ok(summary) => summary,
                    Err(e) => {
                        tracing::debug!(agreement = %txid, error = %e, "skipping unreadable agreement");
                        let involved = load_agreement(chain, &txid).is_ok_and(|a| {
                            let o = &a.offer;
                            o.source.is(pubkey)
                                || o.destination.is(pubkey)
                                || o.arbitrator.as_ref().is_some_and(|k| k.is(pubkey))
                        });
                        if involved {
                            inv.unreadable.push(txid);
                        }
                        continue;
                    }
                };
                if !summary.status.is_live() {
                    continue;
                }
                if summary.source.is(pubkey) || summary.destination.is(pubkey) {
                    inv.agreements.push(txid);
                }
                if summary.arbitrator.as_ref().is_some_and(|a| a.is(pubkey)) {
                    inv.arbitrating.push(txid);
                }
            }
            _ => {}
        }
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WalkError;
    use crate::testkit::{Harness, Who};

    #[test]
    fn info_describes_offer_lifecycle() {
        let mut h = Harness::new();
        let offer = h.offer(0);
        match agreement_info(&h.chain, &h.params, &offer).unwrap() {
            TxInfo::Offer { status, height, .. } => {
                assert_eq!(status, OfferStatus::Open);
                assert!(height.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        let tx = h.accept_tx(&offer);
        let agreement = h.submit_and_mine(tx, &[Who::Bob]);
        match agreement_info(&h.chain, &h.params, &offer).unwrap() {
            TxInfo::Offer { status, .. } => {
                assert_eq!(status, OfferStatus::Accepted { by: agreement })
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn info_tracks_agreement_status() {
        let mut h = Harness::new();
        let agreement = h.agreement(0);
        let TxInfo::Agreement(summary) = agreement_info(&h.chain, &h.params, &agreement).unwrap()
        else {
            panic!("not an agreement");
        };
        assert_eq!(summary.status, AgreementStatus::Active);
        assert_eq!(summary.deposit, 10_000);

        let dispute = h.dispute(&agreement, Who::Bob, false);
        let summary = agreement_summary(&h.chain, &h.params, &agreement).unwrap();
        assert_eq!(summary.status, AgreementStatus::Disputed { dispute });

        let json = serde_json::to_value(agreement_info(&h.chain, &h.params, &dispute).unwrap()).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["op"]["func"], "dispute");
    }

    #[test]
    fn info_rejects_foreign_transactions() {
        let mut h = Harness::new();
        let coin = h.coin(Who::Alice);
        assert_eq!(
            agreement_info(&h.chain, &h.params, &coin.txid).unwrap_err(),
            QueryError::NotAgreementsTx(coin.txid)
        );
        let missing = TxId([9; 32]);
        assert_eq!(
            agreement_info(&h.chain, &h.params, &missing).unwrap_err(),
            QueryError::NotFound(missing)
        );
    }

    #[test]
    fn event_log_filters_and_orders() {
        let mut h = Harness::new();
        let agreement = h.agreement(0);
        let first = h.dispute(&agreement, Who::Bob, false);
        let tx = h.resolve_tx(&first, 5_000);
        let resolve = h.submit_and_mine(tx, &[Who::Carol]);

        let all = agreement_event_log(&h.chain, &h.params, &agreement, None, 0, false).unwrap();
        assert_eq!(
            all.iter().map(|e| e.txid).collect::<Vec<_>>(),
            vec![first, resolve]
        );
        let newest = agreement_event_log(&h.chain, &h.params, &agreement, None, 1, true).unwrap();
        assert_eq!(newest[0].txid, resolve);
        let disputes =
            agreement_event_log(&h.chain, &h.params, &agreement, Some(FuncId::Dispute), 0, false)
                .unwrap();
        assert_eq!(disputes.len(), 1);
        assert_eq!(disputes[0].func, FuncId::Dispute);
    }

    #[test]
    fn lists_and_inventory() {
        let mut h = Harness::new();
        let agreement = h.agreement(0);
        let open = h.offer(0);

        assert_eq!(agreement_list(&h.chain), vec![agreement]);
        assert_eq!(agreement_offer_list(&h.chain), vec![open]);

        let alice = agreement_inventory(&h.chain, &h.params, &h.alice.public_key()).unwrap();
        assert_eq!(alice.offers_sent, vec![open]);
        assert!(alice.offers_received.is_empty());
        assert_eq!(alice.agreements, vec![agreement]);
        let carol = agreement_inventory(&h.chain, &h.params, &h.carol.public_key()).unwrap();
        assert_eq!(carol.arbitrating, vec![agreement]);
        assert!(carol.agreements.is_empty());
    }

    #[test]
    fn inventory_skips_unreadable_agreement() {
        let mut h = Harness::new();
        let long = h.agreement(0);
        let dispute = h.dispute(&long, Who::Bob, false);
        let tx = h.resolve_tx(&dispute, 3_000);
        h.submit_and_mine(tx, &[Who::Carol]);
        let short = h.agreement(0);
        h.params.max_event_chain = 1;

        assert!(matches!(
            agreement_summary(&h.chain, &h.params, &long),
            Err(QueryError::Walk(WalkError::ChainTooLong { .. }))
        ));
        let alice = agreement_inventory(&h.chain, &h.params, &h.alice.public_key()).unwrap();
        assert_eq!(alice.agreements, vec![short]);
        assert_eq!(alice.unreadable, vec![long]);
        let carol = agreement_inventory(&h.chain, &h.params, &h.carol.public_key()).unwrap();
        assert_eq!(carol.arbitrating, vec![short]);
        assert_eq!(carol.unreadable, vec![long]);
    }

    #[test]
    fn references_find_amendments() {
        let mut h = Harness::new();
        let agreement = h.agreement(0);
        assert_eq!(
            agreement_references(&h.chain, &agreement).unwrap(),
            References::default()
        );
        let mut amendment = h.offer_data(0);
        amendment.flags |= OfferFlags::AMENDMENT;
        amendment.ref_agreement = Some(agreement);
        let tx = h.offer_tx_with(amendment);
        let offer = h.submit_and_mine(tx, &[Who::Alice]);
        let refs = agreement_references(&h.chain, &agreement).unwrap();
        assert_eq!(refs.offers, vec![offer]);
        assert!(refs.agreements.is_empty());
    }
}
