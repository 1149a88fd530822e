//! # Event-Chain Walker
//!
//! An agreement's history is a chain of transactions linked through output
//! 0, the baton. Starting at the accept transaction, each event spends the
//! previous baton and (unless terminal) creates the next one.
//!
//! ## Security Invariant
//!
//! The walker follows confirmed spends only and stops at the first unspent
//! baton, so it reports what the chain *currently* says. It is used by
//! builders and reports. The validator never trusts its answer: it checks
//! the specific outputs a transaction spends instead.
//!
//! Walks are bounded by `max_event_chain` steps.

use serde::Serialize;

use agr_chain::{ChainView, Transaction, TxRecord};
use agr_core::{CodecError, ConsensusParams, OutPoint, TxId};

use crate::codec::{AgreementOp, DisputeData, FuncId, OfferData, Payload};
use crate::error::WalkError;

/// Decode the payload carried by a transaction's last output.
pub fn tx_payload(tx: &Transaction) -> Result<Payload, CodecError> {
    let data = tx.op_return().ok_or(CodecError::UnexpectedEof {
        field: "op_return",
        needed: 3,
        remaining: 0,
    })?;
    Payload::decode(data)
}

/// An offer together with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedOffer {
    /// Offer transaction id.
    pub offer_txid: TxId,
    /// Offer terms.
    pub offer: OfferData,
}

/// An agreement: its accept transaction and the offer it accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreementRecord {
    /// Accept transaction id, which is the agreement id.
    pub txid: TxId,
    /// Height of the accept transaction.
    pub height: u32,
    /// Accepted offer id.
    pub offer_txid: TxId,
    /// Accepted terms.
    pub offer: OfferData,
}

impl AgreementRecord {
    /// Escrowed deposit.
    pub fn deposit(&self) -> agr_core::Amount {
        self.offer.deposit
    }
}

/// One event after the agreement's creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventEntry {
    /// Event transaction.
    pub txid: TxId,
    /// Its function id.
    pub func: FuncId,
    /// Its height.
    pub height: u32,
}

/// The most recent event of an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatestEvent {
    /// Event transaction; the agreement itself when nothing followed.
    pub txid: TxId,
    /// Its function id.
    pub func: FuncId,
}

fn confirmed(chain: &dyn ChainView, txid: &TxId) -> Result<TxRecord, WalkError> {
    let record = chain.transaction(txid).ok_or(WalkError::NotFound(*txid))?;
    if !record.is_confirmed() {
        return Err(WalkError::Unconfirmed(*txid));
    }
    Ok(record)
}

/// Load a confirmed offer.
pub fn load_offer(chain: &dyn ChainView, offer_txid: TxId) -> Result<AcceptedOffer, WalkError> {
    let record = confirmed(chain, &offer_txid)?;
    match tx_payload(&record.tx).map(|p| p.op) {
        Ok(AgreementOp::Offer(offer)) => Ok(AcceptedOffer { offer_txid, offer }),
        _ => Err(WalkError::WrongType {
            txid: offer_txid,
            expected: "o",
        }),
    }
}

/// The offer accepted by an accept (`c`) or close (`t`) transaction.
pub fn get_accepted_offer_tx(chain: &dyn ChainView, txid: &TxId) -> Result<AcceptedOffer, WalkError> {
    let record = confirmed(chain, txid)?;
    let offer_txid = match tx_payload(&record.tx).map(|p| p.op) {
        Ok(AgreementOp::Accept(d)) => d.offer_txid,
        Ok(AgreementOp::Close(d)) => d.offer_txid,
        _ => {
            return Err(WalkError::WrongType {
                txid: *txid,
                expected: "c or t",
            })
        }
    };
    load_offer(chain, offer_txid)
}

/// Load a confirmed agreement and its accepted offer.
pub fn load_agreement(chain: &dyn ChainView, txid: &TxId) -> Result<AgreementRecord, WalkError> {
    let record = confirmed(chain, txid)?;
    let offer_txid = match tx_payload(&record.tx).map(|p| p.op) {
        Ok(AgreementOp::Accept(d)) => d.offer_txid,
        _ => {
            return Err(WalkError::WrongType {
                txid: *txid,
                expected: "c",
            })
        }
    };
    let accepted = load_offer(chain, offer_txid)?;
    Ok(AgreementRecord {
        txid: *txid,
        height: record.height.unwrap_or_default(),
        offer_txid,
        offer: accepted.offer,
    })
}

/// Load a confirmed dispute.
pub fn load_dispute(chain: &dyn ChainView, txid: &TxId) -> Result<DisputeData, WalkError> {
    let record = confirmed(chain, txid)?;
    match tx_payload(&record.tx).map(|p| p.op) {
        Ok(AgreementOp::Dispute(d)) => Ok(d),
        _ => Err(WalkError::WrongType {
            txid: *txid,
            expected: "d",
        }),
    }
}

/// Every confirmed event following the agreement, oldest first.
///
/// Stops at an unspent or unconfirmed-spent baton, after a terminal event,
/// or after an accept that amended the agreement into a new one.
pub fn agreement_events(
    chain: &dyn ChainView,
    params: &ConsensusParams,
    agreement_txid: &TxId,
) -> Result<Vec<EventEntry>, WalkError> {
    load_agreement(chain, agreement_txid)?;
    let mut events = Vec::new();
    let mut cur = *agreement_txid;
    for _ in 0..params.max_event_chain {
        let Some(spend) = chain.spender(&OutPoint::new(cur, 0)) else {
            return Ok(events);
        };
        let Some(height) = spend.height else {
            return Ok(events);
        };
        let Some(record) = chain.transaction(&spend.txid) else {
            return Ok(events);
        };
        let Ok(payload) = tx_payload(&record.tx) else {
            return Ok(events);
        };
        let func = payload.op.func_id();
        events.push(EventEntry {
            txid: spend.txid,
            func,
            height,
        });
        if func.is_terminal() || func == FuncId::Accept {
            return Ok(events);
        }
        cur = spend.txid;
    }
    let more = chain
        .spender(&OutPoint::new(cur, 0))
        .is_some_and(|spend| spend.height.is_some());
    if !more {
        return Ok(events);
    }
    tracing::debug!(agreement = %agreement_txid, max = params.max_event_chain, "event chain bound reached");
    Err(WalkError::ChainTooLong {
        agreement: *agreement_txid,
        max: params.max_event_chain,
    })
}

/// The agreement's most recent confirmed event.
///
/// The answer is the agreement itself when its baton is unspent. An accept
/// with a different id means the agreement was amended into that one.
pub fn find_latest_agreement_event(
    chain: &dyn ChainView,
    params: &ConsensusParams,
    agreement_txid: &TxId,
) -> Result<LatestEvent, WalkError> {
    let events = agreement_events(chain, params, agreement_txid)?;
    Ok(events
        .last()
        .map(|e| LatestEvent {
            txid: e.txid,
            func: e.func,
        })
        .unwrap_or(LatestEvent {
            txid: *agreement_txid,
            func: FuncId::Accept,
        }))
}
