//! # Op-Return Codec
//!
//! Every Agreements transaction carries its payload in the last output:
//!
//! ```text
//! [eval code u8][function id u8][version u8][fields...]
//! ```
//!
//! | Id  | Fields after version |
//! |-----|----------------------|
//! | `o` | source, destination, arbitrator, flags, ref agreement, deposit, payment, dispute fee, name, memo, unlock conditions |
//! | `s` | offer txid, memo |
//! | `c` | offer txid |
//! | `t` | agreement txid, offer txid, payout |
//! | `d` | agreement txid, claimant, flags, memo |
//! | `x` | agreement txid, dispute txid, memo |
//! | `r` | agreement txid, dispute txid, claimant payout, memo |
//! | `u` | agreement txid, unlock conditions |
//!
//! Ids are 32 raw bytes (all-zero meaning "none"), keys are length-prefixed
//! bytes (empty meaning "none"), amounts are 8-byte little-endian signed
//! integers, strings are length-prefixed UTF-8.
//!
//! ## Security Invariant
//!
//! Decoding is all-or-nothing. A wrong eval code, a short read, invalid
//! UTF-8 or trailing bytes is an error; a caller never sees a partially
//! populated payload.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use agr_core::{
    Amount, ByteReader, ByteWriter, CodecError, TxId, AGREEMENTS_VERSION, EVAL_AGREEMENTS,
};

use crate::party::PartyKey;

bitflags! {
    /// Terms switches carried by an offer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct OfferFlags: u8 {
        /// Replaces the referenced agreement on acceptance.
        const AMENDMENT = 0x01;
        /// Closes the referenced agreement on acceptance.
        const CLOSE = 0x02;
        /// The source may not cancel the offer.
        const NOCANCEL = 0x04;
        /// The resulting agreement cannot be disputed.
        const NODISPUTES = 0x08;
        /// The resulting agreement cannot be unlocked.
        const NOUNLOCK = 0x10;
        /// Acceptance waits for the offer to be notarized.
        const AWAITNOTARIES = 0x20;
    }
}

bitflags! {
    /// Switches carried by a dispute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DisputeFlags: u8 {
        /// The dispute cannot be cancelled.
        const FINAL = 0x01;
    }
}

/// Function id of an Agreements payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FuncId {
    /// `o`: propose terms.
    Offer = b'o',
    /// `s`: cancel an offer.
    StopOffer = b's',
    /// `c`: accept an offer, creating or amending an agreement.
    Accept = b'c',
    /// `t`: accept a closing offer, terminating an agreement.
    Close = b't',
    /// `d`: open a dispute.
    Dispute = b'd',
    /// `x`: cancel a dispute.
    StopDispute = b'x',
    /// `r`: resolve a dispute.
    Resolve = b'r',
    /// `u`: unlock. Reserved.
    Unlock = b'u',
}

impl FuncId {
    /// Every function id.
    pub const ALL: [FuncId; 8] = [
        FuncId::Offer,
        FuncId::StopOffer,
        FuncId::Accept,
        FuncId::Close,
        FuncId::Dispute,
        FuncId::StopDispute,
        FuncId::Resolve,
        FuncId::Unlock,
    ];

    /// Parse the function id byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|f| *f as u8 == b)
    }

    /// The one-character tag.
    pub fn as_char(self) -> char {
        self as u8 as char
    }

    /// Whether no event may follow this one.
    pub fn is_terminal(self) -> bool {
        matches!(self, FuncId::Close | FuncId::Resolve | FuncId::Unlock)
    }

    /// Human-readable name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            FuncId::Offer => "offer",
            FuncId::StopOffer => "stop_offer",
            FuncId::Accept => "accept",
            FuncId::Close => "close",
            FuncId::Dispute => "dispute",
            FuncId::StopDispute => "stop_dispute",
            FuncId::Resolve => "resolve",
            FuncId::Unlock => "unlock",
        }
    }
}

impl std::fmt::Display for FuncId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl std::str::FromStr for FuncId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FuncId::ALL
            .into_iter()
            .find(|f| f.name() == s || (s.len() == 1 && s.as_bytes()[0] == *f as u8))
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

// ─── Payload Data ───────────────────────────────────────────────────

/// Terms proposed by an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferData {
    /// Offering party; pays the marker and receives the payment.
    pub source: PartyKey,
    /// Party that may accept.
    pub destination: PartyKey,
    /// Dispute arbitrator.
    pub arbitrator: Option<PartyKey>,
    /// Terms switches.
    pub flags: OfferFlags,
    /// Agreement amended or closed by this offer.
    pub ref_agreement: Option<TxId>,
    /// Deposit escrowed by the agreement.
    pub deposit: Amount,
    /// Paid to the source on acceptance.
    pub payment: Amount,
    /// Escrowed by whoever opens a dispute.
    pub dispute_fee: Amount,
    /// Short title.
    pub name: String,
    /// Free text.
    pub memo: String,
    /// Reserved; must be empty.
    pub unlock_conditions: Vec<Vec<u8>>,
}

/// Cancellation of an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopOfferData {
    /// Offer being cancelled.
    pub offer_txid: TxId,
    /// Free text.
    pub memo: String,
}

/// Acceptance of an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptData {
    /// Offer being accepted.
    pub offer_txid: TxId,
}

/// Acceptance of a closing offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseData {
    /// Agreement being closed.
    pub agreement_txid: TxId,
    /// Closing offer being accepted.
    pub offer_txid: TxId,
    /// Paid to the closing offer's source.
    pub payout: Amount,
}

/// Opening of a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeData {
    /// Disputed agreement.
    pub agreement_txid: TxId,
    /// Party raising the dispute.
    pub claimant: PartyKey,
    /// Dispute switches.
    pub flags: DisputeFlags,
    /// Grounds for the dispute.
    pub memo: String,
}

/// Cancellation of a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopDisputeData {
    /// Disputed agreement.
    pub agreement_txid: TxId,
    /// Dispute being cancelled.
    pub dispute_txid: TxId,
    /// Free text.
    pub memo: String,
}

/// Arbitrator's resolution of a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveData {
    /// Disputed agreement.
    pub agreement_txid: TxId,
    /// Dispute being resolved.
    pub dispute_txid: TxId,
    /// Share of the deposit awarded to the claimant.
    pub claimant_payout: Amount,
    /// Free text.
    pub memo: String,
}

/// Unlock request. Reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockData {
    /// Agreement being unlocked.
    pub agreement_txid: TxId,
    /// Conditions claimed as met.
    pub conditions: Vec<Vec<u8>>,
}

/// A decoded Agreements payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "func", rename_all = "snake_case")]
pub enum AgreementOp {
    /// `o`
    Offer(OfferData),
    /// `s`
    StopOffer(StopOfferData),
    /// `c`
    Accept(AcceptData),
    /// `t`
    Close(CloseData),
    /// `d`
    Dispute(DisputeData),
    /// `x`
    StopDispute(StopDisputeData),
    /// `r`
    Resolve(ResolveData),
    /// `u`
    Unlock(UnlockData),
}

impl AgreementOp {
    /// Function id of this payload.
    pub fn func_id(&self) -> FuncId {
        match self {
            AgreementOp::Offer(_) => FuncId::Offer,
            AgreementOp::StopOffer(_) => FuncId::StopOffer,
            AgreementOp::Accept(_) => FuncId::Accept,
            AgreementOp::Close(_) => FuncId::Close,
            AgreementOp::Dispute(_) => FuncId::Dispute,
            AgreementOp::StopDispute(_) => FuncId::StopDispute,
            AgreementOp::Resolve(_) => FuncId::Resolve,
            AgreementOp::Unlock(_) => FuncId::Unlock,
        }
    }

    /// Agreement this event belongs to, for event payloads.
    pub fn agreement_txid(&self) -> Option<TxId> {
        match self {
            AgreementOp::Close(d) => Some(d.agreement_txid),
            AgreementOp::Dispute(d) => Some(d.agreement_txid),
            AgreementOp::StopDispute(d) => Some(d.agreement_txid),
            AgreementOp::Resolve(d) => Some(d.agreement_txid),
            AgreementOp::Unlock(d) => Some(d.agreement_txid),
            AgreementOp::Offer(_) | AgreementOp::StopOffer(_) | AgreementOp::Accept(_) => None,
        }
    }

    /// Encode at the current payload version.
    pub fn encode(&self) -> Vec<u8> {
        Payload::new(self.clone()).encode()
    }
}

/// A payload together with the version it was encoded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Version byte.
    pub version: u8,
    /// Function id and fields.
    pub op: AgreementOp,
}

impl Payload {
    /// Wrap `op` at the current version.
    pub fn new(op: AgreementOp) -> Self {
        Self {
            version: AGREEMENTS_VERSION,
            op,
        }
    }

    /// Serialize to op-return bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.put_u8(EVAL_AGREEMENTS)
            .put_u8(self.op.func_id() as u8)
            .put_u8(self.version);
        match &self.op {
            AgreementOp::Offer(d) => {
                put_party(&mut w, Some(&d.source));
                put_party(&mut w, Some(&d.destination));
                put_party(&mut w, d.arbitrator.as_ref());
                w.put_u8(d.flags.bits())
                    .put_txid(&d.ref_agreement.unwrap_or(TxId::NULL))
                    .put_i64(d.deposit)
                    .put_i64(d.payment)
                    .put_i64(d.dispute_fee)
                    .put_string(&d.name)
                    .put_string(&d.memo)
                    .put_bytes_list(&d.unlock_conditions);
            }
            AgreementOp::StopOffer(d) => {
                w.put_txid(&d.offer_txid).put_string(&d.memo);
            }
            AgreementOp::Accept(d) => {
                w.put_txid(&d.offer_txid);
            }
            AgreementOp::Close(d) => {
                w.put_txid(&d.agreement_txid)
                    .put_txid(&d.offer_txid)
                    .put_i64(d.payout);
            }
            AgreementOp::Dispute(d) => {
                w.put_txid(&d.agreement_txid);
                put_party(&mut w, Some(&d.claimant));
                w.put_u8(d.flags.bits()).put_string(&d.memo);
            }
            AgreementOp::StopDispute(d) => {
                w.put_txid(&d.agreement_txid)
                    .put_txid(&d.dispute_txid)
                    .put_string(&d.memo);
            }
            AgreementOp::Resolve(d) => {
                w.put_txid(&d.agreement_txid)
                    .put_txid(&d.dispute_txid)
                    .put_i64(d.claimant_payout)
                    .put_string(&d.memo);
            }
            AgreementOp::Unlock(d) => {
                w.put_txid(&d.agreement_txid)
                    .put_bytes_list(&d.conditions);
            }
        }
        w.into_vec()
    }

    /// Parse op-return bytes. Any version byte is accepted here; the
    /// validator decides which versions are supported.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut r = ByteReader::new(data);
        let eval = r.get_u8("eval code")?;
        if eval != EVAL_AGREEMENTS {
            return Err(CodecError::WrongEvalCode {
                expected: EVAL_AGREEMENTS,
                found: eval,
            });
        }
        let tag = r.get_u8("function id")?;
        let func = FuncId::from_byte(tag).ok_or(CodecError::UnknownFuncId(tag))?;
        let version = r.get_u8("version")?;
        let op = match func {
            FuncId::Offer => AgreementOp::Offer(OfferData {
                source: get_party(&mut r, "source")?,
                destination: get_party(&mut r, "destination")?,
                arbitrator: get_optional_party(&mut r, "arbitrator")?,
                flags: OfferFlags::from_bits_retain(r.get_u8("offer flags")?),
                ref_agreement: r.get_txid("ref agreement")?.non_null(),
                deposit: r.get_i64("deposit")?,
                payment: r.get_i64("payment")?,
                dispute_fee: r.get_i64("dispute fee")?,
                name: r.get_string("name")?,
                memo: r.get_string("memo")?,
                unlock_conditions: r.get_bytes_list("unlock conditions")?,
            }),
            FuncId::StopOffer => AgreementOp::StopOffer(StopOfferData {
                offer_txid: r.get_txid("offer txid")?,
                memo: r.get_string("memo")?,
            }),
            FuncId::Accept => AgreementOp::Accept(AcceptData {
                offer_txid: r.get_txid("offer txid")?,
            }),
            FuncId::Close => AgreementOp::Close(CloseData {
                agreement_txid: r.get_txid("agreement txid")?,
                offer_txid: r.get_txid("offer txid")?,
                payout: r.get_i64("payout")?,
            }),
            FuncId::Dispute => AgreementOp::Dispute(DisputeData {
                agreement_txid: r.get_txid("agreement txid")?,
                claimant: get_party(&mut r, "claimant")?,
                flags: DisputeFlags::from_bits_retain(r.get_u8("dispute flags")?),
                memo: r.get_string("memo")?,
            }),
            FuncId::StopDispute => AgreementOp::StopDispute(StopDisputeData {
                agreement_txid: r.get_txid("agreement txid")?,
                dispute_txid: r.get_txid("dispute txid")?,
                memo: r.get_string("memo")?,
            }),
            FuncId::Resolve => AgreementOp::Resolve(ResolveData {
                agreement_txid: r.get_txid("agreement txid")?,
                dispute_txid: r.get_txid("dispute txid")?,
                claimant_payout: r.get_i64("claimant payout")?,
                memo: r.get_string("memo")?,
            }),
            FuncId::Unlock => AgreementOp::Unlock(UnlockData {
                agreement_txid: r.get_txid("agreement txid")?,
                conditions: r.get_bytes_list("unlock conditions")?,
            }),
        };
        r.finish()?;
        Ok(Self { version, op })
    }
}

fn put_party(w: &mut ByteWriter, key: Option<&PartyKey>) {
    match key {
        Some(k) => w.put_var_bytes(&k.to_bytes()),
        None => w.put_var_bytes(&[]),
    };
}

fn get_optional_party(
    r: &mut ByteReader<'_>,
    field: &'static str,
) -> Result<Option<PartyKey>, CodecError> {
    Ok(PartyKey::from_bytes(r.get_var_bytes(field)?))
}

fn get_party(r: &mut ByteReader<'_>, field: &'static str) -> Result<PartyKey, CodecError> {
    get_optional_party(r, field)?.ok_or(CodecError::InvalidLength { field, len: 0 })
}

// ─── Decoder Entry Points ───────────────────────────────────────────

/// Function id of `data`, or `None` if it does not fully decode as an
/// Agreements payload.
pub fn decode_agreement_opret(data: &[u8]) -> Option<FuncId> {
    Payload::decode(data).ok().map(|p| p.op.func_id())
}

fn decode_as(data: &[u8], expected: FuncId) -> Result<AgreementOp, CodecError> {
    let op = Payload::decode(data)?.op;
    if op.func_id() != expected {
        return Err(CodecError::FuncIdMismatch {
            expected: expected.as_char(),
            found: op.func_id().as_char(),
        });
    }
    Ok(op)
}

macro_rules! typed_decoder {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $data:ty) => {
        $(#[$doc])*
        pub fn $name(data: &[u8]) -> Result<$data, CodecError> {
            match decode_as(data, FuncId::$variant)? {
                AgreementOp::$variant(d) => Ok(d),
                other => Err(CodecError::FuncIdMismatch {
                    expected: FuncId::$variant.as_char(),
                    found: other.func_id().as_char(),
                }),
            }
        }
    };
}

typed_decoder!(
    /// Decode an `o` payload.
    decode_offer_opret, Offer, OfferData
);
typed_decoder!(
    /// Decode an `s` payload.
    decode_stop_offer_opret, StopOffer, StopOfferData
);
typed_decoder!(
    /// Decode a `c` payload.
    decode_accept_opret, Accept, AcceptData
);
typed_decoder!(
    /// Decode a `t` payload.
    decode_close_opret, Close, CloseData
);
typed_decoder!(
    /// Decode a `d` payload.
    decode_dispute_opret, Dispute, DisputeData
);
typed_decoder!(
    /// Decode an `x` payload.
    decode_stop_dispute_opret, StopDispute, StopDisputeData
);
typed_decoder!(
    /// Decode an `r` payload.
    decode_resolve_opret, Resolve, ResolveData
);
typed_decoder!(
    /// Decode a `u` payload.
    decode_unlock_opret, Unlock, UnlockData
);
