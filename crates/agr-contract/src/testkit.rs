//! Test harness: a funded reference chain with the Agreements validator
//! registered, and raw transaction layouts for each function id.
//!
//! Raw layouts are assembled by hand rather than through the builders so
//! validator tests can break one rule at a time.

use agr_chain::{sign_input, sign_with, ChainView, MemoryChain, Script, Transaction, TxIn, TxOut};
use agr_core::{Amount, ConsensusParams, OutPoint, TxId};
use agr_crypto::KeyPair;

use crate::address::{event_script, global_script, global_signer, is_module_script};
use crate::codec::{
    AcceptData, AgreementOp, DisputeData, DisputeFlags, OfferData, OfferFlags, ResolveData,
};
use crate::party::PartyKey;
use crate::validate::AgreementsValidator;
use crate::walker::load_agreement;

pub const COIN: Amount = 1_000_000;
const COINS_PER_PARTY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Who {
    Alice,
    Bob,
    Carol,
}

pub struct Harness {
    pub chain: MemoryChain,
    pub params: ConsensusParams,
    pub alice: KeyPair,
    pub bob: KeyPair,
    pub carol: KeyPair,
    coins: Vec<(Who, OutPoint)>,
}

impl Harness {
    pub fn new() -> Self {
        let params = ConsensusParams::default();
        let mut chain =
            MemoryChain::new().with_validator(Box::new(AgreementsValidator::new(params.clone())));
        let alice = KeyPair::from_seed(&[0xa1; 32]);
        let bob = KeyPair::from_seed(&[0xb0; 32]);
        let carol = KeyPair::from_seed(&[0xca; 32]);
        let mut coins = Vec::new();
        for _ in 0..COINS_PER_PARTY {
            for (who, key) in [(Who::Alice, &alice), (Who::Bob, &bob), (Who::Carol, &carol)] {
                let coin = chain.fund(&key.public_key(), COIN).unwrap();
                coins.push((who, coin));
            }
        }
        Self {
            chain,
            params,
            alice,
            bob,
            carol,
            coins,
        }
    }

    pub fn key(&self, who: Who) -> &KeyPair {
        match who {
            Who::Alice => &self.alice,
            Who::Bob => &self.bob,
            Who::Carol => &self.carol,
        }
    }

    pub fn party(&self, who: Who) -> PartyKey {
        PartyKey::Pubkey(self.key(who).public_key())
    }

    /// An unspent pre-funded coin of `who`, without mining.
    pub fn coin(&mut self, who: Who) -> OutPoint {
        let pos = self
            .coins
            .iter()
            .position(|(w, op)| *w == who && self.chain.spender(op).is_none())
            .expect("harness ran out of coins");
        self.coins.remove(pos).1
    }

    /// Sign contract inputs with the global key and normal inputs with
    /// `signers`, then submit.
    pub fn submit(&mut self, mut tx: Transaction, signers: &[Who]) -> TxId {
        let global = global_signer();
        for i in 0..tx.inputs.len() {
            let module = self
                .chain
                .prevout(&tx.inputs[i].prevout)
                .is_some_and(|o| is_module_script(&o.script));
            if module {
                sign_input(&mut tx, i, &global);
            }
        }
        for who in signers {
            sign_with(&mut tx, &self.chain, self.key(*who));
        }
        self.chain.submit(tx).unwrap()
    }

    pub fn submit_and_mine(&mut self, tx: Transaction, signers: &[Who]) -> TxId {
        let txid = self.submit(tx, signers);
        self.chain.mine_block();
        txid
    }

    /// Append change to `who` and the payload, leaving exactly the fee.
    fn finish(&self, mut tx: Transaction, who: Who, op: AgreementOp) -> Transaction {
        let inputs: Amount = tx
            .inputs
            .iter()
            .filter_map(|i| self.chain.prevout(&i.prevout))
            .map(|o| o.value)
            .sum();
        let change = inputs - tx.output_total().unwrap() - self.params.tx_fee;
        if change > 0 {
            tx.outputs
                .push(TxOut::new(change, Script::pubkey(self.key(who).public_key())));
        }
        tx.outputs.push(TxOut::new(0, Script::op_return(op.encode())));
        tx
    }

    pub fn offer_data(&self, payment: Amount) -> OfferData {
        OfferData {
            source: self.party(Who::Alice),
            destination: self.party(Who::Bob),
            arbitrator: Some(self.party(Who::Carol)),
            flags: OfferFlags::NOUNLOCK,
            ref_agreement: None,
            deposit: 10_000,
            payment,
            dispute_fee: 10_000,
            name: "lease".to_string(),
            memo: "twelve months".to_string(),
            unlock_conditions: vec![],
        }
    }

    /// Offer from Alice to Bob, arbitrated by Carol.
    pub fn offer_tx(&mut self, payment: Amount) -> Transaction {
        let data = self.offer_data(payment);
        self.offer_tx_with(data)
    }

    pub fn offer_tx_with(&mut self, data: OfferData) -> Transaction {
        let mut tx = Transaction::new();
        tx.inputs.push(TxIn::new(self.coin(Who::Alice)));
        tx.outputs
            .push(TxOut::new(self.params.marker_value, global_script()));
        self.finish(tx, Who::Alice, AgreementOp::Offer(data))
    }

    pub fn offer(&mut self, payment: Amount) -> TxId {
        let tx = self.offer_tx(payment);
        self.submit_and_mine(tx, &[Who::Alice])
    }

    pub fn offer_unmined(&mut self, payment: Amount) -> TxId {
        let tx = self.offer_tx(payment);
        self.submit(tx, &[Who::Alice])
    }

    fn offer_of(&self, offer_txid: &TxId) -> OfferData {
        let record = self.chain.transaction(offer_txid).unwrap();
        crate::codec::decode_offer_opret(record.tx.op_return().unwrap()).unwrap()
    }

    /// Bob accepts a plain offer.
    pub fn accept_tx(&mut self, offer_txid: &TxId) -> Transaction {
        let offer = self.offer_of(offer_txid);
        let mut tx = Transaction::new();
        tx.inputs.push(TxIn::new(OutPoint::new(*offer_txid, 0)));
        tx.inputs.push(TxIn::new(self.coin(Who::Bob)));
        tx.outputs
            .push(TxOut::new(self.params.marker_value, event_script(offer_txid)));
        tx.outputs.push(TxOut::new(offer.deposit, global_script()));
        if offer.payment > 0 {
            let to = *offer.source.as_pubkey().unwrap();
            tx.outputs.push(TxOut::new(offer.payment, Script::pubkey(to)));
        }
        self.finish(
            tx,
            Who::Bob,
            AgreementOp::Accept(AcceptData {
                offer_txid: *offer_txid,
            }),
        )
    }

    /// A mined agreement between Alice (offeror) and Bob (signer).
    pub fn agreement(&mut self, payment: Amount) -> TxId {
        let offer = self.offer(payment);
        let tx = self.accept_tx(&offer);
        self.submit_and_mine(tx, &[Who::Bob])
    }

    /// `who` disputes the agreement, spending `baton`.
    pub fn dispute_tx_from(
        &mut self,
        agreement_txid: &TxId,
        baton: OutPoint,
        who: Who,
        memo: &str,
        flags: DisputeFlags,
    ) -> Transaction {
        let agreement = load_agreement(&self.chain, agreement_txid).unwrap();
        let mut tx = Transaction::new();
        tx.inputs.push(TxIn::new(baton));
        tx.inputs.push(TxIn::new(self.coin(who)));
        tx.outputs.push(TxOut::new(
            agreement.offer.dispute_fee,
            event_script(&agreement.offer_txid),
        ));
        let claimant = self.party(who);
        self.finish(
            tx,
            who,
            AgreementOp::Dispute(DisputeData {
                agreement_txid: *agreement_txid,
                claimant,
                flags,
                memo: memo.to_string(),
            }),
        )
    }

    pub fn dispute_tx(&mut self, agreement_txid: &TxId, who: Who, memo: &str) -> Transaction {
        let baton = OutPoint::new(*agreement_txid, 0);
        self.dispute_tx_from(agreement_txid, baton, who, memo, DisputeFlags::empty())
    }

    pub fn dispute(&mut self, agreement_txid: &TxId, who: Who, is_final: bool) -> TxId {
        let flags = if is_final {
            DisputeFlags::FINAL
        } else {
            DisputeFlags::empty()
        };
        let baton = OutPoint::new(*agreement_txid, 0);
        let tx = self.dispute_tx_from(agreement_txid, baton, who, "not delivered", flags);
        self.submit_and_mine(tx, &[who])
    }

    /// Carol resolves a dispute opened by Bob.
    pub fn resolve_tx(&mut self, dispute_txid: &TxId, payout: Amount) -> Transaction {
        let record = self.chain.transaction(dispute_txid).unwrap();
        let dispute =
            crate::codec::decode_dispute_opret(record.tx.op_return().unwrap()).unwrap();
        let agreement = load_agreement(&self.chain, &dispute.agreement_txid).unwrap();
        let defendant = if dispute.claimant == agreement.offer.source {
            agreement.offer.destination.clone()
        } else {
            agreement.offer.source.clone()
        };
        let mut tx = Transaction::new();
        tx.inputs.push(TxIn::new(OutPoint::new(*dispute_txid, 0)));
        tx.inputs
            .push(TxIn::new(OutPoint::new(dispute.agreement_txid, 1)));
        tx.inputs.push(TxIn::new(self.coin(Who::Carol)));
        if payout > 0 {
            let to = *dispute.claimant.as_pubkey().unwrap();
            tx.outputs.push(TxOut::new(payout, Script::pubkey(to)));
        }
        let remainder = agreement.offer.deposit - payout;
        if remainder > 0 {
            let to = *defendant.as_pubkey().unwrap();
            tx.outputs.push(TxOut::new(remainder, Script::pubkey(to)));
        }
        self.finish(
            tx,
            Who::Carol,
            AgreementOp::Resolve(ResolveData {
                agreement_txid: dispute.agreement_txid,
                dispute_txid: *dispute_txid,
                claimant_payout: payout,
                memo: "split".to_string(),
            }),
        )
    }
}
