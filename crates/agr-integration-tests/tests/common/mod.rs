//! Shared fixture: a reference chain with the Agreements validator and
//! three funded parties. Every transaction goes through the public
//! builders, is signed by the caller, and is checked by the host.

#![allow(dead_code)]

use agr_chain::{sign_with, ChainError, ChainView, MemoryChain, Script, TxOut};
use agr_contract::{AgreementsValidator, BuildContext, BuilderError, BuiltTx, OfferTerms};
use agr_core::{Amount, ConsensusParams, OutPoint, TxId};
use agr_crypto::{KeyPair, PublicKey};

pub const COIN: Amount = 1_000_000;
const COINS_PER_PARTY: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Who {
    Alice,
    Bob,
    Carol,
}

pub struct World {
    pub chain: MemoryChain,
    pub params: ConsensusParams,
    alice: KeyPair,
    bob: KeyPair,
    carol: KeyPair,
}

impl World {
    pub fn new() -> Self {
        Self::with_params(ConsensusParams::default())
    }

    pub fn with_params(params: ConsensusParams) -> Self {
        let mut chain =
            MemoryChain::new().with_validator(Box::new(AgreementsValidator::new(params.clone())));
        let alice = KeyPair::from_seed(&[0x0a; 32]);
        let bob = KeyPair::from_seed(&[0x0b; 32]);
        let carol = KeyPair::from_seed(&[0x0c; 32]);
        for key in [&alice, &bob, &carol] {
            for _ in 0..COINS_PER_PARTY {
                chain.fund(&key.public_key(), COIN).unwrap();
            }
        }
        Self {
            chain,
            params,
            alice,
            bob,
            carol,
        }
    }

    pub fn key(&self, who: Who) -> &KeyPair {
        match who {
            Who::Alice => &self.alice,
            Who::Bob => &self.bob,
            Who::Carol => &self.carol,
        }
    }

    pub fn pk(&self, who: Who) -> PublicKey {
        self.key(who).public_key()
    }

    pub fn ctx(&self, who: Who) -> BuildContext<'_> {
        BuildContext::new(&self.chain, &self.params, self.pk(who))
    }

    /// Sign the caller's inputs and submit, without mining.
    pub fn try_submit(&mut self, who: Who, mut built: BuiltTx) -> Result<TxId, ChainError> {
        sign_with(&mut built.tx, &self.chain, self.key(who));
        self.chain.submit(built.tx)
    }

    /// Sign, submit and mine; panics if the host refuses.
    pub fn send(&mut self, who: Who, built: BuiltTx) -> TxId {
        let txid = self.try_submit(who, built).unwrap();
        self.chain.mine_block();
        txid
    }

    /// Build with `f` as `who`, then sign, submit and mine.
    pub fn run(
        &mut self,
        who: Who,
        f: impl FnOnce(&BuildContext<'_>) -> Result<BuiltTx, BuilderError>,
    ) -> TxId {
        let built = f(&self.ctx(who)).unwrap();
        self.send(who, built)
    }

    /// Terms with Carol as arbitrator.
    pub fn arbitrated_terms(&self, name: &str) -> OfferTerms {
        OfferTerms {
            arbitrator: Some(self.pk(Who::Carol)),
            ..OfferTerms::new(name)
        }
    }

    /// Alice offers `terms` to Bob.
    pub fn offer(&mut self, terms: &OfferTerms) -> TxId {
        let bob = self.pk(Who::Bob);
        self.run(Who::Alice, |ctx| agr_contract::builder::agreement_create(ctx, &bob, terms))
    }

    /// A mined agreement: Alice offers, Bob accepts.
    pub fn agreement(&mut self, terms: &OfferTerms) -> (TxId, TxId) {
        let offer = self.offer(terms);
        let agreement = self.run(Who::Bob, |ctx| {
            agr_contract::builder::agreement_accept(ctx, &offer)
        });
        (offer, agreement)
    }

    pub fn output(&self, txid: &TxId, vout: u32) -> TxOut {
        self.chain.prevout(&OutPoint::new(*txid, vout)).unwrap()
    }

    pub fn is_spent(&self, txid: &TxId, vout: u32) -> bool {
        self.chain.spender(&OutPoint::new(*txid, vout)).is_some()
    }

    /// Outputs of `txid` paying `who`'s normal address.
    pub fn paid_to(&self, txid: &TxId, who: Who) -> Vec<Amount> {
        let script = Script::pubkey(self.pk(who));
        let record = self.chain.transaction(txid).unwrap();
        record
            .tx
            .outputs
            .iter()
            .filter(|o| o.script == script)
            .map(|o| o.value)
            .collect()
    }
}
