//! # In-Memory Reference Host
//!
//! [`MemoryChain`] is a single-node UTXO ledger implementing
//! [`ChainView`]. It performs the checks every host performs before a
//! contract module is consulted:
//!
//! - every input spends an existing, unspent, spendable output;
//! - every input carries a valid signature from a key its lock allows;
//! - outputs are non-negative and do not exceed inputs.
//!
//! It then dispatches the registered [`ContractValidator`] for each eval
//! code the transaction touches. A contract condition with no registered
//! validator is unspendable and cannot be created.
//!
//! Accepted transactions sit in the mempool until [`MemoryChain::mine_block`].
//! The serializable part of the ledger is [`ChainState`]; indexes are
//! rebuilt on load.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use agr_core::{Amount, OutPoint, TxId};
use agr_crypto::PublicKey;

use crate::address::Address;
use crate::error::ChainError;
use crate::tx::{Script, Transaction, TxOut};
use crate::validator::ContractValidator;
use crate::view::{AddressOutput, ChainView, SpendRecord, TxRecord};

/// Block interval used for timestamps when none is configured.
pub const DEFAULT_BLOCK_TIME_SECS: u64 = 60;

/// A block that contained at least one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block height.
    pub height: u32,
    /// Block timestamp.
    pub time: DateTime<Utc>,
    /// Transactions in block order.
    pub txids: Vec<TxId>,
}

/// Persistent ledger contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    /// Timestamp of height zero.
    pub genesis_time: DateTime<Utc>,
    /// Spacing between block timestamps.
    pub block_time_secs: u64,
    /// Tip height.
    pub height: u32,
    /// Highest notarized height; zero when nothing is notarized.
    pub notarized_height: u32,
    /// Non-empty blocks.
    pub blocks: Vec<BlockRecord>,
    /// Every accepted transaction in acceptance order.
    pub transactions: Vec<TxRecord>,
    /// Counter keeping coinbase transactions unique.
    pub coinbase_nonce: u32,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            genesis_time: Utc::now(),
            block_time_secs: DEFAULT_BLOCK_TIME_SECS,
            height: 0,
            notarized_height: 0,
            blocks: Vec::new(),
            transactions: Vec::new(),
            coinbase_nonce: 0,
        }
    }
}

/// In-memory UTXO ledger with contract validator dispatch.
#[derive(Default)]
pub struct MemoryChain {
    state: ChainState,
    tx_index: HashMap<TxId, usize>,
    spends: HashMap<OutPoint, (TxId, u32)>,
    address_index: HashMap<Address, Vec<OutPoint>>,
    validators: Vec<Box<dyn ContractValidator>>,
}

impl std::fmt::Debug for MemoryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChain")
            .field("height", &self.state.height)
            .field("transactions", &self.state.transactions.len())
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl MemoryChain {
    /// Empty chain at height zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a chain from persisted state.
    pub fn from_state(state: ChainState) -> Self {
        let mut chain = Self {
            state,
            ..Self::default()
        };
        for pos in 0..chain.state.transactions.len() {
            chain.index_transaction(pos);
        }
        chain
    }

    /// Load from the JSON produced by [`MemoryChain::to_json`].
    pub fn from_json(json: &str) -> Result<Self, ChainError> {
        let state: ChainState =
            serde_json::from_str(json).map_err(|e| ChainError::State(e.to_string()))?;
        Ok(Self::from_state(state))
    }

    /// Persist the ledger as pretty JSON.
    pub fn to_json(&self) -> Result<String, ChainError> {
        serde_json::to_string_pretty(&self.state).map_err(|e| ChainError::State(e.to_string()))
    }

    /// The persistent ledger contents.
    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Register a contract module's validator. A later registration for the
    /// same eval code replaces the earlier one.
    pub fn register(&mut self, validator: Box<dyn ContractValidator>) {
        let code = validator.eval_code();
        self.validators.retain(|v| v.eval_code() != code);
        tracing::debug!(eval_code = code, "registered contract validator");
        self.validators.push(validator);
    }

    /// Builder-style [`MemoryChain::register`].
    pub fn with_validator(mut self, validator: Box<dyn ContractValidator>) -> Self {
        self.register(validator);
        self
    }

    fn validator(&self, eval_code: u8) -> Option<&dyn ContractValidator> {
        self.validators
            .iter()
            .find(|v| v.eval_code() == eval_code)
            .map(|v| v.as_ref())
    }

    // ─── Mutations ──────────────────────────────────────────────────

    /// Mint `value` to `pubkey` in a new block and return the new output.
    pub fn fund(&mut self, pubkey: &PublicKey, value: Amount) -> Result<OutPoint, ChainError> {
        if value <= 0 {
            return Err(ChainError::InvalidFunding(value));
        }
        self.state.coinbase_nonce = self.state.coinbase_nonce.wrapping_add(1);
        let mut tx = Transaction::new();
        tx.outputs.push(TxOut::new(value, Script::pubkey(*pubkey)));
        tx.lock_time = self.state.coinbase_nonce;
        let txid = tx.txid();
        if self.tx_index.contains_key(&txid) {
            return Err(ChainError::Duplicate(txid));
        }
        self.insert(txid, tx);
        self.mine_block();
        Ok(OutPoint::new(txid, 0))
    }

    /// Run every host check and contract validator without accepting.
    pub fn check_transaction(&self, tx: &Transaction) -> Result<TxId, ChainError> {
        if tx.inputs.is_empty() {
            return Err(ChainError::NoInputs);
        }
        if tx.outputs.is_empty() {
            return Err(ChainError::NoOutputs);
        }
        let txid = tx.txid();
        if self.tx_index.contains_key(&txid) {
            return Err(ChainError::Duplicate(txid));
        }

        let mut seen = HashSet::new();
        let mut eval_codes = BTreeSet::new();
        let mut input_total: Amount = 0;
        for (vin, input) in tx.inputs.iter().enumerate() {
            let outpoint = input.prevout;
            if !seen.insert(outpoint) {
                return Err(ChainError::DuplicateInput(outpoint));
            }
            let prev = self
                .prevout(&outpoint)
                .ok_or(ChainError::UnknownPrevout { vin, outpoint })?;
            if prev.script.op_return_data().is_some() {
                return Err(ChainError::SpendsOpReturn { vin, outpoint });
            }
            if let Some(&(spender, _)) = self.spends.get(&outpoint) {
                return Err(ChainError::DoubleSpend {
                    vin,
                    outpoint,
                    spender,
                });
            }
            let witness = input
                .witness
                .as_ref()
                .ok_or(ChainError::MissingWitness(vin))?;
            if !prev.script.authorizes(&witness.pubkey) {
                return Err(ChainError::UnauthorizedKey(vin));
            }
            witness
                .pubkey
                .verify(&tx.sighash(vin), &witness.signature)
                .map_err(|e| ChainError::BadSignature {
                    vin,
                    reason: e.to_string(),
                })?;
            if let Some(cond) = prev.script.as_condition() {
                eval_codes.insert(cond.eval_code);
            }
            input_total = input_total.saturating_add(prev.value);
        }

        let mut output_total: Amount = 0;
        for (vout, output) in tx.outputs.iter().enumerate() {
            if output.value < 0 {
                return Err(ChainError::NegativeValue(vout));
            }
            if let Some(cond) = output.script.as_condition() {
                eval_codes.insert(cond.eval_code);
            }
            output_total = output_total.saturating_add(output.value);
        }
        if output_total > input_total {
            return Err(ChainError::InsufficientInputs {
                inputs: input_total,
                outputs: output_total,
            });
        }
        if let Some(&tag) = tx.op_return().and_then(|d| d.first()) {
            if self.validator(tag).is_some() {
                eval_codes.insert(tag);
            }
        }

        for code in eval_codes {
            let validator = self.validator(code).ok_or(ChainError::NoValidator(code))?;
            validator
                .validate(self, tx)
                .map_err(|e| ChainError::ContractRejected {
                    eval_code: code,
                    reason: e.to_string(),
                })?;
        }
        Ok(txid)
    }

    /// Check `tx` and add it to the mempool.
    pub fn submit(&mut self, tx: Transaction) -> Result<TxId, ChainError> {
        let txid = match self.check_transaction(&tx) {
            Ok(txid) => txid,
            Err(e) => {
                tracing::debug!(error = %e, "transaction rejected");
                return Err(e);
            }
        };
        self.insert(txid, tx);
        tracing::debug!(%txid, "transaction accepted to mempool");
        Ok(txid)
    }

    /// Submit a hex-encoded transaction.
    pub fn submit_hex(&mut self, hex: &str) -> Result<TxId, ChainError> {
        self.submit(Transaction::from_hex(hex)?)
    }

    fn insert(&mut self, txid: TxId, tx: Transaction) {
        self.state.transactions.push(TxRecord {
            txid,
            tx,
            height: None,
        });
        self.index_transaction(self.state.transactions.len() - 1);
    }

    fn index_transaction(&mut self, pos: usize) {
        let record = &self.state.transactions[pos];
        let txid = record.txid;
        self.tx_index.insert(txid, pos);
        for (vin, input) in record.tx.inputs.iter().enumerate() {
            self.spends.insert(input.prevout, (txid, vin as u32));
        }
        for (vout, output) in record.tx.outputs.iter().enumerate() {
            if let Some(address) = Address::for_script(&output.script) {
                self.address_index
                    .entry(address)
                    .or_default()
                    .push(OutPoint::new(txid, vout as u32));
            }
        }
    }

    /// Confirm every mempool transaction in a new block; returns the new
    /// tip height. Empty blocks advance the height without a record.
    pub fn mine_block(&mut self) -> u32 {
        self.state.height += 1;
        let height = self.state.height;
        let mut txids = Vec::new();
        for record in self.state.transactions.iter_mut().filter(|r| r.height.is_none()) {
            record.height = Some(height);
            txids.push(record.txid);
        }
        if !txids.is_empty() {
            tracing::info!(height, txs = txids.len(), "mined block");
            self.state.blocks.push(BlockRecord {
                height,
                time: self.block_time(height),
                txids,
            });
        }
        height
    }

    /// Mine `blocks` blocks; returns the new tip height.
    pub fn advance(&mut self, blocks: u32) -> u32 {
        for _ in 0..blocks {
            self.mine_block();
        }
        tracing::info!(height = self.state.height, blocks, "advanced chain");
        self.state.height
    }

    /// Mark every block up to `height` as notarized.
    pub fn notarize(&mut self, height: u32) -> Result<(), ChainError> {
        if height > self.state.height {
            return Err(ChainError::NotarizeBeyondTip {
                height,
                tip: self.state.height,
            });
        }
        self.state.notarized_height = self.state.notarized_height.max(height);
        tracing::info!(height = self.state.notarized_height, "notarized");
        Ok(())
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Timestamp of the block at `height`.
    pub fn block_time(&self, height: u32) -> DateTime<Utc> {
        let secs = i64::from(height).saturating_mul(self.state.block_time_secs as i64);
        self.state.genesis_time + Duration::seconds(secs)
    }

    /// Unconfirmed transaction ids in acceptance order.
    pub fn mempool(&self) -> Vec<TxId> {
        self.state
            .transactions
            .iter()
            .filter(|r| r.height.is_none())
            .map(|r| r.txid)
            .collect()
    }

    /// Sum of unspent outputs paid to `pubkey`'s normal address.
    pub fn balance(&self, pubkey: &PublicKey) -> Amount {
        self.address_unspent(&Address::pubkey(pubkey))
            .iter()
            .map(|o| o.value)
            .sum()
    }
}

impl ChainView for MemoryChain {
    fn transaction(&self, txid: &TxId) -> Option<TxRecord> {
        self.tx_index
            .get(txid)
            .and_then(|&pos| self.state.transactions.get(pos))
            .cloned()
    }

    fn spender(&self, outpoint: &OutPoint) -> Option<SpendRecord> {
        let &(txid, vin) = self.spends.get(outpoint)?;
        let height = self
            .tx_index
            .get(&txid)
            .and_then(|&pos| self.state.transactions.get(pos))
            .and_then(|r| r.height);
        Some(SpendRecord { txid, vin, height })
    }

    fn address_outputs(&self, address: &Address) -> Vec<AddressOutput> {
        let Some(outpoints) = self.address_index.get(address) else {
            return Vec::new();
        };
        outpoints
            .iter()
            .filter_map(|op| {
                let pos = *self.tx_index.get(&op.txid)?;
                let record = self.state.transactions.get(pos)?;
                let out = record.tx.outputs.get(op.vout as usize)?;
                Some(AddressOutput {
                    outpoint: *op,
                    value: out.value,
                    height: record.height,
                })
            })
            .collect()
    }

    fn tip_height(&self) -> u32 {
        self.state.height
    }

    fn is_notarized(&self, height: u32) -> bool {
        height > 0 && height <= self.state.notarized_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::sign_with;
    use crate::tx::{Condition, TxIn};
    use crate::validator::Rejection;
    use agr_crypto::KeyPair;

    fn key(b: u8) -> KeyPair {
        KeyPair::from_seed(&[b; 32])
    }

    fn pay(chain: &MemoryChain, from: &KeyPair, prevout: OutPoint, outs: Vec<TxOut>) -> Transaction {
        let mut tx = Transaction::new();
        tx.inputs.push(TxIn::new(prevout));
        tx.outputs = outs;
        sign_with(&mut tx, chain, from);
        tx
    }

    struct RejectAll;

    impl ContractValidator for RejectAll {
        fn eval_code(&self) -> u8 {
            0xee
        }
        fn validate(&self, _: &dyn ChainView, _: &Transaction) -> Result<(), Rejection> {
            Err("nope".into())
        }
    }

    struct AcceptAll;

    impl ContractValidator for AcceptAll {
        fn eval_code(&self) -> u8 {
            0xee
        }
        fn validate(&self, _: &dyn ChainView, _: &Transaction) -> Result<(), Rejection> {
            Ok(())
        }
    }

    #[test]
    fn fund_and_spend() {
        let mut chain = MemoryChain::new();
        let a = key(1);
        let b = key(2);
        let coin = chain.fund(&a.public_key(), 1_000).unwrap();
        assert_eq!(chain.tip_height(), 1);
        assert_eq!(chain.balance(&a.public_key()), 1_000);

        let tx = pay(&chain, &a, coin, vec![TxOut::new(900, Script::pubkey(b.public_key()))]);
        let txid = chain.submit(tx).unwrap();
        assert_eq!(chain.mempool(), vec![txid]);
        assert_eq!(chain.confirmations(&txid), 0);
        chain.mine_block();
        assert_eq!(chain.confirmations(&txid), 1);
        assert_eq!(chain.balance(&b.public_key()), 900);
        assert_eq!(chain.balance(&a.public_key()), 0);
        assert_eq!(chain.spender(&coin).unwrap().txid, txid);
    }

    #[test]
    fn double_spend_rejected() {
        let mut chain = MemoryChain::new();
        let a = key(1);
        let coin = chain.fund(&a.public_key(), 1_000).unwrap();
        let first = pay(&chain, &a, coin, vec![TxOut::new(10, Script::pubkey(key(2).public_key()))]);
        let second = pay(&chain, &a, coin, vec![TxOut::new(20, Script::pubkey(key(3).public_key()))]);
        let first_id = chain.submit(first).unwrap();
        match chain.submit(second) {
            Err(ChainError::DoubleSpend { spender, .. }) => assert_eq!(spender, first_id),
            other => panic!("expected double spend, got {other:?}"),
        }
    }

    #[test]
    fn unsigned_and_foreign_signatures_rejected() {
        let mut chain = MemoryChain::new();
        let a = key(1);
        let coin = chain.fund(&a.public_key(), 1_000).unwrap();
        let mut tx = Transaction::new();
        tx.inputs.push(TxIn::new(coin));
        tx.outputs.push(TxOut::new(1, Script::pubkey(a.public_key())));
        assert!(matches!(
            chain.check_transaction(&tx),
            Err(ChainError::MissingWitness(0))
        ));
        crate::sign::sign_input(&mut tx, 0, &key(2));
        assert!(matches!(
            chain.check_transaction(&tx),
            Err(ChainError::UnauthorizedKey(0))
        ));
    }

    #[test]
    fn tampered_output_breaks_signature() {
        let mut chain = MemoryChain::new();
        let a = key(1);
        let coin = chain.fund(&a.public_key(), 1_000).unwrap();
        let mut tx = pay(&chain, &a, coin, vec![TxOut::new(10, Script::pubkey(a.public_key()))]);
        tx.outputs[0].value = 11;
        assert!(matches!(
            chain.submit(tx),
            Err(ChainError::BadSignature { vin: 0, .. })
        ));
    }

    #[test]
    fn outputs_cannot_exceed_inputs() {
        let mut chain = MemoryChain::new();
        let a = key(1);
        let coin = chain.fund(&a.public_key(), 100).unwrap();
        let tx = pay(&chain, &a, coin, vec![TxOut::new(101, Script::pubkey(a.public_key()))]);
        assert!(matches!(
            chain.submit(tx),
            Err(ChainError::InsufficientInputs { inputs: 100, outputs: 101 })
        ));
    }

    #[test]
    fn condition_without_validator_rejected() {
        let mut chain = MemoryChain::new();
        let a = key(1);
        let coin = chain.fund(&a.public_key(), 100).unwrap();
        let cond = Script::Condition(Condition::one_of_one(0xee, a.public_key()));
        let tx = pay(&chain, &a, coin, vec![TxOut::new(50, cond)]);
        assert!(matches!(chain.submit(tx), Err(ChainError::NoValidator(0xee))));
    }

    #[test]
    fn validator_rejection_carries_reason() {
        let mut chain = MemoryChain::new().with_validator(Box::new(RejectAll));
        let a = key(1);
        let coin = chain.fund(&a.public_key(), 100).unwrap();
        let tx = pay(
            &chain,
            &a,
            coin,
            vec![TxOut::new(0, Script::op_return(vec![0xee, b'o', 1]))],
        );
        let err = chain.submit(tx).unwrap_err();
        assert_eq!(err.rejection_reason(), Some("nope"));
    }

    #[test]
    fn registration_replaces_same_eval_code() {
        let mut chain = MemoryChain::new().with_validator(Box::new(RejectAll));
        chain.register(Box::new(AcceptAll));
        let a = key(1);
        let coin = chain.fund(&a.public_key(), 100).unwrap();
        let cond = Script::Condition(Condition::one_of_one(0xee, a.public_key()));
        let tx = pay(&chain, &a, coin, vec![TxOut::new(50, cond)]);
        chain.submit(tx).unwrap();
    }

    #[test]
    fn notarization_bounds() {
        let mut chain = MemoryChain::new();
        chain.advance(5);
        assert!(!chain.is_notarized(3));
        chain.notarize(3).unwrap();
        assert!(chain.is_notarized(3));
        assert!(!chain.is_notarized(4));
        assert!(chain.notarize(9).is_err());
    }

    #[test]
    fn empty_blocks_not_recorded() {
        let mut chain = MemoryChain::new();
        chain.fund(&key(1).public_key(), 10).unwrap();
        chain.advance(10);
        assert_eq!(chain.tip_height(), 11);
        assert_eq!(chain.state().blocks.len(), 1);
        assert_eq!(chain.state().blocks[0].height, 1);
    }

    #[test]
    fn state_json_roundtrip_rebuilds_indexes() {
        let mut chain = MemoryChain::new();
        let a = key(1);
        let coin = chain.fund(&a.public_key(), 1_000).unwrap();
        let tx = pay(&chain, &a, coin, vec![TxOut::new(10, Script::pubkey(a.public_key()))]);
        let txid = chain.submit(tx).unwrap();

        let restored = MemoryChain::from_json(&chain.to_json().unwrap()).unwrap();
        assert_eq!(restored.state(), chain.state());
        assert_eq!(restored.spender(&coin).unwrap().txid, txid);
        assert_eq!(restored.balance(&a.public_key()), 10);
        assert_eq!(restored.mempool(), vec![txid]);
    }
}
