//! # Host Chain Interface
//!
//! [`ChainView`] is everything a contract module may ask of the host:
//! transaction lookup, spent-output lookup, address index scans, tip
//! height and notarization status. All calls are synchronous and
//! read-only; a validator holding `&dyn ChainView` cannot mutate state.

use serde::{Deserialize, Serialize};

use agr_core::{Amount, OutPoint, TxId};

use crate::address::Address;
use crate::tx::{Transaction, TxOut};

/// A transaction known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    /// Transaction id.
    pub txid: TxId,
    /// The transaction.
    pub tx: Transaction,
    /// Block height, or `None` while in the mempool.
    pub height: Option<u32>,
}

impl TxRecord {
    /// Whether the transaction is in a block.
    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }
}

/// The transaction input that spent an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRecord {
    /// Spending transaction.
    pub txid: TxId,
    /// Index of the spending input.
    pub vin: u32,
    /// Height of the spending transaction, `None` if unconfirmed.
    pub height: Option<u32>,
}

/// One entry of the address index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressOutput {
    /// The indexed output.
    pub outpoint: OutPoint,
    /// Its value.
    pub value: Amount,
    /// Height of the creating transaction, `None` if unconfirmed.
    pub height: Option<u32>,
}

/// Read-only access to host chain state.
pub trait ChainView {
    /// Look up a transaction in blocks or the mempool.
    fn transaction(&self, txid: &TxId) -> Option<TxRecord>;

    /// Which input, if any, spent `outpoint` (mempool spends included).
    fn spender(&self, outpoint: &OutPoint) -> Option<SpendRecord>;

    /// Every output ever paid to `address`, in chain order.
    fn address_outputs(&self, address: &Address) -> Vec<AddressOutput>;

    /// Height of the best block.
    fn tip_height(&self) -> u32;

    /// Whether the block at `height` is covered by a notarization.
    fn is_notarized(&self, height: u32) -> bool;

    /// Look up a transaction that is in a block.
    fn confirmed_transaction(&self, txid: &TxId) -> Option<TxRecord> {
        self.transaction(txid).filter(TxRecord::is_confirmed)
    }

    /// The output `outpoint` refers to.
    fn prevout(&self, outpoint: &OutPoint) -> Option<TxOut> {
        let record = self.transaction(&outpoint.txid)?;
        record.tx.outputs.get(outpoint.vout as usize).cloned()
    }

    /// Outputs paid to `address` that no input has spent.
    fn address_unspent(&self, address: &Address) -> Vec<AddressOutput> {
        self.address_outputs(address)
            .into_iter()
            .filter(|o| self.spender(&o.outpoint).is_none())
            .collect()
    }

    /// Number of blocks including and on top of the transaction's block;
    /// zero when unconfirmed or unknown.
    fn confirmations(&self, txid: &TxId) -> u32 {
        match self.transaction(txid).and_then(|r| r.height) {
            Some(h) => self.tip_height().saturating_sub(h) + 1,
            None => 0,
        }
    }

    /// Whether a transaction is confirmed and its block notarized.
    fn is_tx_notarized(&self, txid: &TxId) -> bool {
        match self.transaction(txid).and_then(|r| r.height) {
            Some(h) => self.is_notarized(h),
            None => false,
        }
    }
}
