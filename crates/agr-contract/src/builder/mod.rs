//! # Transaction Builders
//!
//! Client-side constructors for every Agreements transaction. Each builder:
//!
//! 1. checks the local preconditions the validator will check, failing with
//!    a [`BuilderError`] before any input is selected;
//! 2. lays out contract inputs and outputs in the validator's fixed order;
//! 3. funds the fee (and any shortfall) from the caller's normal outputs,
//!    always spending at least one so the caller's signature is present;
//! 4. returns change to the caller, appends the payload, and signs contract
//!    inputs with the global key.
//!
//! The result is partially signed: the caller signs its own inputs with
//! [`agr_chain::sign_with`] before broadcasting.

mod accept;
mod dispute;
mod offer;

pub use accept::agreement_accept;
pub use dispute::{agreement_dispute, agreement_resolve, agreement_stop_dispute, agreement_unlock};
pub use offer::{agreement_amend, agreement_close, agreement_create, agreement_stop_offer, OfferTerms};

use serde::Serialize;

use agr_chain::{sign_input, Address, ChainView, Script, Transaction, TxIn, TxOut};
use agr_core::{Amount, ConsensusParams, OutPoint, TxId};
use agr_crypto::PublicKey;

use crate::address::global_signer;
use crate::codec::{AgreementOp, FuncId};
use crate::error::BuilderError;
use crate::party::PartyKey;
use crate::walker::{find_latest_agreement_event, LatestEvent};

/// Chain, parameters and caller identity shared by all builders.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    /// Chain state to build against.
    pub chain: &'a dyn ChainView,
    /// Consensus parameters.
    pub params: &'a ConsensusParams,
    /// Key funding the transaction and receiving change.
    pub caller: PublicKey,
}

impl<'a> BuildContext<'a> {
    /// Context for `caller`.
    pub fn new(chain: &'a dyn ChainView, params: &'a ConsensusParams, caller: PublicKey) -> Self {
        Self {
            chain,
            params,
            caller,
        }
    }

    fn is_caller(&self, party: &PartyKey) -> bool {
        party.is(&self.caller)
    }

    /// Reject an offer older than the expiry limit.
    fn check_offer_age(&self, offer_height: u32) -> Result<(), BuilderError> {
        let age_secs = self
            .params
            .elapsed_secs(offer_height, self.chain.tip_height());
        if age_secs > self.params.offer_expiry_secs {
            return Err(BuilderError::OfferExpired {
                age_secs,
                max_secs: self.params.offer_expiry_secs,
            });
        }
        Ok(())
    }

    fn check_memo(&self, memo: &str) -> Result<(), BuilderError> {
        if memo.len() > self.params.max_memo_len {
            return Err(BuilderError::InvalidParameter {
                name: "memo",
                reason: format!("{} bytes exceeds {}", memo.len(), self.params.max_memo_len),
            });
        }
        Ok(())
    }

    /// The agreement's current baton, if the agreement can take a new
    /// event: its latest event must be itself or a dispute cancellation.
    fn active_baton(&self, agreement_txid: &TxId) -> Result<LatestEvent, BuilderError> {
        let latest = find_latest_agreement_event(self.chain, self.params, agreement_txid)?;
        let live = match latest.func {
            FuncId::Accept => latest.txid == *agreement_txid,
            FuncId::StopDispute => true,
            _ => false,
        };
        if !live {
            return Err(BuilderError::AgreementNotActive {
                agreement: *agreement_txid,
                latest: latest.func.as_char(),
            });
        }
        Ok(latest)
    }
}

/// A built, partially signed transaction.
#[derive(Debug, Clone)]
pub struct BuiltTx {
    /// The transaction; contract inputs signed, caller inputs not.
    pub tx: Transaction,
    /// Its id.
    pub txid: TxId,
    /// The parameters the builder captured.
    pub echo: serde_json::Value,
}

/// Public key of a party, or an error naming its role.
pub(crate) fn party_pubkey(party: &PartyKey, role: &'static str) -> Result<PublicKey, BuilderError> {
    party
        .as_pubkey()
        .copied()
        .ok_or(BuilderError::ScriptKeyUnsupported(role))
}

pub(crate) fn echo<T: Serialize>(kind: &str, params: &T) -> serde_json::Value {
    let mut value = serde_json::to_value(params).unwrap_or_default();
    if let Some(map) = value.as_object_mut() {
        map.insert("type".to_string(), serde_json::Value::from(kind));
    }
    value
}

/// A transaction under construction.
#[derive(Debug)]
pub(crate) struct Draft {
    tx: Transaction,
    contract_in: Amount,
}

impl Draft {
    pub(crate) fn new() -> Self {
        Self {
            tx: Transaction::new(),
            contract_in: 0,
        }
    }

    /// Spend a contract output at the next input position.
    pub(crate) fn spend(&mut self, ctx: &BuildContext<'_>, outpoint: OutPoint) -> Result<(), BuilderError> {
        let prev = ctx
            .chain
            .prevout(&outpoint)
            .ok_or(BuilderError::OutputNotFound(outpoint))?;
        self.contract_in += prev.value;
        self.tx.inputs.push(TxIn::new(outpoint));
        Ok(())
    }

    /// Add an output at the next output position.
    pub(crate) fn pay(&mut self, value: Amount, script: Script) {
        self.tx.outputs.push(TxOut::new(value, script));
    }

    /// Fund, add change and payload, sign contract inputs.
    pub(crate) fn finish(
        mut self,
        ctx: &BuildContext<'_>,
        op: AgreementOp,
        echo: serde_json::Value,
    ) -> Result<BuiltTx, BuilderError> {
        let contract_inputs = self.tx.inputs.len();
        let outputs = self
            .tx
            .output_total()
            .ok_or_else(|| BuilderError::InvalidParameter {
                name: "outputs",
                reason: "total value overflows".into(),
            })?;
        let needed = ctx.params.tx_fee + (outputs - self.contract_in).max(0);

        let mut selected: Amount = 0;
        let mut available: Amount = 0;
        let mut coins = ctx.chain.address_unspent(&Address::pubkey(&ctx.caller));
        coins.retain(|c| !self.tx.inputs.iter().any(|i| i.prevout == c.outpoint));
        // Confirmed coins first.
        coins.sort_by_key(|c| c.height.is_none());
        for coin in &coins {
            available += coin.value;
            if selected >= needed && self.tx.inputs.len() > contract_inputs {
                continue;
            }
            selected += coin.value;
            self.tx.inputs.push(TxIn::new(coin.outpoint));
        }
        if selected < needed || self.tx.inputs.len() == contract_inputs {
            return Err(BuilderError::InsufficientFunds { needed, available });
        }

        let change = selected + self.contract_in - outputs - ctx.params.tx_fee;
        if change > 0 {
            self.pay(change, Script::pubkey(ctx.caller));
        }
        let func = op.func_id();
        self.pay(0, Script::op_return(op.encode()));

        let global = global_signer();
        for i in 0..contract_inputs {
            sign_input(&mut self.tx, i, &global);
        }
        let txid = self.tx.txid();
        tracing::debug!(
            %txid,
            func = %func,
            inputs = self.tx.inputs.len(),
            outputs = self.tx.outputs.len(),
            "built agreements transaction"
        );
        Ok(BuiltTx {
            tx: self.tx,
            txid,
            echo,
        })
    }
}
