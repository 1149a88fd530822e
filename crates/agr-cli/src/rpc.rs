//! # Agreement RPC Subcommands
//!
//! One subcommand per `agreement*` RPC method. Each prints the method's
//! JSON result object. Builders sign the caller's inputs with `--key`;
//! `--broadcast` also submits the transaction and `--mine` confirms it.
//!
//! The exit code is 0 for `"result": "success"` and 1 otherwise.

use std::convert::Infallible;

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use serde_json::Value;

use agr_chain::sign_with;
use agr_contract::builder::{
    agreement_accept, agreement_amend, agreement_close, agreement_create, agreement_dispute,
    agreement_resolve, agreement_stop_dispute, agreement_stop_offer, agreement_unlock,
    BuildContext, BuiltTx, OfferTerms,
};
use agr_contract::query::{
    agreement_event_log, agreement_info, agreement_inventory, agreement_list,
    agreement_offer_list, agreement_references,
};
use agr_contract::rpc::{builder_result, error_object, query_result, RpcMethod};
use agr_contract::{BuilderError, DisputeFlags, FuncId, OfferFlags};
use agr_core::{Amount, TxId};
use agr_crypto::PublicKey;

use crate::config::{CliContext, Session};

/// Offer switches settable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OfferFlagArg {
    /// The offeror cannot withdraw the offer.
    Nocancel,
    /// The agreement cannot be disputed.
    Nodisputes,
    /// Acceptance waits for notarization.
    Awaitnotaries,
}

impl OfferFlagArg {
    fn flag(self) -> OfferFlags {
        match self {
            Self::Nocancel => OfferFlags::NOCANCEL,
            Self::Nodisputes => OfferFlags::NODISPUTES,
            Self::Awaitnotaries => OfferFlags::AWAITNOTARIES,
        }
    }
}

/// Offer terms shared by create and amend.
#[derive(Args, Debug, Clone)]
pub struct TermsArgs {
    /// Offer name.
    #[arg(long)]
    pub name: String,
    /// Free-text memo.
    #[arg(long, default_value = "")]
    pub memo: String,
    /// Arbitrator public key (hex).
    #[arg(long)]
    pub arbitrator: Option<PublicKey>,
    /// Deposit; zero means the marker value.
    #[arg(long, default_value_t = 0)]
    pub deposit: Amount,
    /// Payment to the offeror on acceptance.
    #[arg(long, default_value_t = 0)]
    pub payment: Amount,
    /// Dispute fee; zero means the marker value.
    #[arg(long, default_value_t = 0)]
    pub dispute_fee: Amount,
    /// Offer switches (repeatable).
    #[arg(long = "flag", value_enum)]
    pub flags: Vec<OfferFlagArg>,
}

impl TermsArgs {
    fn terms(&self) -> OfferTerms {
        let flags = self
            .flags
            .iter()
            .fold(OfferFlags::NOUNLOCK, |acc, f| acc | f.flag());
        OfferTerms {
            arbitrator: self.arbitrator,
            flags,
            deposit: self.deposit,
            payment: self.payment,
            dispute_fee: self.dispute_fee,
            name: self.name.clone(),
            memo: self.memo.clone(),
        }
    }
}

/// What to do with a built transaction.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct SubmitArgs {
    /// Submit the signed transaction to the mempool.
    #[arg(long)]
    pub broadcast: bool,
    /// Mine a block after broadcasting.
    #[arg(long, requires = "broadcast")]
    pub mine: bool,
}

/// The `agreement*` subcommands.
#[derive(Subcommand, Debug)]
pub enum RpcCommand {
    /// Offer a new agreement.
    #[command(name = "agreementcreate")]
    Create {
        /// Destination public key (hex).
        destination: PublicKey,
        #[command(flatten)]
        terms: TermsArgs,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Offer amended terms for an agreement.
    #[command(name = "agreementamend")]
    Amend {
        /// Agreement id.
        agreement: TxId,
        #[command(flatten)]
        terms: TermsArgs,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Offer to close an agreement.
    #[command(name = "agreementclose")]
    Close {
        /// Agreement id.
        agreement: TxId,
        /// Offer name.
        #[arg(long)]
        name: String,
        /// Payment requested from the other party.
        #[arg(long, default_value_t = 0)]
        payment: Amount,
        /// Free-text memo.
        #[arg(long, default_value = "")]
        memo: String,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Withdraw or decline an offer.
    #[command(name = "agreementstopoffer")]
    StopOffer {
        /// Offer id.
        offer: TxId,
        /// Free-text memo.
        #[arg(long, default_value = "")]
        memo: String,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Accept an offer.
    #[command(name = "agreementaccept")]
    Accept {
        /// Offer id.
        offer: TxId,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Open a dispute.
    #[command(name = "agreementdispute")]
    Dispute {
        /// Agreement id.
        agreement: TxId,
        /// Grounds for the dispute.
        #[arg(long)]
        memo: String,
        /// Make the dispute impossible to withdraw.
        #[arg(long = "final")]
        is_final: bool,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Withdraw a dispute.
    #[command(name = "agreementstopdispute")]
    StopDispute {
        /// Dispute id.
        dispute: TxId,
        /// Free-text memo.
        #[arg(long, default_value = "")]
        memo: String,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Resolve a dispute as arbitrator.
    #[command(name = "agreementresolve")]
    Resolve {
        /// Dispute id.
        dispute: TxId,
        /// Share of the deposit paid to the claimant.
        #[arg(long)]
        payout: Amount,
        /// Free-text memo.
        #[arg(long, default_value = "")]
        memo: String,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Unlock an agreement (reserved).
    #[command(name = "agreementunlock")]
    Unlock {
        /// Agreement id.
        agreement: TxId,
    },
    /// Describe an Agreements transaction.
    #[command(name = "agreementinfo")]
    Info {
        /// Transaction id.
        txid: TxId,
    },
    /// List an agreement's events.
    #[command(name = "agreementeventlog")]
    EventLog {
        /// Agreement id.
        agreement: TxId,
        /// Only events of this type (name or function id).
        #[arg(long)]
        filter: Option<FuncId>,
        /// Maximum number of events; zero lists all.
        #[arg(long, default_value_t = 0)]
        samples: usize,
        /// Newest first.
        #[arg(long)]
        reverse: bool,
    },
    /// List offers and agreements referencing an agreement.
    #[command(name = "agreementreferences")]
    References {
        /// Agreement id.
        agreement: TxId,
    },
    /// List open offers and live agreements of a key.
    #[command(name = "agreementinventory")]
    Inventory {
        /// Public key (hex); defaults to the `--key` public key.
        pubkey: Option<PublicKey>,
    },
    /// List every agreement.
    #[command(name = "agreementlist")]
    List,
    /// List every open offer.
    #[command(name = "agreementofferlist")]
    OfferList,
}

impl RpcCommand {
    /// The RPC method this subcommand runs.
    pub fn method(&self) -> RpcMethod {
        match self {
            Self::Create { .. } => RpcMethod::Create,
            Self::Amend { .. } => RpcMethod::Amend,
            Self::Close { .. } => RpcMethod::Close,
            Self::StopOffer { .. } => RpcMethod::StopOffer,
            Self::Accept { .. } => RpcMethod::Accept,
            Self::Dispute { .. } => RpcMethod::Dispute,
            Self::StopDispute { .. } => RpcMethod::StopDispute,
            Self::Resolve { .. } => RpcMethod::Resolve,
            Self::Unlock { .. } => RpcMethod::Unlock,
            Self::Info { .. } => RpcMethod::Info,
            Self::EventLog { .. } => RpcMethod::EventLog,
            Self::References { .. } => RpcMethod::References,
            Self::Inventory { .. } => RpcMethod::Inventory,
            Self::List => RpcMethod::List,
            Self::OfferList => RpcMethod::OfferList,
        }
    }
}

/// Execute an `agreement*` subcommand and print its result object.
pub fn run_rpc(command: &RpcCommand, ctx: &CliContext) -> Result<u8> {
    let mut session = ctx.session()?;
    let method = command.method();
    tracing::debug!(%method, "running rpc method");
    let result = if method.is_builder() {
        run_builder(command, ctx, &mut session)?
    } else {
        run_query(command, ctx, &session)?
    };
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result["result"] == "success" { 0 } else { 1 })
}

fn run_builder(command: &RpcCommand, ctx: &CliContext, session: &mut Session) -> Result<Value> {
    let keypair = ctx.keypair()?;
    let build = BuildContext::new(&session.chain, &session.params, keypair.public_key());
    let (built, submit): (Result<BuiltTx, BuilderError>, SubmitArgs) = match command {
        RpcCommand::Create {
            destination,
            terms,
            submit,
        } => (agreement_create(&build, destination, &terms.terms()), *submit),
        RpcCommand::Amend {
            agreement,
            terms,
            submit,
        } => (agreement_amend(&build, agreement, &terms.terms()), *submit),
        RpcCommand::Close {
            agreement,
            name,
            payment,
            memo,
            submit,
        } => (agreement_close(&build, agreement, *payment, name, memo), *submit),
        RpcCommand::StopOffer {
            offer,
            memo,
            submit,
        } => (agreement_stop_offer(&build, offer, memo), *submit),
        RpcCommand::Accept { offer, submit } => (agreement_accept(&build, offer), *submit),
        RpcCommand::Dispute {
            agreement,
            memo,
            is_final,
            submit,
        } => {
            let flags = if *is_final {
                DisputeFlags::FINAL
            } else {
                DisputeFlags::empty()
            };
            (agreement_dispute(&build, agreement, flags, memo), *submit)
        }
        RpcCommand::StopDispute {
            dispute,
            memo,
            submit,
        } => (agreement_stop_dispute(&build, dispute, memo), *submit),
        RpcCommand::Resolve {
            dispute,
            payout,
            memo,
            submit,
        } => (agreement_resolve(&build, dispute, *payout, memo), *submit),
        RpcCommand::Unlock { agreement } => {
            (agreement_unlock(&build, agreement), SubmitArgs::default())
        }
        _ => return Ok(error_object(format!("{} is not a builder", command.method()))),
    };

    let mut built = match built {
        Ok(built) => built,
        Err(e) => return Ok(builder_result::<BuilderError>(Err(e))),
    };
    let signed = sign_with(&mut built.tx, &session.chain, &keypair);
    tracing::debug!(txid = %built.txid, signed, "signed caller inputs");
    let mut result = builder_result::<BuilderError>(Ok(built.clone()));
    if submit.broadcast {
        match session.chain.submit(built.tx) {
            Ok(txid) => {
                if submit.mine {
                    session.chain.mine_block();
                }
                session.save()?;
                result["broadcast"] = Value::from(txid.to_hex());
            }
            Err(e) => return Ok(error_object(e)),
        }
    }
    Ok(result)
}

fn run_query(command: &RpcCommand, ctx: &CliContext, session: &Session) -> Result<Value> {
    let chain = &session.chain;
    let params = &session.params;
    let value = match command {
        RpcCommand::Info { txid } => query_result(agreement_info(chain, params, txid)),
        RpcCommand::EventLog {
            agreement,
            filter,
            samples,
            reverse,
        } => query_result(agreement_event_log(
            chain, params, agreement, *filter, *samples, *reverse,
        )),
        RpcCommand::References { agreement } => {
            query_result(agreement_references(chain, agreement))
        }
        RpcCommand::Inventory { pubkey } => {
            let pubkey = match pubkey {
                Some(pk) => *pk,
                None => ctx.keypair()?.public_key(),
            };
            query_result(agreement_inventory(chain, params, &pubkey))
        }
        RpcCommand::List => query_result::<_, Infallible>(Ok(agreement_list(chain))),
        RpcCommand::OfferList => query_result::<_, Infallible>(Ok(agreement_offer_list(chain))),
        _ => error_object(format!("{} is not a query", command.method())),
    };
    Ok(value)
}
