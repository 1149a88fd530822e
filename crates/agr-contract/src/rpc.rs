//! # RPC Result Objects
//!
//! Every builder and query is exposed under an `agreement*` method name.
//! Results are JSON objects, never panics or transport errors:
//!
//! - success: `{"result": "success", "hex": ..., "txid": ..., ...echo}` for
//!   builders, `{"result": "success", ...report}` for queries;
//! - failure: `{"result": "error", "error": "<message>"}`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::builder::BuiltTx;

/// Method names of the Agreements RPC surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    Create,
    Amend,
    Close,
    StopOffer,
    Accept,
    Dispute,
    StopDispute,
    Resolve,
    Unlock,
    Info,
    EventLog,
    References,
    Inventory,
    List,
    OfferList,
}

impl RpcMethod {
    /// All methods, builders first.
    pub const ALL: [RpcMethod; 15] = [
        Self::Create,
        Self::Amend,
        Self::Close,
        Self::StopOffer,
        Self::Accept,
        Self::Dispute,
        Self::StopDispute,
        Self::Resolve,
        Self::Unlock,
        Self::Info,
        Self::EventLog,
        Self::References,
        Self::Inventory,
        Self::List,
        Self::OfferList,
    ];

    /// Wire name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Create => "agreementcreate",
            Self::Amend => "agreementamend",
            Self::Close => "agreementclose",
            Self::StopOffer => "agreementstopoffer",
            Self::Accept => "agreementaccept",
            Self::Dispute => "agreementdispute",
            Self::StopDispute => "agreementstopdispute",
            Self::Resolve => "agreementresolve",
            Self::Unlock => "agreementunlock",
            Self::Info => "agreementinfo",
            Self::EventLog => "agreementeventlog",
            Self::References => "agreementreferences",
            Self::Inventory => "agreementinventory",
            Self::List => "agreementlist",
            Self::OfferList => "agreementofferlist",
        }
    }

    /// Whether the method builds a transaction.
    pub fn is_builder(self) -> bool {
        matches!(
            self,
            Self::Create
                | Self::Amend
                | Self::Close
                | Self::StopOffer
                | Self::Accept
                | Self::Dispute
                | Self::StopDispute
                | Self::Resolve
                | Self::Unlock
        )
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RpcMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown method {s}"))
    }
}

/// `{"result": "error", "error": msg}`.
pub fn error_object(err: impl fmt::Display) -> Value {
    let mut map = Map::new();
    map.insert("result".into(), Value::from("error"));
    map.insert("error".into(), Value::from(err.to_string()));
    Value::Object(map)
}

fn success_with(fields: Value) -> Value {
    let mut map = Map::new();
    map.insert("result".into(), Value::from("success"));
    match fields {
        Value::Object(extra) => {
            for (k, v) in extra {
                map.entry(k).or_insert(v);
            }
        }
        Value::Null => {}
        other => {
            map.insert("data".into(), other);
        }
    }
    Value::Object(map)
}

/// Success object for a built transaction.
pub fn built_object(built: &BuiltTx) -> Value {
    let mut map = Map::new();
    map.insert("hex".into(), Value::from(built.tx.to_hex()));
    map.insert("txid".into(), Value::from(built.txid.to_hex()));
    if let Value::Object(echo) = &built.echo {
        for (k, v) in echo {
            map.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    success_with(Value::Object(map))
}

/// Result object for a builder call.
pub fn builder_result<E: fmt::Display>(result: Result<BuiltTx, E>) -> Value {
    match result {
        Ok(built) => built_object(&built),
        Err(e) => error_object(e),
    }
}

/// Result object for a query call. Object reports are merged into the
/// result; anything else is placed under `data`.
pub fn query_result<T: Serialize, E: fmt::Display>(result: Result<T, E>) -> Value {
    match result.map(|report| serde_json::to_value(report)) {
        Ok(Ok(value)) => success_with(value),
        Ok(Err(e)) => error_object(e),
        Err(e) => error_object(e),
    }
}
