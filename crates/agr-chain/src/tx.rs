//! # Transaction Model
//!
//! UTXO transactions as the Agreements module sees them: inputs that spend
//! previous outputs, outputs locked by a [`Script`], and an optional
//! witness per input.
//!
//! ## Identity and Signing
//!
//! The transaction id is SHA-256 of the encoding *without* witnesses, so
//! signing an input never changes the id another party already referenced.
//! The signature digest for input `i` commits to that same unsigned encoding
//! plus `i`.
//!
//! ## Wire Encoding
//!
//! ```text
//! version u32 | n_in | (txid, vout u32, has_witness u8 [, pubkey32, sig64])*
//!             | n_out | (value i64, script)* | lock_time u32
//! script := 0x00 pubkey32
//!         | 0x01 eval u8, threshold u8, n, pubkey32*
//!         | 0x02 var_bytes
//! ```

use serde::{Deserialize, Serialize};

use agr_core::{sha256, sha256_concat, Amount, ByteReader, ByteWriter, CodecError, OutPoint, TxId};
use agr_crypto::{PublicKey, SigHash, Signature};

const SCRIPT_PUBKEY: u8 = 0x00;
const SCRIPT_CONDITION: u8 = 0x01;
const SCRIPT_OP_RETURN: u8 = 0x02;

const SIGHASH_DOMAIN: &[u8] = b"agr/sighash/v1";

/// A threshold lock over a set of keys, tagged with the contract module
/// whose validator governs spending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Module that must approve every spend.
    pub eval_code: u8,
    /// Number of keys that must sign. Only 1 is produced by this workspace.
    pub threshold: u8,
    /// Keys that may sign.
    pub keys: Vec<PublicKey>,
}

impl Condition {
    /// A 1-of-1 condition.
    pub fn one_of_one(eval_code: u8, key: PublicKey) -> Self {
        Self {
            eval_code,
            threshold: 1,
            keys: vec![key],
        }
    }

    /// A 1-of-2 condition; either key may sign.
    pub fn one_of_two(eval_code: u8, a: PublicKey, b: PublicKey) -> Self {
        Self {
            eval_code,
            threshold: 1,
            keys: vec![a, b],
        }
    }

    /// Whether `key` is one of the condition's signers.
    pub fn has_key(&self, key: &PublicKey) -> bool {
        self.keys.contains(key)
    }
}

/// Output lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Script {
    /// Spendable by one key. Outputs of this kind are "normal" outputs.
    PayToPubkey {
        /// Owning key.
        pubkey: PublicKey,
    },
    /// Spendable under a contract module's rules.
    Condition(Condition),
    /// Unspendable data carrier.
    OpReturn {
        /// Embedded payload, hex in JSON.
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
}

impl Script {
    /// Pay-to-pubkey lock.
    pub fn pubkey(pubkey: PublicKey) -> Self {
        Script::PayToPubkey { pubkey }
    }

    /// Data carrier.
    pub fn op_return(data: Vec<u8>) -> Self {
        Script::OpReturn { data }
    }

    /// Owning key of a pay-to-pubkey lock.
    pub fn as_pubkey(&self) -> Option<&PublicKey> {
        match self {
            Script::PayToPubkey { pubkey } => Some(pubkey),
            _ => None,
        }
    }

    /// Contract condition, if this is one.
    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            Script::Condition(c) => Some(c),
            _ => None,
        }
    }

    /// Payload of a data carrier.
    pub fn op_return_data(&self) -> Option<&[u8]> {
        match self {
            Script::OpReturn { data } => Some(data),
            _ => None,
        }
    }

    /// Whether this is a condition owned by `eval_code`.
    pub fn is_condition_of(&self, eval_code: u8) -> bool {
        matches!(self, Script::Condition(c) if c.eval_code == eval_code)
    }

    /// Whether `key` may produce a valid signature for this lock.
    pub fn authorizes(&self, key: &PublicKey) -> bool {
        match self {
            Script::PayToPubkey { pubkey } => pubkey == key,
            Script::Condition(c) => c.has_key(key),
            Script::OpReturn { .. } => false,
        }
    }

    fn encode_into(&self, w: &mut ByteWriter) {
        match self {
            Script::PayToPubkey { pubkey } => {
                w.put_u8(SCRIPT_PUBKEY).put_raw(pubkey.as_bytes());
            }
            Script::Condition(c) => {
                w.put_u8(SCRIPT_CONDITION)
                    .put_u8(c.eval_code)
                    .put_u8(c.threshold)
                    .put_compact_size(c.keys.len() as u64);
                for key in &c.keys {
                    w.put_raw(key.as_bytes());
                }
            }
            Script::OpReturn { data } => {
                w.put_u8(SCRIPT_OP_RETURN).put_var_bytes(data);
            }
        }
    }

    /// Serialized form, used for address derivation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.encode_into(&mut w);
        w.into_vec()
    }

    fn decode_from(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        match r.get_u8("script tag")? {
            SCRIPT_PUBKEY => Ok(Script::pubkey(read_pubkey(r, "script pubkey")?)),
            SCRIPT_CONDITION => {
                let eval_code = r.get_u8("condition eval code")?;
                let threshold = r.get_u8("condition threshold")?;
                let n = r.get_compact_size("condition keys")?;
                if n > (r.remaining() / PublicKey::LEN) as u64 {
                    return Err(CodecError::LengthOverflow {
                        field: "condition keys",
                        len: n,
                        remaining: r.remaining(),
                    });
                }
                let mut keys = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    keys.push(read_pubkey(r, "condition key")?);
                }
                Ok(Script::Condition(Condition {
                    eval_code,
                    threshold,
                    keys,
                }))
            }
            SCRIPT_OP_RETURN => Ok(Script::op_return(r.get_var_bytes("op_return")?)),
            tag => Err(CodecError::InvalidTag {
                field: "script",
                tag,
            }),
        }
    }
}

fn read_pubkey(r: &mut ByteReader<'_>, field: &'static str) -> Result<PublicKey, CodecError> {
    let raw = r.get_raw(field, PublicKey::LEN)?;
    PublicKey::from_slice(&raw).map_err(|_| CodecError::InvalidLength {
        field,
        len: raw.len(),
    })
}

/// Key and signature authorizing one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    /// Key that signed.
    pub pubkey: PublicKey,
    /// Signature over the input's sighash.
    pub signature: Signature,
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// Output being spent.
    pub prevout: OutPoint,
    /// Authorization; `None` until signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,
}

impl TxIn {
    /// Unsigned input spending `prevout`.
    pub fn new(prevout: OutPoint) -> Self {
        Self {
            prevout,
            witness: None,
        }
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Value in the smallest unit.
    pub value: Amount,
    /// Spending condition.
    pub script: Script,
}

impl TxOut {
    /// Create an output.
    pub fn new(value: Amount, script: Script) -> Self {
        Self { value, script }
    }
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Format version.
    pub version: u32,
    /// Inputs, in order.
    pub inputs: Vec<TxIn>,
    /// Outputs, in order.
    pub outputs: Vec<TxOut>,
    /// Free field; coinbase transactions use it to stay unique.
    pub lock_time: u32,
}

impl Transaction {
    /// Current format version.
    pub const VERSION: u32 = 1;

    /// Empty transaction at the current version.
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            ..Self::default()
        }
    }

    fn encode(&self, with_witness: bool) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.put_u32(self.version)
            .put_compact_size(self.inputs.len() as u64);
        for input in &self.inputs {
            w.put_txid(&input.prevout.txid).put_u32(input.prevout.vout);
            match (&input.witness, with_witness) {
                (Some(wit), true) => {
                    w.put_u8(1)
                        .put_raw(wit.pubkey.as_bytes())
                        .put_raw(wit.signature.as_bytes());
                }
                _ => {
                    w.put_u8(0);
                }
            }
        }
        w.put_compact_size(self.outputs.len() as u64);
        for output in &self.outputs {
            w.put_i64(output.value);
            output.script.encode_into(&mut w);
        }
        w.put_u32(self.lock_time);
        w.into_vec()
    }

    /// Full encoding including witnesses.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode(true)
    }

    /// Full encoding as hex, the form carried by RPC results.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Decode a full encoding. Trailing bytes are rejected.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        let mut r = ByteReader::new(data);
        let version = r.get_u32("tx version")?;
        let n_in = r.get_compact_size("tx inputs")?;
        // Each input costs at least 37 bytes.
        if n_in > (r.remaining() / 37) as u64 {
            return Err(CodecError::LengthOverflow {
                field: "tx inputs",
                len: n_in,
                remaining: r.remaining(),
            });
        }
        let mut inputs = Vec::with_capacity(n_in as usize);
        for _ in 0..n_in {
            let txid = r.get_txid("prevout txid")?;
            let vout = r.get_u32("prevout vout")?;
            let witness = match r.get_u8("witness flag")? {
                0 => None,
                1 => {
                    let pubkey = read_pubkey(&mut r, "witness pubkey")?;
                    let raw = r.get_raw("witness signature", 64)?;
                    let mut sig = [0u8; 64];
                    sig.copy_from_slice(&raw);
                    Some(Witness {
                        pubkey,
                        signature: Signature(sig),
                    })
                }
                tag => {
                    return Err(CodecError::InvalidTag {
                        field: "witness flag",
                        tag,
                    })
                }
            };
            inputs.push(TxIn {
                prevout: OutPoint::new(txid, vout),
                witness,
            });
        }
        let n_out = r.get_compact_size("tx outputs")?;
        // Each output costs at least 10 bytes.
        if n_out > (r.remaining() / 10) as u64 {
            return Err(CodecError::LengthOverflow {
                field: "tx outputs",
                len: n_out,
                remaining: r.remaining(),
            });
        }
        let mut outputs = Vec::with_capacity(n_out as usize);
        for _ in 0..n_out {
            let value = r.get_i64("output value")?;
            let script = Script::decode_from(&mut r)?;
            outputs.push(TxOut { value, script });
        }
        let lock_time = r.get_u32("lock time")?;
        r.finish()?;
        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Decode from hex.
    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(s.trim()).map_err(|e| CodecError::Hex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Transaction id: SHA-256 of the encoding without witnesses.
    pub fn txid(&self) -> TxId {
        TxId(sha256(&self.encode(false)))
    }

    /// Digest that the witness of input `index` must sign.
    pub fn sighash(&self, index: usize) -> SigHash {
        let unsigned = self.encode(false);
        let idx = (index as u32).to_le_bytes();
        SigHash::from_digest(sha256_concat(&[SIGHASH_DOMAIN, &unsigned, &idx]))
    }

    /// Whether this transaction has no inputs.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Sum of output values, `None` on overflow.
    pub fn output_total(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(0 as Amount, |acc, o| acc.checked_add(o.value))
    }

    /// Payload of the last output, if it is a data carrier.
    pub fn op_return(&self) -> Option<&[u8]> {
        self.outputs.last().and_then(|o| o.script.op_return_data())
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
