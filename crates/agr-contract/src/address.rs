//! # Escrow Locks
//!
//! Two lock kinds hold Agreements escrow:
//!
//! - the **global condition**, 1-of-1 on the global key: offer markers and
//!   agreement deposits;
//! - the **event condition**, 1-of-2 on the global key and the key tweaked
//!   from the accepted offer's txid: the agreement's event baton and
//!   dispute fees.
//!
//! Every node derives both from public data, so no registry of agreement
//! addresses exists or is needed.

use std::sync::OnceLock;

use agr_chain::{Address, Condition, Script};
use agr_core::{TxId, EVAL_AGREEMENTS};
use agr_crypto::{global_keypair, tweaked_keypair, KeyPair, PublicKey};

/// Public half of the global key.
pub fn global_pubkey() -> PublicKey {
    static GLOBAL: OnceLock<PublicKey> = OnceLock::new();
    *GLOBAL.get_or_init(|| global_keypair().public_key())
}

/// The global key pair; used to sign contract inputs.
pub fn global_signer() -> KeyPair {
    global_keypair()
}

/// 1-of-1 condition on the global key.
pub fn global_condition() -> Condition {
    Condition::one_of_one(EVAL_AGREEMENTS, global_pubkey())
}

/// Lock script of markers and deposits.
pub fn global_script() -> Script {
    Script::Condition(global_condition())
}

/// Index address of every marker and deposit.
pub fn global_address() -> Address {
    Address::condition(&global_condition())
}

/// Key tweaked from an accepted offer's txid.
pub fn event_pubkey(offer_txid: &TxId) -> PublicKey {
    tweaked_keypair(&global_pubkey(), offer_txid).public_key()
}

/// 1-of-2 condition guarding the event chain of the agreement created by
/// accepting `offer_txid`.
pub fn event_condition(offer_txid: &TxId) -> Condition {
    Condition::one_of_two(EVAL_AGREEMENTS, global_pubkey(), event_pubkey(offer_txid))
}

/// Lock script of event batons and dispute fees.
pub fn event_script(offer_txid: &TxId) -> Script {
    Script::Condition(event_condition(offer_txid))
}

/// Index address of an agreement's event chain.
pub fn event_address(offer_txid: &TxId) -> Address {
    Address::condition(&event_condition(offer_txid))
}

/// Whether `script` is locked under this module's eval code.
pub fn is_module_script(script: &Script) -> bool {
    script.is_condition_of(EVAL_AGREEMENTS)
}
