//! # Input Signing
//!
//! Wallet-side helpers: attach a witness to each input a key is allowed to
//! spend. Signing never touches outputs, so a partially signed transaction
//! keeps its id while other parties add their signatures.

use agr_crypto::KeyPair;

use crate::tx::{Transaction, Witness};
use crate::view::ChainView;

/// Sign input `index` with `key`, replacing any existing witness.
pub fn sign_input(tx: &mut Transaction, index: usize, key: &KeyPair) {
    let signature = key.sign(&tx.sighash(index));
    if let Some(input) = tx.inputs.get_mut(index) {
        input.witness = Some(Witness {
            pubkey: key.public_key(),
            signature,
        });
    }
}

/// Sign every still-unsigned input whose spent output `key` may unlock.
///
/// Returns the number of inputs signed.
pub fn sign_with(tx: &mut Transaction, chain: &dyn ChainView, key: &KeyPair) -> usize {
    let pubkey = key.public_key();
    let targets: Vec<usize> = tx
        .inputs
        .iter()
        .enumerate()
        .filter(|(_, input)| input.witness.is_none())
        .filter(|(_, input)| {
            chain
                .prevout(&input.prevout)
                .is_some_and(|out| out.script.authorizes(&pubkey))
        })
        .map(|(i, _)| i)
        .collect();
    for &i in &targets {
        sign_input(tx, i, key);
    }
    targets.len()
}
