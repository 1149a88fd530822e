//! # Keygen Subcommand
//!
//! Writes a fresh Ed25519 key pair as `<prefix>.key` (hex seed) and
//! `<prefix>.pub` (hex public key).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use agr_chain::Address;
use agr_crypto::KeyPair;

/// Arguments for `agr keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output directory for the key files.
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,
    /// Prefix for the key file names.
    #[arg(long, default_value = "agr")]
    pub prefix: String,
}

/// Execute `agr keygen`.
pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let (key_path, pub_path) = write_keypair(&args.output, &args.prefix, &KeyPair::generate())?;
    println!("OK: generated Ed25519 keypair");
    println!("  Private key: {}", key_path.display());
    println!("  Public key:  {}", pub_path.display());
    Ok(0)
}

/// Write `keypair` under `dir`; returns the private and public key paths.
pub fn write_keypair(dir: &Path, prefix: &str, keypair: &KeyPair) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))?;
    let key_path = dir.join(format!("{prefix}.key"));
    let pub_path = dir.join(format!("{prefix}.pub"));
    let pubkey = keypair.public_key();
    std::fs::write(&key_path, keypair.secret_hex())
        .with_context(|| format!("failed to write private key: {}", key_path.display()))?;
    std::fs::write(&pub_path, pubkey.to_hex())
        .with_context(|| format!("failed to write public key: {}", pub_path.display()))?;
    tracing::info!(pubkey = %pubkey, address = %Address::pubkey(&pubkey), "wrote keypair");
    Ok((key_path, pub_path))
}
