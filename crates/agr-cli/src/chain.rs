//! # Chain Subcommand
//!
//! Maintenance of the reference chain state file: funding keys, mining,
//! notarizing, inspecting and submitting raw transactions.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use agr_chain::{Address, ChainView};
use agr_core::Amount;
use agr_crypto::PublicKey;

use crate::config::CliContext;

/// Arguments for `agr chain`.
#[derive(Args, Debug)]
pub struct ChainArgs {
    #[command(subcommand)]
    pub command: ChainCommand,
}

/// Chain subcommands.
#[derive(Subcommand, Debug)]
pub enum ChainCommand {
    /// Create an empty chain state file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Mint a coin to a public key and mine it.
    Fund {
        /// Recipient public key (hex).
        pubkey: PublicKey,
        /// Coin value.
        amount: Amount,
    },
    /// Mine one block containing the mempool.
    Mine,
    /// Mine several blocks.
    Advance {
        /// Number of blocks.
        blocks: u32,
    },
    /// Mark blocks as notarized, up to the tip by default.
    Notarize {
        /// Highest notarized height.
        height: Option<u32>,
    },
    /// Print tip, notarization and mempool.
    Info,
    /// Print the spendable balance of a public key.
    Balance {
        /// Public key (hex).
        pubkey: PublicKey,
    },
    /// Submit a signed raw transaction to the mempool.
    Submit {
        /// Transaction hex.
        hex: String,
        /// Mine a block right after.
        #[arg(long)]
        mine: bool,
    },
}

/// Execute `agr chain`.
pub fn run_chain(args: &ChainArgs, ctx: &CliContext) -> Result<u8> {
    match &args.command {
        ChainCommand::Init { force } => cmd_init(ctx, *force),
        command => cmd_update(ctx, command),
    }
}

fn cmd_init(ctx: &CliContext, force: bool) -> Result<u8> {
    if ctx.chain_path.exists() {
        if !force {
            bail!(
                "chain state already exists: {} (use --force to overwrite)",
                ctx.chain_path.display()
            );
        }
        std::fs::remove_file(&ctx.chain_path).with_context(|| {
            format!("failed to remove chain state: {}", ctx.chain_path.display())
        })?;
    }
    ctx.session()?.save()?;
    println!("OK: initialized {}", ctx.chain_path.display());
    Ok(0)
}

fn cmd_update(ctx: &CliContext, command: &ChainCommand) -> Result<u8> {
    let mut session = ctx.session()?;
    let chain = &mut session.chain;
    let output = match command {
        ChainCommand::Init { force } => return cmd_init(ctx, *force),
        ChainCommand::Fund { pubkey, amount } => {
            let outpoint = chain.fund(pubkey, *amount)?;
            json!({ "outpoint": outpoint.to_string(), "address": Address::pubkey(pubkey) })
        }
        ChainCommand::Mine => json!({ "height": chain.mine_block() }),
        ChainCommand::Advance { blocks } => json!({ "height": chain.advance(*blocks) }),
        ChainCommand::Notarize { height } => {
            let height = height.unwrap_or_else(|| chain.tip_height());
            chain.notarize(height)?;
            json!({ "notarized_height": height })
        }
        ChainCommand::Info => json!({
            "height": chain.tip_height(),
            "notarized_height": chain.state().notarized_height,
            "block_time": chain.block_time(chain.tip_height()),
            "mempool": chain.mempool(),
            "transactions": chain.state().transactions.len(),
        }),
        ChainCommand::Balance { pubkey } => json!({
            "address": Address::pubkey(pubkey),
            "balance": chain.balance(pubkey),
        }),
        ChainCommand::Submit { hex, mine } => {
            let txid = chain.submit_hex(hex.trim())?;
            if *mine {
                chain.mine_block();
            }
            json!({ "txid": txid, "confirmed": *mine })
        }
    };
    session.save()?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(0)
}
