//! # agr CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use agr_cli::chain::{run_chain, ChainArgs};
use agr_cli::keygen::{run_keygen, KeygenArgs};
use agr_cli::rpc::{run_rpc, RpcCommand};
use agr_cli::{CliContext, DEFAULT_CHAIN_FILE};

/// Agreements module CLI.
///
/// Builds, validates and inspects two-party agreements on a local
/// reference chain.
#[derive(Parser, Debug)]
#[command(name = "agr", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Consensus parameter overrides (YAML or JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reference chain state file.
    #[arg(long, global = true, default_value = DEFAULT_CHAIN_FILE)]
    chain: PathBuf,

    /// Caller key file (hex seed).
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an Ed25519 key pair.
    Keygen(KeygenArgs),

    /// Reference chain maintenance.
    Chain(ChainArgs),

    #[command(flatten)]
    Rpc(RpcCommand),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = CliContext {
        chain_path: cli.chain,
        config: cli.config,
        key: cli.key,
    };
    tracing::debug!(chain = %ctx.chain_path.display(), "agr CLI starting");

    let result = match cli.command {
        Commands::Keygen(args) => run_keygen(&args),
        Commands::Chain(args) => run_chain(&args, &ctx),
        Commands::Rpc(command) => run_rpc(&command, &ctx),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_keygen() {
        let cli = Cli::try_parse_from(["agr", "keygen", "--prefix", "alice"]).unwrap();
        match cli.command {
            Commands::Keygen(args) => assert_eq!(args.prefix, "alice"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_parse_verbose_levels() {
        let cli = Cli::try_parse_from(["agr", "-vv", "agreementlist"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.chain, PathBuf::from(DEFAULT_CHAIN_FILE));
    }

    #[test]
    fn cli_parse_every_rpc_name() {
        let txid = "ab".repeat(32);
        let pk = agr_crypto::KeyPair::from_seed(&[1; 32]).public_key().to_hex();
        let cases: Vec<Vec<&str>> = vec![
            vec!["agreementcreate", pk.as_str(), "--name", "lease"],
            vec!["agreementamend", txid.as_str(), "--name", "v2"],
            vec!["agreementclose", txid.as_str(), "--name", "done"],
            vec!["agreementstopoffer", txid.as_str()],
            vec!["agreementaccept", txid.as_str()],
            vec!["agreementdispute", txid.as_str(), "--memo", "late"],
            vec!["agreementstopdispute", txid.as_str()],
            vec!["agreementresolve", txid.as_str(), "--payout", "5"],
            vec!["agreementunlock", txid.as_str()],
            vec!["agreementinfo", txid.as_str()],
            vec!["agreementeventlog", txid.as_str(), "--filter", "dispute", "--reverse"],
            vec!["agreementreferences", txid.as_str()],
            vec!["agreementinventory", pk.as_str()],
            vec!["agreementlist"],
            vec!["agreementofferlist"],
        ];
        for args in cases {
            let name = args[0];
            let cli = Cli::try_parse_from(std::iter::once("agr").chain(args)).unwrap();
            let Commands::Rpc(command) = cli.command else {
                panic!("{name} did not parse as an rpc command");
            };
            assert_eq!(command.method().name(), name);
        }
    }

    #[test]
    fn cli_parse_mine_requires_broadcast() {
        let txid = "ab".repeat(32);
        assert!(Cli::try_parse_from(["agr", "agreementaccept", &txid, "--mine"]).is_err());
        assert!(
            Cli::try_parse_from(["agr", "agreementaccept", &txid, "--broadcast", "--mine"]).is_ok()
        );
    }

    #[test]
    fn cli_parse_rejects_bad_txid() {
        assert!(Cli::try_parse_from(["agr", "agreementinfo", "xyz"]).is_err());
    }
}
