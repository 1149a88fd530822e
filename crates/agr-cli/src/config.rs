//! # CLI Configuration and State
//!
//! Global options resolved once per invocation:
//!
//! - `--config`: consensus parameter overrides, YAML or JSON by extension.
//!   Absent fields keep their production defaults.
//! - `--chain`: the reference chain's JSON state file.
//! - `--key`: a hex-encoded Ed25519 seed, as written by `agr keygen`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use agr_chain::{ChainState, MemoryChain};
use agr_contract::AgreementsValidator;
use agr_core::ConsensusParams;
use agr_crypto::KeyPair;

/// Default chain state file name.
pub const DEFAULT_CHAIN_FILE: &str = "agr-chain.json";

/// Paths supplied through global options.
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Chain state file.
    pub chain_path: PathBuf,
    /// Consensus parameter file.
    pub config: Option<PathBuf>,
    /// Caller key file.
    pub key: Option<PathBuf>,
}

impl CliContext {
    /// Consensus parameters from `--config`, or the defaults.
    pub fn params(&self) -> Result<ConsensusParams> {
        match &self.config {
            Some(path) => load_params(path),
            None => Ok(ConsensusParams::default()),
        }
    }

    /// The caller's key pair from `--key`.
    pub fn keypair(&self) -> Result<KeyPair> {
        let Some(path) = &self.key else {
            bail!("this command needs a caller key: pass --key <FILE>");
        };
        load_key(path)
    }

    /// Open the chain state, creating an empty chain if the file is absent.
    pub fn session(&self) -> Result<Session> {
        Session::open(&self.chain_path, self.params()?)
    }
}

/// Parse consensus parameters from a YAML or JSON file.
pub fn load_params(path: &Path) -> Result<ConsensusParams> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let params: ConsensusParams = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse JSON: {}", path.display()))?
    };
    params
        .validate()
        .with_context(|| format!("invalid consensus parameters in {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded consensus parameters");
    Ok(params)
}

/// Read a hex-encoded Ed25519 seed.
pub fn load_key(path: &Path) -> Result<KeyPair> {
    if !path.exists() {
        bail!("key file not found: {}", path.display());
    }
    let hex = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key: {}", path.display()))?;
    KeyPair::from_secret_hex(hex.trim())
        .map_err(|e| anyhow::anyhow!("invalid key in {}: {e}", path.display()))
}

/// An open reference chain with the Agreements validator registered.
pub struct Session {
    /// Parameters in force.
    pub params: ConsensusParams,
    /// The chain.
    pub chain: MemoryChain,
    path: PathBuf,
}

impl Session {
    /// Load `path`, or start a new chain when it does not exist.
    pub fn open(path: &Path, params: ConsensusParams) -> Result<Self> {
        let chain = if path.exists() {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read chain state: {}", path.display()))?;
            MemoryChain::from_json(&json)
                .with_context(|| format!("failed to parse chain state: {}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "starting a new chain");
            MemoryChain::from_state(ChainState {
                block_time_secs: params.block_time_secs,
                ..ChainState::default()
            })
        };
        let chain = chain.with_validator(Box::new(AgreementsValidator::new(params.clone())));
        Ok(Self {
            params,
            chain,
            path: path.to_path_buf(),
        })
    }

    /// Write the chain state back to its file.
    pub fn save(&self) -> Result<()> {
        let json = self.chain.to_json().context("failed to serialize chain state")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write chain state: {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "saved chain state");
        Ok(())
    }
}
