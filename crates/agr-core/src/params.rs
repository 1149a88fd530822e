//! # Consensus Parameters
//!
//! Constants and tunables that every validating node must agree on.
//! `ConsensusParams::default()` is the production parameter set; tests and
//! the CLI may load overrides from a file, but all nodes of one chain must
//! run with identical values.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Amounts are signed 64-bit integers in the chain's smallest unit.
pub type Amount = i64;

/// Eval code tagging every payload and condition owned by this module.
pub const EVAL_AGREEMENTS: u8 = 0xf8;

/// Payload version written by this implementation and the only one accepted.
pub const AGREEMENTS_VERSION: u8 = 1;

/// Consensus-relevant parameters of the Agreements module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsensusParams {
    /// Fee every module transaction must leave to the miner.
    pub tx_fee: Amount,
    /// Value of marker and event-logger outputs; also the minimum deposit
    /// and dispute fee.
    pub marker_value: Amount,
    /// Block interval used to estimate elapsed time from block counts.
    pub block_time_secs: u64,
    /// Age after which an offer can no longer be accepted.
    pub offer_expiry_secs: u64,
    /// Maximum byte length of an offer name.
    pub max_name_len: usize,
    /// Maximum byte length of any memo.
    pub max_memo_len: usize,
    /// Maximum byte length of the op-return payload.
    pub max_opret_size: usize,
    /// Maximum number of steps the event-chain walker will follow.
    pub max_event_chain: usize,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            tx_fee: 10_000,
            marker_value: 10_000,
            block_time_secs: 60,
            offer_expiry_secs: 7_776_000,
            max_name_len: 64,
            max_memo_len: 2048,
            max_opret_size: 10_000,
            max_event_chain: 1_000,
        }
    }
}

impl ConsensusParams {
    /// Check internal consistency of the parameter set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tx_fee <= 0 {
            return Err(ConfigError::Invalid {
                name: "tx_fee",
                reason: format!("must be positive, got {}", self.tx_fee),
            });
        }
        if self.marker_value <= 0 {
            return Err(ConfigError::Invalid {
                name: "marker_value",
                reason: format!("must be positive, got {}", self.marker_value),
            });
        }
        if self.block_time_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "block_time_secs",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.max_name_len == 0 {
            return Err(ConfigError::Invalid {
                name: "max_name_len",
                reason: "must allow at least one byte".to_string(),
            });
        }
        if self.max_event_chain == 0 {
            return Err(ConfigError::Invalid {
                name: "max_event_chain",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Estimated seconds elapsed between two block heights.
    ///
    /// Heights in the wrong order yield zero rather than wrapping.
    pub fn elapsed_secs(&self, from_height: u32, to_height: u32) -> u64 {
        u64::from(to_height.saturating_sub(from_height)).saturating_mul(self.block_time_secs)
    }

    /// Whether an offer mined at `offer_height` has expired at `tip_height`.
    pub fn is_offer_expired(&self, offer_height: u32, tip_height: u32) -> bool {
        self.elapsed_secs(offer_height, tip_height) > self.offer_expiry_secs
    }

    /// Number of blocks after which an offer expires.
    pub fn offer_expiry_blocks(&self) -> u64 {
        self.offer_expiry_secs / self.block_time_secs
    }
}
