//! Ledger configuration and defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusPolicy;
use crate::error::LedgerError;
use crate::pow::{SeedStrategy, DEFAULT_LEADING_ZEROS, MAX_LEADING_ZEROS};

/// Proof recorded in the genesis block. It is a trust anchor and does not
/// have to solve the puzzle.
pub const GENESIS_PROOF: u64 = 100;

/// Sentinel `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// How long to wait for a single peer's chain.
pub const DEFAULT_PEER_TIMEOUT_MS: u64 = 5_000;

/// Tunables for a ledger node.
///
/// Every field has a default, so a partial JSON document such as
/// `{"difficulty": 3}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Required zero hex digits in a proof hash.
    pub difficulty: usize,
    /// Where proof searches start.
    pub seed: SeedStrategy,
    /// Upper bound on candidates per proof search.
    pub max_attempts: Option<u64>,
    /// Which peer chain wins during consensus resolution.
    pub policy: ConsensusPolicy,
    /// Per-peer fetch timeout in milliseconds.
    pub peer_timeout_ms: u64,
    /// Proof stored in the genesis block.
    pub genesis_proof: u64,
    /// `previous_hash` stored in the genesis block.
    pub genesis_previous_hash: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            difficulty: DEFAULT_LEADING_ZEROS,
            seed: SeedStrategy::Random,
            max_attempts: None,
            policy: ConsensusPolicy::GlobalLongest,
            peer_timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
            genesis_proof: GENESIS_PROOF,
            genesis_previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, LedgerError> {
        let config: LedgerConfig =
            serde_json::from_str(json).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no ledger can work with.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty > MAX_LEADING_ZEROS {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds {}",
                self.difficulty, MAX_LEADING_ZEROS
            )));
        }
        if self.genesis_previous_hash.is_empty() {
            return Err(LedgerError::Config(
                "genesis_previous_hash must not be empty".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(LedgerError::Config("max_attempts must be positive".to_string()));
        }
        Ok(())
    }

    /// Per-peer fetch timeout.
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}
