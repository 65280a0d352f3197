//! Proof-of-work puzzle: search and validation.
//!
//! A proof `q` is valid for the previous proof `p` when
//! `SHA256(format!("{p}{q}"))` starts with `difficulty` zero hex digits.
//! The search starts from a configurable seed and increments until a valid
//! proof is found. It touches no shared state, so any number of independent
//! workers can run it concurrently; a random seed keeps them from all
//! scanning the same range.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::hash::{count_leading_zero_nibbles, sha256};

/// Default number of leading zero hex digits a proof hash needs.
pub const DEFAULT_LEADING_ZEROS: usize = 4;

/// A SHA256 digest has 64 hex digits; no proof can satisfy more.
pub const MAX_LEADING_ZEROS: usize = 64;

/// Number of candidates checked between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Hash of the puzzle guess for `(last_proof, proof)`.
#[inline]
pub fn guess_hash(last_proof: u64, proof: u64) -> [u8; 32] {
    let guess = format!("{}{}", last_proof, proof);
    sha256(guess.as_bytes())
}

/// Check whether `proof` solves the puzzle for `last_proof`.
pub fn valid_proof(last_proof: u64, proof: u64, leading_zeros: usize) -> bool {
    if leading_zeros > MAX_LEADING_ZEROS {
        return false;
    }
    count_leading_zero_nibbles(&guess_hash(last_proof, proof)) >= leading_zeros
}

/// Find a proof for `last_proof` at the default difficulty.
///
/// Starts from a random seed and never gives up. Use [`ProofOfWork`] for a
/// bounded, cancellable or deterministic search.
pub fn proof_of_work(last_proof: u64) -> u64 {
    let mut proof = SeedStrategy::Random.start_value();
    while !valid_proof(last_proof, proof, DEFAULT_LEADING_ZEROS) {
        proof = proof.wrapping_add(1);
    }
    proof
}

/// Result of searching a window of candidate proofs.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The proof that solved the puzzle (if found).
    pub proof: Option<u64>,
    /// The guess hash of the winning proof (if found).
    pub hash: Option<[u8; 32]>,
    /// Number of candidates hashed in this window.
    pub hashes_computed: u64,
}

impl SearchResult {
    /// Create a result indicating no proof in the window.
    pub fn not_found(hashes: u64) -> Self {
        SearchResult {
            proof: None,
            hash: None,
            hashes_computed: hashes,
        }
    }

    /// Create a result indicating a valid proof was found.
    pub fn found(proof: u64, hash: [u8; 32], hashes: u64) -> Self {
        SearchResult {
            proof: Some(proof),
            hash: Some(hash),
            hashes_computed: hashes,
        }
    }

    /// Whether the window contained a solution.
    pub fn is_found(&self) -> bool {
        self.proof.is_some()
    }
}

/// Check `count` consecutive candidates starting at `start`.
///
/// Candidates wrap around at `u64::MAX`. Returns on the first valid proof.
///
/// # Arguments
/// * `last_proof` - Proof recorded in the current chain head
/// * `start` - First candidate to try
/// * `count` - Number of candidates to try
/// * `leading_zeros` - Required zero hex digits
pub fn search_range(last_proof: u64, start: u64, count: u64, leading_zeros: usize) -> SearchResult {
    if leading_zeros > MAX_LEADING_ZEROS {
        return SearchResult::not_found(0);
    }

    for offset in 0..count {
        let proof = start.wrapping_add(offset);
        let hash = guess_hash(last_proof, proof);

        if count_leading_zero_nibbles(&hash) >= leading_zeros {
            return SearchResult::found(proof, hash, offset + 1);
        }
    }

    SearchResult::not_found(count)
}

/// Where a proof search starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeedStrategy {
    /// Start from a random value, so parallel miners rarely overlap.
    #[default]
    Random,
    /// Start from a fixed value. Makes the search deterministic.
    Fixed(u64),
}

impl SeedStrategy {
    /// The first candidate to try.
    pub fn start_value(&self) -> u64 {
        match self {
            SeedStrategy::Fixed(seed) => *seed,
            SeedStrategy::Random => {
                let mut buf = [0u8; 8];
                match getrandom::getrandom(&mut buf) {
                    Ok(()) => u64::from_le_bytes(buf),
                    Err(err) => {
                        warn!(error = %err, "entropy unavailable, starting proof search at 0");
                        0
                    }
                }
            }
        }
    }
}

/// A configured proof-of-work engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    /// Required zero hex digits.
    pub difficulty: usize,
    /// Where each search starts.
    pub seed: SeedStrategy,
    /// Upper bound on candidates per search. `None` searches forever.
    pub max_attempts: Option<u64>,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork::new(DEFAULT_LEADING_ZEROS)
    }
}

impl ProofOfWork {
    /// Create an unbounded, randomly seeded engine.
    pub fn new(difficulty: usize) -> Self {
        ProofOfWork {
            difficulty,
            seed: SeedStrategy::Random,
            max_attempts: None,
        }
    }

    /// Build an engine from ledger configuration.
    pub fn from_config(config: &LedgerConfig) -> Self {
        ProofOfWork {
            difficulty: config.difficulty,
            seed: config.seed,
            max_attempts: config.max_attempts,
        }
    }

    /// Set the seed strategy.
    pub fn with_seed(mut self, seed: SeedStrategy) -> Self {
        self.seed = seed;
        self
    }

    /// Bound the number of candidates per search.
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Check a claimed proof at this engine's difficulty.
    pub fn verify(&self, last_proof: u64, proof: u64) -> bool {
        valid_proof(last_proof, proof, self.difficulty)
    }

    /// Search for a proof.
    pub fn solve(&self, last_proof: u64) -> Result<u64, LedgerError> {
        self.solve_until(last_proof, &AtomicBool::new(false))
    }

    /// Search for a proof, stopping early once `cancel` is set.
    ///
    /// The flag is polled every [`CANCEL_CHECK_INTERVAL`] candidates.
    pub fn solve_until(&self, last_proof: u64, cancel: &AtomicBool) -> Result<u64, LedgerError> {
        if self.difficulty > MAX_LEADING_ZEROS {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds {}",
                self.difficulty, MAX_LEADING_ZEROS
            )));
        }

        let mut next = self.seed.start_value();
        let mut attempts = 0u64;

        loop {
            if cancel.load(Ordering::Relaxed) {
                debug!(last_proof, attempts, "proof search cancelled");
                return Err(LedgerError::Cancelled);
            }

            let window = match self.max_attempts {
                Some(max) if attempts >= max => {
                    return Err(LedgerError::ProofNotFound { attempts });
                }
                Some(max) => CANCEL_CHECK_INTERVAL.min(max - attempts),
                None => CANCEL_CHECK_INTERVAL,
            };

            let result = search_range(last_proof, next, window, self.difficulty);
            attempts += result.hashes_computed;

            if let Some(proof) = result.proof {
                debug!(last_proof, proof, attempts, "proof found");
                return Ok(proof);
            }

            next = next.wrapping_add(window);
        }
    }
}
