//! Error types for ledger and peer operations.

use thiserror::Error;

/// Errors surfaced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A peer address could not be parsed.
    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),
    /// The chain is empty. Only possible if an invariant has been broken.
    #[error("Chain is empty")]
    EmptyChain,
    /// A candidate chain failed link or proof validation.
    #[error("Invalid chain")]
    InvalidChain,
    /// A submitted proof does not solve the puzzle for the chain head.
    #[error("Proof {proof} does not solve the puzzle for {last_proof}")]
    InvalidProof { last_proof: u64, proof: u64 },
    /// A bounded proof search exhausted its attempt budget.
    #[error("No proof found after {attempts} attempts")]
    ProofNotFound {
        /// Number of candidate proofs checked.
        attempts: u64,
    },
    /// A proof search was cancelled before finding a proof.
    #[error("Proof search cancelled")]
    Cancelled,
    /// The chain head changed while a proof was being searched for.
    #[error("Chain head changed during proof search")]
    StaleProof,
    /// A configuration value was rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// A block or payload could not be encoded.
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Per-peer failures during consensus resolution.
///
/// These are recovered by skipping the peer and never reach the caller of
/// [`crate::Ledger::resolve_conflicts`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    /// The peer could not be reached or did not answer in time.
    #[error("Peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },
    /// The peer answered with something that is not a usable chain.
    #[error("Malformed response from {peer}: {reason}")]
    MalformedResponse { peer: String, reason: String },
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Encoding(err.to_string())
    }
}
