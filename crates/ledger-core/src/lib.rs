//! Core ledger logic for the pow-ledger node.
//!
//! This crate provides pure Rust implementations of:
//! - Canonical block encoding and SHA256 block digests
//! - The ledger: chain, pending-transaction buffer and peer set
//! - Proof-of-work search and validation
//! - End-to-end chain validation
//! - Longest-valid-chain consensus over an injected peer transport
//!
//! Nothing here touches the network or disk. Hosts expose the [`Ledger`]
//! over whatever transport they like and implement [`ChainTransport`] to
//! let it reach peers.

pub mod block;
pub mod chain;
pub mod config;
pub mod consensus;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod peer;
pub mod pow;

pub use block::{Block, ChainSnapshot, Transaction};
pub use chain::{valid_chain, valid_chain_with};
pub use config::LedgerConfig;
pub use consensus::{select_candidate, ChainTransport, ConsensusPolicy, PeerResponse};
pub use error::{LedgerError, PeerError};
pub use hash::sha256_hex;
pub use ledger::Ledger;
pub use peer::{PeerAddress, PeerSet};
pub use pow::{proof_of_work, search_range, valid_proof, ProofOfWork, SearchResult, SeedStrategy};
