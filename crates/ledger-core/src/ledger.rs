//! The ledger: chain, pending transactions and known peers.
//!
//! All chain and buffer mutations happen under one lock, so concurrent
//! callers can share a `Ledger` behind an `Arc`. Proof searches and peer
//! fetches run without holding it; only the final seal or swap does.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::block::{current_timestamp, Block, ChainSnapshot, Transaction};
use crate::chain::valid_chain_with;
use crate::config::LedgerConfig;
use crate::consensus::{fetch_all, select_candidate, ChainTransport, PeerResponse};
use crate::error::LedgerError;
use crate::peer::{PeerAddress, PeerSet};
use crate::pow::{valid_proof, ProofOfWork};

#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

impl LedgerState {
    fn last_block(&self) -> Result<&Block, LedgerError> {
        self.chain.last().ok_or(LedgerError::EmptyChain)
    }

    /// Append a block holding every pending transaction.
    fn seal(
        &mut self,
        proof: u64,
        previous_hash: Option<String>,
        timestamp: u64,
    ) -> Result<Block, LedgerError> {
        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => self.last_block()?.hash()?,
        };

        let block = Block {
            index: self.chain.len() as u64,
            timestamp,
            transactions: std::mem::take(&mut self.pending),
            proof,
            previous_hash,
        };

        self.chain.push(block.clone());
        Ok(block)
    }
}

/// A node's in-memory ledger.
#[derive(Debug)]
pub struct Ledger {
    config: LedgerConfig,
    state: Mutex<LedgerState>,
    peers: Mutex<PeerSet>,
}

impl Ledger {
    /// Create a ledger holding only the genesis block.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        Ledger::new_at(config, current_timestamp())
    }

    /// Same as [`Ledger::new`] with an explicit genesis timestamp, for hosts
    /// without a system clock.
    pub fn new_at(config: LedgerConfig, genesis_timestamp: u64) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Ledger::with_genesis(config, genesis_timestamp))
    }

    fn with_genesis(config: LedgerConfig, timestamp: u64) -> Self {
        // Genesis is a trust anchor: its proof is not checked against the puzzle
        let genesis = Block {
            index: 0,
            timestamp,
            transactions: Vec::new(),
            proof: config.genesis_proof,
            previous_hash: config.genesis_previous_hash.clone(),
        };
        debug!(proof = genesis.proof, "genesis block created");

        Ledger {
            config,
            state: Mutex::new(LedgerState {
                chain: vec![genesis],
                pending: Vec::new(),
            }),
            peers: Mutex::new(PeerSet::new()),
        }
    }

    /// The configuration this ledger was built with.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// A proof-of-work engine matching this ledger's configuration.
    pub fn proof_of_work(&self) -> ProofOfWork {
        ProofOfWork::from_config(&self.config)
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn peer_set(&self) -> MutexGuard<'_, PeerSet> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a peer by URL or `host:port`. Registering twice is a no-op.
    pub fn register_node(&self, address: &str) -> Result<PeerAddress, LedgerError> {
        let peer = PeerAddress::parse(address)?;
        if self.peer_set().insert(peer.clone()) {
            info!(%peer, "registered peer");
        } else {
            debug!(%peer, "peer already registered");
        }
        Ok(peer)
    }

    /// Known peers, in sorted order.
    pub fn peers(&self) -> Vec<PeerAddress> {
        self.peer_set().to_vec()
    }

    /// Queue a transaction. Returns the index of the block that will hold it.
    pub fn new_transaction(&self, transaction: Transaction) -> Result<u64, LedgerError> {
        let mut state = self.state();
        let next_index = state.last_block()?.index + 1;
        state.pending.push(transaction);
        debug!(next_index, pending = state.pending.len(), "transaction queued");
        Ok(next_index)
    }

    /// Seal the pending transactions into a new block stamped with the
    /// current time.
    ///
    /// `previous_hash` defaults to the digest of the current head. The proof
    /// is recorded as given; use [`Ledger::submit_proof`] to have it checked.
    /// There is no clock on wasm32, where blocks sealed here are stamped 0;
    /// use [`Ledger::new_block_at`] there.
    pub fn new_block(
        &self,
        proof: u64,
        previous_hash: Option<String>,
    ) -> Result<Block, LedgerError> {
        self.new_block_at(proof, previous_hash, current_timestamp())
    }

    /// Same as [`Ledger::new_block`] with an explicit timestamp.
    pub fn new_block_at(
        &self,
        proof: u64,
        previous_hash: Option<String>,
        timestamp: u64,
    ) -> Result<Block, LedgerError> {
        let block = self.state().seal(proof, previous_hash, timestamp)?;
        info!(
            index = block.index,
            proof = block.proof,
            transactions = block.transactions.len(),
            "sealed block"
        );
        Ok(block)
    }

    /// Seal a block with a proof found for the head at `head_index`.
    ///
    /// Fails with [`LedgerError::StaleProof`] if the head has moved and with
    /// [`LedgerError::InvalidProof`] if the proof does not solve the puzzle.
    pub fn submit_proof(
        &self,
        head_index: u64,
        proof: u64,
        timestamp: u64,
    ) -> Result<Block, LedgerError> {
        let mut state = self.state();
        let head = state.last_block()?;
        if head.index != head_index {
            debug!(expected = head_index, actual = head.index, "head moved during search");
            return Err(LedgerError::StaleProof);
        }

        let last_proof = head.proof;
        if !valid_proof(last_proof, proof, self.config.difficulty) {
            return Err(LedgerError::InvalidProof { last_proof, proof });
        }

        let block = state.seal(proof, None, timestamp)?;
        drop(state);

        info!(
            index = block.index,
            proof = block.proof,
            transactions = block.transactions.len(),
            "mined block"
        );
        Ok(block)
    }

    /// Find a proof for the current head and seal the pending transactions.
    ///
    /// The search runs without the lock held.
    pub fn mine(&self, pow: &ProofOfWork) -> Result<Block, LedgerError> {
        let (head_index, last_proof) = {
            let state = self.state();
            let head = state.last_block()?;
            (head.index, head.proof)
        };

        let proof = pow.solve(last_proof)?;
        self.submit_proof(head_index, proof, current_timestamp())
    }

    /// The most recently appended block.
    pub fn last_block(&self) -> Result<Block, LedgerError> {
        self.state().last_block().cloned()
    }

    /// A copy of the full chain.
    pub fn chain(&self) -> Vec<Block> {
        self.state().chain.clone()
    }

    /// The chain in the shape peers exchange it.
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot::of(self.chain())
    }

    /// Number of blocks in the chain.
    pub fn len(&self) -> usize {
        self.state().chain.len()
    }

    /// Whether the chain is empty. Never true after construction.
    pub fn is_empty(&self) -> bool {
        self.state().chain.is_empty()
    }

    /// Transactions waiting for the next block.
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.state().pending.clone()
    }

    /// Validate a chain at this ledger's difficulty.
    pub fn valid_chain(&self, chain: &[Block]) -> bool {
        valid_chain_with(chain, self.config.difficulty)
    }

    /// Replace the local chain with `candidate` if it is valid and strictly
    /// longer. Returns whether the swap happened.
    ///
    /// Pending transactions are kept.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> Result<bool, LedgerError> {
        if !self.valid_chain(&candidate) {
            return Err(LedgerError::InvalidChain);
        }
        Ok(self.swap_if_longer(candidate))
    }

    fn swap_if_longer(&self, candidate: Vec<Block>) -> bool {
        let mut state = self.state();
        let (old_length, new_length) = (state.chain.len(), candidate.len());

        // The local chain may have grown while peers were being fetched
        if new_length <= old_length {
            debug!(old_length, new_length, "candidate no longer longer than local chain");
            return false;
        }

        state.chain = candidate;
        drop(state);

        info!(old_length, new_length, "replaced local chain");
        true
    }

    /// Apply the configured consensus policy to already-fetched responses.
    ///
    /// Candidates are validated before the lock is taken. Returns whether
    /// the local chain was replaced.
    pub fn adopt_best<I>(&self, responses: I) -> bool
    where
        I: IntoIterator<Item = PeerResponse>,
    {
        let local_length = self.len();
        let candidate = select_candidate(
            responses,
            local_length,
            self.config.difficulty,
            self.config.policy,
        );
        match candidate {
            Some(candidate) => self.swap_if_longer(candidate),
            None => false,
        }
    }

    /// Fetch every known peer's chain and adopt the longest valid one.
    ///
    /// Unreachable peers and malformed responses are skipped. Returns
    /// whether the local chain was replaced.
    pub fn resolve_conflicts<T>(&self, transport: &T) -> bool
    where
        T: ChainTransport + ?Sized,
    {
        let peers = self.peers();
        if peers.is_empty() {
            warn!("no peers registered, nothing to resolve");
            return false;
        }

        self.adopt_best(fetch_all(transport, peers))
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::with_genesis(LedgerConfig::default(), current_timestamp())
    }
}
