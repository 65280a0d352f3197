//! Ledger node controller exposed to JavaScript.

use std::cell::{Cell, RefCell};

use ledger_core::{
    search_range, Ledger, LedgerConfig, LedgerError, PeerResponse, SeedStrategy, Transaction,
};
use wasm_bindgen::prelude::*;

use crate::api::PeerClient;
use crate::state::{to_js_json, ChainInfo, MiningResultInfo, MiningStats};

/// Proofs found here start below 2^52 so they survive a round trip through
/// JS numbers.
const JS_SEED_MASK: u64 = (1 << 52) - 1;

fn js_err(err: LedgerError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[cfg(target_arch = "wasm32")]
fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

#[cfg(not(target_arch = "wasm32"))]
fn now_ms() -> u64 {
    ledger_core::block::current_timestamp()
}

/// The main node controller.
///
/// Every method takes `&self` so the JS mining loop can keep calling
/// [`Node::mine_batch`] while a [`Node::resolve_conflicts`] call is waiting
/// on peers. The ledger locks internally; the mining bookkeeping lives in
/// cells.
#[wasm_bindgen]
pub struct Node {
    /// The local ledger.
    ledger: Ledger,
    /// Client used to reach peers.
    client: PeerClient,
    /// Mining statistics.
    stats: RefCell<MiningStats>,
    /// Start time of mining.
    start_time: Cell<f64>,
    /// Whether mining is active.
    is_mining: Cell<bool>,
    /// Next candidate proof and the head index it is searching for.
    cursor: Cell<Option<(u64, u64)>>,
}

#[wasm_bindgen]
impl Node {
    /// Create a node.
    ///
    /// # Arguments
    /// * `config_json` - Optional JSON ledger configuration; omitted fields
    ///   take their defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<Node, JsValue> {
        let config = match config_json {
            Some(json) => LedgerConfig::from_json(&json).map_err(js_err)?,
            None => LedgerConfig::default(),
        };
        let timeout_ms = u32::try_from(config.peer_timeout().as_millis()).unwrap_or(u32::MAX);
        let ledger = Ledger::new_at(config, now_ms()).map_err(js_err)?;

        Ok(Node {
            ledger,
            client: PeerClient::new(timeout_ms),
            stats: RefCell::new(MiningStats::new()),
            start_time: Cell::new(0.0),
            is_mining: Cell::new(false),
            cursor: Cell::new(None),
        })
    }

    /// Queue a transaction. Returns the index of the block that will hold it.
    #[wasm_bindgen]
    pub fn new_transaction(&self, payload: JsValue) -> Result<u64, JsValue> {
        let value: serde_json::Value = serde_wasm_bindgen::from_value(payload)
            .map_err(|e| JsValue::from_str(&format!("Invalid transaction: {}", e)))?;
        let transaction = Transaction::from_value(value).map_err(js_err)?;
        self.ledger.new_transaction(transaction).map_err(js_err)
    }

    /// Search a batch of candidate proofs for the current head.
    ///
    /// Seals a block as soon as a proof is found. Call repeatedly from the
    /// event loop to mine without blocking the page.
    #[wasm_bindgen]
    pub fn mine_batch(&self, batch_size: u32) -> Result<JsValue, JsValue> {
        let head = self.ledger.last_block().map_err(js_err)?;

        // Restart the search whenever the head changes
        let start = match self.cursor.get() {
            Some((head_index, next)) if head_index == head.index => next,
            _ => self.fresh_seed(),
        };

        let result = search_range(
            head.proof,
            start,
            u64::from(batch_size),
            self.ledger.config().difficulty,
        );

        self.cursor
            .set(Some((head.index, start.wrapping_add(result.hashes_computed))));
        {
            let mut stats = self.stats.borrow_mut();
            stats.total_hashes += result.hashes_computed;
            let start_time = self.start_time.get();
            if start_time > 0.0 {
                stats.elapsed_ms = js_sys::Date::now() - start_time;
                stats.update_hash_rate();
            }
        }

        let mut info = MiningResultInfo {
            proof: result.proof,
            hash: result.hash.map(hex::encode),
            hashes_computed: result.hashes_computed,
            ..MiningResultInfo::default()
        };

        if let Some(proof) = result.proof {
            match self.ledger.submit_proof(head.index, proof, now_ms()) {
                Ok(block) => {
                    info.block_found = true;
                    info.block_index = Some(block.index);
                    self.stats.borrow_mut().blocks_mined += 1;
                    self.cursor.set(None);
                }
                Err(LedgerError::StaleProof) => {
                    info.stale = true;
                    self.cursor.set(None);
                }
                Err(err) => return Err(js_err(err)),
            }
        }

        info.to_js()
    }

    /// Register a peer by URL or `host:port`. Returns the stored form.
    #[wasm_bindgen]
    pub fn register_node(&self, address: &str) -> Result<String, JsValue> {
        let peer = self.ledger.register_node(address).map_err(js_err)?;
        console_log(&format!("Registered peer {}", peer));
        Ok(peer.to_string())
    }

    /// Registered peers.
    #[wasm_bindgen]
    pub fn peers(&self) -> Vec<String> {
        self.ledger.peers().iter().map(|p| p.to_string()).collect()
    }

    /// Fetch every peer's chain and adopt the longest valid one.
    ///
    /// Unreachable or malformed peers are skipped. Resolves to whether the
    /// local chain was replaced.
    pub async fn resolve_conflicts(&self) -> Result<bool, JsValue> {
        let client = self.client;
        let mut responses: Vec<PeerResponse> = Vec::new();
        for peer in self.ledger.peers() {
            let response = client.fetch_chain(&peer).await;
            if let Err(err) = &response {
                console_log(&format!("Skipping peer: {}", err));
            }
            responses.push((peer, response));
        }

        let replaced = self.ledger.adopt_best(responses);
        if replaced {
            console_log(&format!("Replaced chain, new length {}", self.ledger.len()));
        }
        Ok(replaced)
    }

    /// The head block.
    #[wasm_bindgen]
    pub fn last_block(&self) -> Result<JsValue, JsValue> {
        let block = self.ledger.last_block().map_err(js_err)?;
        to_js_json(&block)
    }

    /// The full chain as `{ length, chain }`, the shape peers serve.
    #[wasm_bindgen]
    pub fn chain(&self) -> Result<JsValue, JsValue> {
        to_js_json(&self.ledger.snapshot())
    }

    /// The full chain as JSON text, for serving to peers verbatim.
    #[wasm_bindgen]
    pub fn chain_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.ledger.snapshot())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Summary of the local ledger.
    #[wasm_bindgen]
    pub fn info(&self) -> Result<JsValue, JsValue> {
        let head = self.ledger.last_block().map_err(js_err)?;
        let info = ChainInfo {
            length: self.ledger.len(),
            head_hash: head.hash().map_err(js_err)?,
            head_proof: head.proof,
            pending: self.ledger.pending_transactions().len(),
            peers: self.peers(),
            difficulty: self.ledger.config().difficulty,
        };
        info.to_js()
    }

    /// Whether the local chain validates at the configured difficulty.
    #[wasm_bindgen]
    pub fn is_valid(&self) -> bool {
        self.ledger.valid_chain(&self.ledger.chain())
    }

    /// Start mining.
    #[wasm_bindgen]
    pub fn start_mining(&self) {
        self.is_mining.set(true);
        self.start_time.set(js_sys::Date::now());
    }

    /// Stop mining.
    #[wasm_bindgen]
    pub fn stop_mining(&self) {
        self.is_mining.set(false);
    }

    /// Check if mining is active.
    #[wasm_bindgen(getter)]
    pub fn is_mining(&self) -> bool {
        self.is_mining.get()
    }

    /// Get current mining statistics.
    #[wasm_bindgen]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        self.stats.borrow().to_js()
    }

    /// Get the formatted hash rate.
    #[wasm_bindgen]
    pub fn get_hash_rate_display(&self) -> String {
        self.stats.borrow().format_hash_rate()
    }

    /// Reset mining statistics and the search cursor.
    #[wasm_bindgen]
    pub fn reset_stats(&self) {
        self.stats.replace(MiningStats::new());
        self.cursor.set(None);
        self.start_time.set(0.0);
        self.is_mining.set(false);
    }
}

impl Node {
    /// First candidate for a new search.
    fn fresh_seed(&self) -> u64 {
        let seed = self.ledger.config().seed;
        match seed {
            SeedStrategy::Fixed(value) => value,
            SeedStrategy::Random => seed.start_value() & JS_SEED_MASK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_seed_used_verbatim() {
        let node = Node::new(Some(r#"{"seed": {"fixed": 35000}}"#.to_string())).unwrap();
        assert_eq!(node.fresh_seed(), 35000);
    }

    #[test]
    fn test_random_seed_is_js_safe() {
        let node = Node::new(None).unwrap();
        for _ in 0..16 {
            assert!(node.fresh_seed() <= JS_SEED_MASK);
        }
    }

    #[test]
    fn test_peer_timeout_from_config() {
        let node = Node::new(Some(r#"{"peer_timeout_ms": 1500}"#.to_string())).unwrap();
        assert_eq!(node.client.timeout_ms(), 1500);
    }

    #[test]
    fn test_genesis_is_stamped_at_creation() {
        let before = now_ms();
        let node = Node::new(None).unwrap();
        let genesis = node.ledger.last_block().unwrap();
        assert!(genesis.timestamp >= before);
        assert!(genesis.timestamp > 0);
    }

    #[test]
    fn test_stats_reset_through_shared_reference() {
        let node = Node::new(None).unwrap();
        node.stats.borrow_mut().total_hashes = 42;
        node.cursor.set(Some((0, 7)));
        node.is_mining.set(true);

        let shared = &node;
        shared.reset_stats();

        assert_eq!(node.stats.borrow().total_hashes, 0);
        assert_eq!(node.cursor.get(), None);
        assert!(!node.is_mining());
    }
}

/// Log to the browser console.
#[wasm_bindgen]
pub fn console_log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}
