//! View types handed to JavaScript.

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Mining statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiningStats {
    /// Total hashes computed.
    pub total_hashes: u64,
    /// Current hash rate (hashes per second).
    pub hash_rate: f64,
    /// Number of blocks this node has sealed.
    pub blocks_mined: u32,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: f64,
}

/// Serializer for view types. Proofs above 2^53 become `BigInt`s instead of
/// failing.
fn js_serializer() -> serde_wasm_bindgen::Serializer {
    serde_wasm_bindgen::Serializer::new().serialize_large_number_types_as_bigints(true)
}

impl MiningStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update hash rate based on elapsed time.
    pub fn update_hash_rate(&mut self) {
        if self.elapsed_ms > 0.0 {
            self.hash_rate = (self.total_hashes as f64) / (self.elapsed_ms / 1000.0);
        }
    }

    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        if self.hash_rate >= 1_000_000.0 {
            format!("{:.2} MH/s", self.hash_rate / 1_000_000.0)
        } else if self.hash_rate >= 1_000.0 {
            format!("{:.2} KH/s", self.hash_rate / 1_000.0)
        } else {
            format!("{:.2} H/s", self.hash_rate)
        }
    }

    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        self.serialize(&js_serializer())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
    }
}

/// Summary of the local ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Number of blocks.
    pub length: usize,
    /// Digest of the head block.
    pub head_hash: String,
    /// Proof stored in the head block.
    pub head_proof: u64,
    /// Transactions waiting for the next block.
    pub pending: usize,
    /// Registered peers.
    pub peers: Vec<String>,
    /// Required zero hex digits.
    pub difficulty: usize,
}

impl ChainInfo {
    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        self.serialize(&js_serializer())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
    }
}

/// Result of one mining batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiningResultInfo {
    /// Whether a block was sealed.
    pub block_found: bool,
    /// Index of the sealed block (if any).
    pub block_index: Option<u64>,
    /// The winning proof (if found).
    pub proof: Option<u64>,
    /// Puzzle hash of the winning proof, hex encoded (if found).
    pub hash: Option<String>,
    /// Whether the head moved before the proof could be used.
    pub stale: bool,
    /// Hashes computed in this batch.
    pub hashes_computed: u64,
}

impl MiningResultInfo {
    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        self.serialize(&js_serializer())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
    }
}

/// Convert a ledger value to a plain JS object through its JSON encoding.
///
/// Transactions are JSON objects with arbitrary keys; going through text
/// keeps them plain objects instead of `Map`s.
pub fn to_js_json<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))?;
    js_sys::JSON::parse(&json)
}
