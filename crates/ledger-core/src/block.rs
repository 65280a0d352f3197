//! Block and transaction types and their canonical encoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LedgerError;
use crate::hash::digest_of;

/// An opaque transaction payload.
///
/// The ledger never inspects the fields; it only carries them into a block.
/// Keys encode in sorted order, which keeps block digests stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transaction(pub Map<String, Value>);

impl Transaction {
    /// Build a transaction from any JSON value, rejecting non-objects.
    pub fn from_value(value: Value) -> Result<Self, LedgerError> {
        match value {
            Value::Object(fields) => Ok(Transaction(fields)),
            other => Err(LedgerError::Encoding(format!(
                "transaction must be an object, got {}",
                other
            ))),
        }
    }

    /// Look up a single field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// A sealed block.
///
/// Field order is the canonical encoding order:
/// `index, timestamp, transactions, proof, previous_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, 0 for genesis.
    pub index: u64,
    /// Creation time (Unix milliseconds).
    pub timestamp: u64,
    /// Transactions pending when the block was sealed, in submission order.
    pub transactions: Vec<Transaction>,
    /// Proof-of-work solution accepted for this block.
    pub proof: u64,
    /// Digest of the preceding block, or the sentinel for genesis.
    pub previous_hash: String,
}

impl Block {
    /// Compute the block digest over its canonical encoding.
    pub fn hash(&self) -> Result<String, LedgerError> {
        digest_of(self)
    }

    /// Canonical byte encoding, as hashed and as sent over the wire.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A chain as reported by a peer: `{ "length": n, "chain": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// Number of blocks the peer claims to hold.
    pub length: usize,
    /// The blocks themselves, genesis first.
    pub chain: Vec<Block>,
}

impl ChainSnapshot {
    /// Snapshot a local chain.
    pub fn of(chain: Vec<Block>) -> Self {
        ChainSnapshot {
            length: chain.len(),
            chain,
        }
    }
}

/// Get the current Unix timestamp in milliseconds.
#[cfg(not(target_arch = "wasm32"))]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(target_arch = "wasm32")]
pub fn current_timestamp() -> u64 {
    // No system clock on wasm32-unknown-unknown; hosts pass JS time to
    // `Ledger::new_block_at` instead.
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(value: Value) -> Transaction {
        Transaction::from_value(value).unwrap()
    }

    fn sample_block() -> Block {
        Block {
            index: 1,
            timestamp: 1_700_000_000_000,
            transactions: vec![tx(json!({"sender": "a", "recipient": "b", "amount": 5}))],
            proof: 35293,
            previous_hash: "1".to_string(),
        }
    }

    #[test]
    fn test_canonical_field_order() {
        let block = sample_block();
        let encoded = String::from_utf8(block.canonical_bytes().unwrap()).unwrap();

        let index = encoded.find("\"index\"").unwrap();
        let timestamp = encoded.find("\"timestamp\"").unwrap();
        let transactions = encoded.find("\"transactions\"").unwrap();
        let proof = encoded.find("\"proof\"").unwrap();
        let previous_hash = encoded.find("\"previous_hash\"").unwrap();

        assert!(index < timestamp);
        assert!(timestamp < transactions);
        assert!(transactions < proof);
        assert!(proof < previous_hash);

        // Transaction keys are sorted regardless of insertion order
        assert!(encoded.contains(r#"{"amount":5,"recipient":"b","sender":"a"}"#));
    }

    #[test]
    fn test_block_hash_deterministic() {
        let block = sample_block();
        let first = block.hash().unwrap();
        let second = block.hash().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_block_hash_changes_with_any_field() {
        let block = sample_block();
        let original = block.hash().unwrap();

        let mut changed = block.clone();
        changed.index = 2;
        assert_ne!(changed.hash().unwrap(), original);

        let mut changed = block.clone();
        changed.timestamp += 1;
        assert_ne!(changed.hash().unwrap(), original);

        let mut changed = block.clone();
        changed.transactions.clear();
        assert_ne!(changed.hash().unwrap(), original);

        let mut changed = block.clone();
        changed.proof += 1;
        assert_ne!(changed.hash().unwrap(), original);

        let mut changed = block;
        changed.previous_hash = "2".to_string();
        assert_ne!(changed.hash().unwrap(), original);
    }

    #[test]
    fn test_transaction_rejects_non_object() {
        assert!(Transaction::from_value(json!([1, 2, 3])).is_err());
        assert!(Transaction::from_value(json!("text")).is_err());
        assert!(Transaction::from_value(json!({})).is_ok());
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let snapshot = ChainSnapshot::of(vec![sample_block()]);
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["length"], json!(1));
        assert_eq!(value["chain"][0]["proof"], json!(35293));

        let decoded: ChainSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
