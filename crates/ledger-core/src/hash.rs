//! SHA256 digests for blocks and proof-of-work guesses.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

/// Single SHA256 hash.
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// SHA256 of `data`, rendered as 64 lowercase hex characters.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Hash any serializable value over its canonical JSON encoding.
///
/// Struct fields encode in declaration order and JSON objects encode with
/// sorted keys, so the digest does not depend on how a value was built.
pub fn digest_of<T: Serialize + ?Sized>(value: &T) -> Result<String, LedgerError> {
    let encoded = serde_json::to_vec(value)?;
    Ok(sha256_hex(&encoded))
}

/// Count leading zero hex digits of a digest.
///
/// Each byte contributes two nibbles; counting stops at the first non-zero
/// nibble, so the result matches the number of `'0'` characters a hex
/// rendering of `hash` starts with.
pub fn count_leading_zero_nibbles(hash: &[u8; 32]) -> usize {
    let mut zeros = 0usize;
    for byte in hash.iter() {
        if *byte == 0 {
            zeros += 2;
        } else {
            if *byte < 0x10 {
                zeros += 1;
            }
            break;
        }
    }
    zeros
}
