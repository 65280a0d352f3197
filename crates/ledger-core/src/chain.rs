//! End-to-end chain validation.

use tracing::debug;

use crate::block::Block;
use crate::pow::{valid_proof, DEFAULT_LEADING_ZEROS};

/// Validate a chain at the default difficulty.
pub fn valid_chain(chain: &[Block]) -> bool {
    valid_chain_with(chain, DEFAULT_LEADING_ZEROS)
}

/// Validate a chain at the given difficulty.
///
/// Walks every adjacent pair and checks that:
/// - indices start at 0 and increase by one
/// - `previous_hash` equals the digest of the preceding block
/// - the proof solves the puzzle for the preceding block's proof
///
/// Stops at the first violation. A genesis-only chain is valid; an empty
/// chain is not.
pub fn valid_chain_with(chain: &[Block], leading_zeros: usize) -> bool {
    let Some(genesis) = chain.first() else {
        return false;
    };
    if genesis.index != 0 {
        return false;
    }

    for pair in chain.windows(2) {
        let (last_block, block) = (&pair[0], &pair[1]);

        if block.index != last_block.index + 1 {
            debug!(index = block.index, "non-contiguous block index");
            return false;
        }

        match last_block.hash() {
            Ok(hash) if hash == block.previous_hash => {}
            _ => {
                debug!(index = block.index, "previous_hash does not match");
                return false;
            }
        }

        if !valid_proof(last_block.proof, block.proof, leading_zeros) {
            debug!(index = block.index, "invalid proof");
            return false;
        }
    }

    true
}
