//! Longest-valid-chain consensus.
//!
//! The resolver never performs I/O itself. Chains are fetched through a
//! [`ChainTransport`], or fetched by the host and handed over as
//! [`PeerResponse`]s, and then judged by [`select_candidate`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::block::{Block, ChainSnapshot};
use crate::chain::valid_chain_with;
use crate::error::PeerError;
use crate::peer::PeerAddress;

/// Which peer chain to adopt when several beat the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusPolicy {
    /// Scan every peer and adopt the longest valid chain. Among equally long
    /// chains the first one seen wins.
    #[default]
    GlobalLongest,
    /// Adopt the first valid chain longer than the local one and stop.
    FirstLonger,
}

/// Fetches a peer's chain.
///
/// Implementations should bound each call with a timeout and report any
/// failure as a [`PeerError`].
pub trait ChainTransport {
    /// Fetch the chain `peer` currently holds.
    fn fetch_chain(&self, peer: &PeerAddress) -> Result<ChainSnapshot, PeerError>;
}

impl<T: ChainTransport + ?Sized> ChainTransport for &T {
    fn fetch_chain(&self, peer: &PeerAddress) -> Result<ChainSnapshot, PeerError> {
        (**self).fetch_chain(peer)
    }
}

/// Outcome of fetching one peer's chain.
pub type PeerResponse = (PeerAddress, Result<ChainSnapshot, PeerError>);

/// Pick the chain to adopt, if any.
///
/// A response qualifies when its reported length matches its block count,
/// beats the best length seen so far and the chain validates at
/// `leading_zeros`. Failed or unqualified responses are skipped.
pub fn select_candidate<I>(
    responses: I,
    local_length: usize,
    leading_zeros: usize,
    policy: ConsensusPolicy,
) -> Option<Vec<Block>>
where
    I: IntoIterator<Item = PeerResponse>,
{
    let mut best_length = local_length;
    let mut candidate = None;

    for (peer, response) in responses {
        let snapshot = match response {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%peer, error = %err, "skipping peer");
                continue;
            }
        };

        if snapshot.length != snapshot.chain.len() {
            let err = PeerError::MalformedResponse {
                peer: peer.to_string(),
                reason: format!(
                    "reported length {} but sent {} blocks",
                    snapshot.length,
                    snapshot.chain.len()
                ),
            };
            warn!(%peer, error = %err, "skipping peer");
            continue;
        }

        if snapshot.length <= best_length {
            debug!(%peer, length = snapshot.length, best_length, "peer chain not longer");
            continue;
        }

        if !valid_chain_with(&snapshot.chain, leading_zeros) {
            warn!(%peer, length = snapshot.length, "peer chain failed validation");
            continue;
        }

        debug!(%peer, length = snapshot.length, "new candidate chain");
        best_length = snapshot.length;
        candidate = Some(snapshot.chain);

        if policy == ConsensusPolicy::FirstLonger {
            break;
        }
    }

    candidate
}

/// Fetch every peer in turn through `transport`.
///
/// With [`ConsensusPolicy::FirstLonger`] fetching is lazy and stops once a
/// qualifying chain has been found.
pub fn fetch_all<'a, T, P>(transport: &'a T, peers: P) -> impl Iterator<Item = PeerResponse> + 'a
where
    T: ChainTransport + ?Sized,
    P: IntoIterator<Item = PeerAddress>,
    P::IntoIter: 'a,
{
    peers.into_iter().map(move |peer| {
        let response = transport.fetch_chain(&peer);
        (peer, response)
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::block::Transaction;
    use crate::pow::{ProofOfWork, SeedStrategy};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory transport serving canned responses.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        pub(crate) responses: HashMap<PeerAddress, Result<ChainSnapshot, PeerError>>,
        pub(crate) calls: RefCell<Vec<PeerAddress>>,
    }

    impl MockTransport {
        pub(crate) fn serve(&mut self, peer: &str, response: Result<ChainSnapshot, PeerError>) {
            self.responses.insert(PeerAddress::parse(peer).unwrap(), response);
        }
    }

    impl ChainTransport for MockTransport {
        fn fetch_chain(&self, peer: &PeerAddress) -> Result<ChainSnapshot, PeerError> {
            self.calls.borrow_mut().push(peer.clone());
            self.responses.get(peer).cloned().unwrap_or_else(|| {
                Err(PeerError::Unreachable {
                    peer: peer.to_string(),
                    reason: "connection refused".to_string(),
                })
            })
        }
    }

    /// Build a valid chain of `len` blocks at `difficulty`, tagged with `tag`
    /// so chains of equal length differ.
    pub(crate) fn build_chain(len: usize, difficulty: usize, tag: &str) -> Vec<Block> {
        let pow = ProofOfWork::new(difficulty).with_seed(SeedStrategy::Fixed(0));
        let mut chain = vec![Block {
            index: 0,
            timestamp: 0,
            transactions: Vec::new(),
            proof: 100,
            previous_hash: "1".to_string(),
        }];
        while chain.len() < len {
            let last = chain.last().unwrap();
            let tx = Transaction::from_value(json!({"tag": tag, "n": chain.len()})).unwrap();
            chain.push(Block {
                index: last.index + 1,
                timestamp: last.timestamp + 1,
                transactions: vec![tx],
                proof: pow.solve(last.proof).unwrap(),
                previous_hash: last.hash().unwrap(),
            });
        }
        chain
    }

    fn peer(s: &str) -> PeerAddress {
        PeerAddress::parse(s).unwrap()
    }

    #[test]
    fn test_global_longest_scans_all_peers() {
        let responses = vec![
            (peer("a:1"), Ok(ChainSnapshot::of(build_chain(5, 2, "a")))),
            (peer("b:1"), Ok(ChainSnapshot::of(build_chain(7, 2, "b")))),
            (peer("c:1"), Ok(ChainSnapshot::of(build_chain(6, 2, "c")))),
        ];

        let chosen = select_candidate(responses, 4, 2, ConsensusPolicy::GlobalLongest).unwrap();
        assert_eq!(chosen.len(), 7);
        assert_eq!(chosen[1].transactions[0].get("tag"), Some(&json!("b")));
    }

    #[test]
    fn test_first_longer_stops_early() {
        let responses = vec![
            (peer("a:1"), Ok(ChainSnapshot::of(build_chain(5, 2, "a")))),
            (peer("b:1"), Ok(ChainSnapshot::of(build_chain(7, 2, "b")))),
        ];

        let chosen = select_candidate(responses, 4, 2, ConsensusPolicy::FirstLonger).unwrap();
        assert_eq!(chosen.len(), 5);
    }

    #[test]
    fn test_equal_length_does_not_replace() {
        let responses = vec![(peer("a:1"), Ok(ChainSnapshot::of(build_chain(4, 2, "a"))))];
        assert!(select_candidate(responses, 4, 2, ConsensusPolicy::GlobalLongest).is_none());
    }

    #[test]
    fn test_length_mismatch_is_skipped() {
        let mut snapshot = ChainSnapshot::of(build_chain(5, 2, "a"));
        snapshot.length = 9;
        let responses = vec![(peer("a:1"), Ok(snapshot))];

        assert!(select_candidate(responses, 1, 2, ConsensusPolicy::GlobalLongest).is_none());
    }

    #[test]
    fn test_failures_are_skipped() {
        let responses = vec![
            (
                peer("down:1"),
                Err(PeerError::Unreachable {
                    peer: "down:1".to_string(),
                    reason: "timeout".to_string(),
                }),
            ),
            (
                peer("junk:1"),
                Err(PeerError::MalformedResponse {
                    peer: "junk:1".to_string(),
                    reason: "expected object".to_string(),
                }),
            ),
            (peer("ok:1"), Ok(ChainSnapshot::of(build_chain(3, 2, "ok")))),
        ];

        let chosen = select_candidate(responses, 1, 2, ConsensusPolicy::GlobalLongest).unwrap();
        assert_eq!(chosen.len(), 3);
    }

    #[test]
    fn test_fetch_all_is_lazy_under_first_longer() {
        let mut transport = MockTransport::default();
        transport.serve("a:1", Ok(ChainSnapshot::of(build_chain(3, 2, "a"))));
        transport.serve("b:1", Ok(ChainSnapshot::of(build_chain(4, 2, "b"))));

        let peers = vec![peer("a:1"), peer("b:1")];
        let chosen = select_candidate(
            fetch_all(&transport, peers),
            1,
            2,
            ConsensusPolicy::FirstLonger,
        )
        .unwrap();

        assert_eq!(chosen.len(), 3);
        assert_eq!(transport.calls.borrow().len(), 1);
    }
}
