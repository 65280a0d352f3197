//! Peer address parsing and the set of known peers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Path a peer serves its full chain on.
pub const CHAIN_PATH: &str = "/chain";

/// The host-identifying part of a peer URL: `host` or `host:port`.
///
/// `http://192.168.1.100:5000/` and `192.168.1.100:5000` both parse to
/// `192.168.1.100:5000`. Hosts are lowercased so the same peer cannot be
/// registered twice under different spellings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Parse a reachable peer address.
    pub fn parse(address: &str) -> Result<Self, LedgerError> {
        let invalid = || LedgerError::InvalidAddress(address.to_string());
        let trimmed = address.trim();

        let rest = match trimmed.split_once("://") {
            Some((scheme, rest)) => {
                let scheme_ok = scheme
                    .chars()
                    .next()
                    .map_or(false, |c| c.is_ascii_alphabetic())
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
                if !scheme_ok {
                    return Err(invalid());
                }
                rest
            }
            None => trimmed,
        };

        // Authority ends at the first path, query or fragment delimiter
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let authority = &rest[..end];

        if authority.is_empty() || authority.contains('@') {
            return Err(invalid());
        }

        let (host, port) = split_host_port(authority).ok_or_else(invalid)?;

        // Store the numeric port so `h:05000` and `h:5000` are one peer
        let port = match port {
            Some(port) if port.bytes().all(|b| b.is_ascii_digit()) => {
                Some(port.parse::<u16>().map_err(|_| invalid())?)
            }
            Some(_) => return Err(invalid()),
            None => None,
        };

        let host = host.to_ascii_lowercase();
        let netloc = match port {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        };

        Ok(PeerAddress(netloc))
    }

    /// The stored `host[:port]` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL the peer serves its chain on.
    pub fn chain_url(&self) -> String {
        format!("http://{}{}", self.0, CHAIN_PATH)
    }
}

/// Split an authority into host and optional port, validating the host.
fn split_host_port(authority: &str) -> Option<(&str, Option<&str>)> {
    if let Some(inner) = authority.strip_prefix('[') {
        // Bracketed IPv6 literal
        let close = inner.find(']')?;
        let literal = &inner[..close];
        let literal_ok = !literal.is_empty()
            && literal
                .chars()
                .all(|c| c.is_ascii_hexdigit() || c == ':' || c == '.');
        if !literal_ok {
            return None;
        }
        let host = &authority[..close + 2];
        let after = &authority[close + 2..];
        return match after.strip_prefix(':') {
            Some(port) => Some((host, Some(port))),
            None if after.is_empty() => Some((host, None)),
            None => None,
        };
    }

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    };

    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));

    host_ok.then_some((host, port))
}

impl FromStr for PeerAddress {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PeerAddress::parse(s)
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PeerAddress::parse(&value)
    }
}

impl From<PeerAddress> for String {
    fn from(address: PeerAddress) -> Self {
        address.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Known peers. Iterates in sorted order so resolution is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSet {
    peers: BTreeSet<PeerAddress>,
}

impl PeerSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer. Returns `false` if it was already known.
    pub fn insert(&mut self, peer: PeerAddress) -> bool {
        self.peers.insert(peer)
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Copy the peers out, e.g. to fetch from them without holding a lock.
    pub fn to_vec(&self) -> Vec<PeerAddress> {
        self.peers.iter().cloned().collect()
    }
}
