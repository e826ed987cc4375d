//! Cluster configurations.
//!
//! A [`Configuration`] is the set of peers forming a raft group at one point
//! in the log. It is a plain value: copied freely and rebuilt on every
//! membership change.
//!
//! Peers are kept in a sorted set so the canonical string and ballot peer
//! lists come out in a deterministic order. Only membership and equality
//! matter for correctness.
//!
//! # Usage
//!
//! ```rust
//! use concord_raft::configuration::Configuration;
//!
//! let old: Configuration = "1.1.1.1:8100,1.1.1.2:8100,1.1.1.3:8100".parse().unwrap();
//! let new: Configuration = "1.1.1.1:8100,1.1.1.2:8100,1.1.1.4:8100".parse().unwrap();
//!
//! let (added, removed) = new.diff(&old);
//! assert_eq!(added.to_string(), "1.1.1.4:8100:0:0");
//! assert_eq!(removed.to_string(), "1.1.1.3:8100:0:0");
//! ```

use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use concord_common::PEER_SEPARATOR;
use serde::{Deserialize, Serialize};

use crate::peer::PeerId;
use crate::{RaftError, Result};

/// A set of peers.
///
/// The set never holds two peers sharing an endpoint and replica index:
/// inserting a duplicate slot is a no-op, whatever its role.
#[derive(Debug, Clone, Default, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    peers: BTreeSet<PeerId>,
}

impl Configuration {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns true if there are no peers.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Removes all peers.
    pub fn reset(&mut self) {
        self.peers.clear();
    }

    /// Iterates over the peers in order.
    pub fn iter(&self) -> btree_set::Iter<'_, PeerId> {
        self.peers.iter()
    }

    /// Returns the peers as an ordered vector.
    pub fn list_peers(&self) -> Vec<PeerId> {
        self.peers.iter().cloned().collect()
    }

    /// Adds every peer of this configuration to `peers`.
    pub fn append_peers(&self, peers: &mut BTreeSet<PeerId>) {
        peers.extend(self.peers.iter().cloned());
    }

    /// Adds a peer.
    ///
    /// Returns true if the peer was not already present.
    pub fn add(&mut self, peer: PeerId) -> bool {
        self.peers.insert(peer)
    }

    /// Removes a peer.
    ///
    /// Returns true if the peer was present.
    pub fn remove(&mut self, peer: &PeerId) -> bool {
        self.peers.remove(peer)
    }

    /// Returns true if the peer is a member.
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer)
    }

    /// Returns true if every peer in `peers` is a member.
    pub fn contains_all(&self, peers: &[PeerId]) -> bool {
        peers.iter().all(|p| self.peers.contains(p))
    }

    /// Returns true if both configurations hold the same peers with the
    /// same roles.
    pub fn equals(&self, other: &Configuration) -> bool {
        self.len() == other.len()
            && self
                .peers
                .iter()
                .all(|p| other.peers.get(p).is_some_and(|q| q.role == p.role))
    }

    /// Returns true if `peers`, taken as a set, equals this configuration.
    pub fn equals_peers(&self, peers: &[PeerId]) -> bool {
        if !self.contains_all(peers) {
            return false;
        }
        let distinct: BTreeSet<&PeerId> = peers.iter().collect();
        distinct.len() == self.peers.len()
    }

    /// Computes the difference against `other`.
    ///
    /// Returns `(included, excluded)`: the peers only in `self`, and the
    /// peers only in `other`. When `self` is a new configuration and `other`
    /// the old one, these are the added and removed peers.
    pub fn diff(&self, other: &Configuration) -> (Configuration, Configuration) {
        let included = self.peers.difference(&other.peers).cloned().collect();
        let excluded = other.peers.difference(&self.peers).cloned().collect();
        (included, excluded)
    }

    /// Replaces this configuration with the one parsed from `s`.
    ///
    /// On error the configuration is left empty.
    pub fn parse_from(&mut self, s: &str) -> Result<()> {
        self.reset();
        *self = s.parse()?;
        Ok(())
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl FromStr for Configuration {
    type Err = RaftError;

    /// Parses comma separated peer strings. Empty segments are skipped.
    fn from_str(s: &str) -> Result<Self> {
        s.split(PEER_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                PeerId::parse(segment).map_err(|err| {
                    RaftError::InvalidConfiguration(format!("{s:?}: {err}"))
                })
            })
            .collect()
    }
}

impl FromIterator<PeerId> for Configuration {
    fn from_iter<I: IntoIterator<Item = PeerId>>(iter: I) -> Self {
        Self {
            peers: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<PeerId>> for Configuration {
    fn from(peers: Vec<PeerId>) -> Self {
        peers.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a Configuration {
    type Item = &'a PeerId;
    type IntoIter = btree_set::Iter<'a, PeerId>;

    fn into_iter(self) -> Self::IntoIter {
        self.peers.iter()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, peer) in self.peers.iter().enumerate() {
            if i > 0 {
                write!(f, "{PEER_SEPARATOR}")?;
            }
            write!(f, "{peer}")?;
        }
        Ok(())
    }
}
