//! Quorum ballots with joint consensus support.
//!
//! A [`Ballot`] tracks a single decision: one election round, or the commit
//! of one log entry. It is seeded with the effective configuration and fed
//! the peers that granted, and reports once a majority is reached.
//!
//! # Joint Consensus
//!
//! While a membership change is in flight the ballot tracks two
//! configurations and needs a majority in each:
//!
//! ```text
//!   old {A, B, C}     new {A, B, D}
//!   grants {A, D}  →  old 1/2, new 2/2  →  not granted
//!   grants {A, B}  →  old 2/2, new 2/2  →  granted
//! ```
//!
//! Without this, disjoint majorities of the old and the new configuration
//! could each commit on their own.
//!
//! # Position hints
//!
//! Lookups go through a [`PosHint`] holding the peer's position in each peer
//! list. A leader granting the same peer for consecutive log indices passes
//! the returned hint to the next ballot and skips the scan.

use crate::configuration::Configuration;
use crate::membership::ConfigurationEntry;
use crate::peer::PeerId;

/// Cached positions of a peer in the ballot peer lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PosHint {
    /// Position in the current configuration.
    pub current: usize,
    /// Position in the old configuration, 0 outside joint consensus.
    pub old: usize,
}

#[derive(Debug, Clone)]
struct UnfoundPeer {
    peer_id: PeerId,
    found: bool,
}

/// Grant tracking for one configuration.
#[derive(Debug, Clone)]
struct Tally {
    peers: Vec<UnfoundPeer>,
    /// Grants still needed for a majority.
    remaining: usize,
}

impl Tally {
    fn new(conf: &Configuration) -> Self {
        let peers: Vec<_> = conf
            .iter()
            .map(|peer_id| UnfoundPeer {
                peer_id: peer_id.clone(),
                found: false,
            })
            .collect();
        let remaining = peers.len() / 2 + 1;
        Self { peers, remaining }
    }

    fn find(&self, peer: &PeerId, hint: usize) -> Option<usize> {
        match self.peers.get(hint) {
            Some(candidate) if candidate.peer_id == *peer => Some(hint),
            _ => self.peers.iter().position(|p| p.peer_id == *peer),
        }
    }

    /// Records a grant and returns the peer's position, or 0 if unknown.
    fn grant(&mut self, peer: &PeerId, hint: usize) -> usize {
        let Some(pos) = self.find(peer, hint) else {
            return 0;
        };
        let entry = &mut self.peers[pos];
        if !entry.found {
            entry.found = true;
            self.remaining = self.remaining.saturating_sub(1);
        }
        pos
    }

    fn is_satisfied(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Clone)]
enum Quorum {
    Single(Tally),
    Joint { current: Tally, old: Tally },
}

/// Tracks grants for a single decision.
///
/// # Example
///
/// ```rust
/// use concord_raft::ballot::Ballot;
/// use concord_raft::configuration::Configuration;
/// use concord_raft::peer::PeerId;
///
/// let conf: Configuration = "1.1.1.1:8100,1.1.1.2:8100,1.1.1.3:8100".parse().unwrap();
/// let mut ballot = Ballot::new(&conf, None);
///
/// let a: PeerId = "1.1.1.1:8100".parse().unwrap();
/// let b: PeerId = "1.1.1.2:8100".parse().unwrap();
///
/// ballot.grant(&a);
/// ballot.grant(&a);
/// assert!(!ballot.granted());
/// ballot.grant(&b);
/// assert!(ballot.granted());
/// ```
#[derive(Debug, Clone)]
pub struct Ballot {
    quorum: Quorum,
}

impl Ballot {
    /// Creates a ballot over `conf`, and over `old_conf` during joint
    /// consensus.
    ///
    /// An empty `old_conf` is treated as absent.
    ///
    /// # Panics
    ///
    /// Panics if `conf` is empty. A live group always has members, so an
    /// empty configuration here is a bug in the caller.
    pub fn new(conf: &Configuration, old_conf: Option<&Configuration>) -> Self {
        assert!(
            !conf.is_empty(),
            "ballot requires a non-empty configuration"
        );

        let current = Tally::new(conf);
        let quorum = match old_conf {
            Some(old) if !old.is_empty() => Quorum::Joint {
                current,
                old: Tally::new(old),
            },
            _ => Quorum::Single(current),
        };
        Self { quorum }
    }

    /// Creates a ballot for the configuration in effect at `entry`.
    ///
    /// # Panics
    ///
    /// Panics if the entry's configuration is empty.
    pub fn from_entry(entry: &ConfigurationEntry) -> Self {
        let old_conf = (!entry.is_stable()).then_some(&entry.old_conf);
        Self::new(&entry.conf, old_conf)
    }

    /// Returns true if the ballot spans an old and a new configuration.
    pub fn is_joint(&self) -> bool {
        matches!(self.quorum, Quorum::Joint { .. })
    }

    /// Records a grant from `peer`, starting the lookup at `hint`.
    ///
    /// Repeated grants from one peer count once. Grants from peers outside
    /// the tracked configurations are ignored. Returns the peer's positions
    /// for reuse on the next ballot.
    pub fn grant_with_hint(&mut self, peer: &PeerId, hint: PosHint) -> PosHint {
        match &mut self.quorum {
            Quorum::Single(current) => PosHint {
                current: current.grant(peer, hint.current),
                old: 0,
            },
            Quorum::Joint { current, old } => PosHint {
                current: current.grant(peer, hint.current),
                old: old.grant(peer, hint.old),
            },
        }
    }

    /// Records a grant from `peer`.
    pub fn grant(&mut self, peer: &PeerId) {
        self.grant_with_hint(peer, PosHint::default());
    }

    /// Returns true once a majority granted in every tracked configuration.
    pub fn granted(&self) -> bool {
        match &self.quorum {
            Quorum::Single(current) => current.is_satisfied(),
            Quorum::Joint { current, old } => current.is_satisfied() && old.is_satisfied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_common::types::LogId;

    fn peer(s: &str) -> PeerId {
        s.parse().unwrap()
    }

    fn conf(s: &str) -> Configuration {
        s.parse().unwrap()
    }

    #[test]
    fn test_quorum_of_three() {
        let mut ballot = Ballot::new(&conf("1.1.1.1:1,1.1.1.2:1,1.1.1.3:1"), None);
        assert!(!ballot.is_joint());
        assert!(!ballot.granted());

        ballot.grant(&peer("1.1.1.1:1"));
        ballot.grant(&peer("1.1.1.1:1"));
        assert!(!ballot.granted());

        ballot.grant(&peer("1.1.1.3:1"));
        assert!(ballot.granted());
    }

    #[test]
    fn test_quorum_sizes() {
        for n in 1..=7u16 {
            let members: Configuration = (0..n)
                .map(|i| peer(&format!("10.0.0.{}:8100", i + 1)))
                .collect();
            let mut ballot = Ballot::new(&members, None);
            let needed = usize::from(n) / 2 + 1;

            for (granted, p) in members.iter().enumerate() {
                assert_eq!(ballot.granted(), granted >= needed, "n={n}");
                ballot.grant(p);
            }
            assert!(ballot.granted());
        }
    }

    #[test]
    fn test_unknown_peer_is_ignored() {
        let mut ballot = Ballot::new(&conf("1.1.1.1:1"), None);
        let hint = ballot.grant_with_hint(&peer("9.9.9.9:9"), PosHint { current: 5, old: 3 });
        assert_eq!(hint, PosHint::default());
        assert!(!ballot.granted());

        ballot.grant(&peer("1.1.1.1:1"));
        assert!(ballot.granted());
    }

    #[test]
    fn test_joint_requires_both_majorities() {
        let old = conf("1.1.1.1:1,1.1.1.2:1,1.1.1.3:1");
        let new = conf("1.1.1.1:1,1.1.1.2:1,1.1.1.4:1");

        // majority of new only
        let mut ballot = Ballot::new(&new, Some(&old));
        assert!(ballot.is_joint());
        ballot.grant(&peer("1.1.1.1:1"));
        ballot.grant(&peer("1.1.1.4:1"));
        assert!(!ballot.granted());
        ballot.grant(&peer("1.1.1.3:1"));
        assert!(ballot.granted());

        // majority of old only
        let mut ballot = Ballot::new(&new, Some(&old));
        ballot.grant(&peer("1.1.1.3:1"));
        ballot.grant(&peer("1.1.1.2:1"));
        assert!(!ballot.granted());
        ballot.grant(&peer("1.1.1.4:1"));
        assert!(ballot.granted());
    }

    #[test]
    fn test_joint_disjoint_configurations() {
        let old = conf("1.1.1.1:1,1.1.1.2:1,1.1.1.3:1");
        let new = conf("2.2.2.1:1,2.2.2.2:1,2.2.2.3:1");
        let mut ballot = Ballot::new(&new, Some(&old));

        for p in &old {
            ballot.grant(p);
        }
        assert!(!ballot.granted());

        ballot.grant(&peer("2.2.2.1:1"));
        assert!(!ballot.granted());
        ballot.grant(&peer("2.2.2.2:1"));
        assert!(ballot.granted());
    }

    #[test]
    fn test_empty_old_conf_is_single() {
        let ballot = Ballot::new(&conf("1.1.1.1:1"), Some(&Configuration::new()));
        assert!(!ballot.is_joint());
    }

    #[test]
    #[should_panic(expected = "ballot requires a non-empty configuration")]
    fn test_empty_conf_panics() {
        let _ = Ballot::new(&Configuration::new(), None);
    }

    #[test]
    fn test_hint_positions() {
        let old = conf("1.1.1.1:1,1.1.1.2:1,1.1.1.3:1");
        let new = conf("1.1.1.2:1,1.1.1.3:1,1.1.1.4:1");
        let mut ballot = Ballot::new(&new, Some(&old));

        let hint = ballot.grant_with_hint(&peer("1.1.1.3:1"), PosHint::default());
        assert_eq!(hint, PosHint { current: 1, old: 2 });

        // A stale hint falls back to a scan.
        let hint = ballot.grant_with_hint(&peer("1.1.1.4:1"), hint);
        assert_eq!(hint, PosHint { current: 2, old: 0 });
    }

    #[test]
    fn test_hint_reuse_across_ballots() {
        let members = conf("1.1.1.1:1,1.1.1.2:1,1.1.1.3:1");
        let mut ballots: Vec<_> = (0..4).map(|_| Ballot::new(&members, None)).collect();

        let mut hint = PosHint::default();
        for ballot in &mut ballots {
            hint = ballot.grant_with_hint(&peer("1.1.1.2:1"), hint);
            assert_eq!(hint.current, 1);
        }
        for ballot in &mut ballots {
            ballot.grant(&peer("1.1.1.1:1"));
            assert!(ballot.granted());
        }
    }

    #[test]
    fn test_from_entry() {
        let stable = ConfigurationEntry::new(LogId::new(3, 1), conf("1.1.1.1:1,1.1.1.2:1"));
        assert!(!Ballot::from_entry(&stable).is_joint());

        let joint = ConfigurationEntry::joint(
            LogId::new(4, 1),
            conf("1.1.1.1:1,1.1.1.2:1,1.1.1.3:1"),
            conf("1.1.1.1:1,1.1.1.2:1"),
        );
        let mut ballot = Ballot::from_entry(&joint);
        assert!(ballot.is_joint());
        ballot.grant(&peer("1.1.1.1:1"));
        ballot.grant(&peer("1.1.1.3:1"));
        assert!(!ballot.granted());
        ballot.grant(&peer("1.1.1.2:1"));
        assert!(ballot.granted());
    }

    #[test]
    fn test_witness_counts_toward_quorum() {
        let mut ballot = Ballot::new(&conf("1.1.1.1:1,1.1.1.2:1,1.1.1.3:1:0:1"), None);
        ballot.grant(&peer("1.1.1.1:1"));
        ballot.grant(&peer("1.1.1.3:1:0:1"));
        assert!(ballot.granted());
    }
}
