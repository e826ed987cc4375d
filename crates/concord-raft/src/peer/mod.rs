//! Peer identities.
//!
//! A peer is one replica process of a raft group. It is identified by the
//! endpoint it listens on plus a replica index that tells apart several
//! replicas sharing one endpoint. Each peer also carries a [`Role`].
//!
//! # Canonical form
//!
//! ```text
//! endpoint:idx:role
//!    │
//!    ├── ip:port           1.2.3.4:8100
//!    ├── [ipv6]:port       [::1]:8100
//!    └── unix:path         unix:/run/raft.sock
//! ```
//!
//! `idx` and `role` are optional on input and default to 0. The role is an
//! integer tag: 0 for a full replica, 1 for a witness. Host names are not
//! resolved here and are rejected. Unix socket paths are limited to
//! [`UNIX_PATH_MAX_LEN`] bytes and may not contain the peer separator `,`.
//!
//! Identity (equality, ordering and hashing) covers the endpoint and the
//! replica index only. Two peers that differ only by role occupy the same
//! slot, so a configuration can never hold both.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use concord_common::config::GroupConfig;
use concord_common::types::GroupId;
use concord_common::{PEER_FIELD_SEPARATOR, PEER_SEPARATOR, UNIX_PATH_MAX_LEN, UNIX_SCHEME};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{RaftError, Result};

/// Matches `endpoint(:idx?)?(:role?)?`.
///
/// The endpoint is either a bracketed IPv6 address or a colon-free head,
/// followed by a colon-free port (or socket path).
static PEER_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:[^:]+|\[.*\]):[^:]+)(?::(\d+)?)?(?::(\d+)?)?$")
        .expect("peer id pattern is a valid regex")
});

/// Network endpoint a peer listens on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    /// An IPv4 or IPv6 socket address.
    Inet(SocketAddr),
    /// A unix domain socket path.
    Unix(PathBuf),
}

impl Endpoint {
    /// The wildcard address with port 0.
    pub const ANY: Self = Endpoint::Inet(SocketAddr::new(
        std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        0,
    ));

    /// Returns true if this is a unix domain socket.
    pub fn is_unix(&self) -> bool {
        matches!(self, Endpoint::Unix(_))
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::ANY
    }
}

impl FromStr for Endpoint {
    type Err = RaftError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &'static str| RaftError::InvalidPeerId {
            input: s.to_string(),
            reason,
        };

        if let Some(path) = s
            .strip_prefix(UNIX_SCHEME)
            .and_then(|rest| rest.strip_prefix(PEER_FIELD_SEPARATOR))
        {
            if path.is_empty() {
                return Err(invalid("empty unix socket path"));
            }
            if path.len() > UNIX_PATH_MAX_LEN {
                return Err(invalid("unix socket path too long"));
            }
            if path.contains(PEER_SEPARATOR) {
                return Err(invalid("unix socket path contains a peer separator"));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        s.parse::<SocketAddr>()
            .map(Endpoint::Inet)
            .map_err(|_| invalid("invalid endpoint"))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Inet(addr) => write!(f, "{addr}"),
            Endpoint::Unix(path) => write!(f, "{UNIX_SCHEME}:{}", path.display()),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::Inet(addr)
    }
}

/// Role of a peer in the group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Role {
    /// A full replica holding the state machine.
    #[default]
    Replica = 0,
    /// A witness that takes part in quorums but keeps no state machine.
    Witness = 1,
}

impl Role {
    /// Returns the integer tag used in the canonical string.
    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Converts an integer tag back into a role.
    pub const fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(Role::Replica),
            1 => Some(Role::Witness),
            _ => None,
        }
    }
}

/// Identifies one replica of a raft group.
///
/// # Example
///
/// ```rust
/// use concord_raft::peer::PeerId;
///
/// let peer: PeerId = "127.0.0.1:8100:1:1".parse().unwrap();
/// assert_eq!(peer.idx, 1);
/// assert!(peer.is_witness());
/// assert_eq!(peer.to_string(), "127.0.0.1:8100:1:1");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId {
    /// Endpoint the replica listens on.
    pub addr: Endpoint,
    /// Index among replicas sharing `addr`.
    pub idx: u32,
    /// Role of the replica.
    pub role: Role,
}

impl PeerId {
    /// Creates a replica peer with index 0.
    pub fn new(addr: impl Into<Endpoint>) -> Self {
        Self::with_index(addr, 0)
    }

    /// Creates a replica peer with the given index.
    pub fn with_index(addr: impl Into<Endpoint>, idx: u32) -> Self {
        Self {
            addr: addr.into(),
            idx,
            role: Role::Replica,
        }
    }

    /// Creates a peer with the given index, marked as witness if `witness`.
    pub fn with_role(addr: impl Into<Endpoint>, idx: u32, witness: bool) -> Self {
        Self {
            addr: addr.into(),
            idx,
            role: if witness { Role::Witness } else { Role::Replica },
        }
    }

    /// Parses a canonical peer string.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &'static str| RaftError::InvalidPeerId {
            input: s.to_string(),
            reason,
        };

        let caps = PEER_ID_PATTERN
            .captures(s)
            .ok_or_else(|| invalid("malformed peer string"))?;

        let addr = caps[1]
            .parse::<Endpoint>()
            .map_err(|_| invalid("invalid endpoint"))?;

        let idx = match caps.get(2) {
            Some(m) => m
                .as_str()
                .parse::<u32>()
                .map_err(|_| invalid("replica index out of range"))?,
            None => 0,
        };

        let role = match caps.get(3) {
            Some(m) => m
                .as_str()
                .parse::<u64>()
                .ok()
                .and_then(Role::from_tag)
                .ok_or_else(|| invalid("unknown role"))?,
            None => Role::Replica,
        };

        Ok(Self { addr, idx, role })
    }

    /// Replaces this peer with the one parsed from `s`.
    ///
    /// The peer is reset first, so on error it is left empty rather than
    /// partially updated.
    pub fn parse_from(&mut self, s: &str) -> Result<()> {
        self.reset();
        *self = Self::parse(s)?;
        Ok(())
    }

    /// Resets to the empty peer.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns true for the wildcard endpoint with index 0, whatever the role.
    pub fn is_empty(&self) -> bool {
        self.addr == Endpoint::ANY && self.idx == 0
    }

    /// Returns true if this peer is a witness.
    #[inline]
    pub fn is_witness(&self) -> bool {
        self.role == Role::Witness
    }
}

impl PartialEq for PeerId {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr && self.idx == other.idx
    }
}

impl Eq for PeerId {}

impl Hash for PeerId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
        self.idx.hash(state);
    }
}

impl Ord for PeerId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr
            .cmp(&other.addr)
            .then_with(|| self.idx.cmp(&other.idx))
    }
}

impl PartialOrd for PeerId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for PeerId {
    type Err = RaftError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PeerId {
    type Error = RaftError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PeerId> for String {
    fn from(peer: PeerId) -> Self {
        peer.to_string()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.addr, self.idx, self.role.tag())
    }
}

/// Identifies a replica within a specific raft group.
///
/// Ordered by group first, then by peer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// The raft group.
    pub group_id: GroupId,
    /// The replica within the group.
    pub peer_id: PeerId,
}

impl NodeId {
    /// Creates a new node id.
    pub fn new(group_id: impl Into<GroupId>, peer_id: PeerId) -> Self {
        Self {
            group_id: group_id.into(),
            peer_id,
        }
    }

    /// Builds the node id of this replica from its group configuration.
    ///
    /// Fails if the configuration does not validate, if the server id does
    /// not parse, or if it names the empty peer.
    pub fn from_config(config: &GroupConfig) -> Result<Self> {
        config.validate().map_err(RaftError::InvalidConfiguration)?;

        let peer_id = PeerId::parse(&config.server_id)?;
        if peer_id.is_empty() {
            return Err(RaftError::InvalidPeerId {
                input: config.server_id.clone(),
                reason: "server id must not be the empty peer",
            });
        }

        Ok(Self::new(config.group_id.clone(), peer_id))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.peer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(s: &str) -> PeerId {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_is_empty() {
        let id = PeerId::default();
        assert!(id.is_empty());
        assert!(!id.is_witness());
        assert_eq!(id.to_string(), "0.0.0.0:0:0:0");
    }

    #[test]
    fn test_parse_optional_fields() {
        let mut id = PeerId::default();

        id.parse_from("1.1.1.1:1000:").unwrap();
        assert_eq!(id.idx, 0);
        assert_eq!(id.role, Role::Replica);

        id.parse_from("1.1.1.1:1000:0").unwrap();
        assert_eq!(id.to_string(), "1.1.1.1:1000:0:0");

        id.parse_from("1.1.1.1:1000:0:0").unwrap();
        assert!(!id.is_witness());

        id.parse_from("1.1.1.1:1000:0:1").unwrap();
        assert!(id.is_witness());

        id.parse_from("1.1.1.1:1000").unwrap();
        assert_eq!(id.idx, 0);
        assert!(!id.is_empty());
    }

    #[test]
    fn test_parse_failure_resets() {
        let mut id = peer("1.1.1.1:1000:3:1");

        assert!(id.parse_from("1.1.1.1::").is_err());
        assert!(id.is_empty());
        assert_eq!(id.role, Role::Replica);

        let mut id = peer("1.1.1.1:1000:3:1");
        let err = id.parse_from("1.1.1.1:1000:0:2").unwrap_err();
        assert_eq!(
            err,
            RaftError::InvalidPeerId {
                input: "1.1.1.1:1000:0:2".into(),
                reason: "unknown role",
            }
        );
        assert!(id.is_empty());
    }

    #[test]
    fn test_parse_unix_socket() {
        let id = peer("unix:/path/to/sock:1:1");
        assert_eq!(id.addr, Endpoint::Unix(PathBuf::from("/path/to/sock")));
        assert!(id.addr.is_unix());
        assert_eq!(id.idx, 1);
        assert_eq!(id.role, Role::Witness);
        assert_eq!(id.to_string(), "unix:/path/to/sock:1:1");
    }

    #[test]
    fn test_parse_unix_socket_limits() {
        let longest = format!("unix:/{}", "a".repeat(UNIX_PATH_MAX_LEN - 1));
        let id = peer(&format!("{longest}:{}:1", u32::MAX));
        assert!(id.to_string().len() <= concord_common::PEER_STRING_MAX_LEN);

        let too_long = format!("unix:/{}", "a".repeat(UNIX_PATH_MAX_LEN));
        assert!(matches!(
            too_long.parse::<Endpoint>(),
            Err(RaftError::InvalidPeerId {
                reason: "unix socket path too long",
                ..
            })
        ));
        assert!(PeerId::parse(&too_long).is_err());

        assert!(matches!(
            "unix:/tmp/a,b".parse::<Endpoint>(),
            Err(RaftError::InvalidPeerId {
                reason: "unix socket path contains a peer separator",
                ..
            })
        ));
        assert!(PeerId::parse("unix:/tmp/a,b").is_err());
    }

    #[test]
    fn test_parse_rejects_host_names() {
        assert!(PeerId::parse("invalid:1:1").is_err());
        assert!(PeerId::parse("localhost:8100").is_err());
    }

    #[test]
    fn test_parse_ipv6() {
        let id = peer("[::1]:1");
        assert_eq!(id.idx, 0);
        assert_eq!(id.role, Role::Replica);

        let id = peer("[::1]:1:1:1");
        assert_eq!(id.idx, 1);
        assert_eq!(id.role, Role::Witness);
        assert_eq!(id.to_string(), "[::1]:1:1:1");

        assert!(PeerId::parse("[:::1:1").is_err());
        assert!(PeerId::parse("::]:1:1").is_err());
    }

    #[test]
    fn test_parse_index_out_of_range() {
        let err = PeerId::parse("1.1.1.1:1000:99999999999").unwrap_err();
        assert!(matches!(
            err,
            RaftError::InvalidPeerId { reason: "replica index out of range", .. }
        ));
    }

    #[test]
    fn test_round_trip_multi_digit_index() {
        let id = PeerId::with_role("10.0.0.1:8100".parse::<SocketAddr>().unwrap(), 12, true);
        assert_eq!(peer(&id.to_string()), id);
        assert!(peer(&id.to_string()).is_witness());
    }

    #[test]
    fn test_identity_ignores_role() {
        let replica = peer("1.1.1.1:1000:0:0");
        let witness = peer("1.1.1.1:1000:0:1");
        assert_eq!(replica, witness);
        assert_eq!(replica.cmp(&witness), Ordering::Equal);

        assert!(peer("1.1.1.1:1000:0") < peer("1.1.1.1:1000:1"));
        assert!(peer("1.1.1.1:1000:9") < peer("1.1.1.1:1001:0"));
    }

    #[test]
    fn test_serde_as_string() {
        let id = peer("1.2.3.4:1000:2:1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1.2.3.4:1000:2:1\"");

        let restored: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, id);
        assert!(restored.is_witness());

        assert!(serde_json::from_str::<PeerId>("\"1.1.1.1::\"").is_err());
    }

    #[test]
    fn test_node_id_ordering_and_display() {
        let a = NodeId::new("alpha", peer("1.1.1.1:1000"));
        let b = NodeId::new("alpha", peer("1.1.1.1:1001"));
        let c = NodeId::new("beta", peer("1.1.1.1:999"));

        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.to_string(), "alpha:1.1.1.1:1000:0:0");
    }

    #[test]
    fn test_node_id_from_config() {
        let config = GroupConfig::new("orders", "127.0.0.1:8100:1");
        let node = NodeId::from_config(&config).unwrap();
        assert_eq!(node.group_id, "orders");
        assert_eq!(node.peer_id.idx, 1);

        let config = GroupConfig::new("orders", "0.0.0.0:0:0");
        assert!(NodeId::from_config(&config).is_err());

        let config = GroupConfig::new("", "127.0.0.1:8100");
        assert!(matches!(
            NodeId::from_config(&config),
            Err(RaftError::InvalidConfiguration(_))
        ));
    }
}
