//! # concord-raft
//!
//! Membership and quorum tracking for raft consensus.
//!
//! This crate holds the safety-critical primitives that a raft node's apply
//! loop uses while electing leaders, committing entries and changing
//! membership:
//!
//! - Peer identities and cluster configurations
//! - Ballots with joint consensus support
//! - A ballot box that commits a window of pending log entries
//! - A log-index keyed history of configurations
//!
//! None of these types synchronize internally. They are owned by the node's
//! serialized control flow and never block or perform I/O.
//!
//! ```text
//!   ConfigurationManager ──seeds──▶ Ballot ◀──grant── peer acks
//!          ▲                           │
//!          └── conf entries appended   └── granted() ──▶ commit / elect
//!              or rolled back
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use thiserror::Error;

pub use concord_common::types::{LogId, LogIndex, Term};

/// Peer identities
pub mod peer;

/// Cluster configurations
pub mod configuration;

/// Quorum ballots
pub mod ballot;

/// Commit tracking for pending log entries
pub mod ballot_box;

/// Configuration history
pub mod membership;

pub use ballot::{Ballot, PosHint};
pub use ballot_box::BallotBox;
pub use configuration::Configuration;
pub use membership::{ConfigurationEntry, ConfigurationManager};
pub use peer::{Endpoint, NodeId, PeerId, Role};

/// Errors returned by the membership core.
///
/// Variants fall in two groups. Malformed input (`InvalidPeerId`,
/// `InvalidConfiguration`, `LogCompacted`) is recoverable and should be
/// reported to whoever supplied it. The remaining variants are defects in the
/// calling node logic; see [`RaftError::is_defect`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaftError {
    /// A peer string could not be parsed.
    #[error("invalid peer id {input:?}: {reason}")]
    InvalidPeerId {
        /// The rejected input.
        input: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A configuration could not be parsed or decoded.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The requested index predates the snapshot boundary.
    #[error("log index {index} is compacted, snapshot starts at {snapshot_index}")]
    LogCompacted {
        /// The requested index.
        index: LogIndex,
        /// Index of the current snapshot entry.
        snapshot_index: LogIndex,
    },

    /// A configuration entry did not follow the last one.
    #[error(
        "configuration at index {index} does not follow the last one at index {last}, \
         the suffix must be truncated first"
    )]
    ConfigurationOutOfOrder {
        /// Index of the current tail entry.
        last: LogIndex,
        /// Index of the rejected entry.
        index: LogIndex,
    },

    /// The snapshot boundary was moved backward.
    #[error("snapshot cannot move back from {current} to {proposed}")]
    SnapshotRegression {
        /// The current snapshot id.
        current: LogId,
        /// The rejected snapshot id.
        proposed: LogId,
    },
}

impl RaftError {
    /// Returns true if the error reports a broken caller contract.
    ///
    /// Defects mean the surrounding node logic is wrong (for example it
    /// re-appended entries without rolling the history back first).
    /// Continuing after one risks deciding on a minority, so callers should
    /// treat them as fatal.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            RaftError::ConfigurationOutOfOrder { .. } | RaftError::SnapshotRegression { .. }
        )
    }
}

/// Result type for membership operations.
pub type Result<T> = std::result::Result<T, RaftError>;
