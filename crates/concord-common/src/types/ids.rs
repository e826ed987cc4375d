//! Log position and group identifier types.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Position of an entry in the replicated log.
pub type LogIndex = u64;

/// A raft term number (monotonically increasing epoch).
pub type Term = u64;

/// Name of a raft group.
pub type GroupId = String;

/// Builds a versioned group id in the `{group_id}_{version}` form.
///
/// Versioned ids let a group be recreated under the same name without
/// colliding with state left behind by an earlier incarnation.
///
/// # Example
///
/// ```rust
/// use concord_common::types::versioned_group_id;
///
/// assert_eq!(versioned_group_id("orders", 3), "orders_3");
/// ```
#[must_use]
pub fn versioned_group_id(group_id: &str, version: u64) -> String {
    format!("{group_id}_{version}")
}

/// Identifies one entry of the replicated log.
///
/// Ordering compares the term first and the index second, so an entry
/// written by a newer leader always orders after entries of older terms.
///
/// # Example
///
/// ```rust
/// use concord_common::types::LogId;
///
/// let id = LogId::new(10, 2);
/// assert_eq!(id.index, 10);
/// assert_eq!(id.term, 2);
/// assert!(LogId::new(20, 1) < id);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogId {
    /// Position in the log.
    pub index: LogIndex,
    /// Term of the leader that created the entry.
    pub term: Term,
}

impl LogId {
    /// The id preceding every real log entry.
    pub const ZERO: Self = Self { index: 0, term: 0 };

    /// Creates a new log id.
    #[inline]
    #[must_use]
    pub const fn new(index: LogIndex, term: Term) -> Self {
        Self { index, term }
    }
}

impl Ord for LogId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.term
            .cmp(&other.term)
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl PartialOrd for LogId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(index={},term={})", self.index, self.term)
    }
}

impl From<(LogIndex, Term)> for LogId {
    #[inline]
    fn from((index, term): (LogIndex, Term)) -> Self {
        Self::new(index, term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_id_orders_by_term_first() {
        assert!(LogId::new(100, 1) < LogId::new(1, 2));
        assert!(LogId::new(1, 2) < LogId::new(2, 2));
        assert_eq!(LogId::new(5, 5), LogId::from((5, 5)));
    }

    #[test]
    fn test_log_id_default_is_zero() {
        assert_eq!(LogId::default(), LogId::ZERO);
        assert!(LogId::ZERO <= LogId::new(0, 0));
    }

    #[test]
    fn test_log_id_display() {
        assert_eq!(LogId::new(8, 1).to_string(), "(index=8,term=1)");
    }

    #[test]
    fn test_versioned_group_id() {
        assert_eq!(versioned_group_id("unittest", 0), "unittest_0");
    }

    #[test]
    fn test_log_id_serde() {
        let id = LogId::new(42, 7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"index":42,"term":7}"#);
        let restored: LogId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, id);
    }
}
