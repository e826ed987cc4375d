//! Raft group configuration structures.

use serde::{Deserialize, Serialize};

/// Configuration of one replica in a raft group.
///
/// Peer fields hold canonical peer strings (`addr:idx:role`) and are parsed
/// into typed values by the raft crate when the group is bootstrapped.
///
/// # Example
///
/// ```rust
/// use concord_common::config::GroupConfig;
///
/// let config = GroupConfig::new("orders", "127.0.0.1:8100:0")
///     .with_initial_conf("127.0.0.1:8100:0,127.0.0.1:8101:0,127.0.0.1:8102:0");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Name of the raft group this replica belongs to.
    pub group_id: String,

    /// Canonical peer string of this replica.
    pub server_id: String,

    /// Comma-separated peers of the initial configuration.
    /// Empty when the replica joins an existing group.
    pub initial_conf: String,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            group_id: "default".to_string(),
            server_id: "0.0.0.0:0:0".to_string(),
            initial_conf: String::new(),
        }
    }
}

impl GroupConfig {
    /// Creates a configuration for `server_id` in `group_id`.
    #[must_use]
    pub fn new(group_id: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            server_id: server_id.into(),
            initial_conf: String::new(),
        }
    }

    /// Sets the initial configuration string.
    #[must_use]
    pub fn with_initial_conf(mut self, initial_conf: impl Into<String>) -> Self {
        self.initial_conf = initial_conf.into();
        self
    }

    /// Returns true if the replica starts with a known membership.
    #[must_use]
    pub fn has_initial_conf(&self) -> bool {
        !self.initial_conf.is_empty()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// Only the shape of the fields is checked here; peer strings are
    /// parsed when the group is bootstrapped.
    pub fn validate(&self) -> Result<(), String> {
        if self.group_id.is_empty() {
            return Err("group_id must not be empty".to_string());
        }

        if self.server_id.is_empty() {
            return Err("server_id must not be empty".to_string());
        }

        if self.initial_conf.chars().any(char::is_whitespace) {
            return Err("initial_conf must not contain whitespace".to_string());
        }

        Ok(())
    }
}
