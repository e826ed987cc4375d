//! Configuration history.
//!
//! Every configuration change is a log entry. The [`ConfigurationManager`]
//! remembers at which log index each configuration took effect, so the node
//! can answer "which configuration was in effect at index i" while the log is
//! appended to, rolled back after a conflict, or compacted into a snapshot.
//!
//! # Layout
//!
//! ```text
//!   snapshot          live history (strictly increasing index)
//!  ┌────────┐   ┌─────────┬─────────┬─────────┐
//!  │ (5, 1) │   │ (10, 1) │ (15, 1) │ (20, 2) │
//!  └────────┘   └─────────┴─────────┴─────────┘
//!       ▲            ▲                    ▲
//!       │            └─ truncate_prefix   └─ truncate_suffix
//!       └─ set_snapshot                      (log conflict rollback)
//!          (compaction)
//! ```
//!
//! Entries of a joint configuration carry the configuration they transition
//! from in `old_conf`; stable entries leave it empty.
//!
//! # Usage
//!
//! ```rust
//! use concord_raft::membership::{ConfigurationEntry, ConfigurationManager};
//! use concord_raft::LogId;
//!
//! let mut manager = ConfigurationManager::new();
//! let conf = "1.1.1.1:8100,1.1.1.2:8100,1.1.1.3:8100".parse().unwrap();
//! manager.add(ConfigurationEntry::new(LogId::new(8, 1), conf)).unwrap();
//!
//! assert_eq!(manager.get(10).id, LogId::new(8, 1));
//! ```

use std::collections::{BTreeSet, VecDeque};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use concord_common::config::GroupConfig;
use concord_common::{CONFIGURATION_ENTRY_VERSION, CONFIGURATION_PEERS_MAX, PEER_STRING_MAX_LEN};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::configuration::Configuration;
use crate::peer::PeerId;
use crate::{LogId, LogIndex, RaftError, Result};

/// A configuration and the log position where it took effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    /// The log entry that carried this configuration.
    pub id: LogId,
    /// The configuration in effect from `id` on.
    pub conf: Configuration,
    /// The configuration being left, empty unless this is a joint entry.
    pub old_conf: Configuration,
}

impl ConfigurationEntry {
    /// Creates a stable entry.
    pub fn new(id: LogId, conf: Configuration) -> Self {
        Self {
            id,
            conf,
            old_conf: Configuration::new(),
        }
    }

    /// Creates a joint entry moving from `old_conf` to `conf`.
    pub fn joint(id: LogId, conf: Configuration, old_conf: Configuration) -> Self {
        Self { id, conf, old_conf }
    }

    /// Returns true if no membership change is in flight.
    pub fn is_stable(&self) -> bool {
        self.old_conf.is_empty()
    }

    /// Returns true if the entry carries no configuration.
    pub fn is_empty(&self) -> bool {
        self.conf.is_empty()
    }

    /// Returns true if `peer` belongs to either configuration.
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.conf.contains(peer) || self.old_conf.contains(peer)
    }

    /// Returns the peers of both configurations.
    pub fn list_peers(&self) -> BTreeSet<PeerId> {
        let mut peers = BTreeSet::new();
        self.conf.append_peers(&mut peers);
        self.old_conf.append_peers(&mut peers);
        peers
    }

    /// Serializes the entry into a log entry payload.
    ///
    /// # Errors
    ///
    /// Returns [`RaftError::InvalidConfiguration`] if a configuration or a
    /// peer string exceeds the limits [`from_bytes`](Self::from_bytes)
    /// accepts, so every encoded payload decodes again.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();

        buf.put_u8(CONFIGURATION_ENTRY_VERSION);
        buf.put_u64_le(self.id.index);
        buf.put_u64_le(self.id.term);
        put_configuration(&mut buf, &self.conf)?;
        put_configuration(&mut buf, &self.old_conf)?;

        Ok(buf.freeze())
    }

    /// Deserializes an entry from a log entry payload.
    pub fn from_bytes(mut data: Bytes) -> Result<Self> {
        ensure_remaining(&data, 1 + 8 + 8)?;

        let version = data.get_u8();
        if version != CONFIGURATION_ENTRY_VERSION {
            return Err(RaftError::InvalidConfiguration(format!(
                "unsupported version: {}",
                version
            )));
        }

        let index = data.get_u64_le();
        let term = data.get_u64_le();
        let conf = get_configuration(&mut data)?;
        let old_conf = get_configuration(&mut data)?;

        if data.has_remaining() {
            return Err(RaftError::InvalidConfiguration(format!(
                "{} trailing bytes",
                data.remaining()
            )));
        }

        Ok(Self {
            id: LogId::new(index, term),
            conf,
            old_conf,
        })
    }
}

fn put_configuration(buf: &mut BytesMut, conf: &Configuration) -> Result<()> {
    let count = u32::try_from(conf.len())
        .ok()
        .filter(|&count| count as usize <= CONFIGURATION_PEERS_MAX)
        .ok_or_else(|| {
            RaftError::InvalidConfiguration(format!("too many peers: {}", conf.len()))
        })?;
    buf.put_u32_le(count);

    for peer in conf {
        let s = peer.to_string();
        let len = u16::try_from(s.len())
            .ok()
            .filter(|&len| usize::from(len) <= PEER_STRING_MAX_LEN)
            .ok_or_else(|| {
                RaftError::InvalidConfiguration(format!("peer string too long: {}", s.len()))
            })?;
        buf.put_u16_le(len);
        buf.put_slice(s.as_bytes());
    }
    Ok(())
}

fn get_configuration(data: &mut Bytes) -> Result<Configuration> {
    ensure_remaining(data, 4)?;
    let count = data.get_u32_le() as usize;
    if count > CONFIGURATION_PEERS_MAX {
        return Err(RaftError::InvalidConfiguration(format!(
            "too many peers: {}",
            count
        )));
    }

    let mut conf = Configuration::new();
    for _ in 0..count {
        ensure_remaining(data, 2)?;
        let len = data.get_u16_le() as usize;
        if len > PEER_STRING_MAX_LEN {
            return Err(RaftError::InvalidConfiguration(format!(
                "peer string too long: {}",
                len
            )));
        }
        ensure_remaining(data, len)?;
        let raw = data.split_to(len);
        let s = std::str::from_utf8(&raw)
            .map_err(|_| RaftError::InvalidConfiguration("peer is not utf-8".into()))?;
        let peer = PeerId::parse(s)
            .map_err(|err| RaftError::InvalidConfiguration(format!("encoded peer: {err}")))?;
        conf.add(peer);
    }
    Ok(conf)
}

fn ensure_remaining(data: &Bytes, needed: usize) -> Result<()> {
    if data.remaining() < needed {
        return Err(RaftError::InvalidConfiguration(format!(
            "truncated entry: need {} bytes, have {}",
            needed,
            data.remaining()
        )));
    }
    Ok(())
}

/// Log-index keyed history of configurations.
///
/// Not synchronized; owned by the node's apply loop.
#[derive(Debug, Default)]
pub struct ConfigurationManager {
    /// Live history, strictly increasing by index.
    configurations: VecDeque<ConfigurationEntry>,
    /// The configuration at the last compaction boundary.
    snapshot: ConfigurationEntry,
}

impl ConfigurationManager {
    /// Creates an empty manager with the snapshot at `LogId(0, 0)`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager whose snapshot holds `conf` at `LogId(0, 0)`.
    pub fn with_initial(conf: Configuration) -> Self {
        Self {
            configurations: VecDeque::new(),
            snapshot: ConfigurationEntry::new(LogId::ZERO, conf),
        }
    }

    /// Creates a manager seeded with the initial configuration of `config`.
    pub fn from_config(config: &GroupConfig) -> Result<Self> {
        config.validate().map_err(RaftError::InvalidConfiguration)?;
        let conf: Configuration = config.initial_conf.parse()?;
        debug!(
            group = %config.group_id,
            conf = %conf,
            "Bootstrapping configuration history"
        );
        Ok(Self::with_initial(conf))
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    /// Returns true if the live history is empty.
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Iterates over the live entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigurationEntry> {
        self.configurations.iter()
    }

    /// Returns the snapshot entry.
    pub fn snapshot(&self) -> &ConfigurationEntry {
        &self.snapshot
    }

    /// Appends a configuration entry.
    ///
    /// The entry must come strictly after the current tail. When a log
    /// conflict rolls entries back, [`truncate_suffix`](Self::truncate_suffix)
    /// must run before the replacements are added.
    ///
    /// # Errors
    ///
    /// Returns [`RaftError::ConfigurationOutOfOrder`], a defect, if the
    /// index does not increase. The history is left untouched.
    pub fn add(&mut self, entry: ConfigurationEntry) -> Result<()> {
        if let Some(last) = self.configurations.back() {
            if last.id.index >= entry.id.index {
                error!(
                    last = last.id.index,
                    index = entry.id.index,
                    "Configuration appended out of order, was the suffix truncated?"
                );
                return Err(RaftError::ConfigurationOutOfOrder {
                    last: last.id.index,
                    index: entry.id.index,
                });
            }
        }

        debug!(id = %entry.id, conf = %entry.conf, stable = entry.is_stable(), "Adding configuration");
        self.configurations.push_back(entry);
        Ok(())
    }

    /// Drops every entry with index below `first_index_kept`.
    ///
    /// Used after log compaction. The snapshot entry is not touched.
    pub fn truncate_prefix(&mut self, first_index_kept: LogIndex) {
        let split = self
            .configurations
            .partition_point(|entry| entry.id.index < first_index_kept);
        if split > 0 {
            debug!(first_index_kept, removed = split, "Truncating configuration prefix");
            self.configurations.drain(..split);
        }
    }

    /// Drops every entry with index above `last_index_kept`.
    ///
    /// Used when a log conflict rolls back appended entries, including
    /// configuration changes that must be undone.
    pub fn truncate_suffix(&mut self, last_index_kept: LogIndex) {
        let split = self
            .configurations
            .partition_point(|entry| entry.id.index <= last_index_kept);
        let removed = self.configurations.len() - split;
        if removed > 0 {
            debug!(last_index_kept, removed, "Truncating configuration suffix");
            self.configurations.truncate(split);
        }
    }

    /// Moves the snapshot boundary to `entry`.
    ///
    /// The live history is not truncated; pair this with
    /// [`truncate_prefix`](Self::truncate_prefix).
    ///
    /// # Errors
    ///
    /// Returns [`RaftError::SnapshotRegression`], a defect, if `entry.id` is
    /// older than the current snapshot. The snapshot is left untouched.
    pub fn set_snapshot(&mut self, entry: ConfigurationEntry) -> Result<()> {
        if entry.id < self.snapshot.id {
            error!(
                current = %self.snapshot.id,
                proposed = %entry.id,
                "Snapshot configuration moved backward"
            );
            return Err(RaftError::SnapshotRegression {
                current: self.snapshot.id,
                proposed: entry.id,
            });
        }

        debug!(id = %entry.id, conf = %entry.conf, "Setting snapshot configuration");
        self.snapshot = entry;
        Ok(())
    }

    /// Returns the configuration in effect at `last_included_index`.
    ///
    /// That is the last live entry at or below the index, or the snapshot
    /// entry when the live history has none.
    ///
    /// # Errors
    ///
    /// Returns [`RaftError::LogCompacted`] if the index lies below the
    /// snapshot and no live entry covers it.
    pub fn try_get(&self, last_included_index: LogIndex) -> Result<&ConfigurationEntry> {
        let covered = self
            .configurations
            .partition_point(|entry| entry.id.index <= last_included_index);
        if covered > 0 {
            return Ok(&self.configurations[covered - 1]);
        }

        if last_included_index >= self.snapshot.id.index {
            return Ok(&self.snapshot);
        }

        Err(RaftError::LogCompacted {
            index: last_included_index,
            snapshot_index: self.snapshot.id.index,
        })
    }

    /// Returns the configuration in effect at `last_included_index`.
    ///
    /// # Panics
    ///
    /// Panics if the index predates all known history; see
    /// [`try_get`](Self::try_get) for the fallible form.
    pub fn get(&self, last_included_index: LogIndex) -> &ConfigurationEntry {
        match self.try_get(last_included_index) {
            Ok(entry) => entry,
            Err(err) => panic!("configuration lookup below snapshot: {err}"),
        }
    }

    /// Returns the latest configuration: the live tail, or the snapshot
    /// entry when the live history is empty.
    pub fn last_configuration(&self) -> &ConfigurationEntry {
        self.configurations.back().unwrap_or(&self.snapshot)
    }
}
