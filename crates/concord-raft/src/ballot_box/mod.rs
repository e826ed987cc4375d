//! Commit tracking for pending log entries.
//!
//! The leader keeps one [`Ballot`] per log entry it has appended but not yet
//! committed. Entries are committed in order: once the ballot at some index
//! is granted, that index and everything before it is committed.
//!
//! ```text
//!   last_committed   pending_index
//!          │              │
//!   ... ───┤  7  │  8  │  9  │ 10  │      pending ballots
//!                  ▲     ▲     ▲
//!                  └─────┴─────┴── commit_at(8, 10, peer)
//! ```
//!
//! Followers do not track ballots; they learn the committed index from the
//! leader through [`BallotBox::set_last_committed_index`].

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::ballot::{Ballot, PosHint};
use crate::configuration::Configuration;
use crate::peer::PeerId;
use crate::LogIndex;

/// Window of ballots for pending log entries.
#[derive(Debug, Default)]
pub struct BallotBox {
    last_committed_index: LogIndex,
    /// Index of the first pending ballot, 0 when not tracking.
    pending_index: LogIndex,
    pending: VecDeque<Ballot>,
}

impl BallotBox {
    /// Creates an empty ballot box.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the highest committed index.
    pub fn last_committed_index(&self) -> LogIndex {
        self.last_committed_index
    }

    /// Returns the index of the first pending ballot, 0 when not tracking.
    pub fn pending_index(&self) -> LogIndex {
        self.pending_index
    }

    /// Returns the number of pending ballots.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Starts tracking ballots from `new_pending_index`.
    ///
    /// Called when the node becomes leader, with the index of the first
    /// entry it will append.
    ///
    /// # Panics
    ///
    /// Panics if ballots are already tracked, or if `new_pending_index` does
    /// not lie past the committed index.
    pub fn reset_pending_index(&mut self, new_pending_index: LogIndex) {
        assert!(
            self.pending_index == 0 && self.pending.is_empty(),
            "pending ballots must be cleared before resetting the pending index"
        );
        assert!(
            new_pending_index > self.last_committed_index,
            "pending index {} must be greater than committed index {}",
            new_pending_index,
            self.last_committed_index
        );
        self.pending_index = new_pending_index;
    }

    /// Appends a ballot for the next log entry and returns its index.
    ///
    /// # Panics
    ///
    /// Panics if tracking has not started, or if `conf` is empty.
    pub fn append_pending_task(
        &mut self,
        conf: &Configuration,
        old_conf: Option<&Configuration>,
    ) -> LogIndex {
        assert!(
            self.pending_index != 0,
            "pending index must be set before appending ballots"
        );
        self.pending.push_back(Ballot::new(conf, old_conf));
        self.pending_index + self.pending.len() as LogIndex - 1
    }

    /// Records that `peer` stored the entries in `[first_index, last_index]`.
    ///
    /// Returns the new committed index if it advanced. Committed ballots are
    /// dropped from the window.
    ///
    /// An acknowledgement reaching past the last pending ballot can only come
    /// from an earlier leadership window; it is logged and ignored.
    pub fn commit_at(
        &mut self,
        first_index: LogIndex,
        last_index: LogIndex,
        peer: &PeerId,
    ) -> Option<LogIndex> {
        if self.pending_index == 0 {
            trace!(%peer, "Ignoring grant, no pending ballots");
            return None;
        }
        if last_index < self.pending_index {
            return None;
        }

        let window_end = self.pending_index + self.pending.len() as LogIndex;
        if last_index >= window_end {
            warn!(
                %peer,
                first_index,
                last_index,
                window_end,
                "Ignoring grant beyond pending window"
            );
            return None;
        }

        let start = first_index.max(self.pending_index);
        let mut hint = PosHint::default();
        let mut committed = None;
        for index in start..=last_index {
            let ballot = &mut self.pending[(index - self.pending_index) as usize];
            hint = ballot.grant_with_hint(peer, hint);
            if ballot.granted() {
                committed = Some(index);
            }
        }

        let committed = committed?;
        let drained = (committed - self.pending_index + 1) as usize;
        self.pending.drain(..drained);
        self.pending_index = committed + 1;
        self.last_committed_index = committed;
        debug!(committed, %peer, "Committed index advanced");
        Some(committed)
    }

    /// Drops all pending ballots, for instance on losing leadership.
    pub fn clear_pending_tasks(&mut self) {
        self.pending.clear();
        self.pending_index = 0;
    }

    /// Sets the committed index learned from the leader.
    ///
    /// Returns true if the index advanced. Rejected while ballots are
    /// tracked, since the leader computes its own commits.
    pub fn set_last_committed_index(&mut self, index: LogIndex) -> bool {
        if self.pending_index != 0 || !self.pending.is_empty() {
            trace!(index, "Ignoring committed index while tracking ballots");
            return false;
        }
        if index <= self.last_committed_index {
            return false;
        }
        self.last_committed_index = index;
        true
    }
}
