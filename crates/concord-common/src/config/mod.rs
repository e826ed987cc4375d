//! Configuration for Concord raft groups.
//!
//! This module provides configuration structures for the membership core.

mod group;

pub use group::GroupConfig;
