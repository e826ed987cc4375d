//! # concord-common
//!
//! Common types and configuration for Concord.
//!
//! This crate provides the foundational types shared by the Concord raft
//! components:
//!
//! - **Types**: Log positions (`LogId`, `LogIndex`, `Term`) and group identifiers
//! - **Config**: Raft group configuration structures
//! - **Constants**: Wire-format and parsing constants
//!
//! ## Example
//!
//! ```rust
//! use concord_common::types::LogId;
//!
//! let applied = LogId::new(8, 1);
//! let leader = LogId::new(3, 2);
//! // Later terms always order after earlier ones.
//! assert!(applied < leader);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod types;

pub use config::GroupConfig;
pub use constants::*;
pub use types::{versioned_group_id, GroupId, LogId, LogIndex, Term};
