//! Core value types shared across Concord.

mod ids;

pub use ids::{versioned_group_id, GroupId, LogId, LogIndex, Term};
