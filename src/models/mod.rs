//! Core data models for the photo and album catalogue.
//!
//! These entities map to SQLite tables via `sqlx::FromRow` and serialize
//! as JSON via `serde`. Ownership and tombstone columns never leave the
//! service boundary.

pub mod album;
pub mod photo;
pub mod user;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at the precision rows are persisted with.
///
/// Keyset cursors carry microseconds, so anything written to a sort column
/// must be truncated to match or the boundary comparison drifts.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
