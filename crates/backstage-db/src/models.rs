//! Database row types that have no direct counterpart in backstage-types.
//! Everything else is mapped straight into the shared domain models.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    /// Argon2id PHC string.
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate figures for the events attached to one chapter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChapterEventStats {
    pub total_events: u64,
    pub average_budget: f64,
    pub total_budget: f64,
    pub signed_contracts: u64,
}
