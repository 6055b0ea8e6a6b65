//! Account records. Only the seeded local user exists today.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct User {
    pub id: Uuid,

    /// Unique across users.
    pub email: String,

    pub display_name: String,

    pub created_at: DateTime<Utc>,
}
