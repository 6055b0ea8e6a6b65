//! A photo whose bytes live in the object store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for an uploaded photo.
///
/// The row is created only after the client reports a finished upload, so
/// `origin_key` always names an object the client put into the bucket.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Photo {
    pub id: Uuid,

    /// Owning user.
    #[serde(skip_serializing)]
    pub owner_id: Uuid,

    pub title: String,

    pub description: String,

    /// Object key inside the photos bucket. Unique across all photos.
    pub origin_key: String,

    /// MIME type reported at confirm time.
    pub content_type: String,

    /// Size in bytes as reported by the client.
    pub bytes: i64,

    pub created_at: DateTime<Utc>,

    /// Tombstone. Rows with a value here are invisible to every lookup.
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Photo {
    /// False once the photo has been soft-deleted.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Column list for single-table photo statements.
pub const PHOTO_FIELDS: &str =
    "id, owner_id, title, description, origin_key, content_type, bytes, created_at, deleted_at";

/// The same columns qualified with the `p` alias, for joins.
pub const PHOTO_COLUMNS: &str = "p.id, p.owner_id, p.title, p.description, p.origin_key, \
     p.content_type, p.bytes, p.created_at, p.deleted_at";
