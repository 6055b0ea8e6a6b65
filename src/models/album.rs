//! Albums and their photo membership.

use super::photo::Photo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named, ordered collection of photos.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Album {
    pub id: Uuid,

    #[serde(skip_serializing)]
    pub owner_id: Uuid,

    /// Never blank once trimmed.
    pub title: String,

    pub description: String,

    /// Representative photo. When set it is always linked to this album.
    pub cover_photo_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

pub const ALBUM_FIELDS: &str =
    "id, owner_id, title, description, cover_photo_id, created_at, updated_at";

pub const ALBUM_COLUMNS: &str =
    "a.id, a.owner_id, a.title, a.description, a.cover_photo_id, a.created_at, a.updated_at";

/// A photo as seen through an album: the photo row plus when it was linked.
///
/// `added_at` is the sort key for album-scoped listings and is distinct from
/// the photo's own `created_at`.
#[derive(Clone, FromRow, Debug)]
pub struct AlbumPhotoEntry {
    #[sqlx(flatten)]
    pub photo: Photo,
    pub added_at: DateTime<Utc>,
}
