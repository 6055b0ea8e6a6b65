//! PhotoService: photo metadata lifecycle.
//!
//! Photo bytes never pass through the API. A client asks for a presigned
//! PUT, uploads straight to the bucket, then confirms the upload here so a
//! metadata row is written. Deletion tombstones the row and then makes a
//! best-effort attempt to remove the object.

use super::{
    Owner, ServiceError, ServiceResult,
    object_store::ObjectStore,
    pagination::{Cursor, Page, push_after_cursor, push_order_and_limit},
    push_visible_to,
};
use crate::models::{
    photo::{PHOTO_COLUMNS, PHOTO_FIELDS, Photo},
    timestamp_now,
};
use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{collections::BTreeMap, path::Path, sync::Arc, time::Duration};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

const DOWNLOAD_TTL_MIN_SECS: u64 = 10;
const DOWNLOAD_TTL_MAX_SECS: u64 = 3000;
const DOWNLOAD_TTL_DEFAULT_SECS: u64 = 300;

/// Input for registering an uploaded object.
#[derive(Debug, Clone, Default)]
pub struct NewPhoto {
    pub key: String,
    pub bytes: i64,
    pub content_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Partial metadata update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PhotoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub url: String,
    pub key: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct PhotoService {
    /// Shared SQLite pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    store: Arc<dyn ObjectStore>,

    /// Lifetime of presigned upload URLs.
    upload_url_ttl: Duration,
}

impl PhotoService {
    pub fn new(db: Arc<SqlitePool>, store: Arc<dyn ObjectStore>, upload_url_ttl: Duration) -> Self {
        Self {
            db,
            store,
            upload_url_ttl,
        }
    }

    /// Issue a presigned PUT for a new object.
    ///
    /// The key is a fresh UUID plus the lowercased extension of the supplied
    /// filename, so client-chosen names never reach the bucket.
    #[instrument(skip(self), fields(owner = %owner.user_id))]
    pub async fn presign_upload(
        &self,
        owner: &Owner,
        filename: &str,
        content_type: &str,
    ) -> ServiceResult<UploadTicket> {
        let filename = sanitize_filename(filename);
        let extension = Path::new(&filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();

        let mut content_type = content_type.trim().to_string();
        if content_type.is_empty() && !extension.is_empty() {
            if let Some(guess) = mime_guess::from_path(&filename).first() {
                content_type = guess.essence_str().to_string();
            }
        }
        if content_type.is_empty() {
            return Err(ServiceError::Validation("content_type_required"));
        }

        let key = format!("{}{}", Uuid::new_v4(), extension);
        let upload = self
            .store
            .presign_put(&key, &content_type, self.upload_url_ttl)
            .await?;

        Ok(UploadTicket {
            url: upload.url,
            key,
            headers: upload.headers,
        })
    }

    /// Register an uploaded object.
    ///
    /// Returns the row and whether it was newly created. Confirming a key
    /// twice yields the original row.
    #[instrument(skip(self, input), fields(owner = %owner.user_id, key = %input.key))]
    pub async fn confirm(&self, owner: &Owner, input: NewPhoto) -> ServiceResult<(Photo, bool)> {
        let key = input.key.trim();
        let content_type = input.content_type.trim();
        if key.is_empty() || content_type.is_empty() || input.bytes < 0 {
            return Err(ServiceError::Validation("missing_fields"));
        }

        let inserted = sqlx::query_as::<_, Photo>(&format!(
            "INSERT INTO photos (id, owner_id, title, description, origin_key, content_type,
                                 bytes, created_at, deleted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)
             ON CONFLICT(origin_key) DO NOTHING
             RETURNING {PHOTO_FIELDS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner.user_id)
        .bind(input.title.unwrap_or_default())
        .bind(input.description.unwrap_or_default())
        .bind(key)
        .bind(content_type)
        .bind(input.bytes)
        .bind(timestamp_now())
        .fetch_optional(&*self.db)
        .await?;

        if let Some(photo) = inserted {
            info!(photo_id = %photo.id, "photo confirmed");
            return Ok((photo, true));
        }

        let existing = sqlx::query_as::<_, Photo>(&format!(
            "SELECT {PHOTO_FIELDS} FROM photos WHERE origin_key = ?"
        ))
        .bind(key)
        .fetch_one(&*self.db)
        .await?;

        if existing.owner_id != owner.user_id || !existing.is_active() {
            return Err(ServiceError::Conflict("key_conflict"));
        }
        Ok((existing, false))
    }

    /// One page of the owner's photos, newest first.
    pub async fn list(
        &self,
        owner: &Owner,
        limit: i64,
        after: Option<Cursor>,
    ) -> ServiceResult<Page<Photo>> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {PHOTO_COLUMNS} FROM photos p WHERE"));
        push_visible_to(&mut builder, "p.", owner);
        if let Some(cursor) = &after {
            push_after_cursor(&mut builder, "p.created_at", "p.id", cursor);
        }
        push_order_and_limit(&mut builder, "p.created_at", "p.id", limit);

        let rows: Vec<Photo> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(Page::from_rows(rows, limit, |p| Cursor::new(p.created_at, p.id)))
    }

    pub async fn get(&self, owner: &Owner, id: Uuid) -> ServiceResult<Photo> {
        fetch_visible_photo(&*self.db, owner, id)
            .await?
            .ok_or(ServiceError::NotFound("not_found"))
    }

    /// Presigned GET for a visible photo, with its expiry.
    pub async fn download_url(
        &self,
        owner: &Owner,
        id: Uuid,
        ttl: Duration,
    ) -> ServiceResult<(String, DateTime<Utc>)> {
        let photo = self.get(owner, id).await?;
        let url = self.store.presign_get(&photo.origin_key, ttl).await?;
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        Ok((url, expires_at))
    }

    #[instrument(skip(self, patch), fields(owner = %owner.user_id))]
    pub async fn update(&self, owner: &Owner, id: Uuid, patch: PhotoPatch) -> ServiceResult<Photo> {
        if patch.title.is_none() && patch.description.is_none() {
            return Err(ServiceError::Validation("missing_fields"));
        }

        let title = patch.title.as_deref().map(str::trim);
        if title.is_some_and(|t| t.chars().count() > TITLE_MAX_CHARS) {
            return Err(ServiceError::Validation("title_too_long"));
        }
        let description = patch.description.as_deref().map(str::trim);
        if description.is_some_and(|d| d.chars().count() > DESCRIPTION_MAX_CHARS) {
            return Err(ServiceError::Validation("description_too_long"));
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE photos SET title = COALESCE(");
        builder.push_bind(title.map(str::to_string));
        builder.push(", title), description = COALESCE(");
        builder.push_bind(description.map(str::to_string));
        builder.push(", description) WHERE id = ");
        builder.push_bind(id);
        builder.push(" AND");
        push_visible_to(&mut builder, "", owner);
        builder.push(format!(" RETURNING {PHOTO_FIELDS}"));

        builder
            .build_query_as::<Photo>()
            .fetch_optional(&*self.db)
            .await?
            .ok_or(ServiceError::NotFound("photo_not_found"))
    }

    /// Tombstone a photo, detach it as any album's cover, then try to delete
    /// the object. Unknown or already-deleted photos are a no-op.
    ///
    /// Object deletion runs after the metadata commit and its failure is only
    /// logged: the row stays tombstoned and the orphaned object is left for
    /// out-of-band cleanup.
    #[instrument(skip(self), fields(owner = %owner.user_id))]
    pub async fn delete(&self, owner: &Owner, id: Uuid) -> ServiceResult<Option<Photo>> {
        let mut tx = self.db.begin().await?;

        let Some(photo) = fetch_visible_photo(&mut *tx, owner, id).await? else {
            return Ok(None);
        };

        let now = timestamp_now();
        sqlx::query("UPDATE photos SET deleted_at = ? WHERE id = ?")
            .bind(now)
            .bind(photo.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE albums SET cover_photo_id = NULL, updated_at = ? WHERE cover_photo_id = ?")
            .bind(now)
            .bind(photo.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        match self.store.delete_object(&photo.origin_key).await {
            Ok(()) => info!(photo_id = %photo.id, key = %photo.origin_key, "photo deleted"),
            Err(err) => warn!(
                photo_id = %photo.id,
                key = %photo.origin_key,
                error = %err,
                "photo tombstoned but object delete failed"
            ),
        }

        Ok(Some(photo))
    }
}

/// Look up a live photo owned by `owner`.
pub(crate) async fn fetch_visible_photo<'e, E>(
    executor: E,
    owner: &Owner,
    id: Uuid,
) -> Result<Option<Photo>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("SELECT {PHOTO_COLUMNS} FROM photos p WHERE p.id = "));
    builder.push_bind(id);
    builder.push(" AND");
    push_visible_to(&mut builder, "p.", owner);
    builder.build_query_as::<Photo>().fetch_optional(executor).await
}

/// Resolve the `ttl` query value for download URLs.
///
/// Numbers are clamped into the allowed window; anything else uses the
/// default.
pub fn resolve_download_ttl(raw: Option<&str>) -> Duration {
    let secs = raw
        .map(str::trim)
        .and_then(|s| s.parse::<i64>().ok())
        .map(|n| n.clamp(DOWNLOAD_TTL_MIN_SECS as i64, DOWNLOAD_TTL_MAX_SECS as i64) as u64)
        .unwrap_or(DOWNLOAD_TTL_DEFAULT_SECS);
    Duration::from_secs(secs)
}

/// Reduce a client filename to its final path component.
fn sanitize_filename(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .to_string()
}
