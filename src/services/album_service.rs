//! AlbumService: albums and their photo membership.
//!
//! Album creation, membership changes and cover updates each run inside a
//! single transaction. With the one-connection pool these transactions are
//! also mutually exclusive, so the membership checks below cannot race a
//! concurrent writer.
//!
//! Invariants maintained here:
//! - an `(album, photo)` pair is linked at most once; relinking is a no-op
//! - a non-null cover always names a photo linked to the album
//! - a rejected create leaves no album and no links behind

use super::{
    Owner, ServiceError, ServiceResult,
    pagination::{Cursor, Page, push_after_cursor, push_order_and_limit},
    push_id_list, push_visible_to,
};
use crate::models::{
    album::{ALBUM_COLUMNS, ALBUM_FIELDS, Album, AlbumPhotoEntry},
    photo::{PHOTO_COLUMNS, Photo},
    timestamp_now,
};
use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, SqliteConnection, SqlitePool, sqlite::Sqlite};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Input for creating an album.
#[derive(Debug, Clone, Default)]
pub struct NewAlbum {
    pub title: String,
    pub description: Option<String>,
    /// Must be one of `photo_ids` when present.
    pub cover_photo_id: Option<String>,
    /// Initial members, in display order.
    pub photo_ids: Vec<String>,
}

/// What an update does to the cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoverChange {
    #[default]
    Keep,
    Clear,
    Set(Uuid),
}

impl CoverChange {
    /// Interpret a request field: absent keeps, `null` or `""` clears, and
    /// anything else must name a photo.
    pub fn from_field(field: Option<Option<String>>) -> ServiceResult<Self> {
        match field {
            None => Ok(CoverChange::Keep),
            Some(None) => Ok(CoverChange::Clear),
            Some(Some(raw)) => match raw.trim() {
                "" => Ok(CoverChange::Clear),
                id => Uuid::parse_str(id)
                    .map(CoverChange::Set)
                    .map_err(|_| ServiceError::CoverNotInAlbum),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlbumPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover: CoverChange,
}

#[derive(Debug)]
pub struct AlbumDetail {
    pub album: Album,
    pub photos: Page<Photo>,
}

#[derive(Clone)]
pub struct AlbumService {
    pub db: Arc<SqlitePool>,
}

impl AlbumService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Create an album together with its initial members.
    ///
    /// All supplied photos must be live and owned by `owner`, checked with one
    /// count against the distinct ids. Duplicate ids link once, at the
    /// position of their first occurrence. Without an explicit cover the
    /// first supplied photo becomes the cover.
    #[instrument(skip(self, input), fields(owner = %owner.user_id, photos = input.photo_ids.len()))]
    pub async fn create(&self, owner: &Owner, input: NewAlbum) -> ServiceResult<Album> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ServiceError::Validation("missing_title"));
        }
        let description = input.description.as_deref().map(str::trim).unwrap_or_default();
        let photo_ids = parse_photo_ids(&input.photo_ids)?;

        let explicit_cover = match input.cover_photo_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| ServiceError::CoverNotInAlbum)?),
        };
        if explicit_cover.is_some_and(|cover| !photo_ids.contains(&cover)) {
            return Err(ServiceError::CoverNotInAlbum);
        }

        let now = timestamp_now();
        let mut album = Album {
            id: Uuid::new_v4(),
            owner_id: owner.user_id,
            title: title.to_string(),
            description: description.to_string(),
            cover_photo_id: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO albums (id, owner_id, title, description, cover_photo_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(album.id)
        .bind(album.owner_id)
        .bind(&album.title)
        .bind(&album.description)
        .bind(album.created_at)
        .bind(album.updated_at)
        .execute(&mut *tx)
        .await?;

        if !photo_ids.is_empty() {
            ensure_photos_visible(&mut tx, owner, &photo_ids).await?;
            link_photos(&mut tx, album.id, &photo_ids, 0, now).await?;
        }

        album.cover_photo_id = explicit_cover.or_else(|| photo_ids.first().copied());

        sqlx::query("UPDATE albums SET cover_photo_id = ?, updated_at = ? WHERE id = ?")
            .bind(album.cover_photo_id)
            .bind(album.updated_at)
            .bind(album.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(album_id = %album.id, cover = ?album.cover_photo_id, "album created");
        Ok(album)
    }

    /// One page of the owner's albums, newest first.
    pub async fn list(
        &self,
        owner: &Owner,
        limit: i64,
        after: Option<Cursor>,
    ) -> ServiceResult<Page<Album>> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {ALBUM_COLUMNS} FROM albums a WHERE"));
        push_visible_to(&mut builder, "a.", owner);
        if let Some(cursor) = &after {
            push_after_cursor(&mut builder, "a.created_at", "a.id", cursor);
        }
        push_order_and_limit(&mut builder, "a.created_at", "a.id", limit);

        let rows: Vec<Album> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(Page::from_rows(rows, limit, |a| Cursor::new(a.created_at, a.id)))
    }

    /// Album metadata plus one page of its live photos.
    ///
    /// Photos are ordered by when they were linked (`added_at`), not by when
    /// they were uploaded, and the cursor carries the link time.
    pub async fn get_with_photos(
        &self,
        owner: &Owner,
        id: Uuid,
        limit: i64,
        after: Option<Cursor>,
    ) -> ServiceResult<AlbumDetail> {
        let album = fetch_visible_album(&*self.db, owner, id)
            .await?
            .ok_or(ServiceError::NotFound("album_not_found"))?;

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PHOTO_COLUMNS}, ap.added_at \
             FROM album_photos ap JOIN photos p ON p.id = ap.photo_id \
             WHERE ap.album_id = "
        ));
        builder.push_bind(album.id);
        builder.push(" AND");
        push_visible_to(&mut builder, "p.", owner);
        if let Some(cursor) = &after {
            push_after_cursor(&mut builder, "ap.added_at", "p.id", cursor);
        }
        push_order_and_limit(&mut builder, "ap.added_at", "p.id", limit);

        let rows: Vec<AlbumPhotoEntry> = builder.build_query_as().fetch_all(&*self.db).await?;
        let photos = Page::from_rows(rows, limit, |e| Cursor::new(e.added_at, e.photo.id))
            .map(|e| e.photo);

        Ok(AlbumDetail { album, photos })
    }

    /// Link more photos into an existing album.
    ///
    /// Validation matches [`AlbumService::create`]. New links are positioned
    /// after the current last one. Returns how many links were actually added.
    #[instrument(skip(self, raw_ids), fields(owner = %owner.user_id, requested = raw_ids.len()))]
    pub async fn add_photos(&self, owner: &Owner, id: Uuid, raw_ids: &[String]) -> ServiceResult<u64> {
        let photo_ids = parse_photo_ids(raw_ids)?;

        let mut tx = self.db.begin().await?;
        let album = fetch_visible_album(&mut *tx, owner, id)
            .await?
            .ok_or(ServiceError::NotFound("album_not_found"))?;

        if photo_ids.is_empty() {
            return Ok(0);
        }

        ensure_photos_visible(&mut tx, owner, &photo_ids).await?;

        let next_pos: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(pos) + 1, 0) FROM album_photos WHERE album_id = ?")
                .bind(album.id)
                .fetch_one(&mut *tx)
                .await?;

        let now = timestamp_now();
        let added = link_photos(&mut tx, album.id, &photo_ids, next_pos, now).await?;

        let cover = album.cover_photo_id.or_else(|| photo_ids.first().copied());
        sqlx::query("UPDATE albums SET cover_photo_id = ?, updated_at = ? WHERE id = ?")
            .bind(cover)
            .bind(now)
            .bind(album.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(album_id = %album.id, added, "photos linked");
        Ok(added)
    }

    /// Unlink photos from an album.
    ///
    /// Returns the number of ids requested, not the number of links that
    /// existed. Removing the cover photo clears the cover.
    #[instrument(skip(self, raw_ids), fields(owner = %owner.user_id, requested = raw_ids.len()))]
    pub async fn remove_photos(
        &self,
        owner: &Owner,
        id: Uuid,
        raw_ids: &[String],
    ) -> ServiceResult<usize> {
        let mut tx = self.db.begin().await?;
        let album = fetch_visible_album(&mut *tx, owner, id)
            .await?
            .ok_or(ServiceError::NotFound("album_not_found"))?;

        // Ids that are not UUIDs cannot be linked; they still count as requested.
        let photo_ids: Vec<Uuid> = raw_ids
            .iter()
            .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
            .collect();

        if !photo_ids.is_empty() {
            let mut builder =
                QueryBuilder::<Sqlite>::new("DELETE FROM album_photos WHERE album_id = ");
            builder.push_bind(album.id);
            builder.push(" AND");
            push_id_list(&mut builder, "photo_id", &photo_ids);
            builder.build().execute(&mut *tx).await?;

            if album.cover_photo_id.is_some_and(|cover| photo_ids.contains(&cover)) {
                sqlx::query("UPDATE albums SET cover_photo_id = NULL, updated_at = ? WHERE id = ?")
                    .bind(timestamp_now())
                    .bind(album.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(raw_ids.len())
    }

    /// Partial metadata update.
    ///
    /// A new cover must already be linked to the album; otherwise nothing is
    /// written and `CoverNotInAlbum` is returned.
    #[instrument(skip(self, patch), fields(owner = %owner.user_id))]
    pub async fn update(&self, owner: &Owner, id: Uuid, patch: AlbumPatch) -> ServiceResult<Album> {
        let mut tx = self.db.begin().await?;
        let mut album = fetch_visible_album(&mut *tx, owner, id)
            .await?
            .ok_or(ServiceError::NotFound("album_not_found"))?;

        if let Some(title) = patch.title.as_deref().map(str::trim) {
            if title.is_empty() {
                return Err(ServiceError::Validation("missing_title"));
            }
            album.title = title.to_string();
        }
        if let Some(description) = patch.description.as_deref() {
            album.description = description.trim().to_string();
        }

        match patch.cover {
            CoverChange::Keep => {}
            CoverChange::Clear => album.cover_photo_id = None,
            CoverChange::Set(photo_id) => {
                let linked: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM album_photos WHERE album_id = ? AND photo_id = ?",
                )
                .bind(album.id)
                .bind(photo_id)
                .fetch_one(&mut *tx)
                .await?;
                if linked == 0 {
                    return Err(ServiceError::CoverNotInAlbum);
                }
                album.cover_photo_id = Some(photo_id);
            }
        }

        album.updated_at = timestamp_now();
        sqlx::query(
            "UPDATE albums SET title = ?, description = ?, cover_photo_id = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&album.title)
        .bind(&album.description)
        .bind(album.cover_photo_id)
        .bind(album.updated_at)
        .bind(album.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(album)
    }

    /// Tombstone an album and clear its cover. Links are left in place.
    /// Deleting an unknown or already-deleted album is a no-op.
    #[instrument(skip(self), fields(owner = %owner.user_id))]
    pub async fn delete(&self, owner: &Owner, id: Uuid) -> ServiceResult<bool> {
        let now = timestamp_now();
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE albums SET deleted_at = ");
        builder.push_bind(now);
        builder.push(", cover_photo_id = NULL, updated_at = ");
        builder.push_bind(now);
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" AND");
        push_visible_to(&mut builder, "", owner);

        let result = builder.build().execute(&*self.db).await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Parse caller-supplied photo ids. Anything that is not a UUID cannot
/// name a photo.
fn parse_photo_ids(raw: &[String]) -> ServiceResult<Vec<Uuid>> {
    raw.iter()
        .map(|id| Uuid::parse_str(id.trim()).map_err(|_| ServiceError::PhotoNotFound))
        .collect()
}

/// Fail with `PhotoNotFound` unless every distinct id is a live photo of
/// `owner`.
async fn ensure_photos_visible(
    conn: &mut SqliteConnection,
    owner: &Owner,
    ids: &[Uuid],
) -> ServiceResult<()> {
    let distinct: Vec<Uuid> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();

    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM photos p WHERE");
    push_visible_to(&mut builder, "p.", owner);
    builder.push(" AND");
    push_id_list(&mut builder, "p.id", &distinct);

    let found: i64 = builder.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;
    if found != distinct.len() as i64 {
        debug!(found, expected = distinct.len(), "photo membership check failed");
        return Err(ServiceError::PhotoNotFound);
    }
    Ok(())
}

/// Insert links for `ids`, skipping pairs that already exist. Positions
/// start at `first_pos` and follow input order. Returns rows inserted.
async fn link_photos(
    conn: &mut SqliteConnection,
    album_id: Uuid,
    ids: &[Uuid],
    first_pos: i64,
    added_at: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Sqlite>::new("INSERT INTO album_photos (album_id, photo_id, pos, added_at) ");
    builder.push_values(ids.iter().enumerate(), |mut row, (offset, photo_id)| {
        row.push_bind(album_id)
            .push_bind(*photo_id)
            .push_bind(first_pos + offset as i64)
            .push_bind(added_at);
    });
    builder.push(" ON CONFLICT(album_id, photo_id) DO NOTHING");

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

async fn fetch_visible_album<'e, E>(
    executor: E,
    owner: &Owner,
    id: Uuid,
) -> Result<Option<Album>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("SELECT {ALBUM_FIELDS} FROM albums WHERE id = "));
    builder.push_bind(id);
    builder.push(" AND");
    push_visible_to(&mut builder, "", owner);
    builder.build_query_as::<Album>().fetch_optional(executor).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::testing::{memory_db, other_owner};

    #[derive(sqlx::FromRow)]
    struct Link {
        photo_id: Uuid,
        pos: i64,
    }

    struct Fixture {
        albums: AlbumService,
        owner: Owner,
    }

    impl Fixture {
        async fn new() -> Self {
            let (db, owner) = memory_db().await;
            Self {
                albums: AlbumService::new(Arc::new(db)),
                owner,
            }
        }

        fn db(&self) -> &SqlitePool {
            &self.albums.db
        }

        async fn photo_for(&self, owner: &Owner, created_at: &str) -> Uuid {
            let id = Uuid::new_v4();
            let ts: DateTime<Utc> = created_at.parse().unwrap();
            sqlx::query(
                "INSERT INTO photos (id, owner_id, title, description, origin_key,
                                     content_type, bytes, created_at)
                 VALUES (?, ?, '', '', ?, 'image/jpeg', 10, ?)",
            )
            .bind(id)
            .bind(owner.user_id)
            .bind(format!("{id}.jpg"))
            .bind(ts)
            .execute(self.db())
            .await
            .unwrap();
            id
        }

        async fn photo(&self) -> Uuid {
            self.photo_for(&self.owner, "2024-03-01T12:00:00Z").await
        }

        /// Links of an album in position order, tombstoned photos included.
        async fn memberships(&self, album_id: Uuid) -> Vec<Link> {
            sqlx::query_as::<_, Link>(
                "SELECT photo_id, pos FROM album_photos WHERE album_id = ? ORDER BY pos ASC",
            )
            .bind(album_id)
            .fetch_all(self.db())
            .await
            .unwrap()
        }

        async fn count(&self, table: &str) -> i64 {
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(self.db())
                .await
                .unwrap()
        }

        async fn create(&self, title: &str, ids: &[Uuid]) -> ServiceResult<Album> {
            self.albums
                .create(
                    &self.owner,
                    NewAlbum {
                        title: title.into(),
                        photo_ids: ids.iter().map(Uuid::to_string).collect(),
                        ..NewAlbum::default()
                    },
                )
                .await
        }
    }

    #[tokio::test]
    async fn create_defaults_cover_to_first_photo() {
        let fx = Fixture::new().await;
        let (p1, p2) = (fx.photo().await, fx.photo().await);

        let album = fx.create("  Trip ", &[p1, p2]).await.unwrap();
        assert_eq!(album.title, "Trip");
        assert_eq!(album.cover_photo_id, Some(p1));

        let links = fx.memberships(album.id).await;
        let order: Vec<(Uuid, i64)> = links.iter().map(|l| (l.photo_id, l.pos)).collect();
        assert_eq!(order, vec![(p1, 0), (p2, 1)]);

        let stored: Option<Uuid> =
            sqlx::query_scalar("SELECT cover_photo_id FROM albums WHERE id = ?")
                .bind(album.id)
                .fetch_one(fx.db())
                .await
                .unwrap();
        assert_eq!(stored, Some(p1));
    }

    #[tokio::test]
    async fn create_without_photos_has_no_cover() {
        let fx = Fixture::new().await;
        let album = fx.create("Empty", &[]).await.unwrap();
        assert_eq!(album.cover_photo_id, None);
        assert_eq!(fx.count("album_photos").await, 0);
    }

    #[tokio::test]
    async fn duplicate_ids_link_once() {
        let fx = Fixture::new().await;
        let (p1, p2) = (fx.photo().await, fx.photo().await);

        let album = fx.create("Dups", &[p1, p2, p1]).await.unwrap();
        let links = fx.memberships(album.id).await;
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].photo_id, p1);
        assert_eq!(links[0].pos, 0);
    }

    #[tokio::test]
    async fn create_is_all_or_nothing() {
        let fx = Fixture::new().await;
        let stranger = other_owner(fx.db()).await;
        let mine = fx.photo().await;
        let foreign = fx.photo_for(&stranger, "2024-03-01T12:00:00Z").await;
        let deleted = fx.photo().await;
        sqlx::query("UPDATE photos SET deleted_at = ? WHERE id = ?")
            .bind(timestamp_now())
            .bind(deleted)
            .execute(fx.db())
            .await
            .unwrap();

        for bad in [Uuid::new_v4(), foreign, deleted] {
            let err = fx.create("Broken", &[mine, bad]).await.unwrap_err();
            assert!(matches!(err, ServiceError::PhotoNotFound), "{bad}");
        }

        let err = fx
            .albums
            .create(
                &fx.owner,
                NewAlbum {
                    title: "Typo".into(),
                    photo_ids: vec![mine.to_string(), "not-a-uuid".into()],
                    ..NewAlbum::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PhotoNotFound));

        assert_eq!(fx.count("albums").await, 0);
        assert_eq!(fx.count("album_photos").await, 0);
    }

    #[tokio::test]
    async fn explicit_cover_must_be_a_member() {
        let fx = Fixture::new().await;
        let (p1, p2, p3) = (fx.photo().await, fx.photo().await, fx.photo().await);

        let album = fx
            .albums
            .create(
                &fx.owner,
                NewAlbum {
                    title: "Chosen".into(),
                    cover_photo_id: Some(p2.to_string()),
                    photo_ids: vec![p1.to_string(), p2.to_string()],
                    ..NewAlbum::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(album.cover_photo_id, Some(p2));

        let err = fx
            .albums
            .create(
                &fx.owner,
                NewAlbum {
                    title: "Outsider".into(),
                    cover_photo_id: Some(p3.to_string()),
                    photo_ids: vec![p1.to_string()],
                    ..NewAlbum::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CoverNotInAlbum));
        assert_eq!(fx.count("albums").await, 1);
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let fx = Fixture::new().await;
        let err = fx.create("   ", &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation("missing_title")));
    }

    #[tokio::test]
    async fn album_photos_sort_by_link_time_not_upload_time() {
        let fx = Fixture::new().await;
        let old_upload = fx.photo_for(&fx.owner, "2020-01-01T00:00:00Z").await;
        let new_upload = fx.photo_for(&fx.owner, "2024-01-01T00:00:00Z").await;
        let album = fx.create("Mixed", &[new_upload, old_upload]).await.unwrap();

        sqlx::query("UPDATE album_photos SET added_at = ? WHERE photo_id = ?")
            .bind("2025-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap())
            .bind(old_upload)
            .execute(fx.db())
            .await
            .unwrap();
        sqlx::query("UPDATE album_photos SET added_at = ? WHERE photo_id = ?")
            .bind("2025-05-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap())
            .bind(new_upload)
            .execute(fx.db())
            .await
            .unwrap();

        let first = fx
            .albums
            .get_with_photos(&fx.owner, album.id, 1, None)
            .await
            .unwrap();
        assert_eq!(first.photos.items[0].id, old_upload);
        assert!(!first.photos.next_cursor.is_empty());

        let cursor = Cursor::decode(&first.photos.next_cursor).unwrap();
        let second = fx
            .albums
            .get_with_photos(&fx.owner, album.id, 1, Some(cursor))
            .await
            .unwrap();
        assert_eq!(second.photos.items[0].id, new_upload);

        let cursor = Cursor::decode(&second.photos.next_cursor).unwrap();
        let third = fx
            .albums
            .get_with_photos(&fx.owner, album.id, 1, Some(cursor))
            .await
            .unwrap();
        assert!(third.photos.items.is_empty());
        assert!(third.photos.next_cursor.is_empty());
    }

    #[tokio::test]
    async fn album_listing_hides_deleted_photos() {
        let fx = Fixture::new().await;
        let (p1, p2) = (fx.photo().await, fx.photo().await);
        let album = fx.create("Partly gone", &[p1, p2]).await.unwrap();
        sqlx::query("UPDATE photos SET deleted_at = ? WHERE id = ?")
            .bind(timestamp_now())
            .bind(p2)
            .execute(fx.db())
            .await
            .unwrap();

        let detail = fx
            .albums
            .get_with_photos(&fx.owner, album.id, 10, None)
            .await
            .unwrap();
        let ids: Vec<Uuid> = detail.photos.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![p1]);
    }

    #[tokio::test]
    async fn cover_update_requires_membership() {
        let fx = Fixture::new().await;
        let (p1, p2, outsider) = (fx.photo().await, fx.photo().await, fx.photo().await);
        let album = fx.create("Covers", &[p1, p2]).await.unwrap();

        let err = fx
            .albums
            .update(
                &fx.owner,
                album.id,
                AlbumPatch {
                    title: Some("Renamed".into()),
                    cover: CoverChange::Set(outsider),
                    ..AlbumPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CoverNotInAlbum));

        let unchanged = fx
            .albums
            .get_with_photos(&fx.owner, album.id, 1, None)
            .await
            .unwrap()
            .album;
        assert_eq!(unchanged.cover_photo_id, Some(p1));
        assert_eq!(unchanged.title, "Covers");

        let moved = fx
            .albums
            .update(
                &fx.owner,
                album.id,
                AlbumPatch {
                    cover: CoverChange::Set(p2),
                    ..AlbumPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.cover_photo_id, Some(p2));

        let cleared = fx
            .albums
            .update(
                &fx.owner,
                album.id,
                AlbumPatch {
                    description: Some("  notes  ".into()),
                    cover: CoverChange::Clear,
                    ..AlbumPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.cover_photo_id, None);
        assert_eq!(cleared.description, "notes");
        assert_eq!(cleared.title, "Covers");
    }

    #[test]
    fn cover_field_interpretation() {
        let id = Uuid::new_v4();
        assert_eq!(CoverChange::from_field(None).unwrap(), CoverChange::Keep);
        assert_eq!(CoverChange::from_field(Some(None)).unwrap(), CoverChange::Clear);
        assert_eq!(
            CoverChange::from_field(Some(Some(String::new()))).unwrap(),
            CoverChange::Clear
        );
        assert_eq!(
            CoverChange::from_field(Some(Some(id.to_string()))).unwrap(),
            CoverChange::Set(id)
        );
        assert!(matches!(
            CoverChange::from_field(Some(Some("p1".into()))),
            Err(ServiceError::CoverNotInAlbum)
        ));
    }

    #[tokio::test]
    async fn add_photos_appends_and_skips_existing() {
        let fx = Fixture::new().await;
        let (p1, p2, p3) = (fx.photo().await, fx.photo().await, fx.photo().await);
        let album = fx.create("Growing", &[]).await.unwrap();

        let added = fx
            .albums
            .add_photos(&fx.owner, album.id, &[p1.to_string(), p2.to_string()])
            .await
            .unwrap();
        assert_eq!(added, 2);

        let added = fx
            .albums
            .add_photos(&fx.owner, album.id, &[p2.to_string(), p3.to_string()])
            .await
            .unwrap();
        assert_eq!(added, 1);

        let links = fx.memberships(album.id).await;
        let order: Vec<(Uuid, i64)> = links.iter().map(|l| (l.photo_id, l.pos)).collect();
        assert_eq!(order, vec![(p1, 0), (p2, 1), (p3, 3)]);

        let album = fx
            .albums
            .get_with_photos(&fx.owner, album.id, 1, None)
            .await
            .unwrap()
            .album;
        assert_eq!(album.cover_photo_id, Some(p1));

        let err = fx
            .albums
            .add_photos(&fx.owner, album.id, &[Uuid::new_v4().to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PhotoNotFound));

        let err = fx
            .albums
            .add_photos(&fx.owner, Uuid::new_v4(), &[p1.to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("album_not_found")));
    }

    #[tokio::test]
    async fn remove_photos_reports_requested_count() {
        let fx = Fixture::new().await;
        let (p1, p2) = (fx.photo().await, fx.photo().await);
        let album = fx.create("Shrinking", &[p1, p2]).await.unwrap();

        let removed = fx
            .albums
            .remove_photos(
                &fx.owner,
                album.id,
                &[p1.to_string(), Uuid::new_v4().to_string(), "junk".into()],
            )
            .await
            .unwrap();
        assert_eq!(removed, 3);

        let links = fx.memberships(album.id).await;
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].photo_id, p2);

        let album = fx
            .albums
            .get_with_photos(&fx.owner, album.id, 10, None)
            .await
            .unwrap()
            .album;
        assert_eq!(album.cover_photo_id, None, "removed cover is cleared");

        assert_eq!(
            fx.albums.remove_photos(&fx.owner, album.id, &[]).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn delete_tombstones_album_and_keeps_links() {
        let fx = Fixture::new().await;
        let p1 = fx.photo().await;
        let album = fx.create("Old", &[p1]).await.unwrap();
        let kept = fx.create("Kept", &[]).await.unwrap();

        assert!(fx.albums.delete(&fx.owner, album.id).await.unwrap());
        assert!(!fx.albums.delete(&fx.owner, album.id).await.unwrap());

        let page = fx.albums.list(&fx.owner, 10, None).await.unwrap();
        let ids: Vec<Uuid> = page.items.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![kept.id]);
        assert!(matches!(
            fx.albums.get_with_photos(&fx.owner, album.id, 10, None).await,
            Err(ServiceError::NotFound("album_not_found"))
        ));

        let (deleted_at, cover): (Option<DateTime<Utc>>, Option<Uuid>) =
            sqlx::query_as("SELECT deleted_at, cover_photo_id FROM albums WHERE id = ?")
                .bind(album.id)
                .fetch_one(fx.db())
                .await
                .unwrap();
        assert!(deleted_at.is_some());
        assert_eq!(cover, None);
        assert_eq!(fx.memberships(album.id).await.len(), 1);
    }

    #[tokio::test]
    async fn albums_page_in_creation_order() {
        let fx = Fixture::new().await;
        let stranger = other_owner(fx.db()).await;
        for title in ["a", "b", "c", "d", "e"] {
            fx.create(title, &[]).await.unwrap();
        }
        fx.albums
            .create(
                &stranger,
                NewAlbum {
                    title: "theirs".into(),
                    ..NewAlbum::default()
                },
            )
            .await
            .unwrap();

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = fx.albums.list(&fx.owner, 2, cursor).await.unwrap();
            seen.extend(page.items.iter().map(|a| (a.created_at, a.id)));
            if page.next_cursor.is_empty() {
                break;
            }
            cursor = Some(Cursor::decode(&page.next_cursor).unwrap());
        }
        assert_eq!(seen.len(), 5);
        assert!(seen.windows(2).all(|w| w[0] > w[1]));
    }
}
