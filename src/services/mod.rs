//! Domain services: the photo catalogue, album membership, pagination and
//! the object store gateway. Handlers stay thin and delegate here.

pub mod album_service;
pub mod database;
pub mod object_store;
pub mod pagination;
pub mod photo_service;

use object_store::ObjectStoreError;
use pagination::CursorError;
use sqlx::{QueryBuilder, sqlite::Sqlite};
use thiserror::Error;
use uuid::Uuid;

/// Who a request acts on behalf of.
///
/// Every catalogue operation takes one explicitly; today the value always
/// comes from the seeded local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub user_id: Uuid,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(&'static str),
    #[error(transparent)]
    InvalidCursor(#[from] CursorError),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("one or more photos do not exist or are not visible")]
    PhotoNotFound,
    #[error("cover photo is not linked to the album")]
    CoverNotInAlbum,
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Upstream(#[from] ObjectStoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Restrict a query to live rows owned by `owner`.
///
/// `prefix` is the table qualifier including its dot (`"p."`), or empty for
/// single-table statements. Every read and write path filters tombstones
/// through here.
pub(crate) fn push_visible_to(builder: &mut QueryBuilder<'_, Sqlite>, prefix: &str, owner: &Owner) {
    builder.push(format!(" {prefix}owner_id = "));
    builder.push_bind(owner.user_id);
    builder.push(format!(" AND {prefix}deleted_at IS NULL"));
}

/// Append `col IN (?, ?, ...)`. `ids` must not be empty.
pub(crate) fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, col: &str, ids: &[Uuid]) {
    builder.push(format!(" {col} IN ("));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}
