//! HTTP handlers for albums and album membership.

use crate::{
    errors::AppError,
    handlers::extract::{AppJson, AppPath, QueryParams},
    models::{album::Album, photo::Photo},
    services::{
        Owner,
        album_service::{AlbumPatch, CoverChange, NewAlbum},
        pagination::{ALBUM_PAGE, ALBUM_PHOTO_PAGE, Cursor, Page},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateAlbumRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub cover_photo_id: Option<String>,
    #[serde(default)]
    pub photo_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAlbumRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absent keeps the cover; `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub cover_photo_id: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoIdsRequest {
    #[serde(default)]
    pub photo_ids: Vec<String>,
}

/// Album fields plus one page of its photos.
#[derive(Debug, Serialize)]
pub struct AlbumDetailResponse {
    #[serde(flatten)]
    pub album: Album,
    pub photos: Vec<Photo>,
    pub next_cursor: String,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// `GET /albums`
pub async fn list_albums(
    State(state): State<AppState>,
    owner: Owner,
    params: QueryParams,
) -> Result<Json<Page<Album>>, AppError> {
    let limit = ALBUM_PAGE.resolve(params.get("limit"));
    let after = Cursor::parse_param(params.get("cursor"))?;
    Ok(Json(state.albums.list(&owner, limit, after).await?))
}

/// `GET /albums/{id}`
pub async fn get_album(
    State(state): State<AppState>,
    owner: Owner,
    AppPath(id): AppPath<Uuid>,
    params: QueryParams,
) -> Result<Json<AlbumDetailResponse>, AppError> {
    let limit = ALBUM_PHOTO_PAGE.resolve(params.get("limit"));
    let after = Cursor::parse_param(params.get("cursor"))?;

    let detail = state.albums.get_with_photos(&owner, id, limit, after).await?;
    Ok(Json(AlbumDetailResponse {
        album: detail.album,
        photos: detail.photos.items,
        next_cursor: detail.photos.next_cursor,
    }))
}

/// `POST /albums`
pub async fn create_album(
    State(state): State<AppState>,
    owner: Owner,
    AppJson(req): AppJson<CreateAlbumRequest>,
) -> Result<(StatusCode, Json<Album>), AppError> {
    let album = state
        .albums
        .create(
            &owner,
            NewAlbum {
                title: req.title,
                description: req.description,
                cover_photo_id: req.cover_photo_id,
                photo_ids: req.photo_ids,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(album)))
}

/// `PATCH /albums/{id}`
pub async fn update_album(
    State(state): State<AppState>,
    owner: Owner,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateAlbumRequest>,
) -> Result<Json<Album>, AppError> {
    let patch = AlbumPatch {
        title: req.title,
        description: req.description,
        cover: CoverChange::from_field(req.cover_photo_id)?,
    };
    Ok(Json(state.albums.update(&owner, id, patch).await?))
}

/// `DELETE /albums/{id}`
pub async fn delete_album(
    State(state): State<AppState>,
    owner: Owner,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.albums.delete(&owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /albums/{id}/photos`
pub async fn add_album_photos(
    State(state): State<AppState>,
    owner: Owner,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<PhotoIdsRequest>,
) -> Result<Json<Value>, AppError> {
    let added = state.albums.add_photos(&owner, id, &req.photo_ids).await?;
    Ok(Json(json!({ "added": added })))
}

/// `DELETE /albums/{id}/photos`
pub async fn remove_album_photos(
    State(state): State<AppState>,
    owner: Owner,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<PhotoIdsRequest>,
) -> Result<Json<Value>, AppError> {
    let removed = state.albums.remove_photos(&owner, id, &req.photo_ids).await?;
    Ok(Json(json!({ "removed": removed })))
}
