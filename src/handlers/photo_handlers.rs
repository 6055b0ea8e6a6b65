//! HTTP handlers for the photo catalogue.
//! Upload bytes go straight to the bucket; these endpoints only hand out
//! presigned URLs and manage metadata rows.

use crate::{
    errors::AppError,
    handlers::extract::{AppJson, AppPath, QueryParams},
    models::photo::Photo,
    services::{
        Owner,
        pagination::{Cursor, PHOTO_PAGE, Page},
        photo_service::{NewPhoto, PhotoPatch, resolve_download_ttl},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PresignRequest {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub content_type: String,
}

#[derive(Debug, Serialize)]
pub struct PresignResponse {
    pub url: String,
    pub key: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub bytes: i64,
    #[serde(default)]
    pub content_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhotoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// `GET /photos`
pub async fn list_photos(
    State(state): State<AppState>,
    owner: Owner,
    params: QueryParams,
) -> Result<Json<Page<Photo>>, AppError> {
    let limit = PHOTO_PAGE.resolve(params.get("limit"));
    let after = Cursor::parse_param(params.get("cursor"))?;
    let page = state.photos.list(&owner, limit, after).await?;
    Ok(Json(page))
}

/// `GET /photos/{id}`
pub async fn get_photo(
    State(state): State<AppState>,
    owner: Owner,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Photo>, AppError> {
    Ok(Json(state.photos.get(&owner, id).await?))
}

/// `GET /photos/{id}/url?ttl=<secs>`
pub async fn photo_url(
    State(state): State<AppState>,
    owner: Owner,
    AppPath(id): AppPath<Uuid>,
    params: QueryParams,
) -> Result<Json<UrlResponse>, AppError> {
    let ttl = resolve_download_ttl(params.get("ttl"));
    let (url, expires_at) = state.photos.download_url(&owner, id, ttl).await?;
    Ok(Json(UrlResponse { url, expires_at }))
}

/// `POST /photos/presign`
pub async fn presign_photo(
    State(state): State<AppState>,
    owner: Owner,
    AppJson(req): AppJson<PresignRequest>,
) -> Result<Json<PresignResponse>, AppError> {
    let ticket = state
        .photos
        .presign_upload(&owner, &req.filename, &req.content_type)
        .await?;
    Ok(Json(PresignResponse {
        url: ticket.url,
        key: ticket.key,
        headers: ticket.headers,
    }))
}

/// `POST /photos/confirm`
///
/// 201 for a new row, 200 when the key was already confirmed.
pub async fn confirm_photo(
    State(state): State<AppState>,
    owner: Owner,
    AppJson(req): AppJson<ConfirmRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (photo, created) = state
        .photos
        .confirm(
            &owner,
            NewPhoto {
                key: req.key,
                bytes: req.bytes,
                content_type: req.content_type,
                title: req.title,
                description: req.description,
            },
        )
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(photo)))
}

/// `PATCH /photos/{id}`
pub async fn update_photo(
    State(state): State<AppState>,
    owner: Owner,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdatePhotoRequest>,
) -> Result<Json<Photo>, AppError> {
    let patch = PhotoPatch {
        title: req.title,
        description: req.description,
    };
    Ok(Json(state.photos.update(&owner, id, patch).await?))
}

/// `DELETE /photos/{id}`. Always 204 once the id parses.
pub async fn delete_photo(
    State(state): State<AppState>,
    owner: Owner,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.photos.delete(&owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
