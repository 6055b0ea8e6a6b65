use crate::services::{
    Owner, album_service::AlbumService, object_store::ObjectStore, photo_service::PhotoService,
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

/// Shared handler state. Cheap to clone; every field is a handle.
#[derive(Clone)]
pub struct AppState {
    pub photos: PhotoService,
    pub albums: AlbumService,
    pub store: Arc<dyn ObjectStore>,
    /// Account that all requests act as until real authentication exists.
    pub local_owner: Owner,
}

impl AppState {
    pub fn new(
        db: Arc<SqlitePool>,
        store: Arc<dyn ObjectStore>,
        upload_url_ttl: Duration,
        local_owner: Owner,
    ) -> Self {
        Self {
            photos: PhotoService::new(db.clone(), store.clone(), upload_url_ttl),
            albums: AlbumService::new(db),
            store,
            local_owner,
        }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.photos.db
    }
}
