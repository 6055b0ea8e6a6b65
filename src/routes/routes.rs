//! Defines routes for the photo catalogue and albums.
//!
//! ## Structure
//! - **Photos**
//!   - `GET    /photos`            - keyset-paginated listing (`limit`, `cursor`)
//!   - `POST   /photos/presign`    - presigned PUT for a new upload
//!   - `POST   /photos/confirm`    - register an uploaded object
//!   - `GET    /photos/{id}`       - one photo
//!   - `PATCH  /photos/{id}`       - edit title/description
//!   - `DELETE /photos/{id}`       - soft-delete
//!   - `GET    /photos/{id}/url`   - presigned download URL (`ttl`)
//!
//! - **Albums**
//!   - `GET    /albums`               - keyset-paginated listing
//!   - `POST   /albums`               - create, optionally with photos
//!   - `GET    /albums/{id}`          - album plus a page of its photos
//!   - `PATCH  /albums/{id}`          - edit title/description/cover
//!   - `DELETE /albums/{id}`          - soft-delete
//!   - `POST   /albums/{id}/photos`   - link photos
//!   - `DELETE /albums/{id}/photos`   - unlink photos
//!
//! - **Probes**: `/healthz`, `/readyz`, `/version`

use crate::{
    errors::AppError,
    handlers::{
        album_handlers::{
            add_album_photos, create_album, delete_album, get_album, list_albums,
            remove_album_photos, update_album,
        },
        health_handlers::{healthz, readyz, version},
        photo_handlers::{
            confirm_photo, delete_photo, get_photo, list_photos, photo_url, presign_photo,
            update_photo,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::any::Any;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Build the router for all API routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // probes (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/version", get(version))
        // photo routes; static segments win over `{id}`
        .route("/photos", get(list_photos))
        .route("/photos/presign", post(presign_photo))
        .route("/photos/confirm", post(confirm_photo))
        .route(
            "/photos/{id}",
            get(get_photo).patch(update_photo).delete(delete_photo),
        )
        .route("/photos/{id}/url", get(photo_url))
        // album routes
        .route("/albums", get(list_albums).post(create_album))
        .route(
            "/albums/{id}",
            get(get_album).patch(update_album).delete(delete_album),
        )
        .route(
            "/albums/{id}/photos",
            post(add_album_photos).delete(remove_album_photos),
        )
}

/// The complete application: routes, state and middleware.
pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    with_middleware(routes().with_state(state), cors_origins)
}

/// Wrap a router with request ids, tracing, CORS and panic recovery.
///
/// Layers run outermost-first in reverse order of the calls below: the
/// request id is assigned before the trace span opens, so every log line of
/// a request, including a recovered panic, carries it.
pub fn with_middleware(router: Router, cors_origins: &[String]) -> Router {
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer(cors_origins))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id,
            )
        }))
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AnyOrigin);

    if origins.is_empty() {
        return layer.allow_origin(AnyOrigin);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = %detail, "request handler panicked");
    AppError::internal().into_response()
}
