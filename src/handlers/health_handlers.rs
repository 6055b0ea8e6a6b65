//! Health, readiness & version handlers.
//!
//! - GET /healthz  -> liveness, no I/O
//! - GET /readyz   -> checks SQLite and the photo bucket
//! - GET /version  -> crate version

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// `GET /version`
pub async fn version() -> impl IntoResponse {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

/// `GET /readyz`
///
/// 200 when both the database and the object store answer, 503 otherwise.
/// The body names the failed check; the cause goes to the log only.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let sqlite = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(state.db())
        .await
    {
        Ok(1) => CheckStatus::ok(),
        Ok(v) => {
            tracing::warn!(result = v, "readiness: unexpected sqlite probe result");
            CheckStatus::failed()
        }
        Err(e) => {
            tracing::warn!(error = %e, "readiness: sqlite unavailable");
            CheckStatus::failed()
        }
    };

    let object_store = match state.store.health().await {
        Ok(()) => CheckStatus::ok(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness: object store unavailable");
            CheckStatus::failed()
        }
    };

    let overall_ok = sqlite.ok && object_store.ok;

    let mut checks = BTreeMap::new();
    checks.insert("sqlite", sqlite);
    checks.insert("object_store", object_store);

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadyResponse { ok: overall_ok, checks }))
}

#[derive(Serialize)]
struct ReadyResponse {
    ok: bool,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self { ok: true, error: None }
    }

    fn failed() -> Self {
        Self { ok: false, error: Some("unavailable") }
    }
}
