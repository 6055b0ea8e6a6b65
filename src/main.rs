use anyhow::{Context, Result};
use std::{io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::{
    Owner,
    database,
    object_store::{ObjectStore, S3ObjectStore},
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- .env before anything reads the environment ---
    dotenv::dotenv().ok();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting moments-api with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    ensure_db_parent(&cfg.database_url)?;
    let db = database::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening database {}", cfg.database_url))?;

    let applied = database::run_migrations(&db)
        .await
        .context("running migrations")?;
    tracing::info!("Applied {} migration statements", applied);

    // --- Handle migration mode ---
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    let user = database::seed_user(&db, &cfg.local_user_email, "LocalUser")
        .await
        .context("seeding local user")?;
    tracing::info!(user_id = %user.id, email = %user.email, "acting as local user");

    // --- Object store ---
    let s3 = S3ObjectStore::new(&cfg.s3).await;
    if let Err(err) = s3.health().await {
        tracing::warn!(error = %err, "object store not reachable yet");
    }
    s3.ensure_bucket()
        .await
        .with_context(|| format!("ensuring bucket {}", cfg.s3.bucket))?;
    if let Err(err) = s3.set_bucket_cors().await {
        tracing::warn!(error = %err, "could not set bucket CORS; continuing");
    }
    let store: Arc<dyn ObjectStore> = Arc::new(s3);

    // --- Build router ---
    let state = AppState::new(
        Arc::new(db),
        store,
        cfg.upload_url_ttl,
        Owner { user_id: user.id },
    );
    let app = routes::routes::app(state, &cfg.cors_origins);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the directory holding a file-backed SQLite database.
fn ensure_db_parent(database_url: &str) -> Result<()> {
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    if db_path.is_empty() || db_path == ":memory:" {
        return Ok(());
    }

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    Ok(())
}
