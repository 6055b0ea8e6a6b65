//! SQLite pool setup, schema migration and user seeding.

use crate::models::{timestamp_now, user::User};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{str::FromStr, time::Duration};
use tracing::debug;
use uuid::Uuid;

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Open the catalogue database.
///
/// The pool holds exactly one connection, so SQLite serializes every
/// statement and transaction issued by concurrent requests. A writer that
/// cannot get the lock within the busy timeout fails instead of retrying.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let mut options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(SQLITE_BUSY_TIMEOUT);

    if !database_url.contains(":memory:") {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Apply the embedded schema. Every statement is idempotent.
pub async fn run_migrations(db: &SqlitePool) -> Result<usize, sqlx::Error> {
    let statements = INIT_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    for stmt in &statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(statements.len())
}

/// Insert the user for `email` unless it exists, and return the stored row.
pub async fn seed_user(
    db: &SqlitePool,
    email: &str,
    display_name: &str,
) -> Result<User, sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, email, display_name, created_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(email) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(display_name)
    .bind(timestamp_now())
    .execute(db)
    .await?;

    sqlx::query_as::<_, User>(
        "SELECT id, email, display_name, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_one(db)
    .await
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::services::Owner;

    /// Fresh in-memory catalogue with one seeded user.
    pub async fn memory_db() -> (SqlitePool, Owner) {
        let db = connect("sqlite::memory:").await.expect("open memory db");
        run_migrations(&db).await.expect("migrate");
        let user = seed_user(&db, "local@example.com", "LocalUser")
            .await
            .expect("seed user");
        (db, Owner { user_id: user.id })
    }

    /// A second, unrelated account.
    pub async fn other_owner(db: &SqlitePool) -> Owner {
        let user = seed_user(db, "someone@example.com", "Someone")
            .await
            .expect("seed other user");
        Owner { user_id: user.id }
    }
}
