//! Database pool and schema bootstrap.

use std::str::FromStr as _;

use anyhow::Context as _;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// The main database connection pool.
pub type Db = SqlitePool;

/// Open (and create, if needed) the main database and make sure the schema
/// exists.
#[tracing::instrument(skip_all)]
pub async fn establish_pool(url: &str) -> anyhow::Result<Db> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database url {url:?}"))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .context("failed to connect to database")?;

    bootstrap(&pool).await?;
    Ok(pool)
}

async fn bootstrap(db: &Db) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id              TEXT PRIMARY KEY,
            description     TEXT NOT NULL,
            photo_reference TEXT,
            status          TEXT NOT NULL,
            verdict         TEXT NOT NULL,
            created_at      TEXT NOT NULL
        )
        "#,
    )
    .execute(db)
    .await
    .context("failed to create reports table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS driver_applications (
            cedula     TEXT PRIMARY KEY,
            status     TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(db)
    .await
    .context("failed to create driver_applications table")?;

    Ok(())
}

/// Collaborator check: does the driver have an approved application?
pub async fn is_approved_driver(db: &Db, cedula: &str) -> anyhow::Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM driver_applications WHERE cedula = ? AND status = 'approved'",
    )
    .bind(cedula)
    .fetch_one(db)
    .await
    .context("failed to check driver application")?;
    Ok(count > 0)
}
