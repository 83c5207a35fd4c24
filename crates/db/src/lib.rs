//! Persistence layer: sqlx models and repositories over PostgreSQL.
//!
//! Repositories that run read-modify-write transactions load rows into the
//! pure types of `skillforge_core`, apply one operation, and write back what
//! changed before committing.

use std::time::Duration;

use skillforge_core::error::CoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod models;
pub mod repositories;

/// Shared connection pool type.
pub type DbPool = PgPool;

const MAX_CONNECTIONS: u32 = 20;
const ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Create a connection pool for `database_url`.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// Error returned by transactional repository operations that enforce
/// domain rules between reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}
