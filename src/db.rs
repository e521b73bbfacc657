//! Database connection pool and migration management.
//!
//! This module provides utilities for:
//! - Creating and managing a PostgreSQL connection pool
//! - Running the embedded wallet schema migrations

use std::time::Duration;

use sqlx::{Pool, Postgres, postgres::PgPoolOptions};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Create a new PostgreSQL connection pool.
///
/// Every wallet mutation holds one connection for the length of its transaction
/// while the wallet row is locked, so the pool size bounds how many vendors can be
/// written concurrently.
///
/// # Configuration
///
/// - Maximum connections: 10
/// - Acquire timeout: 5 seconds, after which the request fails with a database error
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the server cannot be
/// reached or authenticated against.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are embedded at compile time and tracked in `_sqlx_migrations`, so
/// each one runs only once.
///
/// # Migration Files
///
/// - `<timestamp>_<name>.sql` (e.g., `20250101000002_create_vendor_wallets.sql`)
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
