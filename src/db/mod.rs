pub mod models;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

/// Opens the shared pool. Each request borrows one connection and returns it
/// when the handler finishes, on success and error paths alike.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    debug!(max_connections, "Connecting to database");
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to DATABASE_URL")
}

/// Applies the embedded `users` / `sensor_data` schema.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply database migrations")
}
