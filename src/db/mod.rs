//! Postgres pool setup and schema migrations.
//!
//! SYSTEM CONTEXT
//! ==============
//! The binary calls [`init_pool`] when `DATABASE_URL` is set and hands the
//! pool to [`crate::store::postgres::PgStore`]. The three tables (versions,
//! chat log, generated index) exist before the first read or write.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::env_parse;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Connect, then bring the schema up to date.
///
/// - `DB_MAX_CONNECTIONS`: default 5
/// - `DB_ACQUIRE_TIMEOUT_SECS`: default 10
///
/// # Errors
///
/// Connection or migration failure.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);
    let acquire_secs = env_parse("DB_ACQUIRE_TIMEOUT_SECS", DEFAULT_DB_ACQUIRE_TIMEOUT_SECS);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(acquire_secs))
        .connect(database_url)
        .await?;
    run_migrations(&pool).await?;

    info!(max_connections, acquire_secs, "db: pool ready");
    Ok(pool)
}

/// # Errors
///
/// The first migration that fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("src/db/migrations").run(pool).await?;
    Ok(())
}
