//! # Schema Migrations
//!
//! The schema in `migrations/sqlite/` is compiled into the binary and applied
//! by [`crate::Database::new`] unless `DbConfig::run_migrations(false)`.
//!
//! ```text
//! 001_initial_schema.sql   master data, ledger lines + transactions,
//!                          opening balances, PO/SO/DN/INV/CN documents,
//!                          stock takes
//! ```
//!
//! Applied files are recorded in `_sqlx_migrations`; schema changes go in a
//! new numbered file.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every embedded migration not yet recorded.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Applying schema migrations");
    MIGRATOR.run(pool).await?;
    info!("Schema up to date");
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await?;
    Ok((MIGRATOR.migrations.len(), applied as usize))
}
