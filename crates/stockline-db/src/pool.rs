//! # Database Handle
//!
//! [`Database`] owns the SQLite pool and the [`LedgerPolicy`] and hands out
//! repositories that share both.
//!
//! ```text
//! DbConfig::new(path).policy(policy)
//!        │
//!        ▼
//! Database::new ──► SqlitePool (WAL, foreign keys, busy_timeout)
//!        │                │
//!        │                └── migrations::run_migrations
//!        ▼
//! db.purchases() / db.sales() / db.deliveries() / ...   cheap clones
//! ```
//!
//! Reads run concurrently. SQLite admits one writer at a time, so ledger
//! transactions queue on `busy_timeout` and surface as
//! `ConcurrencyConflict` when the wait runs out.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use stockline_core::LedgerPolicy;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::credit::CreditNoteRepository;
use crate::repository::delivery::DeliveryNoteRepository;
use crate::repository::inventory::InventoryRepository;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::purchase::PurchaseOrderRepository;
use crate::repository::sales::SalesOrderRepository;
use crate::repository::stock_take::StockTakeRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/stockline/stockline.db")
///     .max_connections(8)
///     .policy(policy);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// How long a writer waits on SQLite's lock before giving up with BUSY.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Business policies applied by the repositories.
    pub policy: LedgerPolicy,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            policy: LedgerPolicy::default(),
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the business policies.
    pub fn policy(mut self, policy: LedgerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// An in-memory database lives on one connection, so the pool is capped
    /// at one and every operation is naturally serialized.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
            policy: LedgerPolicy::default(),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// ## Usage in Handlers
/// ```rust,ignore
/// async fn receive_items(
///     State(state): State<AppState>,
///     Json(req): Json<ReceiveItemsRequest>,
/// ) -> Result<Json<ReceiveOutcome>, ApiError> {
///     Ok(Json(state.db.purchases().receive_items(&req).await?))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    policy: LedgerPolicy,
}

impl Database {
    /// Opens (creating if missing) the database file and applies pending
    /// migrations unless disabled.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            partial_delivery = ?config.policy.partial_delivery,
            negative_count = ?config.policy.negative_count,
            "Database pool created"
        );

        let db = Database {
            pool,
            policy: config.policy,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the active business policies.
    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Products, stores, customers, suppliers, riders.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Ledger primitives, opening balances and projections.
    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone())
    }

    pub fn purchases(&self) -> PurchaseOrderRepository {
        PurchaseOrderRepository::new(self.pool.clone(), self.policy)
    }

    pub fn sales(&self) -> SalesOrderRepository {
        SalesOrderRepository::new(self.pool.clone(), self.policy)
    }

    pub fn deliveries(&self) -> DeliveryNoteRepository {
        DeliveryNoteRepository::new(self.pool.clone())
    }

    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    pub fn credit_notes(&self) -> CreditNoteRepository {
        CreditNoteRepository::new(self.pool.clone())
    }

    pub fn stock_takes(&self) -> StockTakeRepository {
        StockTakeRepository::new(self.pool.clone(), self.policy)
    }

    /// Waits for checked-out connections, then closes the pool.
    pub async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }

    /// Whether a trivial query round-trips.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
