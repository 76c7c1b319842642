//! # Connection Pool and Writer Transactions
//!
//! Opens the SQLite store, applies migrations, and hands out the single kind
//! of write transaction the services use.
//!
//! ## Reads vs Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TableRepository / OrderRepository / InvoiceRepository                  │
//! │       │  plain SELECTs on any pooled connection                        │
//! │       ▼                                                                 │
//! │  SqlitePool (WAL) ◄──────── readers never wait for the writer           │
//! │       ▲                                                                 │
//! │       │  begin_write() = BEGIN IMMEDIATE                               │
//! │  TableService / OrderService / InvoiceService / SplitService            │
//! │       one writer at a time; the next waits up to busy_timeout,          │
//! │       then gets PosError::Conflict                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why BEGIN IMMEDIATE?
//! A deferred transaction takes the write lock at its first write, so two
//! writers can both read "table is free" and then race. `BEGIN IMMEDIATE`
//! takes the lock before the first read: every decision is made on a view
//! no other writer can change until commit.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::{InvoiceRepository, OrderRepository, TableRepository};

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the store lives and how the pool behaves.
///
/// Usually built from [`crate::PosConfig::db_config`].
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/bistro/bistro.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,

    /// Default: 5
    pub max_connections: u32,

    /// How long a caller waits for a free pooled connection.
    pub acquire_timeout: Duration,

    /// How long a writer waits for the write lock before failing.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Apply embedded migrations on connect. Default: true
    pub migrate: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Private in-memory store for tests.
    ///
    /// Each `:memory:` connection is its own database, so the pool is capped
    /// at one connection; that connection also serializes every writer.
    pub fn in_memory() -> Self {
        DbConfig {
            path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true)
        };

        Ok(options
            // Readers keep working while a writer holds the lock
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Off by default in SQLite; the schema relies on them
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the store: read repositories plus writer transactions.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects, creating the file when missing, and migrates if configured.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.path.display(), "Opening POS store");

        let connect_options = config.connect_options()?;
        debug!(
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            in_memory = config.is_in_memory(),
            "Connection options configured"
        );

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            // An idle in-memory connection must never be reaped
            .idle_timeout((!config.is_in_memory()).then_some(Duration::from_secs(600)))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };
        if config.migrate {
            migrations::run_migrations(&db.pool).await?;
        }

        info!(max_connections = config.max_connections, "POS store ready");
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a writer transaction (`BEGIN IMMEDIATE`).
    ///
    /// Rolls back on drop; callers commit explicitly.
    pub async fn begin_write(&self) -> DbResult<Transaction<'static, Sqlite>> {
        begin_write(&self.pool).await
    }

    pub fn tables(&self) -> TableRepository {
        TableRepository::new(self.pool.clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        info!("Closing POS store");
        self.pool.close().await;
    }
}

/// Opens a `BEGIN IMMEDIATE` transaction on `pool`.
///
/// The write lock is taken before the first statement; a lock that cannot be
/// obtained within the busy timeout surfaces as [`DbError::Busy`].
pub async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

// =============================================================================
// Unit Tests
// =============================================================================
