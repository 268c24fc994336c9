//! Database connection management.
//!
//! Provides a `QuotaPool` wrapper around `SQLx` that opens the quota database
//! with durable settings (WAL journal, full sync, busy timeout) so several
//! processes can share one file.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Special path selecting a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// How long a writer waits for another process to release the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum pooled connections for on-disk databases.
const MAX_CONNECTIONS: u32 = 5;

/// Connection pool for the quota database.
#[derive(Debug, Clone)]
pub struct QuotaPool {
    pool: Pool<Sqlite>,
}

impl QuotaPool {
    /// Open (creating if missing) the database at `path`.
    ///
    /// # Arguments
    /// * `path` - Path to the `SQLite` database file (or `:memory:` for in-memory)
    ///
    /// # Errors
    /// Returns `DatabaseError` if:
    /// - The path is not valid UTF-8
    /// - The parent directory cannot be created
    /// - The database file cannot be opened
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| {
            DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
        })?;

        // An in-memory database lives as long as its single connection
        let in_memory = path_str == IN_MEMORY;

        let connect_options = if in_memory {
            SqliteConnectOptions::from_str(IN_MEMORY)
                .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        let connect_options = connect_options
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(BUSY_TIMEOUT);

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DatabaseError::Open(format!("failed to open {path_str}: {e}")))?;

        tracing::info!("Quota database pool created at {}", path_str);

        Ok(Self { pool })
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the connection pool gracefully.
    ///
    /// Clones share the pool, so this closes it for every holder.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Quota database pool closed");
    }
}
