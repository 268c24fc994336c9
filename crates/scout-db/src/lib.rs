//! Scout Database Layer
//!
//! Provides `SQLite` access for the admission-control quota state.
//! Uses `SQLx` with embedded migrations.
//!
//! # Architecture
//!
//! - **Durability**: WAL journal with full sync; every committed grant survives
//!   a crash or restart
//! - **Sharing**: several processes may open the same file; writers wait on a
//!   busy timeout instead of failing immediately
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Auditability**: quota state lives in one plain table, `quota_records`,
//!   readable with any `SQLite` client
//!
//! # Example
//!
//! ```ignore
//! use scout_db::{quota_records, Database};
//!
//! let db = Database::new("quota.db").await?;
//! db.run_migrations().await?;
//! let rows = quota_records::list_quota_records(db.pool()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod migrations;
pub mod quota_records;

// Re-export commonly used types
pub use connection::{QuotaPool, IN_MEMORY};
pub use error::{DatabaseError, Result};
pub use quota_records::QuotaRecordRow;

use std::path::Path;

/// High-level database interface with migrations.
///
/// This provides a convenient wrapper around `QuotaPool` that handles
/// initialization and migration.
#[derive(Debug, Clone)]
pub struct Database {
    pool: QuotaPool,
}

impl Database {
    /// Open the database at the specified path.
    ///
    /// # Arguments
    /// * `path` - Path to the database file (or `:memory:` for in-memory)
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = QuotaPool::new(path).await?;
        Ok(Self { pool })
    }

    /// Open the database and bring its schema up to date.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened or migrated.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::new(path).await?;
        db.run_migrations().await?;

        let version = db.get_schema_version().await?;
        tracing::info!("Quota database ready at schema version {}", version);
        Ok(db)
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(self.pool.pool()).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(self.pool.pool()).await
    }

    /// Get a reference to the underlying connection pool.
    ///
    /// This allows direct access to the `SQLx` pool for custom queries.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        self.pool.pool()
    }

    /// Get a reference to the `QuotaPool` wrapper.
    #[must_use]
    pub fn quota_pool(&self) -> &QuotaPool {
        &self.pool
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_creation() {
        let db = Database::new(IN_MEMORY).await.expect("create database");
        assert_eq!(db.get_schema_version().await.expect("get version"), 0);
    }

    #[tokio::test]
    async fn test_database_open_runs_migrations() {
        let db = Database::open(IN_MEMORY).await.expect("open database");

        let version = db.get_schema_version().await.expect("get version");
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_database_schema() {
        let db = Database::open(IN_MEMORY).await.expect("open database");

        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('quota_records') ORDER BY cid")
                .fetch_all(db.pool())
                .await
                .expect("query columns");

        assert_eq!(
            columns,
            vec![
                "region",
                "day_key",
                "day_count",
                "hour_key",
                "hour_count",
                "last_request_at",
                "updated_at"
            ]
        );
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("quota.db");

        let db = Database::open(&path).await.expect("open database");
        quota_records::upsert_quota_record(
            db.pool(),
            &QuotaRecordRow {
                region: "Japan".to_string(),
                day_key: "2026-03-02".to_string(),
                day_count: 5,
                hour_key: "2026-03-02T10".to_string(),
                hour_count: 2,
                last_request_at: None,
            },
        )
        .await
        .expect("write record");
        db.close().await;

        let reopened = Database::open(&path).await.expect("reopen database");
        let record = quota_records::get_quota_record(reopened.pool(), "Japan")
            .await
            .expect("query record")
            .expect("record exists");
        assert_eq!(record.day_count, 5);
        assert_eq!(record.hour_count, 2);
    }

    #[tokio::test]
    async fn test_database_close() {
        let db = Database::new(IN_MEMORY).await.expect("create database");
        db.close().await; // Should not panic
    }
}
