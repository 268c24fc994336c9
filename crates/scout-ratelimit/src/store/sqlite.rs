//! `SQLite`-backed quota store.
//!
//! Each increment runs in its own transaction whose first statement is a
//! write, so `SQLite` hands out the database write lock before the record is
//! read. Two processes sharing one file therefore never both see the same
//! count, and the loser waits on the busy timeout instead of failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scout_core::{RegionId, RegionLimits};
use scout_db::{quota_records, Database, DatabaseError};
use std::path::Path;

use super::{apply_increment, QuotaStore};
use crate::error::{RateLimitError, Result};
use crate::record::QuotaRecord;

/// Durable quota store over the `quota_records` table.
#[derive(Debug, Clone)]
pub struct SqliteQuotaStore {
    db: Database,
}

impl SqliteQuotaStore {
    /// Wrap an already migrated database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (creating if missing) and migrate the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path).await?;
        Ok(Self::new(db))
    }

    /// Private in-memory database, mainly for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::open(scout_db::IN_MEMORY).await
    }

    /// The underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    async fn load(&self, region: &RegionId, now: DateTime<Utc>) -> Result<QuotaRecord> {
        let row = quota_records::get_quota_record(self.db.pool(), region.as_str()).await?;

        match row {
            Some(row) => Ok(QuotaRecord::from_row(row)?.reconciled(now)),
            None => Ok(QuotaRecord::fresh(region.clone(), now)),
        }
    }

    async fn try_increment(
        &self,
        region: &RegionId,
        now: DateTime<Utc>,
        limits: &RegionLimits,
    ) -> Result<QuotaRecord> {
        let mut tx = self.db.pool().begin().await.map_err(DatabaseError::from)?;

        // Dropping `tx` on any early return rolls the transaction back
        let fresh = QuotaRecord::fresh(region.clone(), now);
        quota_records::insert_quota_record_if_absent(&mut *tx, &fresh.to_row()).await?;

        let row = quota_records::get_quota_record(&mut *tx, region.as_str())
            .await?
            .ok_or_else(|| RateLimitError::Corrupt {
                region: region.to_string(),
                reason: "record vanished inside its own transaction".to_string(),
            })?;
        let current = QuotaRecord::from_row(row)?;

        let updated = match apply_increment(current, now, limits) {
            Ok(updated) => updated,
            Err(e) => {
                tx.rollback().await.map_err(DatabaseError::from)?;
                return Err(e);
            }
        };

        quota_records::upsert_quota_record(&mut *tx, &updated.to_row()).await?;
        tx.commit().await.map_err(DatabaseError::from)?;

        tracing::trace!(
            "Persisted quota record for {}: day {} hour {}",
            region,
            updated.day_count,
            updated.hour_count
        );

        Ok(updated)
    }

    async fn regions(&self) -> Result<Vec<RegionId>> {
        let rows = quota_records::list_quota_records(self.db.pool()).await?;

        rows.into_iter()
            .map(|row| {
                RegionId::new(row.region.as_str()).map_err(|e| RateLimitError::Corrupt {
                    region: row.region.clone(),
                    reason: format!("invalid region key: {e}"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuotaScope;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn region(name: &str) -> RegionId {
        RegionId::new(name).expect("valid region")
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn limits(daily: u32, hourly: u32) -> RegionLimits {
        RegionLimits {
            daily_limit: daily,
            hourly_limit: hourly,
            ..RegionLimits::default()
        }
    }

    #[tokio::test]
    async fn test_load_is_read_only() {
        let store = SqliteQuotaStore::in_memory().await.expect("open store");
        let japan = region("Japan");

        let first = store.load(&japan, start()).await.expect("first load");
        let second = store.load(&japan, start()).await.expect("second load");
        assert_eq!(first, second);

        let rows = quota_records::list_quota_records(store.database().pool())
            .await
            .expect("list rows");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_increment_persists_row() {
        let store = SqliteQuotaStore::in_memory().await.expect("open store");
        let japan = region("Japan");

        let record = store
            .try_increment(&japan, start(), &limits(40, 10))
            .await
            .expect("increment");
        assert_eq!(record.day_count, 1);
        assert_eq!(record.last_request_at, Some(start()));

        let row = quota_records::get_quota_record(store.database().pool(), "Japan")
            .await
            .expect("query row")
            .expect("row exists");
        assert_eq!(row.hour_key, "2026-03-02T09");
        assert_eq!(row.hour_count, 1);
    }

    #[tokio::test]
    async fn test_denied_increment_leaves_no_trace() {
        let store = SqliteQuotaStore::in_memory().await.expect("open store");
        let japan = region("Japan");

        let err = store
            .try_increment(&japan, start(), &limits(40, 0))
            .await
            .expect_err("zero hourly limit denies");
        assert!(matches!(
            err,
            RateLimitError::QuotaExceeded {
                scope: QuotaScope::Hour,
                ..
            }
        ));

        // The placeholder row is rolled back with the transaction
        assert!(store.regions().await.expect("list regions").is_empty());
    }

    #[tokio::test]
    async fn test_hour_rollover_on_increment() {
        let store = SqliteQuotaStore::in_memory().await.expect("open store");
        let japan = region("Japan");

        for _ in 0..2 {
            store
                .try_increment(&japan, start(), &limits(40, 2))
                .await
                .expect("increment");
        }

        let next_hour = start() + chrono::Duration::hours(1);
        let record = store
            .try_increment(&japan, next_hour, &limits(40, 2))
            .await
            .expect("increment in next hour");
        assert_eq!(record.day_count, 3);
        assert_eq!(record.hour_count, 1);
    }

    #[tokio::test]
    async fn test_reopen_restores_counts() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("quota.db");
        let romania = region("Romania");

        {
            let store = SqliteQuotaStore::open(&path).await.expect("open store");
            for _ in 0..3 {
                store
                    .try_increment(&romania, start(), &limits(40, 10))
                    .await
                    .expect("increment");
            }
            store.database().clone().close().await;
        }

        let store = SqliteQuotaStore::open(&path).await.expect("reopen store");
        let record = store
            .load(&romania, start() + chrono::Duration::minutes(5))
            .await
            .expect("load");
        assert_eq!(record.day_count, 3);
        assert_eq!(record.hour_count, 3);
        assert_eq!(store.regions().await.expect("list"), vec![romania]);
    }

    #[tokio::test]
    async fn test_closed_pool_is_storage_unavailable() {
        let store = SqliteQuotaStore::in_memory().await.expect("open store");
        store.database().quota_pool().close().await;

        let err = store
            .try_increment(&region("Japan"), start(), &limits(40, 10))
            .await
            .expect_err("closed pool");
        assert!(matches!(err, RateLimitError::StorageUnavailable(_)));
    }
}
