//! Quota record storage.
//!
//! Row-level access to the `quota_records` table. Every function takes a
//! generic executor so callers can run it against the pool or inside an open
//! transaction. Window keys are stored as text (`YYYY-MM-DD` for days,
//! `YYYY-MM-DDTHH` for hours); interpreting them is the caller's job.

use crate::error::{DatabaseError, Result};
use sqlx::{Executor, Sqlite};

/// Raw `quota_records` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaRecordRow {
    /// Region identifier (primary key)
    pub region: String,
    /// UTC date of the daily window
    pub day_key: String,
    /// Grants issued in the daily window
    pub day_count: u32,
    /// UTC hour of the hourly window
    pub hour_key: String,
    /// Grants issued in the hourly window
    pub hour_count: u32,
    /// RFC 3339 timestamp of the latest grant
    pub last_request_at: Option<String>,
}

type RawRow = (String, String, i64, String, i64, Option<String>);

impl TryFrom<RawRow> for QuotaRecordRow {
    type Error = DatabaseError;

    fn try_from(
        (region, day_key, day_count, hour_key, hour_count, last_request_at): RawRow,
    ) -> Result<Self> {
        let day_count = u32::try_from(day_count).map_err(|_| {
            DatabaseError::Decode(format!(
                "day_count {day_count} out of range for region '{region}'"
            ))
        })?;
        let hour_count = u32::try_from(hour_count).map_err(|_| {
            DatabaseError::Decode(format!(
                "hour_count {hour_count} out of range for region '{region}'"
            ))
        })?;

        Ok(Self {
            region,
            day_key,
            day_count,
            hour_key,
            hour_count,
            last_request_at,
        })
    }
}

/// Fetch the record of a region, if one has been written.
pub async fn get_quota_record<'e, E>(executor: E, region: &str) -> Result<Option<QuotaRecordRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<RawRow> = sqlx::query_as(
        r"
        SELECT region, day_key, day_count, hour_key, hour_count, last_request_at
        FROM quota_records
        WHERE region = ?
        ",
    )
    .bind(region)
    .fetch_optional(executor)
    .await?;

    row.map(QuotaRecordRow::try_from).transpose()
}

/// Insert a record unless the region already has one.
///
/// Returns `true` when a row was inserted. Inside a deferred transaction this
/// is the statement that takes the database write lock, so a read that
/// follows it sees the latest committed state of every writer.
pub async fn insert_quota_record_if_absent<'e, E>(
    executor: E,
    record: &QuotaRecordRow,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r"
        INSERT INTO quota_records (region, day_key, day_count, hour_key, hour_count, last_request_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(region) DO NOTHING
        ",
    )
    .bind(&record.region)
    .bind(&record.day_key)
    .bind(i64::from(record.day_count))
    .bind(&record.hour_key)
    .bind(i64::from(record.hour_count))
    .bind(&record.last_request_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Write the full state of a region, creating the row if needed.
pub async fn upsert_quota_record<'e, E>(executor: E, record: &QuotaRecordRow) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r"
        INSERT INTO quota_records (region, day_key, day_count, hour_key, hour_count, last_request_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        ON CONFLICT(region) DO UPDATE SET
            day_key = excluded.day_key,
            day_count = excluded.day_count,
            hour_key = excluded.hour_key,
            hour_count = excluded.hour_count,
            last_request_at = excluded.last_request_at,
            updated_at = excluded.updated_at
        ",
    )
    .bind(&record.region)
    .bind(&record.day_key)
    .bind(i64::from(record.day_count))
    .bind(&record.hour_key)
    .bind(i64::from(record.hour_count))
    .bind(&record.last_request_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Fetch every record, ordered by region.
pub async fn list_quota_records<'e, E>(executor: E) -> Result<Vec<QuotaRecordRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<RawRow> = sqlx::query_as(
        r"
        SELECT region, day_key, day_count, hour_key, hour_count, last_request_at
        FROM quota_records
        ORDER BY region
        ",
    )
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(QuotaRecordRow::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn create_test_db() -> Database {
        let db = Database::new(crate::connection::IN_MEMORY)
            .await
            .expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn row(region: &str, day_count: u32, hour_count: u32) -> QuotaRecordRow {
        QuotaRecordRow {
            region: region.to_string(),
            day_key: "2026-03-02".to_string(),
            day_count,
            hour_key: "2026-03-02T09".to_string(),
            hour_count,
            last_request_at: Some("2026-03-02T09:15:00+00:00".to_string()),
        }
    }

    #[tokio::test]
    async fn test_get_missing_record() {
        let db = create_test_db().await;

        let record = get_quota_record(db.pool(), "Far_East")
            .await
            .expect("query record");
        assert_eq!(record, None);
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = create_test_db().await;

        upsert_quota_record(db.pool(), &row("Far_East", 3, 1))
            .await
            .expect("insert record");
        upsert_quota_record(db.pool(), &row("Far_East", 4, 2))
            .await
            .expect("update record");

        let record = get_quota_record(db.pool(), "Far_East")
            .await
            .expect("query record")
            .expect("record exists");
        assert_eq!(record, row("Far_East", 4, 2));
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing() {
        let db = create_test_db().await;

        let inserted = insert_quota_record_if_absent(db.pool(), &row("Poland", 7, 2))
            .await
            .expect("insert record");
        assert!(inserted);

        let inserted = insert_quota_record_if_absent(db.pool(), &row("Poland", 0, 0))
            .await
            .expect("insert record");
        assert!(!inserted);

        let record = get_quota_record(db.pool(), "Poland")
            .await
            .expect("query record")
            .expect("record exists");
        assert_eq!(record.day_count, 7);
    }

    #[tokio::test]
    async fn test_list_ordered_by_region() {
        let db = create_test_db().await;

        for region in ["Romania", "Japan", "Singapore"] {
            upsert_quota_record(db.pool(), &row(region, 1, 1))
                .await
                .expect("insert record");
        }

        let regions: Vec<String> = list_quota_records(db.pool())
            .await
            .expect("list records")
            .into_iter()
            .map(|r| r.region)
            .collect();
        assert_eq!(regions, vec!["Japan", "Romania", "Singapore"]);
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_write() {
        let db = create_test_db().await;

        let mut tx = db.pool().begin().await.expect("begin transaction");
        upsert_quota_record(&mut *tx, &row("Hong Kong", 1, 1))
            .await
            .expect("write inside transaction");
        tx.rollback().await.expect("rollback");

        let record = get_quota_record(db.pool(), "Hong Kong")
            .await
            .expect("query record");
        assert_eq!(record, None);
    }

    #[tokio::test]
    async fn test_negative_count_is_decode_error() {
        let db = create_test_db().await;

        // The CHECK constraint guards the column, so bypass it to simulate corruption
        sqlx::query("PRAGMA ignore_check_constraints = ON")
            .execute(db.pool())
            .await
            .expect("disable checks");
        sqlx::query(
            "INSERT INTO quota_records (region, day_key, day_count, hour_key, hour_count)
             VALUES ('Czech Republic', '2026-03-02', -1, '2026-03-02T09', 0)",
        )
        .execute(db.pool())
        .await
        .expect("insert corrupt row");

        let result = get_quota_record(db.pool(), "Czech Republic").await;
        assert!(matches!(result, Err(DatabaseError::Decode(_))));
    }
}
