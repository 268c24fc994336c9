//! Durable quota storage.
//!
//! The [`QuotaStore`] trait is the only place quota state is mutated. Two
//! implementations are provided:
//!
//! - [`SqliteQuotaStore`]: the `quota_records` table, shared safely between
//!   processes
//! - [`MemoryQuotaStore`]: a process-local map for tests and ephemeral runs

mod memory;
mod sqlite;

pub use memory::MemoryQuotaStore;
pub use sqlite::SqliteQuotaStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scout_core::{RegionId, RegionLimits};

use crate::error::Result;
use crate::record::QuotaRecord;

/// Storage of per-region quota counters.
#[async_trait]
pub trait QuotaStore: Send + Sync + std::fmt::Debug {
    /// Current record of `region`, reconciled against `now`.
    ///
    /// Regions without a record get a zeroed one. Loading never writes.
    async fn load(&self, region: &RegionId, now: DateTime<Utc>) -> Result<QuotaRecord>;

    /// Atomically roll windows, check `limits` and count one grant at `now`.
    ///
    /// Fails with `QuotaExceeded` without touching stored state when either
    /// window is full.
    async fn try_increment(
        &self,
        region: &RegionId,
        now: DateTime<Utc>,
        limits: &RegionLimits,
    ) -> Result<QuotaRecord>;

    /// Every region with stored state, sorted.
    async fn regions(&self) -> Result<Vec<RegionId>>;
}

/// Reconcile, check and count a grant on an in-memory copy of a record.
pub(crate) fn apply_increment(
    record: QuotaRecord,
    now: DateTime<Utc>,
    limits: &RegionLimits,
) -> Result<QuotaRecord> {
    let mut record = record.reconciled(now);
    record.check(limits)?;
    record.record_grant(now);
    Ok(record)
}
