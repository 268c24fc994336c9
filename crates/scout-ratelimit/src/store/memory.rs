//! In-process quota store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scout_core::{RegionId, RegionLimits};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{apply_increment, QuotaStore};
use crate::error::Result;
use crate::record::QuotaRecord;

/// Quota store kept in a map; state is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryQuotaStore {
    records: RwLock<HashMap<RegionId, QuotaRecord>>,
}

impl MemoryQuotaStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn load(&self, region: &RegionId, now: DateTime<Utc>) -> Result<QuotaRecord> {
        let records = self.records.read().await;
        Ok(match records.get(region) {
            Some(record) => record.clone().reconciled(now),
            None => QuotaRecord::fresh(region.clone(), now),
        })
    }

    async fn try_increment(
        &self,
        region: &RegionId,
        now: DateTime<Utc>,
        limits: &RegionLimits,
    ) -> Result<QuotaRecord> {
        let mut records = self.records.write().await;
        let current = records
            .get(region)
            .cloned()
            .unwrap_or_else(|| QuotaRecord::fresh(region.clone(), now));

        let updated = apply_increment(current, now, limits)?;
        records.insert(region.clone(), updated.clone());
        Ok(updated)
    }

    async fn regions(&self) -> Result<Vec<RegionId>> {
        let records = self.records.read().await;
        let mut regions: Vec<RegionId> = records.keys().cloned().collect();
        regions.sort();
        Ok(regions)
    }
}
