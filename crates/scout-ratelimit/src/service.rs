//! Admission-control façade.
//!
//! [`RateLimiterService`] combines a [`QuotaStore`] and a [`PacingGate`]
//! behind two calls: [`acquire`](RateLimiterService::acquire) before every
//! outbound request, and [`status`](RateLimiterService::status) for
//! dashboards.
//!
//! Each region has its own FIFO async mutex held for the whole acquire, so
//! callers of one region are granted in arrival order and never race on the
//! store, while different regions proceed in parallel.

use chrono::{DateTime, Utc};
use scout_core::{AppConfig, RateLimitConfig, RegionId, RegionLimits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{RateLimitError, Result};
use crate::pacing::{JitterSource, PacingGate, PacingPolicy};
use crate::store::{QuotaStore, SqliteQuotaStore};
use crate::window::{add_duration, duration_until};

/// Permission to make exactly one outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Region the grant was issued for
    pub region: RegionId,
    /// Clock reading when the grant was recorded
    pub granted_at: DateTime<Utc>,
    /// Grants in the current day, this one included
    pub day_count: u32,
    /// Grants in the current hour, this one included
    pub hour_count: u32,
    /// Time spent inside `acquire`
    pub waited: Duration,
}

/// Read-only view of a region's quota state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Region described
    pub region: RegionId,
    /// Grants in the current day
    pub day_count: u32,
    /// Daily limit in force
    pub day_limit: u32,
    /// Grants in the current hour
    pub hour_count: u32,
    /// Hourly limit in force
    pub hour_limit: u32,
    /// Earliest instant a grant could be issued, ignoring jitter
    pub next_eligible_at: DateTime<Utc>,
    /// Start of the next daily window
    pub day_resets_at: DateTime<Utc>,
    /// Start of the next hourly window
    pub hour_resets_at: DateTime<Utc>,
    /// Latest grant, if any
    pub last_request_at: Option<DateTime<Utc>>,
}

impl QuotaSnapshot {
    /// Grants left today.
    #[must_use]
    pub fn daily_remaining(&self) -> u32 {
        self.day_limit.saturating_sub(self.day_count)
    }

    /// Grants left this hour.
    #[must_use]
    pub fn hourly_remaining(&self) -> u32 {
        self.hour_limit.saturating_sub(self.hour_count)
    }
}

/// Rate limiter shared by every scraping task.
///
/// Build it once and share it behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiterService {
    config: RateLimitConfig,
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    gate: PacingGate,
    regions: Mutex<HashMap<RegionId, Arc<Mutex<()>>>>,
}

impl RateLimiterService {
    /// Service over `store` using real time and random jitter.
    ///
    /// Fails with `Config` if any default or regional value is negative or
    /// not finite, so a limit can never be silently dropped.
    pub fn new(config: RateLimitConfig, store: Arc<dyn QuotaStore>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            store,
            clock: Arc::new(SystemClock),
            gate: PacingGate::default(),
            regions: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the jitter source.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.gate = PacingGate::new(jitter);
        self
    }

    /// Validate `config` and open the `SQLite` store it points at.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let path = config.storage.resolved_database_path()?;
        info!("Opening quota store at {}", path.display());

        let store = SqliteQuotaStore::open(&path).await?;
        Self::new(config.rate_limit.clone(), Arc::new(store))
    }

    /// Effective limits of `region`.
    #[must_use]
    pub fn limits_for(&self, region: &RegionId) -> RegionLimits {
        self.config.limits_for(region.as_str())
    }

    /// Wait for permission to make one request in `region`.
    ///
    /// Suspends at most `max_wait` (region lock plus pacing). Exhausted quotas
    /// fail immediately with `QuotaExceeded`; a pacing delay longer than the
    /// remaining budget fails with `PacingTimeout`. Nothing is recorded
    /// unless a grant is returned, and dropping the future before the final
    /// write leaves the quota untouched.
    ///
    /// The wait for the region lock is bounded in real time (`tokio::time`),
    /// while pacing runs on the injected [`Clock`]. With a [`ManualClock`]
    /// a contended caller therefore gives up after `max_wait` of wall time
    /// even if synthetic time stands still.
    ///
    /// [`ManualClock`]: crate::clock::ManualClock
    pub async fn acquire(&self, region: &RegionId, max_wait: Duration) -> Result<Grant> {
        let limits = self.limits_for(region);
        let policy = PacingPolicy::from(&limits);
        let started = self.clock.now();

        let slot = self.region_slot(region).await;
        let Ok(_guard) = tokio::time::timeout(max_wait, slot.lock()).await else {
            let retry_after = add_duration(self.clock.now(), policy.min_spacing);
            warn!(region = %region, "Timed out waiting for region lock");
            return Err(RateLimitError::PacingTimeout {
                region: region.clone(),
                retry_after,
            });
        };

        let mut lost_race = false;
        loop {
            let now = self.clock.now();
            let remaining = max_wait.saturating_sub(duration_until(started, now));

            let record = self.store.load(region, now).await?;
            if let Err(e) = record.check(&limits) {
                warn!(region = %region, "{}", e);
                return Err(e);
            }

            let delay = self
                .gate
                .wait_until_eligible(region, record.last_request_at, &policy, now, remaining)
                .inspect_err(|e| warn!(region = %region, "{}", e))?;

            if !delay.is_zero() {
                debug!(region = %region, wait_ms = delay.as_millis(), "Pacing before grant");
                self.clock.sleep(delay).await;
            }

            let granted_at = self.clock.now();
            match self.store.try_increment(region, granted_at, &limits).await {
                Ok(updated) => {
                    info!(
                        region = %region,
                        day_count = updated.day_count,
                        hour_count = updated.hour_count,
                        daily_remaining = limits.daily_limit.saturating_sub(updated.day_count),
                        hourly_remaining = limits.hourly_limit.saturating_sub(updated.hour_count),
                        "Granted request"
                    );
                    return Ok(Grant {
                        region: region.clone(),
                        granted_at,
                        day_count: updated.day_count,
                        hour_count: updated.hour_count,
                        waited: duration_until(started, granted_at),
                    });
                }
                Err(RateLimitError::QuotaExceeded { .. }) if !lost_race => {
                    warn!(region = %region, "Quota taken by another writer, re-checking");
                    lost_race = true;
                }
                Err(e) => {
                    if matches!(e, RateLimitError::QuotaExceeded { .. }) {
                        warn!(region = %region, "{}", e);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// [`acquire`](Self::acquire) with the region's configured wait budget.
    pub async fn acquire_default(&self, region: &RegionId) -> Result<Grant> {
        let max_wait = self.limits_for(region).max_wait();
        self.acquire(region, max_wait).await
    }

    /// Current quota state of `region`. Never writes.
    pub async fn status(&self, region: &RegionId) -> Result<QuotaSnapshot> {
        let now = self.clock.now();
        let limits = self.limits_for(region);
        let record = self.store.load(region, now).await?;

        let mut next_eligible_at = PacingGate::next_eligible_at(
            record.last_request_at,
            &PacingPolicy::from(&limits),
            now,
        );
        if let Some(scope) = record.exhausted(&limits) {
            next_eligible_at = next_eligible_at.max(record.reset_at(scope));
        }

        Ok(QuotaSnapshot {
            region: region.clone(),
            day_count: record.day_count,
            day_limit: limits.daily_limit,
            hour_count: record.hour_count,
            hour_limit: limits.hourly_limit,
            next_eligible_at,
            day_resets_at: record.day_resets_at(),
            hour_resets_at: record.hour_resets_at(),
            last_request_at: record.last_request_at,
        })
    }

    /// Snapshots of every region with stored state, sorted by region.
    pub async fn status_all(&self) -> Result<Vec<QuotaSnapshot>> {
        let regions = self.store.regions().await?;
        let mut snapshots = Vec::with_capacity(regions.len());
        for region in &regions {
            snapshots.push(self.status(region).await?);
        }
        Ok(snapshots)
    }

    async fn region_slot(&self, region: &RegionId) -> Arc<Mutex<()>> {
        let mut regions = self.regions.lock().await;
        Arc::clone(regions.entry(region.clone()).or_default())
    }
}
