//! Per-region quota state and the rules that move it.
//!
//! A [`QuotaRecord`] is pure data. Window rollover, limit checks and grant
//! bookkeeping are plain functions of the record, the clock reading and the
//! region limits, so every store applies them the same way.

use chrono::{DateTime, NaiveDate, Utc};
use scout_core::{RegionId, RegionLimits};
use scout_db::QuotaRecordRow;

use crate::error::{QuotaScope, RateLimitError, Result};
use crate::window;

/// Quota counters of one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaRecord {
    /// Region the counters belong to
    pub region: RegionId,
    /// UTC date of the daily window
    pub day_key: NaiveDate,
    /// Grants issued in `day_key`
    pub day_count: u32,
    /// Start of the hourly window
    pub hour_key: DateTime<Utc>,
    /// Grants issued in `hour_key`
    pub hour_count: u32,
    /// Latest grant, absent until the first one
    pub last_request_at: Option<DateTime<Utc>>,
}

impl QuotaRecord {
    /// Zeroed record with windows positioned at `now`.
    #[must_use]
    pub fn fresh(region: RegionId, now: DateTime<Utc>) -> Self {
        Self {
            region,
            day_key: window::day_key(now),
            day_count: 0,
            hour_key: window::hour_key(now),
            hour_count: 0,
            last_request_at: None,
        }
    }

    /// Roll stale windows forward to the ones containing `now`.
    ///
    /// Returns `true` if anything changed. A clock reading that falls before
    /// a stored window leaves that window and its count alone.
    pub fn reconcile(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;

        let day = window::day_key(now);
        if day > self.day_key {
            self.day_key = day;
            self.day_count = 0;
            changed = true;
        }

        let hour = window::hour_key(now);
        if hour > self.hour_key {
            self.hour_key = hour;
            self.hour_count = 0;
            changed = true;
        }

        changed
    }

    /// Owned variant of [`QuotaRecord::reconcile`].
    #[must_use]
    pub fn reconciled(mut self, now: DateTime<Utc>) -> Self {
        self.reconcile(now);
        self
    }

    /// The exhausted window, day first.
    #[must_use]
    pub fn exhausted(&self, limits: &RegionLimits) -> Option<QuotaScope> {
        if self.day_count >= limits.daily_limit {
            Some(QuotaScope::Day)
        } else if self.hour_count >= limits.hourly_limit {
            Some(QuotaScope::Hour)
        } else {
            None
        }
    }

    /// Instant the given window resets.
    #[must_use]
    pub fn reset_at(&self, scope: QuotaScope) -> DateTime<Utc> {
        match scope {
            QuotaScope::Day => self.day_resets_at(),
            QuotaScope::Hour => self.hour_resets_at(),
        }
    }

    /// Start of the next daily window.
    #[must_use]
    pub fn day_resets_at(&self) -> DateTime<Utc> {
        window::next_day_start(self.day_key)
    }

    /// Start of the next hourly window.
    #[must_use]
    pub fn hour_resets_at(&self) -> DateTime<Utc> {
        window::next_hour_start(self.hour_key)
    }

    /// Fail with `QuotaExceeded` if another grant would break a limit.
    pub fn check(&self, limits: &RegionLimits) -> Result<()> {
        match self.exhausted(limits) {
            Some(scope) => Err(RateLimitError::QuotaExceeded {
                region: self.region.clone(),
                scope,
                reset_at: self.reset_at(scope),
            }),
            None => Ok(()),
        }
    }

    /// Count one grant made at `now`.
    ///
    /// Callers reconcile and [`check`](QuotaRecord::check) first.
    pub fn record_grant(&mut self, now: DateTime<Utc>) {
        self.day_count = self.day_count.saturating_add(1);
        self.hour_count = self.hour_count.saturating_add(1);
        self.last_request_at = Some(match self.last_request_at {
            Some(prev) if prev > now => prev,
            _ => now,
        });
    }

    /// Storage form.
    #[must_use]
    pub fn to_row(&self) -> QuotaRecordRow {
        QuotaRecordRow {
            region: self.region.to_string(),
            day_key: window::format_day_key(self.day_key),
            day_count: self.day_count,
            hour_key: window::format_hour_key(self.hour_key),
            hour_count: self.hour_count,
            last_request_at: self.last_request_at.map(|t| t.to_rfc3339()),
        }
    }

    /// Decode a stored row, failing with `Corrupt` on any malformed field.
    pub fn from_row(row: QuotaRecordRow) -> Result<Self> {
        let corrupt = |reason: String| RateLimitError::Corrupt {
            region: row.region.clone(),
            reason,
        };

        let region = RegionId::new(row.region.as_str())
            .map_err(|e| corrupt(format!("invalid region key: {e}")))?;
        let day_key = window::parse_day_key(&row.day_key)
            .map_err(|e| corrupt(format!("invalid day_key '{}': {e}", row.day_key)))?;
        let hour_key = window::parse_hour_key(&row.hour_key)
            .map_err(|e| corrupt(format!("invalid hour_key '{}': {e}", row.hour_key)))?;
        let last_request_at = row
            .last_request_at
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| corrupt(format!("invalid last_request_at '{raw}': {e}")))
            })
            .transpose()?;

        Ok(Self {
            region,
            day_key,
            day_count: row.day_count,
            hour_key,
            hour_count: row.hour_count,
            last_request_at,
        })
    }
}
