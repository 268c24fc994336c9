//! Minimum spacing between grants of a region.
//!
//! Spacing is a fixed interval plus a random extra drawn from
//! `[0, jitter]`, so two grants are never closer than the minimum. The
//! random part comes from a [`JitterSource`] so tests can pin it.

use chrono::{DateTime, Utc};
use rand::Rng;
use scout_core::{RegionId, RegionLimits};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{RateLimitError, Result};
use crate::window::{add_duration, duration_until};

/// Source of the random extra spacing.
pub trait JitterSource: Send + Sync + fmt::Debug {
    /// A duration in `[0, max]`.
    fn sample(&self, max: Duration) -> Duration;
}

/// Uniform jitter from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_secs_f64(rng.gen_range(0.0..=max.as_secs_f64()))
    }
}

/// Always the same fraction of the bound.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(f64);

impl FixedJitter {
    /// `fraction` is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(fraction: f64) -> Self {
        if fraction.is_nan() {
            return Self(0.0);
        }
        Self(fraction.clamp(0.0, 1.0))
    }
}

impl JitterSource for FixedJitter {
    fn sample(&self, max: Duration) -> Duration {
        max.mul_f64(self.0)
    }
}

/// No extra spacing at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&self, _max: Duration) -> Duration {
        Duration::ZERO
    }
}

/// Spacing settings of one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Guaranteed gap between two grants
    pub min_spacing: Duration,
    /// Upper bound of the random extra gap
    pub jitter: Duration,
}

impl From<&RegionLimits> for PacingPolicy {
    fn from(limits: &RegionLimits) -> Self {
        Self {
            min_spacing: limits.min_spacing(),
            jitter: limits.jitter(),
        }
    }
}

/// Computes how long a caller must wait before its grant.
#[derive(Debug, Clone)]
pub struct PacingGate {
    jitter: Arc<dyn JitterSource>,
}

impl Default for PacingGate {
    fn default() -> Self {
        Self::new(Arc::new(RandomJitter))
    }
}

impl PacingGate {
    /// Gate drawing jitter from `jitter`.
    #[must_use]
    pub fn new(jitter: Arc<dyn JitterSource>) -> Self {
        Self { jitter }
    }

    /// Gate that spaces grants by exactly the minimum.
    #[must_use]
    pub fn without_jitter() -> Self {
        Self::new(Arc::new(NoJitter))
    }

    /// Gap to enforce after the previous grant, jitter included.
    #[must_use]
    pub fn spacing(&self, policy: &PacingPolicy) -> Duration {
        let extra = self.jitter.sample(policy.jitter).min(policy.jitter);
        policy.min_spacing.saturating_add(extra)
    }

    /// Earliest instant a grant could happen, ignoring jitter.
    #[must_use]
    pub fn next_eligible_at(
        last_request_at: Option<DateTime<Utc>>,
        policy: &PacingPolicy,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match last_request_at {
            Some(last) => add_duration(last, policy.min_spacing).max(now),
            None => now,
        }
    }

    /// Delay before the next grant of `region` may be issued.
    ///
    /// Fails with `PacingTimeout` when the delay is longer than `ceiling`;
    /// `retry_after` is then the instant the region becomes eligible.
    pub fn wait_until_eligible(
        &self,
        region: &RegionId,
        last_request_at: Option<DateTime<Utc>>,
        policy: &PacingPolicy,
        now: DateTime<Utc>,
        ceiling: Duration,
    ) -> Result<Duration> {
        let Some(last) = last_request_at else {
            return Ok(Duration::ZERO);
        };

        let eligible_at = add_duration(last, self.spacing(policy));
        let delay = duration_until(now, eligible_at);

        if delay > ceiling {
            return Err(RateLimitError::PacingTimeout {
                region: region.clone(),
                retry_after: eligible_at,
            });
        }

        Ok(delay)
    }
}
