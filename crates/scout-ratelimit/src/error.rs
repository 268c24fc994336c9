//! Admission-control error types.

use chrono::{DateTime, Utc};
use scout_core::{ConfigError, RegionId};
use scout_db::DatabaseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Quota window that denied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaScope {
    /// The UTC calendar day window
    Day,
    /// The UTC hour window
    Hour,
}

impl fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "daily"),
            Self::Hour => write!(f, "hourly"),
        }
    }
}

/// Reasons an acquire can end without a grant.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// A daily or hourly quota is used up; never waited out inside a call.
    #[error("{scope} quota exhausted for region {region}, resets at {reset_at}")]
    QuotaExceeded {
        /// Region that was denied
        region: RegionId,
        /// Window that is exhausted
        scope: QuotaScope,
        /// Start of the next window
        reset_at: DateTime<Utc>,
    },

    /// The pacing delay (or the wait for the region) exceeds the caller's budget.
    #[error("pacing for region {region} exceeds the wait budget, retry after {retry_after}")]
    PacingTimeout {
        /// Region that was denied
        region: RegionId,
        /// Earliest instant worth retrying
        retry_after: DateTime<Utc>,
    },

    /// The grant could not be read or recorded durably.
    #[error("quota storage unavailable: {0}")]
    StorageUnavailable(#[from] DatabaseError),

    /// A persisted record holds values that cannot be interpreted.
    #[error("corrupt quota record for region {region}: {reason}")]
    Corrupt {
        /// Stored region key
        region: String,
        /// What failed to decode
        reason: String,
    },

    /// The service could not be built from configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RateLimitError {
    /// Instant after which the same acquire may succeed, for expected denials.
    #[must_use]
    pub fn retry_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::QuotaExceeded { reset_at, .. } => Some(*reset_at),
            Self::PacingTimeout { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// True for infrastructure faults rather than policy denials.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::Corrupt { .. } | Self::Config(_)
        )
    }
}

/// Result type alias for admission-control operations.
pub type Result<T> = std::result::Result<T, RateLimitError>;
