//! Scout Rate Limiter - per-region admission control for outbound scraping.
//!
//! Every request to the external platform must first obtain a [`Grant`]
//! from the [`RateLimiterService`]. A grant is issued only while the
//! region's daily and hourly quotas have room, and never sooner than the
//! region's minimum spacing (plus jitter) after the previous grant.
//!
//! # Modules
//!
//! - [`clock`] - Injectable time source (`SystemClock`, `ManualClock`)
//! - [`window`] - UTC day and hour window arithmetic
//! - [`record`] - Per-region quota counters and rollover rules
//! - [`store`] - Durable quota storage (`SQLite` and in-memory)
//! - [`pacing`] - Minimum spacing with bounded jitter
//! - [`service`] - The `acquire` / `status` façade
//!
//! # Example
//!
//! ```rust,no_run
//! use scout_core::{RateLimitConfig, RegionId};
//! use scout_ratelimit::{RateLimiterService, SqliteQuotaStore};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteQuotaStore::open("quota.db").await?;
//! let limiter = RateLimiterService::new(RateLimitConfig::default(), Arc::new(store))?;
//!
//! let region = RegionId::new("Eastern_Europe")?;
//! let grant = limiter.acquire(&region, Duration::from_secs(60)).await?;
//! println!("request {} of today", grant.day_count);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod clock;
pub mod error;
pub mod pacing;
pub mod record;
pub mod service;
pub mod store;
pub mod window;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{QuotaScope, RateLimitError, Result};
pub use pacing::{FixedJitter, JitterSource, NoJitter, PacingGate, PacingPolicy, RandomJitter};
pub use record::QuotaRecord;
pub use service::{Grant, QuotaSnapshot, RateLimiterService};
pub use store::{MemoryQuotaStore, QuotaStore, SqliteQuotaStore};
