//! Scout Core - Foundation crate for the Tulip Scout admission-control core.
//!
//! This crate provides shared types, error handling and configuration
//! management that the storage and rate-limiting crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared newtypes (`RegionId`)
//!
//! # Example
//!
//! ```rust
//! use scout_core::{AppConfig, RegionId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let region = RegionId::new("Eastern_Europe")?;
//!
//! let limits = config.rate_limit.limits_for(region.as_str());
//! assert_eq!(limits.daily_limit, 40);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, LogFormat, LoggingConfig, RateLimitConfig, RegionLimits, RegionOverride,
    StorageConfig,
};
pub use error::{ConfigError, ConfigResult, Result, ScoutError};
pub use types::RegionId;
