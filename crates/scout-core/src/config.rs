//! Configuration management for Tulip Scout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::RegionId;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of grants per region per UTC day.
pub const DEFAULT_DAILY_LIMIT: u32 = 40;
/// Default number of grants per region per UTC hour.
pub const DEFAULT_HOURLY_LIMIT: u32 = 10;
/// Default minimum spacing between grants, in seconds.
pub const DEFAULT_MIN_SPACING_SECONDS: f64 = 10.0;
/// Default upper bound of the random extra spacing, in seconds.
pub const DEFAULT_JITTER_SECONDS: f64 = 5.0;
/// Default longest time a single acquire may suspend, in seconds.
pub const DEFAULT_MAX_WAIT_SECONDS: f64 = 60.0;

/// File name of the quota database inside the data directory.
pub const DEFAULT_DATABASE_FILE: &str = "quota.db";

/// Main application configuration.
///
/// This is loaded from `~/.config/tulip-scout/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging settings
    pub logging: LoggingConfig,
    /// Quota database settings
    pub storage: StorageConfig,
    /// Admission-control settings
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML or fail validation
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SCOUT_DAILY_LIMIT`, `SCOUT_HOURLY_LIMIT`: default quota limits
    /// - `SCOUT_MIN_SPACING_SECONDS`, `SCOUT_JITTER_SECONDS`,
    ///   `SCOUT_MAX_WAIT_SECONDS`: default pacing settings
    /// - `SCOUT_DATABASE_PATH`: quota database location
    /// - `SCOUT_LOG_LEVEL`, `SCOUT_LOG_FORMAT`: logging settings
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Unset or unparseable variables leave the current value untouched.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = &mut self.rate_limit.defaults;

        if let Some(limit) = parse_var(&lookup, "SCOUT_DAILY_LIMIT") {
            defaults.daily_limit = limit;
            tracing::debug!("Override rate_limit.defaults.daily_limit from env: {}", limit);
        }

        if let Some(limit) = parse_var(&lookup, "SCOUT_HOURLY_LIMIT") {
            defaults.hourly_limit = limit;
            tracing::debug!("Override rate_limit.defaults.hourly_limit from env: {}", limit);
        }

        if let Some(secs) = parse_var(&lookup, "SCOUT_MIN_SPACING_SECONDS") {
            defaults.min_spacing_seconds = secs;
            tracing::debug!("Override rate_limit.defaults.min_spacing_seconds from env: {}", secs);
        }

        if let Some(secs) = parse_var(&lookup, "SCOUT_JITTER_SECONDS") {
            defaults.jitter_seconds = secs;
            tracing::debug!("Override rate_limit.defaults.jitter_seconds from env: {}", secs);
        }

        if let Some(secs) = parse_var(&lookup, "SCOUT_MAX_WAIT_SECONDS") {
            defaults.max_wait_seconds = secs;
            tracing::debug!("Override rate_limit.defaults.max_wait_seconds from env: {}", secs);
        }

        if let Some(path) = lookup("SCOUT_DATABASE_PATH").filter(|p| !p.is_empty()) {
            tracing::debug!("Override storage.database_path from env: {}", path);
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Some(level) = lookup("SCOUT_LOG_LEVEL").filter(|l| !l.is_empty()) {
            tracing::debug!("Override logging.level from env: {}", level);
            self.logging.level = level;
        }

        if let Some(format) = parse_var(&lookup, "SCOUT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Check every section for values the rest of the system cannot honour.
    pub fn validate(&self) -> ConfigResult<()> {
        self.rate_limit.validate()
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/tulip-scout/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/tulip-scout`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "tulip-scout", "tulip-scout").ok_or(ConfigError::NoConfigDir)
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::debug!("Ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                reason: format!("expected \"pretty\" or \"json\", got \"{other}\""),
            }),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `scout_ratelimit=debug`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Quota database settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the `SQLite` quota database; the data directory is used when unset
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the database location, falling back to the XDG data directory.
    pub fn resolved_database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(AppConfig::data_dir()?.join(DEFAULT_DATABASE_FILE)),
        }
    }
}

/// Quota and pacing settings for a single region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionLimits {
    /// Grants allowed per UTC day
    pub daily_limit: u32,
    /// Grants allowed per UTC hour
    pub hourly_limit: u32,
    /// Minimum spacing between two grants
    pub min_spacing_seconds: f64,
    /// Upper bound of the random spacing added on top of the minimum
    pub jitter_seconds: f64,
    /// Longest time a single acquire may suspend by default
    pub max_wait_seconds: f64,
}

impl Default for RegionLimits {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            hourly_limit: DEFAULT_HOURLY_LIMIT,
            min_spacing_seconds: DEFAULT_MIN_SPACING_SECONDS,
            jitter_seconds: DEFAULT_JITTER_SECONDS,
            max_wait_seconds: DEFAULT_MAX_WAIT_SECONDS,
        }
    }
}

impl RegionLimits {
    /// Minimum spacing as a `Duration`.
    #[must_use]
    pub fn min_spacing(&self) -> Duration {
        seconds(self.min_spacing_seconds)
    }

    /// Jitter bound as a `Duration`.
    #[must_use]
    pub fn jitter(&self) -> Duration {
        seconds(self.jitter_seconds)
    }

    /// Default wait budget as a `Duration`.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        seconds(self.max_wait_seconds)
    }

    fn validate(&self, section: &str) -> ConfigResult<()> {
        for (name, value) in [
            ("min_spacing_seconds", self.min_spacing_seconds),
            ("jitter_seconds", self.jitter_seconds),
            ("max_wait_seconds", self.max_wait_seconds),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{section}.{name}"),
                    reason: format!("must be a finite, non-negative number of seconds, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Validated values never fail this conversion; anything else collapses to zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Per-region override; unset fields inherit the global defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionOverride {
    /// Grants allowed per UTC day
    pub daily_limit: Option<u32>,
    /// Grants allowed per UTC hour
    pub hourly_limit: Option<u32>,
    /// Minimum spacing between two grants
    pub min_spacing_seconds: Option<f64>,
    /// Upper bound of the random extra spacing
    pub jitter_seconds: Option<f64>,
    /// Longest time a single acquire may suspend by default
    pub max_wait_seconds: Option<f64>,
}

impl RegionOverride {
    fn apply(&self, base: RegionLimits) -> RegionLimits {
        RegionLimits {
            daily_limit: self.daily_limit.unwrap_or(base.daily_limit),
            hourly_limit: self.hourly_limit.unwrap_or(base.hourly_limit),
            min_spacing_seconds: self.min_spacing_seconds.unwrap_or(base.min_spacing_seconds),
            jitter_seconds: self.jitter_seconds.unwrap_or(base.jitter_seconds),
            max_wait_seconds: self.max_wait_seconds.unwrap_or(base.max_wait_seconds),
        }
    }
}

/// Admission-control settings: global defaults plus per-region overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Limits applied to every region without an override
    pub defaults: RegionLimits,
    /// Overrides keyed by region identifier
    pub regions: BTreeMap<String, RegionOverride>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut regions = BTreeMap::new();
        regions.insert(
            "Eastern_Europe".to_string(),
            RegionOverride {
                min_spacing_seconds: Some(12.0),
                ..RegionOverride::default()
            },
        );
        regions.insert(
            "Far_East".to_string(),
            RegionOverride {
                min_spacing_seconds: Some(15.0),
                ..RegionOverride::default()
            },
        );

        Self {
            defaults: RegionLimits::default(),
            regions,
        }
    }
}

impl RateLimitConfig {
    /// Configuration with the given defaults and no regional overrides.
    #[must_use]
    pub fn uniform(defaults: RegionLimits) -> Self {
        Self {
            defaults,
            regions: BTreeMap::new(),
        }
    }

    /// Add or replace the override for a region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>, limits: RegionOverride) -> Self {
        self.regions.insert(region.into(), limits);
        self
    }

    /// Resolve the effective limits of a region.
    #[must_use]
    pub fn limits_for(&self, region: &str) -> RegionLimits {
        match self.regions.get(region) {
            Some(over) => over.apply(self.defaults),
            None => self.defaults,
        }
    }

    /// Check defaults and every resolved regional configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.defaults.validate("rate_limit.defaults")?;

        for name in self.regions.keys() {
            if let Err(e) = RegionId::new(name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("rate_limit.regions.{name}"),
                    reason: e.to_string(),
                });
            }
            self.limits_for(name)
                .validate(&format!("rate_limit.regions.{name}"))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.storage.database_path.is_none());
        assert_eq!(config.rate_limit.defaults.daily_limit, 40);
        assert_eq!(config.rate_limit.defaults.hourly_limit, 10);
        assert_eq!(config.rate_limit.defaults.min_spacing(), Duration::from_secs(10));
        assert_eq!(config.rate_limit.defaults.jitter(), Duration::from_secs(5));
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_regional_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(
            config.limits_for("Eastern_Europe").min_spacing(),
            Duration::from_secs(12)
        );
        assert_eq!(config.limits_for("Far_East").min_spacing(), Duration::from_secs(15));
        assert_eq!(config.limits_for("Nordics"), config.defaults);
    }

    #[test]
    fn test_override_inherits_unset_fields() {
        let config = RateLimitConfig::uniform(RegionLimits::default()).with_region(
            "Japan",
            RegionOverride {
                daily_limit: Some(20),
                ..RegionOverride::default()
            },
        );

        let limits = config.limits_for("Japan");
        assert_eq!(limits.daily_limit, 20);
        assert_eq!(limits.hourly_limit, DEFAULT_HOURLY_LIMIT);
        assert!((limits.min_spacing_seconds - DEFAULT_MIN_SPACING_SECONDS).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[logging]"));
        assert!(toml_str.contains("[rate_limit.defaults]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.rate_limit, config.rate_limit);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[logging]
format = "json"

[rate_limit.defaults]
daily_limit = 25

[rate_limit.regions.Poland]
hourly_limit = 4
min_spacing_seconds = 20.5
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.rate_limit.defaults.daily_limit, 25);
        // Explicit regions replace the built-in regional table
        assert!(!config.rate_limit.regions.contains_key("Far_East"));

        let poland = config.rate_limit.limits_for("Poland");
        assert_eq!(poland.daily_limit, 25);
        assert_eq!(poland.hourly_limit, 4);
        assert_eq!(poland.min_spacing(), Duration::from_millis(20_500));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.storage.database_path = Some(tmp.path().join("quota.db"));
        config.rate_limit.defaults.hourly_limit = 3;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.rate_limit.defaults.hourly_limit, 3);
        assert_eq!(
            loaded
                .storage
                .resolved_database_path()
                .expect("resolve database path"),
            tmp.path().join("quota.db")
        );
    }

    #[test]
    fn test_load_from_missing_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = AppConfig::load_from(&tmp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_load_rejects_negative_spacing() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");
        fs::write(
            &config_path,
            "[rate_limit.regions.Far_East]\nmin_spacing_seconds = -1.0\n",
        )
        .expect("write config file");

        match AppConfig::load_from(&config_path) {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "rate_limit.regions.Far_East.min_spacing_seconds");
            }
            other => panic!("Expected InvalidValue error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_region_name() {
        let config = RateLimitConfig::default().with_region("bad\tregion", RegionOverride::default());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let mut config = RateLimitConfig::default();
        config.defaults.max_wait_seconds = f64::INFINITY;
        assert!(config.validate().is_err());

        config.defaults.max_wait_seconds = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SCOUT_DAILY_LIMIT", "60"),
            ("SCOUT_HOURLY_LIMIT", "not-a-number"),
            ("SCOUT_MIN_SPACING_SECONDS", "11.5"),
            ("SCOUT_JITTER_SECONDS", "0"),
            ("SCOUT_DATABASE_PATH", "/tmp/scout/quota.db"),
            ("SCOUT_LOG_FORMAT", "JSON"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.rate_limit.defaults.daily_limit, 60);
        // Unparseable values are ignored
        assert_eq!(config.rate_limit.defaults.hourly_limit, DEFAULT_HOURLY_LIMIT);
        assert_eq!(
            config.rate_limit.defaults.min_spacing(),
            Duration::from_millis(11_500)
        );
        assert_eq!(config.rate_limit.defaults.jitter(), Duration::ZERO);
        assert_eq!(
            config.storage.database_path,
            Some(PathBuf::from("/tmp/scout/quota.db"))
        );
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }
}
