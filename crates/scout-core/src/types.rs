//! Shared types used across the Tulip Scout workspace.
//!
//! This module defines the newtypes that give the admission-control core
//! type-safe keys instead of bare strings.

use crate::error::ScoutError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Maximum length of a region identifier, in characters.
pub const MAX_REGION_LEN: usize = 64;

/// Newtype for region identifiers with validation.
///
/// A region is an independent quota and pacing domain, typically a named
/// market such as `Eastern_Europe` or `Asia/Pacific`. Any text of 1-64
/// characters is accepted as long as it contains no control characters and
/// does not start or end with whitespace. Comparison is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId(String);

impl RegionId {
    /// Create a new `RegionId` from a string.
    ///
    /// # Errors
    /// Returns `ScoutError::Validation` if the identifier is empty, too long,
    /// padded with whitespace, or contains control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, ScoutError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), ScoutError> {
        static REGION_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = REGION_REGEX.get_or_init(|| {
            Regex::new(r"^[^\p{Cc}\s](?:[^\p{Cc}]*[^\p{Cc}\s])?$").expect("valid regex")
        });

        let len = id.chars().count();
        if len == 0 || len > MAX_REGION_LEN {
            return Err(ScoutError::Validation(format!(
                "invalid region: must be 1-{MAX_REGION_LEN} characters, got {len} characters"
            )));
        }

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(ScoutError::Validation(format!(
                "invalid region: no control characters or surrounding whitespace allowed, got {id:?}"
            )))
        }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RegionId {
    type Error = ScoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RegionId> for String {
    fn from(id: RegionId) -> Self {
        id.0
    }
}

impl std::str::FromStr for RegionId {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RegionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_id_valid() {
        let valid_ids = vec![
            "Eastern_Europe",
            "EasternEurope",
            "Far_East",
            "south-korea",
            "Hong Kong",
            "eu.west",
            "Asia/Pacific",
            "São_Paulo",
            "東京",
            "A",
        ];

        for id in valid_ids {
            assert!(RegionId::new(id).is_ok(), "Failed for: {id}");
        }
    }

    #[test]
    fn test_region_id_invalid() {
        let too_long = "a".repeat(MAX_REGION_LEN + 1);
        let invalid_ids = vec![
            "",
            " Poland",
            "Poland ",
            "tab\tregion",
            "line\nbreak",
            "nul\0region",
            too_long.as_str(),
        ];

        for id in invalid_ids {
            assert!(RegionId::new(id).is_err(), "Should fail for: {id:?}");
        }
    }

    #[test]
    fn test_region_id_length_counts_characters() {
        let at_limit = "é".repeat(MAX_REGION_LEN);
        assert!(RegionId::new(at_limit.as_str()).is_ok());

        let over_limit = "é".repeat(MAX_REGION_LEN + 1);
        assert!(RegionId::new(over_limit.as_str()).is_err());
    }

    #[test]
    fn test_region_id_is_case_sensitive() {
        let a = RegionId::new("Far_East").expect("valid region");
        let b = RegionId::new("far_east").expect("valid region");
        assert_ne!(a, b);
    }

    #[test]
    fn test_region_id_display_and_parse() {
        let region: RegionId = "Eastern_Europe".parse().expect("parse region");
        assert_eq!(region.to_string(), "Eastern_Europe");
        assert_eq!(region.as_str(), "Eastern_Europe");
    }

    #[test]
    fn test_region_id_serde_validates() {
        let region: RegionId = serde_json::from_str("\"Far_East\"").expect("deserialize region");
        assert_eq!(region.as_str(), "Far_East");

        let json = serde_json::to_string(&region).expect("serialize region");
        assert_eq!(json, "\"Far_East\"");

        assert!(serde_json::from_str::<RegionId>("\"  \"").is_err());
    }
}
