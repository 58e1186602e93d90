//! Policy enums consumed by the selection logic and the registry.
//!
//! All of them parse case-insensitively from snake_case strings so they can be
//! loaded from environment variables or JSON.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// What happens when a second instance of an already-registered type is added.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DuplicateBeanPolicy {
    /// Ignore the new instance and keep the registered one.
    Quiet,
    /// Fail with [`BeansError::DuplicateBean`](crate::BeansError::DuplicateBean).
    #[default]
    Exception,
}

/// How one instance is picked when several beans satisfy a required type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SelectionStrategy {
    /// First loaded candidate in registration order, else the first candidate.
    First,
    /// Uniformly random candidate.
    Random,
    /// Candidates tagged with the active profile, with fallbacks.
    #[default]
    Profile,
}

/// Fallback used by [`SelectionStrategy::Profile`] when the profile filter yields
/// zero or several candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FallbackStrategy {
    First,
    Random,
    Exception,
}

/// Whether a bean's profile may come from its declared supertype chain or only
/// from the bean's own type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProfileLookup {
    #[default]
    Inherited,
    Exact,
}

/// Which variant of batch loading `load_all` runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BatchStrategy {
    /// Load each pending bean depth-first, pulling dependencies in as needed.
    #[default]
    Recursive,
    /// Repeat passes over the pending actions until nothing is left or a pass
    /// makes no progress.
    FixedPoint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            SelectionStrategy::from_str("PROFILE").unwrap(),
            SelectionStrategy::Profile
        );
        assert_eq!(
            BatchStrategy::from_str("fixed_point").unwrap(),
            BatchStrategy::FixedPoint
        );
        assert!(FallbackStrategy::from_str("sometimes").is_err());
    }

    #[test]
    fn test_display_is_snake_case() {
        assert_eq!(BatchStrategy::FixedPoint.to_string(), "fixed_point");
        assert_eq!(DuplicateBeanPolicy::Quiet.to_string(), "quiet");
    }
}
