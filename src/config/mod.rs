//! Engine settings
//!
//! [`Settings`] is a plain value object. The engine keeps its copy behind a lock
//! and re-reads it on every resolution, so changes made through
//! [`BeanEngine::configure`](crate::BeanEngine::configure) affect the very next
//! selection.

mod policy;

pub use policy::{
    BatchStrategy, DuplicateBeanPolicy, FallbackStrategy, ProfileLookup, SelectionStrategy,
};

use crate::error::{BeansError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Profile assumed when none is configured, and the tag a bare profile marker carries.
pub const DEFAULT_PROFILE: &str = "default";

const ENV_PREFIX: &str = "BEANWIRE_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    profile: String,
    duplicate_bean_policy: DuplicateBeanPolicy,
    selection_strategy: SelectionStrategy,
    duplicate_profile_fallback: FallbackStrategy,
    no_profile_fallback: FallbackStrategy,
    profile_lookup: ProfileLookup,
    batch_strategy: BatchStrategy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            duplicate_bean_policy: DuplicateBeanPolicy::Exception,
            selection_strategy: SelectionStrategy::Profile,
            duplicate_profile_fallback: FallbackStrategy::Exception,
            no_profile_fallback: FallbackStrategy::First,
            profile_lookup: ProfileLookup::Inherited,
            batch_strategy: BatchStrategy::Recursive,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from `BEANWIRE_*` environment variables, starting from the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup. Keys are the `BEANWIRE_*`
    /// variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let mut settings = Self::default();
        if let Some(profile) = get("PROFILE") {
            settings.set_profile(profile)?;
        }
        if let Some(value) = get("DUPLICATE_BEAN_POLICY") {
            settings.duplicate_bean_policy = parse_policy("DUPLICATE_BEAN_POLICY", &value)?;
        }
        if let Some(value) = get("SELECTION_STRATEGY") {
            settings.selection_strategy = parse_policy("SELECTION_STRATEGY", &value)?;
        }
        if let Some(value) = get("DUPLICATE_PROFILE_FALLBACK") {
            settings.duplicate_profile_fallback =
                parse_policy("DUPLICATE_PROFILE_FALLBACK", &value)?;
        }
        if let Some(value) = get("NO_PROFILE_FALLBACK") {
            settings.no_profile_fallback = parse_policy("NO_PROFILE_FALLBACK", &value)?;
        }
        if let Some(value) = get("PROFILE_LOOKUP") {
            settings.profile_lookup = parse_policy("PROFILE_LOOKUP", &value)?;
        }
        if let Some(value) = get("BATCH_STRATEGY") {
            settings.batch_strategy = parse_policy("BATCH_STRATEGY", &value)?;
        }

        tracing::debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    /// Parse settings from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| BeansError::invalid_config(format!("malformed settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        validate_profile(&self.profile)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: impl Into<String>) -> Result<()> {
        let profile = profile.into();
        validate_profile(&profile)?;
        self.profile = profile;
        Ok(())
    }

    pub fn duplicate_bean_policy(&self) -> DuplicateBeanPolicy {
        self.duplicate_bean_policy
    }

    pub fn set_duplicate_bean_policy(&mut self, policy: DuplicateBeanPolicy) {
        self.duplicate_bean_policy = policy;
    }

    pub fn selection_strategy(&self) -> SelectionStrategy {
        self.selection_strategy
    }

    pub fn set_selection_strategy(&mut self, strategy: SelectionStrategy) {
        self.selection_strategy = strategy;
    }

    pub fn duplicate_profile_fallback(&self) -> FallbackStrategy {
        self.duplicate_profile_fallback
    }

    pub fn set_duplicate_profile_fallback(&mut self, fallback: FallbackStrategy) {
        self.duplicate_profile_fallback = fallback;
    }

    pub fn no_profile_fallback(&self) -> FallbackStrategy {
        self.no_profile_fallback
    }

    pub fn set_no_profile_fallback(&mut self, fallback: FallbackStrategy) {
        self.no_profile_fallback = fallback;
    }

    pub fn profile_lookup(&self) -> ProfileLookup {
        self.profile_lookup
    }

    pub fn set_profile_lookup(&mut self, lookup: ProfileLookup) {
        self.profile_lookup = lookup;
    }

    pub fn batch_strategy(&self) -> BatchStrategy {
        self.batch_strategy
    }

    pub fn set_batch_strategy(&mut self, strategy: BatchStrategy) {
        self.batch_strategy = strategy;
    }
}

fn validate_profile(profile: &str) -> Result<()> {
    if profile.is_empty() {
        return Err(BeansError::invalid_config("profile can not be empty"));
    }
    if profile.trim() != profile {
        return Err(BeansError::invalid_config(format!(
            "profile '{profile}' has surrounding whitespace"
        )));
    }
    Ok(())
}

fn parse_policy<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    value.trim().parse().map_err(|e| {
        BeansError::invalid_config(format!("{ENV_PREFIX}{name} '{value}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.profile(), DEFAULT_PROFILE);
        assert_eq!(settings.duplicate_bean_policy(), DuplicateBeanPolicy::Exception);
        assert_eq!(settings.selection_strategy(), SelectionStrategy::Profile);
        assert_eq!(settings.duplicate_profile_fallback(), FallbackStrategy::Exception);
        assert_eq!(settings.no_profile_fallback(), FallbackStrategy::First);
        assert_eq!(settings.profile_lookup(), ProfileLookup::Inherited);
        assert_eq!(settings.batch_strategy(), BatchStrategy::Recursive);
    }

    #[test]
    fn test_set_profile_rejects_blank_values() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set_profile(""),
            Err(BeansError::InvalidConfiguration { .. })
        ));
        assert!(settings.set_profile(" prod").is_err());
        assert_eq!(settings.profile(), DEFAULT_PROFILE);

        settings.set_profile("prod").unwrap();
        assert_eq!(settings.profile(), "prod");
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("BEANWIRE_PROFILE", "production"),
            ("BEANWIRE_SELECTION_STRATEGY", "Random"),
            ("BEANWIRE_BATCH_STRATEGY", "fixed_point"),
            ("BEANWIRE_DUPLICATE_BEAN_POLICY", "quiet"),
        ]
        .into_iter()
        .collect();

        let settings =
            Settings::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(settings.profile(), "production");
        assert_eq!(settings.selection_strategy(), SelectionStrategy::Random);
        assert_eq!(settings.batch_strategy(), BatchStrategy::FixedPoint);
        assert_eq!(settings.duplicate_bean_policy(), DuplicateBeanPolicy::Quiet);
        assert_eq!(settings.no_profile_fallback(), FallbackStrategy::First);
    }

    #[test]
    fn test_from_lookup_rejects_unknown_policy() {
        let err = Settings::from_lookup(|key| {
            (key == "BEANWIRE_NO_PROFILE_FALLBACK").then(|| "maybe".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("BEANWIRE_NO_PROFILE_FALLBACK"));
    }

    #[test]
    fn test_from_json() {
        let settings = Settings::from_json(
            r#"{ "profile": "p2", "duplicate_profile_fallback": "first" }"#,
        )
        .unwrap();
        assert_eq!(settings.profile(), "p2");
        assert_eq!(settings.duplicate_profile_fallback(), FallbackStrategy::First);
        assert_eq!(settings.selection_strategy(), SelectionStrategy::Profile);

        assert!(Settings::from_json(r#"{ "profile": "" }"#).is_err());
        assert!(Settings::from_json("not json").is_err());
    }
}
