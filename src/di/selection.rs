//! Candidate selection
//!
//! Pure functions that pick one bean out of the candidates satisfying a required
//! type. Loading the chosen bean is the engine's job.

use super::registry::Candidate;
use crate::bean::TypeKey;
use crate::config::{FallbackStrategy, SelectionStrategy, Settings};
use crate::error::{BeansError, Result};
use rand::Rng;

/// How the final bean is drawn from a narrowed pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Draw {
    /// First loaded candidate, else the first candidate.
    First,
    /// Any candidate, uniformly.
    Random,
}

/// Apply the configured strategy and fallbacks to a non-empty candidate list.
pub(crate) fn narrow<'a>(
    required: &TypeKey,
    candidates: &'a [Candidate],
    settings: &Settings,
) -> Result<(Vec<&'a Candidate>, Draw)> {
    let all: Vec<&Candidate> = candidates.iter().collect();

    match settings.selection_strategy() {
        SelectionStrategy::First => Ok((all, Draw::First)),
        SelectionStrategy::Random => Ok((all, Draw::Random)),
        SelectionStrategy::Profile => {
            let profile = settings.profile();
            let profiled: Vec<&Candidate> = candidates
                .iter()
                .filter(|c| c.profile.as_deref() == Some(profile))
                .collect();

            if profiled.is_empty() {
                return match settings.no_profile_fallback() {
                    FallbackStrategy::First => Ok((all, Draw::First)),
                    FallbackStrategy::Random => Ok((all, Draw::Random)),
                    FallbackStrategy::Exception => Err(BeansError::NoProfileMatch {
                        type_name: required.name().to_string(),
                        profile: profile.to_string(),
                    }),
                };
            }

            match settings.duplicate_profile_fallback() {
                FallbackStrategy::First => Ok((profiled, Draw::First)),
                FallbackStrategy::Random => Ok((profiled, Draw::Random)),
                FallbackStrategy::Exception if profiled.len() == 1 => {
                    Ok((profiled, Draw::First))
                }
                FallbackStrategy::Exception => Err(BeansError::AmbiguousProfileMatch {
                    type_name: required.name().to_string(),
                    profile: profile.to_string(),
                    candidates: profiled.iter().map(|c| c.key.name().to_string()).collect(),
                }),
            }
        }
    }
}

pub(crate) fn draw<'a>(pool: &[&'a Candidate], draw: Draw) -> Option<&'a Candidate> {
    match draw {
        Draw::First => pool
            .iter()
            .find(|c| c.loaded)
            .or_else(|| pool.first())
            .copied(),
        Draw::Random => {
            if pool.is_empty() {
                return None;
            }
            let index = rand::rng().random_range(0..pool.len());
            Some(pool[index])
        }
    }
}

/// Pick the best match among `candidates`, or `None` if there are none.
pub(crate) fn select<'a>(
    required: &TypeKey,
    candidates: &'a [Candidate],
    settings: &Settings,
) -> Result<Option<&'a Candidate>> {
    if candidates.is_empty() {
        return Ok(None);
    }
    let (pool, how) = narrow(required, candidates, settings)?;
    Ok(draw(&pool, how))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::BeanBuilder;
    use crate::config::{DuplicateBeanPolicy, ProfileLookup};
    use crate::di::Registry;
    use std::collections::HashSet;
    use std::sync::Arc;

    trait Store: Send + Sync {}

    struct Memory;
    impl Store for Memory {}

    struct Disk;
    impl Store for Disk {}

    struct Cloud;
    impl Store for Cloud {}

    fn store() -> TypeKey {
        TypeKey::of::<dyn Store>()
    }

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .add(
                BeanBuilder::new(Memory)
                    .provides::<dyn Store>(|s| s as Arc<dyn Store>)
                    .profile("test")
                    .build(),
                DuplicateBeanPolicy::Exception,
            )
            .unwrap();
        registry
            .add(
                BeanBuilder::new(Disk)
                    .provides::<dyn Store>(|s| s as Arc<dyn Store>)
                    .profile("production")
                    .preloaded()
                    .build(),
                DuplicateBeanPolicy::Exception,
            )
            .unwrap();
        registry
            .add(
                BeanBuilder::new(Cloud)
                    .provides::<dyn Store>(|s| s as Arc<dyn Store>)
                    .inherits_profile("production")
                    .build(),
                DuplicateBeanPolicy::Exception,
            )
            .unwrap();
        registry
    }

    fn pick(settings: &Settings, lookup: ProfileLookup) -> Result<Option<TypeKey>> {
        let candidates = registry().candidates(&store(), lookup);
        Ok(select(&store(), &candidates, settings)?.map(|c| c.key))
    }

    #[test]
    fn test_first_prefers_loaded_candidate() {
        let mut settings = Settings::default();
        settings.set_selection_strategy(SelectionStrategy::First);
        assert_eq!(
            pick(&settings, ProfileLookup::Inherited).unwrap(),
            Some(TypeKey::of::<Disk>())
        );
    }

    #[test]
    fn test_random_covers_all_candidates() {
        let mut settings = Settings::default();
        settings.set_selection_strategy(SelectionStrategy::Random);

        let seen: HashSet<TypeKey> = (0..300)
            .filter_map(|_| pick(&settings, ProfileLookup::Inherited).unwrap())
            .collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_profile_single_match() {
        let mut settings = Settings::default();
        settings.set_profile("test").unwrap();
        assert_eq!(
            pick(&settings, ProfileLookup::Inherited).unwrap(),
            Some(TypeKey::of::<Memory>())
        );
    }

    #[test]
    fn test_profile_ambiguity_depends_on_lookup() {
        let mut settings = Settings::default();
        settings.set_profile("production").unwrap();

        let err = pick(&settings, ProfileLookup::Inherited).unwrap_err();
        match err {
            BeansError::AmbiguousProfileMatch { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Cloud only inherits its tag, so an exact lookup leaves one match.
        assert_eq!(
            pick(&settings, ProfileLookup::Exact).unwrap(),
            Some(TypeKey::of::<Disk>())
        );

        settings.set_duplicate_profile_fallback(FallbackStrategy::First);
        assert_eq!(
            pick(&settings, ProfileLookup::Inherited).unwrap(),
            Some(TypeKey::of::<Disk>())
        );
    }

    #[test]
    fn test_no_profile_fallbacks() {
        let mut settings = Settings::default();
        settings.set_profile("staging").unwrap();
        assert_eq!(
            pick(&settings, ProfileLookup::Inherited).unwrap(),
            Some(TypeKey::of::<Disk>())
        );

        settings.set_no_profile_fallback(FallbackStrategy::Exception);
        assert!(matches!(
            pick(&settings, ProfileLookup::Inherited),
            Err(BeansError::NoProfileMatch { .. })
        ));
    }

    #[test]
    fn test_empty_candidates_select_nothing() {
        let mut settings = Settings::default();
        settings.set_no_profile_fallback(FallbackStrategy::Exception);
        assert!(select(&store(), &[], &settings).unwrap().is_none());
    }

    #[test]
    fn test_draw_first_without_loaded_takes_head() {
        let registry = Registry::new();
        for definition in [
            BeanBuilder::new(Memory)
                .provides::<dyn Store>(|s| s as Arc<dyn Store>)
                .build(),
            BeanBuilder::new(Disk)
                .provides::<dyn Store>(|s| s as Arc<dyn Store>)
                .build(),
        ] {
            registry
                .add(definition, DuplicateBeanPolicy::Exception)
                .unwrap();
        }
        let candidates = registry.candidates(&store(), ProfileLookup::Inherited);
        let pool: Vec<&Candidate> = candidates.iter().collect();
        assert_eq!(
            draw(&pool, Draw::First).map(|c| c.key),
            Some(TypeKey::of::<Memory>())
        );
        assert!(draw(&[], Draw::Random).is_none());
    }
}
