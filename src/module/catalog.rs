use crate::bean::{BeanBuilder, BeanDefinition, LoadMode, ProfileTag, TypeKey};
use crate::config::{DEFAULT_PROFILE, Settings};
use crate::di::BeanEngine;
use crate::error::{BeansError, Result};
use std::collections::HashSet;
use std::fmt;

type Factory = Box<dyn Fn(&Settings) -> anyhow::Result<BeanDefinition> + Send + Sync>;

/// A discoverable bean type: how to instantiate it plus the metadata used to
/// decide whether it should be registered at all.
pub struct BeanClass {
    key: TypeKey,
    tags: Vec<String>,
    profile: ProfileTag,
    always_load: bool,
    factory: Factory,
}

impl BeanClass {
    /// Describe `T`, built by `factory` from the engine's settings.
    ///
    /// The class starts with the single tag `"default"`, no profile and
    /// `always_load` off.
    pub fn of<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Settings) -> anyhow::Result<BeanBuilder<T>> + Send + Sync + 'static,
    {
        Self {
            key: TypeKey::of::<T>(),
            tags: vec![DEFAULT_PROFILE.to_string()],
            profile: ProfileTag::default(),
            always_load: false,
            factory: Box::new(move |settings| factory(settings).map(BeanBuilder::build)),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile.own = Some(profile.into());
        self
    }

    pub fn inherits_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile.inherited = Some(profile.into());
        self
    }

    /// Queue the bean for `load_all` as soon as it is installed.
    pub fn always_load(mut self) -> Self {
        self.always_load = true;
        self
    }

    fn instantiate(&self, settings: &Settings) -> Result<BeanDefinition> {
        let mut definition =
            (self.factory)(settings).map_err(|source| BeansError::InstantiationFailed {
                type_name: self.key.name().to_string(),
                source,
            })?;

        if !self.profile.is_empty() {
            definition.profile = self.profile.clone();
        }
        if self.always_load && definition.load_mode == LoadMode::OnDemand {
            definition.load_mode = LoadMode::Queued;
        }
        Ok(definition)
    }
}

impl fmt::Debug for BeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanClass")
            .field("type", &self.key.name())
            .field("tags", &self.tags)
            .field("profile", &self.profile)
            .field("always_load", &self.always_load)
            .finish_non_exhaustive()
    }
}

/// Set of candidate bean classes filtered by tag and profile on installation.
#[derive(Debug)]
pub struct Catalog {
    tags: HashSet<String>,
    classes: Vec<BeanClass>,
}

impl Catalog {
    /// An empty catalog whose only active tag is `"default"`.
    pub fn new() -> Self {
        Self {
            tags: HashSet::from([DEFAULT_PROFILE.to_string()]),
            classes: Vec::new(),
        }
    }

    pub fn class(mut self, class: BeanClass) -> Self {
        self.classes.push(class);
        self
    }

    pub fn push(&mut self, class: BeanClass) {
        self.classes.push(class);
    }

    pub fn tags(&self) -> &HashSet<String> {
        &self.tags
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) -> Result<()> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(BeansError::invalid_config("tag can not be empty"));
        }
        self.tags.insert(tag);
        Ok(())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    pub fn remove_default_tag(&mut self) -> bool {
        self.remove_tag(DEFAULT_PROFILE)
    }

    /// Whether `class` carries an active tag and a profile compatible with `settings`.
    pub fn is_eligible(&self, class: &BeanClass, settings: &Settings) -> bool {
        let tagged = class.tags.iter().any(|tag| self.tags.contains(tag));
        let profiled = class
            .profile
            .effective(settings.profile_lookup())
            .is_none_or(|profile| profile == settings.profile());
        tagged && profiled
    }

    /// Instantiate and register every eligible class. Returns how many beans were added.
    pub fn install(&self, engine: &BeanEngine) -> Result<usize> {
        let settings = engine.settings();
        let mut installed = 0;

        for class in &self.classes {
            if !self.is_eligible(class, &settings) {
                tracing::debug!("Skipping ineligible bean class: {}", class.key);
                continue;
            }
            if engine.add(class.instantiate(&settings)?)? {
                installed += 1;
            }
        }

        tracing::info!(
            "Catalog installed {} of {} bean classes",
            installed,
            self.classes.len()
        );
        Ok(installed)
    }

    /// [`install`](Self::install), then load everything queued.
    pub fn install_and_load(&self, engine: &BeanEngine) -> Result<usize> {
        let installed = self.install(engine)?;
        engine.load_all()?;
        Ok(installed)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
