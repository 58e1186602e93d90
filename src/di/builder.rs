use crate::bean::BeanDefinition;
use crate::config::Settings;
use crate::di::BeanEngine;
use crate::error::Result;
use crate::module::Module;

type RegisterFn = fn(&BeanEngine) -> Result<()>;

/// Builder for constructing a bean engine
///
/// Collects settings, beans and modules, then registers them in order when
/// [`build`](Self::build) is called.
///
/// # Example
/// ```
/// use beanwire::prelude::*;
///
/// struct Clock;
///
/// let engine = BeanEngine::builder()
///     .profile("production")?
///     .bean(BeanBuilder::new(Clock).queued())
///     .build()?;
///
/// assert_eq!(engine.pending(), vec![TypeKey::of::<Clock>()]);
/// # Ok::<(), beanwire::BeansError>(())
/// ```
pub struct EngineBuilder {
    settings: Settings,
    beans: Vec<BeanDefinition>,
    modules: Vec<RegisterFn>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            beans: Vec::new(),
            modules: Vec::new(),
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Result<Self> {
        self.settings.set_profile(profile)?;
        Ok(self)
    }

    /// Register a bean when the engine is built.
    pub fn bean(mut self, definition: impl Into<BeanDefinition>) -> Self {
        self.beans.push(definition.into());
        self
    }

    /// Let module `M` register its beans when the engine is built.
    pub fn module<M: Module>(mut self) -> Self {
        self.modules.push(M::register);
        self
    }

    /// Build the engine, registering beans first and modules after.
    pub fn build(self) -> Result<BeanEngine> {
        self.settings.validate()?;
        let engine = BeanEngine::with_settings(self.settings);

        for definition in self.beans {
            engine.add(definition)?;
        }
        for register in self.modules {
            register(&engine)?;
        }

        tracing::debug!("Bean engine built with {} beans", engine.registry().len());
        Ok(engine)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::BeanBuilder;
    use crate::error::BeansError;

    struct Alpha;
    struct Beta;

    struct Greek;

    impl Module for Greek {
        fn register(engine: &BeanEngine) -> Result<()> {
            engine.add(BeanBuilder::new(Beta).queued())?;
            Ok(())
        }
    }

    #[test]
    fn test_build_registers_beans_and_modules() {
        let engine = EngineBuilder::new()
            .bean(BeanBuilder::new(Alpha))
            .module::<Greek>()
            .build()
            .unwrap();

        assert!(engine.contains::<Alpha>());
        assert!(engine.contains::<Beta>());
        assert_eq!(engine.pending().len(), 1);
    }

    #[test]
    fn test_build_fails_on_duplicates() {
        let result = EngineBuilder::new()
            .bean(BeanBuilder::new(Alpha))
            .bean(BeanBuilder::new(Alpha))
            .build();
        assert!(matches!(result, Err(BeansError::DuplicateBean { .. })));
    }
}
