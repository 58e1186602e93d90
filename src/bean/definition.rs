use super::{Args, Instance, ParameterSpec, TypeKey, WiringAction};
use crate::config::ProfileLookup;
use crate::di::BeanEngine;
use crate::error::{BeansError, Result};
use std::sync::Arc;

type CasterFn = Arc<dyn Fn(Instance) -> Option<Instance> + Send + Sync>;

/// A type a bean can stand in for, with the cast that produces that view.
///
/// The cast yields an erased `Arc<R>` so that sized and trait-object requirements
/// are handled the same way.
#[derive(Clone)]
pub(crate) struct Provision {
    pub(crate) key: TypeKey,
    cast: CasterFn,
}

impl Provision {
    fn new<T, R, F>(cast: F) -> Self
    where
        T: Send + Sync + 'static,
        R: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<R> + Send + Sync + 'static,
    {
        let cast: CasterFn = Arc::new(move |instance: Instance| {
            let concrete = instance.downcast::<T>().ok()?;
            let view: Arc<R> = cast(concrete);
            Some(Arc::new(view) as Instance)
        });
        Self {
            key: TypeKey::of::<R>(),
            cast,
        }
    }

    fn identity<T: Send + Sync + 'static>() -> Self {
        Self::new::<T, T, _>(|instance| instance)
    }

    pub(crate) fn cast(&self, instance: Instance) -> Result<Instance> {
        (self.cast)(instance).ok_or_else(|| BeansError::downcast_failed(self.key.name()))
    }
}

/// Profile metadata attached to a bean type.
///
/// `own` is declared on the bean's type itself; `inherited` is the nearest tag found
/// on its declared supertype chain. Which of them counts is decided by
/// [`ProfileLookup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileTag {
    pub own: Option<String>,
    pub inherited: Option<String>,
}

impl ProfileTag {
    pub fn effective(&self, lookup: ProfileLookup) -> Option<&str> {
        match lookup {
            ProfileLookup::Inherited => self.own.as_deref().or(self.inherited.as_deref()),
            ProfileLookup::Exact => self.own.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.own.is_none() && self.inherited.is_none()
    }
}

/// How a bean enters the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Registered unloaded; loaded only when something asks for it.
    #[default]
    OnDemand,
    /// Registered unloaded and queued for the next `load_all`.
    Queued,
    /// Registered as already loaded; its wiring actions never run.
    Preloaded,
}

/// Type-erased bean ready for registration.
pub struct BeanDefinition {
    pub(crate) key: TypeKey,
    pub(crate) instance: Instance,
    pub(crate) provisions: Vec<Provision>,
    pub(crate) profile: ProfileTag,
    pub(crate) wiring: Vec<WiringAction>,
    pub(crate) load_mode: LoadMode,
}

impl BeanDefinition {
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    pub fn profile(&self) -> &ProfileTag {
        &self.profile
    }

    pub fn load_mode(&self) -> LoadMode {
        self.load_mode
    }

    pub fn wiring(&self) -> &[WiringAction] {
        &self.wiring
    }

    pub fn provides(&self, key: &TypeKey) -> bool {
        self.provisions.iter().any(|p| p.key == *key)
    }
}

impl std::fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("type", &self.key.name())
            .field(
                "provides",
                &self.provisions.iter().map(|p| p.key.name()).collect::<Vec<_>>(),
            )
            .field("profile", &self.profile)
            .field("wiring", &self.wiring)
            .field("load_mode", &self.load_mode)
            .finish()
    }
}

/// Builder for registering an instance of `T` together with its wiring.
///
/// # Example
/// ```
/// use beanwire::prelude::*;
/// use std::sync::{Arc, OnceLock};
///
/// trait Repository: Send + Sync {}
///
/// struct PgRepository;
/// impl Repository for PgRepository {}
///
/// #[derive(Default)]
/// struct UserService {
///     repository: OnceLock<Arc<dyn Repository>>,
/// }
///
/// let repository = BeanBuilder::new(PgRepository)
///     .provides::<dyn Repository>(|r| r as Arc<dyn Repository>)
///     .profile("production");
///
/// let service = BeanBuilder::new(UserService::default())
///     .wire(
///         "set_repository",
///         [ParameterSpec::of::<dyn Repository>()],
///         |service, _engine, args| {
///             let _ = service.repository.set(args.get::<dyn Repository>(0)?);
///             Ok(())
///         },
///     )
///     .queued();
/// # let _ = (repository.build(), service.build());
/// ```
pub struct BeanBuilder<T> {
    instance: Arc<T>,
    provisions: Vec<Provision>,
    profile: ProfileTag,
    wiring: Vec<WiringAction>,
    load_mode: LoadMode,
}

impl<T: Send + Sync + 'static> BeanBuilder<T> {
    pub fn new(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc(instance: Arc<T>) -> Self {
        Self {
            instance,
            provisions: vec![Provision::identity::<T>()],
            profile: ProfileTag::default(),
            wiring: Vec::new(),
            load_mode: LoadMode::default(),
        }
    }

    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }

    /// Declare that this bean satisfies requirements for `R`, usually a trait object.
    pub fn provides<R>(mut self, cast: impl Fn(Arc<T>) -> Arc<R> + Send + Sync + 'static) -> Self
    where
        R: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<R>();
        if !self.provisions.iter().any(|p| p.key == key) {
            self.provisions.push(Provision::new::<T, R, _>(cast));
        }
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile.own = Some(profile.into());
        self
    }

    /// Profile declared on the nearest supertype that carries one.
    pub fn inherits_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile.inherited = Some(profile.into());
        self
    }

    pub fn profile_tag(mut self, tag: ProfileTag) -> Self {
        self.profile = tag;
        self
    }

    /// Add a wiring action bound to this bean's instance.
    pub fn wire<F>(
        mut self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = ParameterSpec>,
        action: F,
    ) -> Self
    where
        F: Fn(&T, &BeanEngine, &Args) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let bean = Arc::clone(&self.instance);
        self.wiring.push(WiringAction::new(name, params, move |engine, args| {
            action(&bean, engine, args)
        }));
        self
    }

    pub fn load_mode(mut self, mode: LoadMode) -> Self {
        self.load_mode = mode;
        self
    }

    pub fn queued(self) -> Self {
        self.load_mode(LoadMode::Queued)
    }

    pub fn preloaded(self) -> Self {
        self.load_mode(LoadMode::Preloaded)
    }

    pub fn build(self) -> BeanDefinition {
        BeanDefinition {
            key: TypeKey::of::<T>(),
            instance: self.instance,
            provisions: self.provisions,
            profile: self.profile,
            wiring: self.wiring,
            load_mode: self.load_mode,
        }
    }
}

impl<T: Send + Sync + 'static> From<BeanBuilder<T>> for BeanDefinition {
    fn from(builder: BeanBuilder<T>) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    struct Square;

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    #[test]
    fn test_builder_records_provisions() {
        let definition = BeanBuilder::new(Square)
            .provides::<dyn Shape>(|s| s as Arc<dyn Shape>)
            .provides::<dyn Shape>(|s| s as Arc<dyn Shape>)
            .build();

        assert_eq!(definition.type_key(), TypeKey::of::<Square>());
        assert_eq!(definition.provisions.len(), 2);
        assert!(definition.provides(&TypeKey::of::<Square>()));
        assert!(definition.provides(&TypeKey::of::<dyn Shape>()));
        assert_eq!(definition.load_mode(), LoadMode::OnDemand);
    }

    #[test]
    fn test_provision_casts_to_trait_object() {
        let definition = BeanBuilder::new(Square)
            .provides::<dyn Shape>(|s| s as Arc<dyn Shape>)
            .build();
        let provision = &definition.provisions[1];

        let view = provision.cast(Arc::clone(&definition.instance)).unwrap();
        let shape = view.downcast_ref::<Arc<dyn Shape>>().unwrap();
        assert_eq!(shape.sides(), 4);
    }

    #[test]
    fn test_provision_rejects_foreign_instance() {
        let provision = Provision::identity::<Square>();
        let other: Instance = Arc::new(5_u8);
        assert!(matches!(
            provision.cast(other),
            Err(BeansError::DowncastFailed { .. })
        ));
    }

    #[test]
    fn test_profile_lookup() {
        let tag = ProfileTag {
            own: None,
            inherited: Some("production".into()),
        };
        assert_eq!(tag.effective(ProfileLookup::Inherited), Some("production"));
        assert_eq!(tag.effective(ProfileLookup::Exact), None);

        let tag = ProfileTag {
            own: Some("dev".into()),
            inherited: Some("production".into()),
        };
        assert_eq!(tag.effective(ProfileLookup::Inherited), Some("dev"));
        assert_eq!(tag.effective(ProfileLookup::Exact), Some("dev"));
    }
}
