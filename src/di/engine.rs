use super::builder::EngineBuilder;
use super::registry::{BeanInfo, Candidate, LoadPlan, Registry};
use super::selection::{self, Draw};
use crate::bean::{Args, BeanDefinition, Instance, ParameterSpec, TypeKey, WiringAction};
use crate::config::{BatchStrategy, Settings};
use crate::error::{BeansError, Result, StalledBean};
use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Outcome of resolving one parameter during a fixed-point pass.
enum Slot {
    Ready(Option<Instance>),
    Wait,
}

/// Resolution engine: owns the registry and the live settings, and loads beans by
/// running their wiring actions against the best matching dependencies.
///
/// Resolution is synchronous and may reenter itself: choosing an unloaded
/// dependency loads it on the spot, and wiring actions receive `&BeanEngine` so
/// they can pull further beans on demand. Callers on several threads must
/// serialize access themselves.
///
/// # Example
/// ```
/// use beanwire::prelude::*;
/// use std::sync::{Arc, OnceLock};
///
/// struct Config;
///
/// #[derive(Default)]
/// struct Server {
///     config: OnceLock<Arc<Config>>,
/// }
///
/// let engine = BeanEngine::new();
/// engine.add(BeanBuilder::new(Config))?;
/// engine.add(
///     BeanBuilder::new(Server::default())
///         .wire("configure", [ParameterSpec::of::<Config>()], |server, _, args| {
///             let _ = server.config.set(args.get::<Config>(0)?);
///             Ok(())
///         })
///         .queued(),
/// )?;
///
/// engine.load_all()?;
/// assert!(engine.is_loaded::<Server>());
/// assert!(engine.is_loaded::<Config>());
/// # Ok::<(), beanwire::BeansError>(())
/// ```
pub struct BeanEngine {
    registry: Registry,
    settings: RwLock<Settings>,
    /// Types whose wiring is currently running, outermost first.
    loading: Mutex<Vec<TypeKey>>,
}

impl BeanEngine {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            registry: Registry::new(),
            settings: RwLock::new(settings),
            loading: Mutex::new(Vec::new()),
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A copy of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change settings in place. The change is committed only if `update` succeeds,
    /// and applies to every resolution that starts afterwards.
    pub fn configure<F, R>(&self, update: F) -> Result<R>
    where
        F: FnOnce(&mut Settings) -> Result<R>,
    {
        let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        let mut draft = settings.clone();
        let out = update(&mut draft)?;
        draft.validate()?;
        *settings = draft;
        Ok(out)
    }

    //----------registry----------//

    /// Register a bean, honouring the duplicate bean policy.
    ///
    /// Returns `false` when a duplicate was quietly ignored.
    pub fn add(&self, definition: impl Into<BeanDefinition>) -> Result<bool> {
        let policy = self.settings().duplicate_bean_policy();
        self.registry.add(definition.into(), policy)
    }

    /// Remove the bean registered for `T` from the registry and the load queue.
    pub fn remove<T: Send + Sync + 'static>(&self) -> bool {
        self.registry.remove(&TypeKey::of::<T>())
    }

    pub fn remove_instance<T: Send + Sync + 'static>(&self, bean: &Arc<T>) -> bool {
        self.registry.remove_instance(bean)
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.registry.contains(&TypeKey::of::<T>())
    }

    pub fn contains_instance<T: Send + Sync + 'static>(&self, bean: &Arc<T>) -> bool {
        self.registry.contains_instance(bean)
    }

    pub fn is_loaded<T: Send + Sync + 'static>(&self) -> bool {
        self.registry.is_loaded(&TypeKey::of::<T>())
    }

    pub fn is_loaded_instance<T: Send + Sync + 'static>(&self, bean: &Arc<T>) -> bool {
        self.registry.is_loaded_instance(bean)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.registry.get::<T>()
    }

    pub fn get_loaded<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.registry.get_loaded::<T>()
    }

    pub fn beans(&self) -> Vec<BeanInfo> {
        self.registry.beans()
    }

    pub fn pending(&self) -> Vec<TypeKey> {
        self.registry.queued()
    }

    //----------selection----------//

    /// Pick the best registered match for `required` under the current settings.
    ///
    /// The result is the bean viewed as `required`, erased as an `Arc<R>` inside
    /// `Arc<dyn Any>`. An unloaded match is loaded first unless `allow_raw_bean` is
    /// set; no match yields `None` when `allow_null` is set and
    /// [`BeansError::DependencyNotFound`] otherwise.
    pub fn select_best_match(
        &self,
        required: &TypeKey,
        allow_raw_bean: bool,
        allow_null: bool,
    ) -> Result<Option<Arc<dyn Any + Send + Sync>>> {
        let settings = self.settings();
        let candidates = self.registry.candidates(required, settings.profile_lookup());

        let Some(chosen) = selection::select(required, &candidates, &settings)? else {
            if allow_null {
                tracing::debug!("No bean for {}, resolving to nothing", required);
                return Ok(None);
            }
            return Err(BeansError::not_found(required.name()));
        };

        if !chosen.loaded && !allow_raw_bean {
            self.load_key(&chosen.key)?;
        }
        tracing::debug!("Resolved {} to {}", required, chosen.key);
        chosen.view().map(Some)
    }

    /// Typed [`select_best_match`](Self::select_best_match) that fails when nothing matches.
    pub fn best_match<R: ?Sized + 'static>(&self, allow_raw_bean: bool) -> Result<Arc<R>> {
        self.try_best_match::<R>(allow_raw_bean)?
            .ok_or_else(|| BeansError::not_found(std::any::type_name::<R>()))
    }

    /// Typed [`select_best_match`](Self::select_best_match) that yields `None` when
    /// nothing matches.
    pub fn try_best_match<R: ?Sized + 'static>(&self, allow_raw_bean: bool) -> Result<Option<Arc<R>>> {
        let required = TypeKey::of::<R>();
        let Some(found) = self.select_best_match(&required, allow_raw_bean, true)? else {
            return Ok(None);
        };
        found
            .downcast_ref::<Arc<R>>()
            .cloned()
            .map(Some)
            .ok_or_else(|| BeansError::downcast_failed(required.name()))
    }

    //----------loading----------//

    /// Register `definition` if its instance is not registered yet, then load it.
    pub fn load_bean(&self, definition: impl Into<BeanDefinition>) -> Result<()> {
        let definition = definition.into();
        let key = definition.key;
        if !self.registry.holds(&key, &definition.instance) {
            self.add(definition)?;
        }
        self.load_key(&key)
    }

    /// Load the registered bean of type `T`.
    pub fn load<T: Send + Sync + 'static>(&self) -> Result<()> {
        self.load_key(&TypeKey::of::<T>())
    }

    /// Load every queued bean with the configured [`BatchStrategy`].
    pub fn load_all(&self) -> Result<()> {
        match self.settings().batch_strategy() {
            BatchStrategy::Recursive => self.load_all_recursive(),
            BatchStrategy::FixedPoint => self.load_all_fixed_point(),
        }
    }

    /// Load queued beans one by one, depth first.
    ///
    /// Stops at the first failure: beans loaded so far stay loaded, the rest stay
    /// queued.
    pub fn load_all_recursive(&self) -> Result<()> {
        tracing::info!("Loading {} queued beans", self.registry.queued().len());
        let loaded = self.drain_queue()?;
        tracing::info!("Queued beans loaded ({} beans)", loaded);
        Ok(())
    }

    /// Load queued beans until the queue is empty. Returns how many of them this
    /// call actually wired.
    fn drain_queue(&self) -> Result<usize> {
        let mut loaded = 0;
        while let Some(key) = self.registry.next_queued() {
            let fresh = !self.registry.is_loaded(&key);
            self.load_key(&key)?;
            self.registry.dequeue(&key);
            if fresh {
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Load queued beans by repeated passes over their outstanding wiring actions.
    ///
    /// An action runs once every parameter resolves. A non-raw parameter whose pick
    /// is another bean of the batch waits until that bean is loaded; a pick outside
    /// the batch is loaded on the spot. A bean is loaded when its last action has
    /// run. A pass that completes no bean ends the batch with
    /// [`BeansError::Stalled`], leaving satisfiable beans loaded.
    pub fn load_all_fixed_point(&self) -> Result<()> {
        loop {
            let batch: Vec<(LoadPlan, Vec<usize>)> = self
                .registry
                .queued()
                .iter()
                .filter_map(|key| {
                    let plan = self.registry.load_plan(key);
                    if plan.as_ref().is_none_or(|p| p.loaded) {
                        self.registry.dequeue(key);
                    }
                    plan.filter(|p| !p.loaded)
                })
                .map(|plan| {
                    let actions = (0..plan.wiring.len()).collect();
                    (plan, actions)
                })
                .collect();

            if batch.is_empty() {
                return Ok(());
            }
            self.run_fixed_point(batch)?;
        }
    }

    fn run_fixed_point(&self, mut batch: Vec<(LoadPlan, Vec<usize>)>) -> Result<()> {
        tracing::info!("Wiring {} queued beans to a fixed point", batch.len());

        let mut pass = 0;
        while !batch.is_empty() {
            pass += 1;
            let mut completed = 0;
            let in_batch: HashSet<TypeKey> = batch.iter().map(|(plan, _)| plan.key).collect();

            for (plan, outstanding) in batch.iter_mut() {
                if self.registry.is_loaded(&plan.key) {
                    // Loaded on demand earlier in this batch.
                    outstanding.clear();
                    completed += 1;
                    continue;
                }

                let mut waiting = Vec::new();
                for &index in outstanding.iter() {
                    let action = &plan.wiring[index];
                    match self.resolve_ready(action, &in_batch)? {
                        Some(args) => self.invoke(&plan.key, action, &args)?,
                        None => waiting.push(index),
                    }
                }
                *outstanding = waiting;

                if outstanding.is_empty() {
                    self.registry.mark_loaded(&plan.key, plan.seq);
                    tracing::debug!("Loaded bean: {}", plan.key);
                    completed += 1;
                }
            }

            batch.retain(|(_, outstanding)| !outstanding.is_empty());
            tracing::debug!(
                "Fixed-point pass {}: {} beans completed, {} remaining",
                pass,
                completed,
                batch.len()
            );

            if completed == 0 && !batch.is_empty() {
                let remaining: Vec<StalledBean> = batch
                    .iter()
                    .map(|(plan, outstanding)| StalledBean {
                        bean: plan.key.name().to_string(),
                        actions: outstanding
                            .iter()
                            .map(|&i| plan.wiring[i].name().to_string())
                            .collect(),
                    })
                    .collect();
                tracing::warn!("Wiring stalled with {} beans left", remaining.len());
                return Err(BeansError::Stalled { remaining });
            }
        }

        tracing::info!("Fixed-point wiring complete after {} passes", pass);
        Ok(())
    }

    fn load_key(&self, key: &TypeKey) -> Result<()> {
        let plan = self
            .registry
            .load_plan(key)
            .ok_or_else(|| BeansError::not_found(key.name()))?;
        if plan.loaded {
            return Ok(());
        }

        self.enter(key)?;
        let outcome = self.run_wiring(&plan);
        self.leave(key);
        outcome?;

        self.registry.mark_loaded(&plan.key, plan.seq);
        tracing::debug!("Loaded bean: {}", key);
        Ok(())
    }

    fn run_wiring(&self, plan: &LoadPlan) -> Result<()> {
        for action in plan.wiring.iter() {
            let values = action
                .params()
                .iter()
                .map(|spec| self.resolve_param(spec))
                .collect::<Result<Vec<_>>>()?;
            self.invoke(&plan.key, action, &Args::new(values))?;
        }
        Ok(())
    }

    fn invoke(&self, bean: &TypeKey, action: &WiringAction, args: &Args) -> Result<()> {
        tracing::debug!("Running wiring action {} on {}", action.name(), bean);
        action.invoke(self, args).map_err(|e| {
            tracing::error!("Wiring action {} failed for {}: {}", action.name(), bean, e);
            BeansError::wiring_failed(bean.name(), action.name(), e)
        })
    }

    fn resolve_param(&self, spec: &ParameterSpec) -> Result<Option<Instance>> {
        self.select_best_match(&spec.required, spec.allow_raw_bean, spec.allow_null)
    }

    /// Resolve every parameter of `action`, or `None` if some parameter has to
    /// wait for a bean of the current batch.
    fn resolve_ready(&self, action: &WiringAction, batch: &HashSet<TypeKey>) -> Result<Option<Args>> {
        let mut values = Vec::with_capacity(action.params().len());
        for spec in action.params() {
            match self.resolve_in_batch(spec, batch)? {
                Slot::Ready(value) => values.push(value),
                Slot::Wait => return Ok(None),
            }
        }
        Ok(Some(Args::new(values)))
    }

    fn resolve_in_batch(&self, spec: &ParameterSpec, batch: &HashSet<TypeKey>) -> Result<Slot> {
        let settings = self.settings();
        let candidates = self
            .registry
            .candidates(&spec.required, settings.profile_lookup());

        if candidates.is_empty() {
            return Ok(if spec.allow_null {
                Slot::Ready(None)
            } else {
                Slot::Wait
            });
        }

        let (pool, how) = selection::narrow(&spec.required, &candidates, &settings)?;
        let waiting = |c: &&Candidate| !c.loaded && batch.contains(&c.key);

        // A random draw stays uniform only once no candidate is still being wired.
        if !spec.allow_raw_bean && how == Draw::Random && pool.iter().any(waiting) {
            return Ok(Slot::Wait);
        }
        let Some(chosen) = selection::draw(&pool, how) else {
            return Ok(Slot::Wait);
        };

        if !chosen.loaded && !spec.allow_raw_bean {
            if waiting(&chosen) {
                return Ok(Slot::Wait);
            }
            self.load_key(&chosen.key)?;
        }
        Ok(Slot::Ready(Some(chosen.view()?)))
    }

    fn enter(&self, key: &TypeKey) -> Result<()> {
        let mut loading = self.loading();
        if let Some(start) = loading.iter().position(|k| k == key) {
            let cycle = loading[start..]
                .iter()
                .chain(std::iter::once(key))
                .map(TypeKey::name)
                .collect::<Vec<_>>()
                .join(" -> ");
            tracing::error!("Circular dependency detected: {}", cycle);
            return Err(BeansError::CircularDependency { cycle });
        }
        loading.push(*key);
        Ok(())
    }

    fn leave(&self, key: &TypeKey) {
        let mut loading = self.loading();
        if let Some(index) = loading.iter().rposition(|k| k == key) {
            loading.remove(index);
        }
    }

    fn loading(&self) -> MutexGuard<'_, Vec<TypeKey>> {
        self.loading.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BeanEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::BeanBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        wired: AtomicUsize,
    }

    struct Leaf;

    fn counting() -> BeanBuilder<Counter> {
        BeanBuilder::new(Counter::default()).wire(
            "count",
            [ParameterSpec::of::<Leaf>()],
            |counter, _, _| {
                counter.wired.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
    }

    #[test]
    fn test_load_bean_registers_and_loads_dependencies() {
        let engine = BeanEngine::new();
        engine.add(BeanBuilder::new(Leaf)).unwrap();

        let bean = counting();
        let counter = Arc::clone(bean.instance());
        engine.load_bean(bean).unwrap();

        assert!(engine.is_loaded_instance(&counter));
        assert!(engine.is_loaded::<Leaf>());
        assert_eq!(counter.wired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_is_idempotent() {
        let engine = BeanEngine::new();
        engine.add(BeanBuilder::new(Leaf)).unwrap();
        engine.add(counting()).unwrap();

        engine.load::<Counter>().unwrap();
        engine.load::<Counter>().unwrap();

        let counter = engine.get::<Counter>().unwrap();
        assert_eq!(counter.wired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_unknown_type_fails() {
        let engine = BeanEngine::new();
        assert!(matches!(
            engine.load::<Leaf>(),
            Err(BeansError::DependencyNotFound { .. })
        ));
    }

    #[test]
    fn test_failed_wiring_leaves_bean_unloaded() {
        let engine = BeanEngine::new();
        engine.add(counting()).unwrap();

        assert!(matches!(
            engine.load::<Counter>(),
            Err(BeansError::DependencyNotFound { .. })
        ));
        assert!(!engine.is_loaded::<Counter>());
        assert!(engine.loading().is_empty());

        engine.add(BeanBuilder::new(Leaf)).unwrap();
        engine.load::<Counter>().unwrap();
        assert!(engine.is_loaded::<Counter>());
    }

    #[test]
    fn test_drain_queue_counts_only_wired_beans() {
        let engine = BeanEngine::new();
        engine.add(BeanBuilder::new(Leaf).queued()).unwrap();
        engine.add(counting().queued()).unwrap();

        assert_eq!(engine.drain_queue().unwrap(), 2);
        assert!(engine.pending().is_empty());
        assert_eq!(engine.drain_queue().unwrap(), 0);

        engine.remove::<Counter>();
        engine.add(counting().queued()).unwrap();
        assert_eq!(engine.drain_queue().unwrap(), 1);
        assert!(engine.is_loaded::<Leaf>());
    }

    #[test]
    fn test_configure_rolls_back_on_error() {
        let engine = BeanEngine::new();
        let result = engine.configure(|s| {
            s.set_batch_strategy(BatchStrategy::FixedPoint);
            s.set_profile("")
        });
        assert!(result.is_err());
        assert_eq!(engine.settings().batch_strategy(), BatchStrategy::Recursive);
    }

    #[test]
    fn test_best_match_typed() {
        let engine = BeanEngine::new();
        assert!(engine.try_best_match::<Leaf>(false).unwrap().is_none());
        assert!(engine.best_match::<Leaf>(false).is_err());

        engine.add(BeanBuilder::new(Leaf)).unwrap();
        assert!(!engine.is_loaded::<Leaf>());
        engine.best_match::<Leaf>(true).unwrap();
        assert!(!engine.is_loaded::<Leaf>());
        engine.best_match::<Leaf>(false).unwrap();
        assert!(engine.is_loaded::<Leaf>());
    }
}
