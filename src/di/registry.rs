use crate::bean::{BeanDefinition, Instance, LoadMode, ProfileTag, Provision, TypeKey, WiringAction};
use crate::config::{DuplicateBeanPolicy, ProfileLookup};
use crate::error::{BeansError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Registry entry for one concrete bean type.
struct BeanRecord {
    key: TypeKey,
    /// Registration order; also tells a re-added bean apart from the one it replaced.
    seq: u64,
    instance: Instance,
    provisions: Vec<Provision>,
    profile: ProfileTag,
    wiring: Arc<[WiringAction]>,
    loaded: bool,
}

/// Snapshot of a registered bean, as returned by [`Registry::beans`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanInfo {
    pub key: TypeKey,
    pub loaded: bool,
    pub profile: ProfileTag,
}

/// A registered bean that satisfies some required type.
#[derive(Clone)]
pub(crate) struct Candidate {
    pub(crate) key: TypeKey,
    pub(crate) loaded: bool,
    pub(crate) profile: Option<String>,
    instance: Instance,
    provision: Provision,
}

impl Candidate {
    /// The candidate viewed as the required type.
    pub(crate) fn view(&self) -> Result<Instance> {
        self.provision.cast(Arc::clone(&self.instance))
    }
}

/// What the engine needs to run a bean's wiring.
pub(crate) struct LoadPlan {
    pub(crate) key: TypeKey,
    pub(crate) seq: u64,
    pub(crate) loaded: bool,
    pub(crate) wiring: Arc<[WiringAction]>,
}

/// Beans by concrete type, plus the queue of beans waiting for the next batch load.
///
/// At most one instance per concrete type is stored. Every queued type has an
/// unloaded record; loading or removing a bean takes it off the queue.
pub struct Registry {
    beans: DashMap<TypeId, BeanRecord>,
    pending: Mutex<Vec<TypeKey>>,
    next_seq: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            beans: DashMap::new(),
            pending: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a bean. Returns `false` when a duplicate was quietly ignored.
    pub fn add(&self, definition: BeanDefinition, policy: DuplicateBeanPolicy) -> Result<bool> {
        let key = definition.key;
        match self.beans.entry(key.id()) {
            Entry::Occupied(_) => match policy {
                DuplicateBeanPolicy::Quiet => {
                    tracing::warn!("Ignoring duplicate bean: {}", key);
                    Ok(false)
                }
                DuplicateBeanPolicy::Exception => Err(BeansError::DuplicateBean {
                    type_name: key.name().to_string(),
                }),
            },
            Entry::Vacant(slot) => {
                let loaded = definition.load_mode == LoadMode::Preloaded;
                slot.insert(BeanRecord {
                    key,
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    instance: definition.instance,
                    provisions: definition.provisions,
                    profile: definition.profile,
                    wiring: definition.wiring.into(),
                    loaded,
                });
                if definition.load_mode == LoadMode::Queued {
                    self.pending().push(key);
                }
                tracing::debug!(
                    "Registered bean: {} ({:?})",
                    key,
                    definition.load_mode
                );
                Ok(true)
            }
        }
    }

    /// Remove the bean registered under `key`, from the registry and the load queue.
    pub fn remove(&self, key: &TypeKey) -> bool {
        let removed = self.beans.remove(&key.id()).is_some();
        self.pending().retain(|queued| queued != key);
        if removed {
            tracing::debug!("Removed bean: {}", key);
        }
        removed
    }

    /// Remove `bean` only if it is the exact instance registered for its type.
    pub fn remove_instance<T: Send + Sync + 'static>(&self, bean: &Arc<T>) -> bool {
        let key = TypeKey::of::<T>();
        let removed = self
            .beans
            .remove_if(&key.id(), |_, record| same_instance(&record.instance, bean))
            .is_some();
        if removed {
            self.pending().retain(|queued| *queued != key);
            tracing::debug!("Removed bean: {}", key);
        }
        removed
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.beans.contains_key(&key.id())
    }

    pub fn contains_instance<T: Send + Sync + 'static>(&self, bean: &Arc<T>) -> bool {
        self.beans
            .get(&TypeId::of::<T>())
            .is_some_and(|record| same_instance(&record.instance, bean))
    }

    pub fn is_loaded(&self, key: &TypeKey) -> bool {
        self.beans.get(&key.id()).is_some_and(|record| record.loaded)
    }

    /// Loaded check that also requires `bean` to be the registered instance, so a
    /// bean replaced under the same type is never mistaken for its successor.
    pub fn is_loaded_instance<T: Send + Sync + 'static>(&self, bean: &Arc<T>) -> bool {
        self.beans
            .get(&TypeId::of::<T>())
            .is_some_and(|record| record.loaded && same_instance(&record.instance, bean))
    }

    /// The registered instance of `T`, loaded or not.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let instance = Arc::clone(&self.beans.get(&TypeId::of::<T>())?.instance);
        instance.downcast::<T>().ok()
    }

    /// The registered instance of `T`, only once it has finished loading.
    pub fn get_loaded<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let instance = {
            let record = self.beans.get(&TypeId::of::<T>())?;
            if !record.loaded {
                return None;
            }
            Arc::clone(&record.instance)
        };
        instance.downcast::<T>().ok()
    }

    /// All registered beans in registration order.
    pub fn beans(&self) -> Vec<BeanInfo> {
        let mut records: Vec<(u64, BeanInfo)> = self
            .beans
            .iter()
            .map(|record| {
                (
                    record.seq,
                    BeanInfo {
                        key: record.key,
                        loaded: record.loaded,
                        profile: record.profile.clone(),
                    },
                )
            })
            .collect();
        records.sort_by_key(|(seq, _)| *seq);
        records.into_iter().map(|(_, info)| info).collect()
    }

    /// Types queued for the next batch load, in queue order.
    pub fn queued(&self) -> Vec<TypeKey> {
        self.pending().clone()
    }

    pub fn len(&self) -> usize {
        self.beans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }

    /// Every bean that can stand in for `required`, in registration order.
    pub(crate) fn candidates(&self, required: &TypeKey, lookup: ProfileLookup) -> Vec<Candidate> {
        let mut found: Vec<(u64, Candidate)> = self
            .beans
            .iter()
            .filter_map(|record| {
                let provision = record.provisions.iter().find(|p| p.key == *required)?;
                Some((
                    record.seq,
                    Candidate {
                        key: record.key,
                        loaded: record.loaded,
                        profile: record.profile.effective(lookup).map(str::to_string),
                        instance: Arc::clone(&record.instance),
                        provision: provision.clone(),
                    },
                ))
            })
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, candidate)| candidate).collect()
    }

    pub(crate) fn load_plan(&self, key: &TypeKey) -> Option<LoadPlan> {
        self.beans.get(&key.id()).map(|record| LoadPlan {
            key: record.key,
            seq: record.seq,
            loaded: record.loaded,
            wiring: Arc::clone(&record.wiring),
        })
    }

    /// Flip the record to loaded, unless it was removed or replaced meanwhile.
    pub(crate) fn mark_loaded(&self, key: &TypeKey, seq: u64) -> bool {
        let marked = match self.beans.get_mut(&key.id()) {
            Some(mut record) if record.seq == seq => {
                record.loaded = true;
                true
            }
            _ => false,
        };
        if marked {
            self.pending().retain(|queued| queued != key);
        }
        marked
    }

    /// The first queued type, if any.
    pub(crate) fn next_queued(&self) -> Option<TypeKey> {
        self.pending().first().copied()
    }

    pub(crate) fn dequeue(&self, key: &TypeKey) {
        self.pending().retain(|queued| queued != key);
    }

    /// Whether `instance` is the exact object registered under `key`.
    pub(crate) fn holds(&self, key: &TypeKey, instance: &Instance) -> bool {
        self.beans
            .get(&key.id())
            .is_some_and(|record| Arc::ptr_eq(&record.instance, instance))
    }

    fn pending(&self) -> MutexGuard<'_, Vec<TypeKey>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn same_instance<T>(stored: &Instance, bean: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(stored), Arc::as_ptr(bean))
}
