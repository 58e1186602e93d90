use super::{Instance, TypeKey};
use crate::di::BeanEngine;
use crate::error::{BeansError, Result};
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

type InvokeFn = Box<dyn Fn(&BeanEngine, &Args) -> anyhow::Result<()> + Send + Sync>;

/// Requirement for one argument of a [`WiringAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    pub required: TypeKey,
    /// Accept a registered bean that has not finished loading.
    pub allow_raw_bean: bool,
    /// Resolve to nothing instead of failing when no bean satisfies the type.
    pub allow_null: bool,
}

impl ParameterSpec {
    pub fn of<R: ?Sized + 'static>() -> Self {
        Self {
            required: TypeKey::of::<R>(),
            allow_raw_bean: false,
            allow_null: false,
        }
    }

    pub fn raw(mut self) -> Self {
        self.allow_raw_bean = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.allow_null = true;
        self
    }
}

/// One unit of injection applied to a bean: a callback bound to the bean instance
/// plus the ordered parameter requirements it needs resolved before it runs.
pub struct WiringAction {
    name: String,
    params: Vec<ParameterSpec>,
    invoke: InvokeFn,
}

impl WiringAction {
    pub fn new<F>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = ParameterSpec>,
        invoke: F,
    ) -> Self
    where
        F: Fn(&BeanEngine, &Args) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
            invoke: Box::new(invoke),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub(crate) fn invoke(&self, engine: &BeanEngine, args: &Args) -> anyhow::Result<()> {
        (self.invoke)(engine, args)
    }
}

impl fmt::Debug for WiringAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WiringAction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Resolved arguments handed to a wiring action, in parameter order.
///
/// Each slot holds the bean viewed as the type its [`ParameterSpec`] asked for, or
/// nothing when a nullable parameter found no candidate.
pub struct Args {
    values: Vec<Option<Instance>>,
}

impl Args {
    pub(crate) fn new(values: Vec<Option<Instance>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The argument at `index` as `Arc<R>`; fails if it resolved to nothing.
    pub fn get<R: ?Sized + 'static>(&self, index: usize) -> Result<Arc<R>> {
        self.get_opt::<R>(index)?
            .ok_or_else(|| BeansError::MissingArgument {
                index,
                type_name: type_name::<R>().to_string(),
            })
    }

    /// The argument at `index`, or `None` for a nullable parameter left empty.
    pub fn get_opt<R: ?Sized + 'static>(&self, index: usize) -> Result<Option<Arc<R>>> {
        let slot = self
            .values
            .get(index)
            .ok_or_else(|| BeansError::MissingArgument {
                index,
                type_name: type_name::<R>().to_string(),
            })?;

        match slot {
            None => Ok(None),
            Some(value) => value
                .downcast_ref::<Arc<R>>()
                .cloned()
                .map(Some)
                .ok_or_else(|| BeansError::downcast_failed(type_name::<R>())),
        }
    }
}
