//! Bean discovery seams
//!
//! A [`Module`] registers a fixed group of beans explicitly. A [`Catalog`] plays
//! the part of a scanner: it holds candidate bean classes with their tags and
//! profile metadata, and installs the ones that are eligible for the engine's
//! active profile and the catalog's active tags.

mod catalog;

pub use catalog::{BeanClass, Catalog};

use crate::di::BeanEngine;
use crate::error::Result;

/// Trait for groups of beans registered together
///
/// # Example
/// ```
/// use beanwire::prelude::*;
///
/// struct Cache;
/// struct Metrics;
///
/// struct InfraModule;
///
/// impl Module for InfraModule {
///     fn register(engine: &BeanEngine) -> Result<()> {
///         engine.add(BeanBuilder::new(Cache).queued())?;
///         engine.add(BeanBuilder::new(Metrics))?;
///         Ok(())
///     }
/// }
///
/// let engine = BeanEngine::builder().module::<InfraModule>().build()?;
/// assert!(engine.contains::<Metrics>());
/// # Ok::<(), beanwire::BeansError>(())
/// ```
pub trait Module {
    /// Register all beans of this module
    fn register(engine: &BeanEngine) -> Result<()>;
}
