//! Bean descriptions handed to the engine: type identity, the types a bean can
//! stand in for, its profile tag and its wiring actions.

mod definition;
mod key;
mod wiring;

use std::any::Any;
use std::sync::Arc;

pub use definition::{BeanBuilder, BeanDefinition, LoadMode, ProfileTag};
pub use key::TypeKey;
pub use wiring::{Args, ParameterSpec, WiringAction};

pub(crate) use definition::Provision;

/// A bean instance with its concrete type erased.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;
