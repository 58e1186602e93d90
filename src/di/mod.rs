mod builder;
mod engine;
mod registry;
mod selection;

pub use builder::EngineBuilder;
pub use engine::BeanEngine;
pub use registry::{BeanInfo, Registry};
