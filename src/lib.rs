//! # Beanwire
//!
//! A dependency resolution and bean lifecycle engine.
//!
//! Beans are registered with the types they can stand in for, an optional profile
//! tag and a list of wiring actions. The engine loads a bean by resolving every
//! wiring action's parameters against the registry, loading unloaded dependencies
//! on the way, and running the actions exactly once.
//!
//! ## Features
//!
//! - **Polymorphic matching**: a bean satisfies its own type and every trait object
//!   it declares with `provides`
//! - **Selection strategies**: first, random, or profile-tagged with fallbacks
//! - **Raw beans**: parameters may accept a bean that is not loaded yet, to break
//!   mutual dependencies
//! - **Cycle detection**: true cycles fail with the cycle path instead of overflowing
//! - **Batch loading**: depth-first, or by fixed-point passes with stall detection
//!
//! ## Quick Start
//!
//! ```rust
//! use beanwire::prelude::*;
//! use std::sync::{Arc, OnceLock};
//!
//! trait Mailer: Send + Sync {
//!     fn send(&self, to: &str) -> String;
//! }
//!
//! struct SmtpMailer;
//! impl Mailer for SmtpMailer {
//!     fn send(&self, to: &str) -> String {
//!         format!("smtp -> {to}")
//!     }
//! }
//!
//! struct LogMailer;
//! impl Mailer for LogMailer {
//!     fn send(&self, to: &str) -> String {
//!         format!("log -> {to}")
//!     }
//! }
//!
//! #[derive(Default)]
//! struct SignupService {
//!     mailer: OnceLock<Arc<dyn Mailer>>,
//! }
//!
//! let engine = BeanEngine::builder()
//!     .profile("production")?
//!     .bean(
//!         BeanBuilder::new(SmtpMailer)
//!             .provides::<dyn Mailer>(|m| m as Arc<dyn Mailer>)
//!             .profile("production"),
//!     )
//!     .bean(
//!         BeanBuilder::new(LogMailer)
//!             .provides::<dyn Mailer>(|m| m as Arc<dyn Mailer>)
//!             .profile("dev"),
//!     )
//!     .bean(
//!         BeanBuilder::new(SignupService::default())
//!             .wire("set_mailer", [ParameterSpec::of::<dyn Mailer>()], |service, _, args| {
//!                 let _ = service.mailer.set(args.get::<dyn Mailer>(0)?);
//!                 Ok(())
//!             })
//!             .queued(),
//!     )
//!     .build()?;
//!
//! engine.load_all()?;
//!
//! let service = engine.get_loaded::<SignupService>().unwrap();
//! assert_eq!(service.mailer.get().unwrap().send("ada"), "smtp -> ada");
//! # Ok::<(), beanwire::BeansError>(())
//! ```

pub mod bean;
pub mod config;
pub mod di;
pub mod error;
pub mod module;

// Re-export core types
pub use bean::{
    Args, BeanBuilder, BeanDefinition, LoadMode, ParameterSpec, ProfileTag, TypeKey, WiringAction,
};
pub use config::{
    BatchStrategy, DEFAULT_PROFILE, DuplicateBeanPolicy, FallbackStrategy, ProfileLookup,
    SelectionStrategy, Settings,
};
pub use di::{BeanEngine, BeanInfo, EngineBuilder, Registry};
pub use error::{BeansError, Result, StalledBean};
pub use module::{BeanClass, Catalog, Module};

/// Prelude module for convenient imports
///
/// ```
/// use beanwire::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bean::{
        Args, BeanBuilder, BeanDefinition, LoadMode, ParameterSpec, ProfileTag, TypeKey,
        WiringAction,
    };
    pub use crate::config::{
        BatchStrategy, DuplicateBeanPolicy, FallbackStrategy, ProfileLookup, SelectionStrategy,
        Settings,
    };
    pub use crate::di::{BeanEngine, BeanInfo, EngineBuilder, Registry};
    pub use crate::error::{BeansError, Result};
    pub use crate::module::{BeanClass, Catalog, Module};
}
