//! # ferrous-singleton
//!
//! Singleton construction policies for declared types, with per-type instance
//! caches and inheritable derivation rules.
//!
//! ## Features
//!
//! - **At most one instance**: a wrapped type hands out the same instance on
//!   every `construct` call
//! - **Inheritance policies**: forbid derivation, keep derived types
//!   singletons, or turn them back into ordinary types
//! - **Stale argument detection**: a populated singleton requested with
//!   different arguments fails (or warns, in permissive mode)
//! - **Split construction**: allocation and initialization are separate
//!   steps with independent arities, and derived types may override either
//! - **Thread-safe**: racing first constructions commit exactly one instance
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_singleton::{Arity, InheritancePolicy, SingletonEngine, SingletonError, TypeSpec};
//! use std::sync::Arc;
//!
//! let engine = SingletonEngine::new();
//!
//! // Declare and wrap in one step
//! let settings = engine
//!     .define_singleton(
//!         TypeSpec::new("Settings").init(Arity::Positional(1), |ctx, args| {
//!             ctx.set("path", args.string(0)?);
//!             Ok(())
//!         }),
//!         InheritancePolicy::NonDerivable,
//!     )
//!     .unwrap();
//!
//! let a = engine.construct(&settings, ["/etc/app.toml"]).unwrap();
//! let b = engine.construct(&settings, ["/etc/app.toml"]).unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! assert_eq!(a.get_str("path").as_deref(), Some("/etc/app.toml"));
//!
//! // NonDerivable types cannot be used as bases
//! let err = engine.declare(TypeSpec::new("Derived").base(&settings)).unwrap_err();
//! assert_eq!(err.to_string(), "type 'Settings' is not an acceptable base type");
//! ```
//!
//! ## Inheritance Policies
//!
//! - **NonDerivable**: declaring a derived type fails with `InvalidBaseType`
//! - **SingletonChildren**: every derived type is a singleton with its own
//!   cache, distinct from the base's
//! - **NonSingletonChildren**: derived types construct a fresh instance on
//!   every call while the wrapped type stays a singleton
//!
//! ```rust
//! use ferrous_singleton::{InheritancePolicy, SingletonEngine, TypeSpec};
//! use std::sync::Arc;
//!
//! let engine = SingletonEngine::new();
//! let base = engine
//!     .define_singleton(TypeSpec::new("Base"), InheritancePolicy::NonSingletonChildren)
//!     .unwrap();
//! let child = engine.declare(TypeSpec::new("Child").base(&base)).unwrap();
//!
//! assert!(Arc::ptr_eq(&engine.construct(&base, ()).unwrap(), &engine.construct(&base, ()).unwrap()));
//! assert!(!Arc::ptr_eq(&engine.construct(&child, ()).unwrap(), &engine.construct(&child, ()).unwrap()));
//! ```

pub mod args;
pub mod cache;
pub mod config;
pub mod ctor;
pub mod descriptors;
pub mod engine;
pub mod error;
pub mod key;
pub mod object;
pub mod observer;
pub mod policy;

// Internal modules
mod internal;

pub use args::{ArgTuple, ArgValue, Arity};
pub use cache::{CacheState, InstanceCache};
pub use config::{ConfigProvider, ConfigSource, ConfigValue, EngineConfig, EnvironmentConfigSource};
#[cfg(feature = "config")]
pub use config::JsonConfigSource;
pub use ctor::{AllocContext, AllocFn, AllocStep, InitContext, InitFn, InitStep};
pub use descriptors::{TypeDescriptor, TypeInfo, TypeRef};
pub use engine::{EngineBuilder, EngineId, SingletonEngine, TypeSpec, WrapOptions};
pub use error::{SingletonError, SingletonResult};
pub use key::TypeKey;
pub use object::{Instance, ObjectRef};
pub use observer::{ConstructionObserver, ConstructionOutcome, LoggingObserver, MetricsObserver};
pub use policy::{ArgumentMismatch, InheritancePolicy};
