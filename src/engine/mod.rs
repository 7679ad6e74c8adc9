//! The construction policy engine.
//!
//! A [`SingletonEngine`] owns a registry of declared types. Types are declared
//! with [`SingletonEngine::declare`], turned into singletons with
//! [`SingletonEngine::wrap_type`], and instantiated with
//! [`SingletonEngine::construct`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::descriptors::{TypeInfo, TypeRef};
use crate::internal::sync::{read, RwLock};
use crate::observer::{ConstructionObserver, Observers};
use crate::policy::ArgumentMismatch;

mod construction;
mod declaration;

pub use declaration::{TypeSpec, WrapOptions};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an engine; descriptors remember which engine declared them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(u64);

impl EngineId {
    fn next() -> Self {
        EngineId(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Singleton construction engine.
///
/// Cheap to clone; clones share the same registry, configuration and
/// observers, so a step closure can capture an engine clone and construct
/// other types from inside it.
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::{Arity, InheritancePolicy, SingletonEngine, SingletonError, TypeSpec};
/// use std::sync::Arc;
///
/// let engine = SingletonEngine::new();
/// let counter = engine
///     .define_singleton(
///         TypeSpec::new("Counter").init(Arity::Positional(1), |ctx, args| {
///             ctx.set("value", args.int(0)?);
///             Ok(())
///         }),
///         InheritancePolicy::NonDerivable,
///     )
///     .unwrap();
///
/// let first = engine.construct(&counter, [0]).unwrap();
/// assert_eq!(first.get_int("value"), Some(0));
///
/// let err = engine.construct(&counter, [5]).unwrap_err();
/// assert!(matches!(err, SingletonError::StaleArguments { .. }));
///
/// let again = engine.construct(&counter, [0]).unwrap();
/// assert!(Arc::ptr_eq(&first, &again));
/// ```
#[derive(Clone)]
pub struct SingletonEngine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    id: EngineId,
    config: EngineConfig,
    observers: Observers,
    /// Latest declaration under each name
    types: RwLock<HashMap<String, TypeRef>>,
}

impl SingletonEngine {
    /// An engine with the default configuration and no observers.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    #[inline]
    pub(crate) fn inner(&self) -> &EngineInner {
        &self.inner
    }

    pub fn id(&self) -> EngineId {
        self.inner.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The most recent declaration published under `name`.
    ///
    /// Wrapping keeps the base's name, so after `wrap_type` the lookup
    /// returns the wrapped descriptor.
    pub fn lookup_type(&self, name: &str) -> Option<TypeRef> {
        read(&self.inner.types).get(name).cloned()
    }

    /// Snapshots of every type currently registered by name, sorted by name.
    pub fn type_descriptors(&self) -> Vec<TypeInfo> {
        let mut infos: Vec<TypeInfo> = read(&self.inner.types).values().map(|t| t.info()).collect();
        infos.sort_by(|a, b| a.type_name().cmp(b.type_name()));
        infos
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Singleton Engine Debug ===\n");
        s.push_str(&format!(
            "Config: mismatch={}, warn_on_derivable={}, max_depth={}\n",
            self.inner.config.argument_mismatch,
            self.inner.config.warn_on_derivable,
            self.inner.config.max_construction_depth
        ));
        s.push_str("Types:\n");
        for info in self.type_descriptors() {
            let policy = info.policy.map_or("-", |p| p.name());
            s.push_str(&format!(
                "  {}#{}: policy={}, wrapped={}, singleton={}, populated={}, bases=[{}]\n",
                info.type_name(),
                info.key.id(),
                policy,
                info.wrapped,
                info.is_singleton,
                info.is_populated,
                info.base_names.join(", ")
            ));
        }
        s
    }
}

impl Default for SingletonEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SingletonEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonEngine")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("types", &read(&self.inner.types).len())
            .finish()
    }
}

/// Builder for [`SingletonEngine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    observers: Observers,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            observers: Observers::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default mismatch mode for types wrapped without an explicit one.
    pub fn argument_mismatch(mut self, mode: ArgumentMismatch) -> Self {
        self.config.argument_mismatch = mode;
        self
    }

    pub fn add_observer(mut self, observer: Arc<dyn ConstructionObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn build(self) -> SingletonEngine {
        SingletonEngine {
            inner: Arc::new(EngineInner {
                id: EngineId::next(),
                config: self.config,
                observers: self.observers,
                types: RwLock::new(HashMap::new()),
            }),
        }
    }
}
