//! Diagnostic observers for construction events.
//!
//! Observers are registered on the [`EngineBuilder`](crate::EngineBuilder)
//! and notified synchronously from the thread doing the work. When no
//! observer is registered the engine skips timing and notification entirely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::args::ArgTuple;
use crate::error::SingletonError;
use crate::key::TypeKey;
use crate::policy::InheritancePolicy;

/// How a successful `construct` call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructionOutcome {
    /// First construction of a singleton; the cache was populated
    Created,
    /// Served from the cache
    Cached,
    /// Plain construction of a type that bypasses caching
    Uncached,
    /// Lost a first-construction race; the winner's instance was returned
    RaceLost,
}

impl ConstructionOutcome {
    /// True when the instance returned was already cached.
    pub fn is_hit(&self) -> bool {
        matches!(self, ConstructionOutcome::Cached | ConstructionOutcome::RaceLost)
    }
}

/// Observer trait for engine events.
///
/// Keep implementations lightweight: every call happens on the construction
/// path.
///
/// # Examples
///
/// ```
/// use ferrous_singleton::{
///     ConstructionObserver, ConstructionOutcome, InheritancePolicy, SingletonEngine, TypeKey, TypeSpec,
/// };
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder {
///     events: Mutex<Vec<String>>,
/// }
///
/// impl ConstructionObserver for Recorder {
///     fn constructing(&self, key: &TypeKey) {
///         self.events.lock().unwrap().push(format!("start {}", key));
///     }
///
///     fn constructed(&self, key: &TypeKey, outcome: ConstructionOutcome, _duration: Duration) {
///         self.events.lock().unwrap().push(format!("{:?} {}", outcome, key));
///     }
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let engine = SingletonEngine::builder().add_observer(recorder.clone()).build();
/// let config = engine
///     .define_singleton(TypeSpec::new("Config"), InheritancePolicy::NonDerivable)
///     .unwrap();
///
/// engine.construct(&config, ()).unwrap();
/// engine.construct(&config, ()).unwrap();
///
/// let events = recorder.events.lock().unwrap();
/// assert_eq!(events[1], "Created Config");
/// assert_eq!(events[3], "Cached Config");
/// ```
pub trait ConstructionObserver: Send + Sync {
    /// A type was published by `declare` or `wrap_type`.
    fn type_declared(&self, _key: &TypeKey, _policy: Option<InheritancePolicy>, _is_singleton: bool) {}

    /// A `construct` call is starting.
    fn constructing(&self, key: &TypeKey);

    /// A `construct` call succeeded.
    fn constructed(&self, key: &TypeKey, outcome: ConstructionOutcome, duration: Duration);

    /// A populated singleton was requested with different arguments.
    ///
    /// `rejected` is true in strict mode, where the call fails.
    fn stale_arguments(&self, _key: &TypeKey, _stored: &ArgTuple, _requested: &ArgTuple, _rejected: bool) {}

    /// A `construct` call failed.
    fn construction_failed(&self, _key: &TypeKey, _error: &SingletonError) {}
}

/// Registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ConstructionObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn ConstructionObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn type_declared(&self, key: &TypeKey, policy: Option<InheritancePolicy>, is_singleton: bool) {
        for observer in &self.observers {
            observer.type_declared(key, policy, is_singleton);
        }
    }

    #[inline]
    pub(crate) fn constructing(&self, key: &TypeKey) {
        for observer in &self.observers {
            observer.constructing(key);
        }
    }

    #[inline]
    pub(crate) fn constructed(&self, key: &TypeKey, outcome: ConstructionOutcome, duration: Duration) {
        for observer in &self.observers {
            observer.constructed(key, outcome, duration);
        }
    }

    #[inline]
    pub(crate) fn stale_arguments(&self, key: &TypeKey, stored: &ArgTuple, requested: &ArgTuple, rejected: bool) {
        for observer in &self.observers {
            observer.stale_arguments(key, stored, requested, rejected);
        }
    }

    #[inline]
    pub(crate) fn construction_failed(&self, key: &TypeKey, error: &SingletonError) {
        for observer in &self.observers {
            observer.construction_failed(key, error);
        }
    }
}

/// Built-in observer that emits `tracing` events.
///
/// Declarations and construction starts go to `trace`, completions to
/// `debug`, stale arguments to `warn` and failures to `error`, all under the
/// `ferrous_singleton::observer` target.
///
/// # Examples
///
/// ```
/// use ferrous_singleton::{LoggingObserver, SingletonEngine};
/// use std::sync::Arc;
///
/// let engine = SingletonEngine::builder()
///     .add_observer(Arc::new(LoggingObserver::new()))
///     .build();
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            prefix: "[ferrous-singleton]".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionObserver for LoggingObserver {
    fn type_declared(&self, key: &TypeKey, policy: Option<InheritancePolicy>, is_singleton: bool) {
        tracing::trace!(
            target: "ferrous_singleton::observer",
            type_name = key.display_name(),
            policy = ?policy,
            is_singleton,
            "{} Declared: {}",
            self.prefix,
            key
        );
    }

    fn constructing(&self, key: &TypeKey) {
        tracing::trace!(
            target: "ferrous_singleton::observer",
            type_name = key.display_name(),
            "{} Constructing: {}",
            self.prefix,
            key
        );
    }

    fn constructed(&self, key: &TypeKey, outcome: ConstructionOutcome, duration: Duration) {
        tracing::debug!(
            target: "ferrous_singleton::observer",
            type_name = key.display_name(),
            outcome = ?outcome,
            elapsed = ?duration,
            "{} Constructed: {} ({:?}) in {:?}",
            self.prefix,
            key,
            outcome,
            duration
        );
    }

    fn stale_arguments(&self, key: &TypeKey, stored: &ArgTuple, requested: &ArgTuple, rejected: bool) {
        tracing::warn!(
            target: "ferrous_singleton::observer",
            type_name = key.display_name(),
            %stored,
            %requested,
            rejected,
            "{} Stale arguments for {}",
            self.prefix,
            key
        );
    }

    fn construction_failed(&self, key: &TypeKey, error: &SingletonError) {
        tracing::error!(
            target: "ferrous_singleton::observer",
            type_name = key.display_name(),
            %error,
            "{} Construction of {} failed",
            self.prefix,
            key
        );
    }
}

/// Observer that counts events with atomics.
///
/// # Examples
///
/// ```
/// use ferrous_singleton::{InheritancePolicy, MetricsObserver, SingletonEngine, TypeSpec};
/// use std::sync::Arc;
///
/// let metrics = Arc::new(MetricsObserver::new());
/// let engine = SingletonEngine::builder().add_observer(metrics.clone()).build();
/// let ty = engine
///     .define_singleton(TypeSpec::new("Pool"), InheritancePolicy::NonDerivable)
///     .unwrap();
///
/// for _ in 0..4 {
///     engine.construct(&ty, ()).unwrap();
/// }
///
/// assert_eq!(metrics.created_count(), 1);
/// assert_eq!(metrics.hit_count(), 3);
/// assert_eq!(metrics.hit_ratio(), Some(0.75));
/// ```
#[derive(Default)]
pub struct MetricsObserver {
    declared: AtomicU64,
    created: AtomicU64,
    hits: AtomicU64,
    uncached: AtomicU64,
    races_lost: AtomicU64,
    stale: AtomicU64,
    failures: AtomicU64,
    total_construction_ns: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declared_count(&self) -> u64 {
        self.declared.load(Ordering::Relaxed)
    }

    /// Singletons constructed for the first time.
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Calls answered from a cache, including lost races.
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn uncached_count(&self) -> u64 {
        self.uncached.load(Ordering::Relaxed)
    }

    pub fn races_lost(&self) -> u64 {
        self.races_lost.load(Ordering::Relaxed)
    }

    pub fn stale_count(&self) -> u64 {
        self.stale.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Successful `construct` calls of every kind.
    pub fn construction_count(&self) -> u64 {
        self.created_count() + self.hit_count() + self.uncached_count()
    }

    pub fn total_construction_time(&self) -> Duration {
        Duration::from_nanos(self.total_construction_ns.load(Ordering::Relaxed))
    }

    pub fn average_construction_time(&self) -> Option<Duration> {
        let count = self.construction_count();
        if count == 0 {
            return None;
        }
        Some(self.total_construction_time() / count as u32)
    }

    /// Share of singleton requests served from a cache.
    pub fn hit_ratio(&self) -> Option<f64> {
        let hits = self.hit_count();
        let total = hits + self.created_count();
        if total == 0 {
            return None;
        }
        Some(hits as f64 / total as f64)
    }

    pub fn reset(&self) {
        for counter in [
            &self.declared,
            &self.created,
            &self.hits,
            &self.uncached,
            &self.races_lost,
            &self.stale,
            &self.failures,
            &self.total_construction_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl ConstructionObserver for MetricsObserver {
    fn type_declared(&self, _key: &TypeKey, _policy: Option<InheritancePolicy>, _is_singleton: bool) {
        self.declared.fetch_add(1, Ordering::Relaxed);
    }

    fn constructing(&self, _key: &TypeKey) {}

    fn constructed(&self, _key: &TypeKey, outcome: ConstructionOutcome, duration: Duration) {
        match outcome {
            ConstructionOutcome::Created => self.created.fetch_add(1, Ordering::Relaxed),
            ConstructionOutcome::Cached => self.hits.fetch_add(1, Ordering::Relaxed),
            ConstructionOutcome::Uncached => self.uncached.fetch_add(1, Ordering::Relaxed),
            ConstructionOutcome::RaceLost => {
                self.races_lost.fetch_add(1, Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed)
            }
        };
        self.total_construction_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn stale_arguments(&self, _key: &TypeKey, _stored: &ArgTuple, _requested: &ArgTuple, _rejected: bool) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    fn construction_failed(&self, _key: &TypeKey, _error: &SingletonError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}
