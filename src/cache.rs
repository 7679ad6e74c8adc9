//! Per-type instance caches.
//!
//! Every type descriptor owns exactly one [`InstanceCache`]. A cache is either
//! a bypass cache (the type is not singleton-flavored and construction never
//! touches it) or a set-once slot that moves from empty to populated exactly
//! once and is never reset.

use std::sync::Arc;

#[cfg(feature = "once-cell")]
use once_cell::sync::OnceCell;

use crate::args::ArgTuple;
use crate::error::{SingletonError, SingletonResult};
use crate::key::TypeKey;
use crate::object::ObjectRef;

#[cfg(not(feature = "once-cell"))]
use crate::internal::sync::{lock, Mutex};

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub enum CacheState {
    /// The type is not singleton-flavored; construct normally
    Bypass,
    /// Singleton-flavored, nothing constructed yet
    Empty,
    /// The cached instance and the arguments it was built with
    Populated {
        instance: ObjectRef,
        args: Arc<ArgTuple>,
    },
}

/// The populated half of a cache. Holding both in one value keeps
/// `already_created ⇒ instance ⇒ ctor_args` true by construction.
#[derive(Clone)]
struct CachedEntry {
    instance: ObjectRef,
    ctor_args: Arc<ArgTuple>,
}

/// Instance cache attached 1:1 to a type descriptor.
///
/// The lookup-then-populate window is guarded by a set-once slot (a
/// `OnceCell` with the `once-cell` feature, a mutex otherwise): the first
/// `populate` wins and every later call fails with
/// [`SingletonError::AlreadyPopulated`], which is how a thread that lost a
/// first-construction race learns to discard its speculative instance.
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::{CacheState, InheritancePolicy, SingletonEngine, TypeSpec};
/// use std::sync::Arc;
///
/// let engine = SingletonEngine::new();
/// let plain = engine.declare(TypeSpec::new("Settings")).unwrap();
/// assert!(matches!(plain.cache().lookup(), CacheState::Bypass));
///
/// let settings = engine.wrap_type(&plain, InheritancePolicy::NonDerivable).unwrap();
/// assert!(matches!(settings.cache().lookup(), CacheState::Empty));
///
/// let instance = engine.construct(&settings, ()).unwrap();
/// match settings.cache().lookup() {
///     CacheState::Populated { instance: cached, args } => {
///         assert!(Arc::ptr_eq(&cached, &instance));
///         assert!(args.is_empty());
///     }
///     _ => unreachable!(),
/// }
/// ```
pub struct InstanceCache {
    key: TypeKey,
    is_singleton: bool,
    #[cfg(feature = "once-cell")]
    slot: OnceCell<CachedEntry>,
    #[cfg(not(feature = "once-cell"))]
    slot: Mutex<Option<CachedEntry>>,
}

impl InstanceCache {
    pub(crate) fn new(key: TypeKey, is_singleton: bool) -> Self {
        Self {
            key,
            is_singleton,
            #[cfg(feature = "once-cell")]
            slot: OnceCell::new(),
            #[cfg(not(feature = "once-cell"))]
            slot: Mutex::new(None),
        }
    }

    /// Key of the owning type.
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn is_singleton(&self) -> bool {
        self.is_singleton
    }

    pub fn lookup(&self) -> CacheState {
        if !self.is_singleton {
            return CacheState::Bypass;
        }
        match self.entry() {
            Some(entry) => CacheState::Populated {
                instance: entry.instance,
                args: entry.ctor_args,
            },
            None => CacheState::Empty,
        }
    }

    /// Records the first constructed instance and its arguments.
    ///
    /// Fails with `AlreadyPopulated` (naming the stored arguments) on any call
    /// after the first successful one, and with `NotSingleton` on a bypass
    /// cache. A failed call leaves the cache unchanged.
    pub fn populate(&self, instance: ObjectRef, args: ArgTuple) -> SingletonResult<()> {
        if !self.is_singleton {
            return Err(SingletonError::NotSingleton(self.key.display_name().to_string()));
        }
        let entry = CachedEntry {
            instance,
            ctor_args: Arc::new(args),
        };
        self.commit(entry).map_err(|stored| SingletonError::AlreadyPopulated {
            type_name: self.key.display_name().to_string(),
            stored: (*stored).clone(),
        })
    }

    /// True once an instance has been committed.
    pub fn already_created(&self) -> bool {
        self.entry().is_some()
    }

    pub fn is_populated(&self) -> bool {
        self.already_created()
    }

    pub fn instance(&self) -> Option<ObjectRef> {
        self.entry().map(|entry| entry.instance)
    }

    pub fn ctor_args(&self) -> Option<Arc<ArgTuple>> {
        self.entry().map(|entry| entry.ctor_args)
    }

    pub(crate) fn cached(&self) -> Option<(ObjectRef, Arc<ArgTuple>)> {
        self.entry().map(|entry| (entry.instance, entry.ctor_args))
    }

    #[cfg(feature = "once-cell")]
    fn entry(&self) -> Option<CachedEntry> {
        self.slot.get().cloned()
    }

    #[cfg(not(feature = "once-cell"))]
    fn entry(&self) -> Option<CachedEntry> {
        lock(&self.slot).clone()
    }

    /// Set-once commit; on conflict returns the arguments already stored.
    #[cfg(feature = "once-cell")]
    fn commit(&self, entry: CachedEntry) -> Result<(), Arc<ArgTuple>> {
        match self.slot.set(entry) {
            Ok(()) => Ok(()),
            Err(rejected) => Err(self
                .slot
                .get()
                .map(|winner| winner.ctor_args.clone())
                .unwrap_or(rejected.ctor_args)),
        }
    }

    #[cfg(not(feature = "once-cell"))]
    fn commit(&self, entry: CachedEntry) -> Result<(), Arc<ArgTuple>> {
        let mut slot = lock(&self.slot);
        if let Some(existing) = slot.as_ref() {
            return Err(existing.ctor_args.clone());
        }
        *slot = Some(entry);
        Ok(())
    }
}

impl std::fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceCache")
            .field("type", &self.key.display_name())
            .field("is_singleton", &self.is_singleton)
            .field("already_created", &self.already_created())
            .field("ctor_args", &self.ctor_args().map(|args| args.to_string()))
            .finish()
    }
}
