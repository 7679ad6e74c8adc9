//! Type descriptors for construction and introspection.

use std::fmt;
use std::sync::Arc;

use crate::cache::InstanceCache;
use crate::ctor::{AllocStep, InitStep};
use crate::engine::EngineId;
use crate::key::TypeKey;
use crate::policy::{ArgumentMismatch, InheritancePolicy};

/// Shared handle to a declared type
pub type TypeRef = Arc<TypeDescriptor>;

/// A declared type.
///
/// Descriptors are created by [`SingletonEngine::declare`] and
/// [`SingletonEngine::wrap_type`] and never change identity afterwards; the
/// only mutable part is the instance cache, which moves from empty to
/// populated once.
///
/// [`SingletonEngine::declare`]: crate::SingletonEngine::declare
/// [`SingletonEngine::wrap_type`]: crate::SingletonEngine::wrap_type
pub struct TypeDescriptor {
    pub(crate) key: TypeKey,
    pub(crate) engine: EngineId,
    pub(crate) bases: Vec<TypeRef>,
    /// This type first, then its ancestors depth-first, left to right
    pub(crate) lineage: Arc<[TypeKey]>,
    pub(crate) alloc_chain: Vec<AllocStep>,
    pub(crate) init_chain: Vec<InitStep>,
    pub(crate) policy: Option<InheritancePolicy>,
    pub(crate) wrapped: bool,
    pub(crate) argument_mismatch: ArgumentMismatch,
    pub(crate) cache: InstanceCache,
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        self.key.display_name()
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// Direct bases in declaration order.
    pub fn bases(&self) -> &[TypeRef] {
        &self.bases
    }

    pub fn lineage(&self) -> &[TypeKey] {
        &self.lineage
    }

    pub(crate) fn lineage_arc(&self) -> Arc<[TypeKey]> {
        self.lineage.clone()
    }

    pub(crate) fn alloc_chain(&self) -> &[AllocStep] {
        &self.alloc_chain
    }

    pub(crate) fn init_chain(&self) -> &[InitStep] {
        &self.init_chain
    }

    /// The inheritance policy this type applies to its derived types, either
    /// its own (wrapped types) or inherited from its bases.
    pub fn policy(&self) -> Option<InheritancePolicy> {
        self.policy
    }

    /// True for descriptors produced by a wrap.
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Whether construction routes through this type's cache.
    pub fn is_singleton(&self) -> bool {
        self.cache.is_singleton()
    }

    pub fn argument_mismatch(&self) -> ArgumentMismatch {
        self.argument_mismatch
    }

    pub fn cache(&self) -> &InstanceCache {
        &self.cache
    }

    /// True when `self` is `other` or derives from it.
    pub fn is_subtype_of(&self, other: &TypeDescriptor) -> bool {
        self.lineage.iter().any(|k| k == other.key())
    }

    /// Introspection snapshot.
    pub fn info(&self) -> TypeInfo {
        TypeInfo {
            key: self.key.clone(),
            policy: self.policy,
            wrapped: self.wrapped,
            is_singleton: self.cache.is_singleton(),
            is_populated: self.cache.is_populated(),
            argument_mismatch: self.argument_mismatch,
            base_names: self.bases.iter().map(|b| b.name().to_string()).collect(),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name())
            .field("id", &self.key.id())
            .field("bases", &self.bases.iter().map(|b| b.name()).collect::<Vec<_>>())
            .field("policy", &self.policy)
            .field("wrapped", &self.wrapped)
            .field("argument_mismatch", &self.argument_mismatch)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Type descriptor snapshot for introspection and diagnostics
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::{InheritancePolicy, SingletonEngine, TypeSpec};
///
/// let engine = SingletonEngine::new();
/// let base = engine
///     .define_singleton(TypeSpec::new("Base"), InheritancePolicy::SingletonChildren)
///     .unwrap();
/// engine.declare(TypeSpec::new("Child").base(&base)).unwrap();
/// engine.construct(&base, ()).unwrap();
///
/// let infos = engine.type_descriptors();
/// let child = infos.iter().find(|i| i.type_name() == "Child").unwrap();
/// assert!(child.is_singleton);
/// assert!(!child.is_populated);
/// assert!(!child.wrapped);
/// assert_eq!(child.policy, Some(InheritancePolicy::SingletonChildren));
/// assert_eq!(child.base_names, vec!["Base".to_string()]);
///
/// let base_info = infos.iter().find(|i| i.type_name() == "Base").unwrap();
/// assert!(base_info.is_populated);
/// ```
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub key: TypeKey,
    pub policy: Option<InheritancePolicy>,
    pub wrapped: bool,
    pub is_singleton: bool,
    pub is_populated: bool,
    pub argument_mismatch: ArgumentMismatch,
    pub base_names: Vec<String>,
}

impl TypeInfo {
    pub fn type_name(&self) -> &str {
        self.key.display_name()
    }
}
