//! Type declaration and policy wrapping.

use std::sync::Arc;

use super::SingletonEngine;
use crate::args::{ArgTuple, Arity};
use crate::cache::InstanceCache;
use crate::ctor::{AllocContext, AllocStep, InitContext, InitStep};
use crate::descriptors::{TypeDescriptor, TypeRef};
use crate::error::{SingletonError, SingletonResult};
use crate::internal::sync::write;
use crate::key::TypeKey;
use crate::object::ObjectRef;
use crate::policy::{ArgumentMismatch, InheritancePolicy};

/// Declaration of a plain or derived type.
///
/// A spec names the type, lists its direct bases and optionally overrides the
/// allocation and/or initialization step. Whatever is not overridden is
/// inherited from the first base.
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::{Arity, SingletonEngine, TypeSpec};
///
/// let engine = SingletonEngine::new();
/// let point = engine
///     .declare(TypeSpec::new("Point").init(Arity::Positional(2), |ctx, args| {
///         ctx.set("x", args.int(0)?);
///         ctx.set("y", args.int(1)?);
///         Ok(())
///     }))
///     .unwrap();
///
/// // Plain types construct fresh instances every time
/// let a = engine.construct(&point, [1, 2]).unwrap();
/// let b = engine.construct(&point, [1, 2]).unwrap();
/// assert_ne!(a.id(), b.id());
/// assert_eq!(b.get_int("y"), Some(2));
/// ```
#[derive(Clone)]
pub struct TypeSpec {
    name: String,
    bases: Vec<TypeRef>,
    alloc: Option<AllocStep>,
    init: Option<InitStep>,
}

impl TypeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            alloc: None,
            init: None,
        }
    }

    /// Appends a direct base.
    pub fn base(mut self, base: &TypeRef) -> Self {
        self.bases.push(base.clone());
        self
    }

    /// Overrides the allocation step.
    pub fn alloc<F>(self, arity: Arity, f: F) -> Self
    where
        F: Fn(&AllocContext<'_>, &ArgTuple) -> SingletonResult<ObjectRef> + Send + Sync + 'static,
    {
        self.alloc_step(AllocStep::new(arity, f))
    }

    /// Overrides the initialization step.
    pub fn init<F>(self, arity: Arity, f: F) -> Self
    where
        F: Fn(&InitContext<'_>, &ArgTuple) -> SingletonResult<()> + Send + Sync + 'static,
    {
        self.init_step(InitStep::new(arity, f))
    }

    pub fn alloc_step(mut self, step: AllocStep) -> Self {
        self.alloc = Some(step);
        self
    }

    pub fn init_step(mut self, step: InitStep) -> Self {
        self.init = Some(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for TypeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeSpec")
            .field("name", &self.name)
            .field("bases", &self.bases.iter().map(|b| b.name()).collect::<Vec<_>>())
            .field("alloc", &self.alloc)
            .field("init", &self.init)
            .finish()
    }
}

/// Options for [`SingletonEngine::wrap_type_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WrapOptions {
    /// Allow wrapping a type that is itself the product of a wrap
    pub allow_rewrap: bool,
    /// Mismatch mode for the new type; the engine default when `None`
    pub argument_mismatch: Option<ArgumentMismatch>,
}

impl WrapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rewrap(mut self) -> Self {
        self.allow_rewrap = true;
        self
    }

    pub fn with_argument_mismatch(mut self, mode: ArgumentMismatch) -> Self {
        self.argument_mismatch = Some(mode);
        self
    }
}

impl SingletonEngine {
    /// Declares a type.
    ///
    /// Without bases the type is plain: construction always produces a new
    /// instance. With bases, the type inherits the bases' policy (if any) and
    /// receives a fresh cache that is singleton-flavored under
    /// `SingletonChildren` and bypassed under `NonSingletonChildren`.
    ///
    /// # Errors
    ///
    /// * `InvalidBaseType` when a base is `NonDerivable`
    /// * `ConflictingBasePolicies` when policy-bearing bases disagree
    /// * `ForeignType` when a base was declared by another engine
    pub fn declare(&self, spec: TypeSpec) -> SingletonResult<TypeRef> {
        for base in &spec.bases {
            self.check_owned(base)?;
            if base.policy() == Some(InheritancePolicy::NonDerivable) {
                return Err(SingletonError::InvalidBaseType(base.name().to_string()));
            }
        }

        let (policy, inherited_mismatch) = inherited_policy(&spec.name, &spec.bases)?;
        let is_singleton = policy.and_then(|p| p.child_is_singleton()).unwrap_or(false);

        let key = TypeKey::next(&spec.name);
        let lineage = linearize(&key, &spec.bases);

        let first = spec.bases.first();
        let alloc_chain: Vec<AllocStep> = spec
            .alloc
            .into_iter()
            .chain(first.into_iter().flat_map(|b| b.alloc_chain().iter().cloned()))
            .collect();
        let init_chain: Vec<InitStep> = spec
            .init
            .into_iter()
            .chain(first.into_iter().flat_map(|b| b.init_chain().iter().cloned()))
            .collect();

        let descriptor = TypeDescriptor {
            cache: InstanceCache::new(key.clone(), is_singleton),
            key,
            engine: self.id(),
            bases: spec.bases,
            lineage,
            alloc_chain,
            init_chain,
            policy,
            wrapped: false,
            argument_mismatch: inherited_mismatch.unwrap_or(self.config().argument_mismatch),
        };

        Ok(self.publish(descriptor))
    }

    /// Applies `policy` to `base` with default options.
    ///
    /// The result is a new type with the same name, `base` as its only base,
    /// the base's steps, and a fresh empty singleton cache.
    pub fn wrap_type(&self, base: &TypeRef, policy: InheritancePolicy) -> SingletonResult<TypeRef> {
        self.wrap_type_with(base, policy, WrapOptions::default())
    }

    /// Applies `policy` to `base`.
    ///
    /// # Errors
    ///
    /// * `InvalidBaseType` when `base` is `NonDerivable`
    /// * `DoubleWrapping` when `base` is itself a wrapped type and
    ///   `allow_rewrap` is not set
    /// * `ForeignType` when `base` was declared by another engine
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_singleton::{InheritancePolicy, SingletonEngine, SingletonError, TypeSpec, WrapOptions};
    ///
    /// let engine = SingletonEngine::new();
    /// let plain = engine.declare(TypeSpec::new("Service")).unwrap();
    /// let wrapped = engine.wrap_type(&plain, InheritancePolicy::SingletonChildren).unwrap();
    ///
    /// assert!(matches!(
    ///     engine.wrap_type(&wrapped, InheritancePolicy::NonSingletonChildren),
    ///     Err(SingletonError::DoubleWrapping { .. })
    /// ));
    ///
    /// let rewrapped = engine
    ///     .wrap_type_with(&wrapped, InheritancePolicy::NonSingletonChildren, WrapOptions::new().with_rewrap())
    ///     .unwrap();
    /// assert_eq!(rewrapped.policy(), Some(InheritancePolicy::NonSingletonChildren));
    /// ```
    pub fn wrap_type_with(
        &self,
        base: &TypeRef,
        policy: InheritancePolicy,
        options: WrapOptions,
    ) -> SingletonResult<TypeRef> {
        self.check_owned(base)?;

        if let Some(existing) = base.policy() {
            if !existing.is_derivable() {
                return Err(SingletonError::InvalidBaseType(base.name().to_string()));
            }
            if base.is_wrapped() && !options.allow_rewrap {
                return Err(SingletonError::DoubleWrapping {
                    type_name: base.name().to_string(),
                    existing,
                });
            }
        }

        if policy.is_derivable() && self.config().warn_on_derivable {
            tracing::warn!(
                type_name = base.name(),
                %policy,
                "'{}' is a derivable singleton. This can lead to unexpected behavior for types derived from it",
                base.name()
            );
        }

        let key = TypeKey::next(base.name());
        let lineage = linearize(&key, std::slice::from_ref(base));

        let descriptor = TypeDescriptor {
            cache: InstanceCache::new(key.clone(), true),
            key,
            engine: self.id(),
            bases: vec![base.clone()],
            lineage,
            alloc_chain: base.alloc_chain().to_vec(),
            init_chain: base.init_chain().to_vec(),
            policy: Some(policy),
            wrapped: true,
            argument_mismatch: options
                .argument_mismatch
                .unwrap_or(self.config().argument_mismatch),
        };

        Ok(self.publish(descriptor))
    }

    /// Declares `spec` and wraps it with `policy` in one step.
    ///
    /// Mirrors decorating a freshly written type; `InheritancePolicy::from_flags`
    /// maps the usual `is_final` / `children_singleton` flags.
    pub fn define_singleton(&self, spec: TypeSpec, policy: InheritancePolicy) -> SingletonResult<TypeRef> {
        let plain = self.declare(spec)?;
        self.wrap_type(&plain, policy)
    }

    pub(crate) fn check_owned(&self, ty: &TypeDescriptor) -> SingletonResult<()> {
        if ty.engine != self.id() {
            return Err(SingletonError::ForeignType(ty.name().to_string()));
        }
        Ok(())
    }

    fn publish(&self, descriptor: TypeDescriptor) -> TypeRef {
        let ty = Arc::new(descriptor);
        write(&self.inner().types).insert(ty.name().to_string(), ty.clone());

        tracing::debug!(
            type_name = ty.name(),
            type_id = ty.key().id(),
            policy = ?ty.policy(),
            wrapped = ty.is_wrapped(),
            is_singleton = ty.is_singleton(),
            "type declared"
        );
        self.inner()
            .observers
            .type_declared(ty.key(), ty.policy(), ty.is_singleton());
        ty
    }
}

/// The policy and mismatch mode a derived type inherits from its bases.
///
/// Every policy-bearing base must agree on both.
fn inherited_policy(
    type_name: &str,
    bases: &[TypeRef],
) -> SingletonResult<(Option<InheritancePolicy>, Option<ArgumentMismatch>)> {
    let mut bearing = bases
        .iter()
        .filter_map(|b| b.policy().map(|p| (p, b.argument_mismatch())));

    let Some((policy, mismatch)) = bearing.next() else {
        return Ok((None, None));
    };

    if bearing.any(|(p, m)| p != policy || m != mismatch) {
        return Err(SingletonError::ConflictingBasePolicies {
            type_name: type_name.to_string(),
            bases: bases
                .iter()
                .filter_map(|b| b.policy().map(|p| (b.name().to_string(), p)))
                .collect(),
        });
    }

    Ok((Some(policy), Some(mismatch)))
}

/// `key` followed by the bases' lineages, depth-first, left to right, first
/// occurrence wins.
fn linearize(key: &TypeKey, bases: &[TypeRef]) -> Arc<[TypeKey]> {
    let mut lineage = vec![key.clone()];
    for ancestor in bases.iter().flat_map(|b| b.lineage().iter()) {
        if !lineage.contains(ancestor) {
            lineage.push(ancestor.clone());
        }
    }
    Arc::from(lineage)
}
