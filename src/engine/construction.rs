//! Cached construction.

use std::time::Instant;

use super::SingletonEngine;
use crate::args::ArgTuple;
use crate::cache::CacheState;
use crate::ctor::{AllocContext, InitContext};
use crate::descriptors::TypeDescriptor;
use crate::error::{SingletonError, SingletonResult};
use crate::internal::ConstructionGuard;
use crate::object::ObjectRef;
use crate::observer::ConstructionOutcome;
use crate::policy::ArgumentMismatch;

impl SingletonEngine {
    /// Constructs an instance of `ty`.
    ///
    /// * Types that bypass caching run their allocation and initialization
    ///   steps on every call.
    /// * A singleton with an empty cache runs both steps once and commits the
    ///   instance together with `args`.
    /// * A populated singleton returns the cached instance without running
    ///   any step. If `args` differ from the stored arguments, strict types
    ///   fail with `StaleArguments` and permissive types log a warning.
    ///
    /// Only `ty`'s own cache is consulted; caches of its ancestors are never
    /// read or written.
    ///
    /// A step that constructs its own singleton type again fails with
    /// `ReentrantConstruction`. Types that bypass caching may recurse freely,
    /// bounded only by the maximum construction depth.
    ///
    /// # Concurrency
    ///
    /// No lock is held while steps run. When two threads race on an empty
    /// cache both build an instance, exactly one commits, and the other drops
    /// its instance and returns the winner's.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_singleton::{InheritancePolicy, SingletonEngine, TypeSpec};
    /// use std::sync::Arc;
    ///
    /// let engine = SingletonEngine::new();
    /// let base = engine
    ///     .define_singleton(TypeSpec::new("Base"), InheritancePolicy::SingletonChildren)
    ///     .unwrap();
    /// let child = engine.declare(TypeSpec::new("Child").base(&base)).unwrap();
    ///
    /// let b1 = engine.construct(&base, ()).unwrap();
    /// let b2 = engine.construct(&base, ()).unwrap();
    /// let c1 = engine.construct(&child, ()).unwrap();
    /// let c2 = engine.construct(&child, ()).unwrap();
    ///
    /// assert!(Arc::ptr_eq(&b1, &b2));
    /// assert!(Arc::ptr_eq(&c1, &c2));
    /// assert!(!Arc::ptr_eq(&b1, &c1));
    /// ```
    pub fn construct(&self, ty: &TypeDescriptor, args: impl Into<ArgTuple>) -> SingletonResult<ObjectRef> {
        let args = args.into();
        let observers = &self.inner().observers;

        if !observers.has_observers() {
            return self.construct_impl(ty, args).map(|(instance, _)| instance);
        }

        let start = Instant::now();
        observers.constructing(ty.key());
        match self.construct_impl(ty, args) {
            Ok((instance, outcome)) => {
                observers.constructed(ty.key(), outcome, start.elapsed());
                Ok(instance)
            }
            Err(err) => {
                observers.construction_failed(ty.key(), &err);
                Err(err)
            }
        }
    }

    fn construct_impl(
        &self,
        ty: &TypeDescriptor,
        args: ArgTuple,
    ) -> SingletonResult<(ObjectRef, ConstructionOutcome)> {
        self.check_owned(ty)?;

        // Fast path: populated singleton, no step runs
        if let CacheState::Populated { instance, args: stored } = ty.cache().lookup() {
            self.check_arguments(ty, &stored, &args)?;
            return Ok((instance, ConstructionOutcome::Cached));
        }

        let max_depth = self.config().max_construction_depth;
        if !ty.is_singleton() {
            let _guard = ConstructionGuard::enter_uncached(ty.key(), max_depth)?;
            let instance = self.build(ty, &args)?;
            return Ok((instance, ConstructionOutcome::Uncached));
        }

        let _guard = ConstructionGuard::enter(ty.key(), max_depth)?;
        let instance = self.build(ty, &args)?;

        match ty.cache().populate(instance.clone(), args.clone()) {
            Ok(()) => {
                tracing::debug!(
                    type_name = ty.name(),
                    instance_id = instance.id(),
                    %args,
                    "singleton cache populated"
                );
                Ok((instance, ConstructionOutcome::Created))
            }
            Err(err @ SingletonError::AlreadyPopulated { .. }) => {
                // Another thread committed first; ours is dropped here
                let Some((winner, stored)) = ty.cache().cached() else {
                    return Err(err);
                };
                tracing::debug!(
                    type_name = ty.name(),
                    discarded_id = instance.id(),
                    winner_id = winner.id(),
                    "lost first-construction race"
                );
                self.check_arguments(ty, &stored, &args)?;
                Ok((winner, ConstructionOutcome::RaceLost))
            }
            Err(err) => Err(err),
        }
    }

    /// Allocation followed by initialization, no caching.
    fn build(&self, ty: &TypeDescriptor, args: &ArgTuple) -> SingletonResult<ObjectRef> {
        let instance = AllocContext::allocate(ty, args)?;
        if instance.type_key() != ty.key() {
            return Err(SingletonError::InvalidAllocation {
                type_name: ty.name().to_string(),
                produced: instance.type_name().to_string(),
            });
        }
        InitContext::initialize(ty, &instance, args)?;
        Ok(instance)
    }

    fn check_arguments(&self, ty: &TypeDescriptor, stored: &ArgTuple, requested: &ArgTuple) -> SingletonResult<()> {
        if stored == requested {
            return Ok(());
        }

        let observers = &self.inner().observers;
        match ty.argument_mismatch() {
            ArgumentMismatch::Strict => {
                observers.stale_arguments(ty.key(), stored, requested, true);
                Err(SingletonError::StaleArguments {
                    type_name: ty.name().to_string(),
                    stored: stored.clone(),
                    requested: requested.clone(),
                })
            }
            ArgumentMismatch::Permissive => {
                tracing::warn!(
                    type_name = ty.name(),
                    %stored,
                    %requested,
                    "'{}' has already been created; new arguments are ignored and the cached instance is returned",
                    ty.name()
                );
                observers.stale_arguments(ty.key(), stored, requested, false);
                Ok(())
            }
        }
    }
}
