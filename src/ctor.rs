//! Allocation and initialization steps.
//!
//! Construction is split in two: an allocation step produces an instance of
//! the target type and an initialization step fills it in. Both receive the
//! same argument tuple, trimmed to the arity each one declares.
//!
//! A type's steps form chains. The first entry is the type's own override and
//! the rest are the steps it inherited, nearest ancestor first. A step reaches
//! the next link through [`AllocContext::base_alloc`] or
//! [`InitContext::base_init`]; neither touches an instance cache, so exactly
//! one cache (the target type's) is consulted per construction.

use std::fmt;
use std::sync::Arc;

use crate::args::{ArgTuple, ArgValue, Arity};
use crate::descriptors::TypeDescriptor;
use crate::error::{SingletonError, SingletonResult};
use crate::object::{Instance, ObjectRef};

/// Allocation function signature
pub type AllocFn =
    dyn Fn(&AllocContext<'_>, &ArgTuple) -> SingletonResult<ObjectRef> + Send + Sync;

/// Initialization function signature
pub type InitFn = dyn Fn(&InitContext<'_>, &ArgTuple) -> SingletonResult<()> + Send + Sync;

/// An allocation step with its declared arity.
#[derive(Clone)]
pub struct AllocStep {
    arity: Arity,
    f: Arc<AllocFn>,
}

impl AllocStep {
    pub fn new<F>(arity: Arity, f: F) -> Self
    where
        F: Fn(&AllocContext<'_>, &ArgTuple) -> SingletonResult<ObjectRef> + Send + Sync + 'static,
    {
        Self { arity, f: Arc::new(f) }
    }

    /// The universal zero-argument allocator.
    pub fn blank() -> Self {
        Self::new(Arity::Nullary, |ctx, _| Ok(ctx.blank()))
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    fn call(&self, ctx: &AllocContext<'_>, args: &ArgTuple) -> SingletonResult<ObjectRef> {
        let args = args.adapt(self.arity);
        (self.f)(ctx, &*args)
    }
}

impl fmt::Debug for AllocStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocStep").field("arity", &self.arity).finish()
    }
}

/// An initialization step with its declared arity.
#[derive(Clone)]
pub struct InitStep {
    arity: Arity,
    f: Arc<InitFn>,
}

impl InitStep {
    pub fn new<F>(arity: Arity, f: F) -> Self
    where
        F: Fn(&InitContext<'_>, &ArgTuple) -> SingletonResult<()> + Send + Sync + 'static,
    {
        Self { arity, f: Arc::new(f) }
    }

    /// An initializer that accepts anything and does nothing.
    pub fn noop() -> Self {
        Self::new(Arity::Nullary, |_, _| Ok(()))
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    fn call(&self, ctx: &InitContext<'_>, args: &ArgTuple) -> SingletonResult<()> {
        let args = args.adapt(self.arity);
        (self.f)(ctx, &*args)
    }
}

impl fmt::Debug for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitStep").field("arity", &self.arity).finish()
    }
}

/// What an allocation step sees while it runs.
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::{Arity, InheritancePolicy, SingletonEngine, TypeSpec};
///
/// let engine = SingletonEngine::new();
/// let base = engine
///     .define_singleton(
///         TypeSpec::new("Base").alloc(Arity::Positional(1), |ctx, args| {
///             let obj = ctx.blank();
///             obj.set("val0", args.int(0)?);
///             Ok(obj)
///         }),
///         InheritancePolicy::NonSingletonChildren,
///     )
///     .unwrap();
///
/// // The child reuses the base allocator, then overwrites the field
/// let child = engine
///     .declare(TypeSpec::new("Child").base(&base).alloc(Arity::Variadic, |ctx, args| {
///         let obj = ctx.base_alloc(args)?;
///         obj.set("val0", 2);
///         Ok(obj)
///     }))
///     .unwrap();
///
/// let b = engine.construct(&child, [3, 5]).unwrap();
/// assert_eq!(b.get_int("val0"), Some(2));
/// assert_eq!(b.type_name(), "Child");
/// ```
pub struct AllocContext<'a> {
    target: &'a TypeDescriptor,
    rest: &'a [AllocStep],
}

impl<'a> AllocContext<'a> {
    /// Runs the allocation chain of `target`, falling back to a blank
    /// instance when nothing in the chain overrides allocation.
    pub(crate) fn allocate(target: &'a TypeDescriptor, args: &ArgTuple) -> SingletonResult<ObjectRef> {
        let ctx = AllocContext {
            target,
            rest: target.alloc_chain(),
        };
        ctx.base_alloc(args)
    }

    /// The type being constructed.
    pub fn target(&self) -> &TypeDescriptor {
        self.target
    }

    pub fn type_name(&self) -> &str {
        self.target.name()
    }

    /// A field-less instance of the target type.
    pub fn blank(&self) -> ObjectRef {
        Instance::blank(self.target)
    }

    /// Allocates with the step this one overrides.
    ///
    /// The result is still an instance of the target type, and no instance
    /// cache is consulted.
    pub fn base_alloc(&self, args: &ArgTuple) -> SingletonResult<ObjectRef> {
        match self.rest.split_first() {
            Some((step, rest)) => {
                let ctx = AllocContext {
                    target: self.target,
                    rest,
                };
                step.call(&ctx, args)
            }
            None => Ok(self.blank()),
        }
    }

    /// An `Initialization` error attributed to the target type.
    pub fn fail(&self, message: impl Into<String>) -> SingletonError {
        SingletonError::Initialization {
            type_name: self.type_name().to_string(),
            message: message.into(),
        }
    }
}

/// What an initialization step sees while it runs.
pub struct InitContext<'a> {
    instance: &'a ObjectRef,
    target: &'a TypeDescriptor,
    rest: &'a [InitStep],
}

impl<'a> InitContext<'a> {
    pub(crate) fn initialize(
        target: &'a TypeDescriptor,
        instance: &'a ObjectRef,
        args: &ArgTuple,
    ) -> SingletonResult<()> {
        let ctx = InitContext {
            instance,
            target,
            rest: target.init_chain(),
        };
        ctx.base_init(args)
    }

    /// The freshly allocated instance.
    pub fn instance(&self) -> &ObjectRef {
        self.instance
    }

    pub fn target(&self) -> &TypeDescriptor {
        self.target
    }

    /// Shorthand for `instance().set(..)`.
    pub fn set(&self, name: impl Into<String>, value: impl Into<ArgValue>) {
        self.instance.set(name, value);
    }

    /// Runs the initialization step this one overrides, if any.
    pub fn base_init(&self, args: &ArgTuple) -> SingletonResult<()> {
        match self.rest.split_first() {
            Some((step, rest)) => {
                let ctx = InitContext {
                    instance: self.instance,
                    target: self.target,
                    rest,
                };
                step.call(&ctx, args)
            }
            None => Ok(()),
        }
    }

    pub fn fail(&self, message: impl Into<String>) -> SingletonError {
        SingletonError::Initialization {
            type_name: self.target.name().to_string(),
            message: message.into(),
        }
    }
}
