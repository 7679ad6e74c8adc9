//! Inheritance policies and argument-mismatch modes.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::SingletonError;

/// Inheritance policy controlling what a derived type receives
///
/// The policy is attached to a type when it is wrapped and decides what
/// instance cache a *derived* type gets. The variant itself is inherited, so
/// grandchildren keep following the same rule until a type is explicitly
/// re-wrapped.
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::InheritancePolicy;
///
/// assert_eq!(InheritancePolicy::from_flags(true, false), InheritancePolicy::NonDerivable);
/// assert_eq!(InheritancePolicy::from_flags(false, true), InheritancePolicy::SingletonChildren);
/// assert_eq!(InheritancePolicy::from_flags(false, false), InheritancePolicy::NonSingletonChildren);
///
/// assert_eq!(InheritancePolicy::SingletonChildren.child_is_singleton(), Some(true));
/// assert_eq!(InheritancePolicy::NonDerivable.child_is_singleton(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub enum InheritancePolicy {
    /// Declaring any derived type is an error
    NonDerivable,
    /// Derived types get a fresh cache and stay singletons
    ///
    /// Each derived type owns an independent cache, so its instance is never
    /// the base's instance.
    SingletonChildren,
    /// Derived types get a fresh cache that bypasses caching
    ///
    /// Construction of a derived type behaves like ordinary construction while
    /// the wrapped type itself stays a singleton.
    NonSingletonChildren,
}

impl InheritancePolicy {
    /// Maps the `is_final` / `children_singleton` decorator flags to a policy.
    ///
    /// `is_final` wins over `children_singleton`.
    pub fn from_flags(is_final: bool, children_singleton: bool) -> Self {
        match (is_final, children_singleton) {
            (true, _) => InheritancePolicy::NonDerivable,
            (false, true) => InheritancePolicy::SingletonChildren,
            (false, false) => InheritancePolicy::NonSingletonChildren,
        }
    }

    pub fn is_derivable(&self) -> bool {
        !matches!(self, InheritancePolicy::NonDerivable)
    }

    /// The `is_singleton` flag a derived type's cache receives, or `None`
    /// when derivation is forbidden.
    pub fn child_is_singleton(&self) -> Option<bool> {
        match self {
            InheritancePolicy::NonDerivable => None,
            InheritancePolicy::SingletonChildren => Some(true),
            InheritancePolicy::NonSingletonChildren => Some(false),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InheritancePolicy::NonDerivable => "NonDerivable",
            InheritancePolicy::SingletonChildren => "SingletonChildren",
            InheritancePolicy::NonSingletonChildren => "NonSingletonChildren",
        }
    }
}

impl fmt::Display for InheritancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What `construct` does when a populated singleton is requested with
/// arguments that differ from the cached call.
///
/// The mode is fixed per wrapped type and inherited by its derived types; a
/// single type never mixes the two behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum ArgumentMismatch {
    /// Fail with `StaleArguments`; the cached instance is left untouched
    #[default]
    Strict,
    /// Log a warning and return the cached instance
    Permissive,
}

impl ArgumentMismatch {
    pub fn name(&self) -> &'static str {
        match self {
            ArgumentMismatch::Strict => "strict",
            ArgumentMismatch::Permissive => "permissive",
        }
    }
}

impl fmt::Display for ArgumentMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArgumentMismatch {
    type Err = SingletonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ArgumentMismatch::Strict),
            "permissive" => Ok(ArgumentMismatch::Permissive),
            other => Err(SingletonError::Config(format!(
                "unknown argument mismatch mode '{}' (expected 'strict' or 'permissive')",
                other
            ))),
        }
    }
}
