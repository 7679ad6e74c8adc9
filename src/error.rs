//! Error types for the singleton construction engine.

use std::fmt;

use crate::args::ArgTuple;
use crate::policy::InheritancePolicy;

/// Singleton engine errors
///
/// Declaration-time variants (`InvalidBaseType`, `DoubleWrapping`,
/// `ConflictingBasePolicies`) abort type creation; nothing is published.
/// Construction-time variants abort the single `construct` call and leave the
/// instance cache untouched, so a corrected retry still succeeds.
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::{ArgTuple, SingletonError};
///
/// let invalid = SingletonError::InvalidBaseType("Config".to_string());
/// assert_eq!(invalid.to_string(), "type 'Config' is not an acceptable base type");
///
/// let stale = SingletonError::StaleArguments {
///     type_name: "Counter".to_string(),
///     stored: ArgTuple::new([0]),
///     requested: ArgTuple::new([5]),
/// };
/// assert!(stale.to_string().contains("stored arguments: (0)"));
/// assert_eq!(stale.stored_arguments(), Some(&ArgTuple::new([0])));
/// ```
#[derive(Debug, Clone)]
pub enum SingletonError {
    /// Base type forbids derivation
    InvalidBaseType(String),
    /// Policy applied to a type that already carries one, without override
    DoubleWrapping {
        type_name: String,
        existing: InheritancePolicy,
    },
    /// Construction requested with arguments that differ from the cached call
    StaleArguments {
        type_name: String,
        stored: ArgTuple,
        requested: ArgTuple,
    },
    /// Second `populate` on the same cache
    AlreadyPopulated {
        type_name: String,
        stored: ArgTuple,
    },
    /// `populate` on a cache that bypasses caching
    NotSingleton(String),
    /// Direct bases disagree on the policy a derived type should inherit
    ConflictingBasePolicies {
        type_name: String,
        bases: Vec<(String, InheritancePolicy)>,
    },
    /// A step asked for a type that is already being constructed (includes path)
    ReentrantConstruction(Vec<String>),
    /// Maximum nested construction depth exceeded
    DepthExceeded(usize),
    /// Descriptor was declared by a different engine
    ForeignType(String),
    /// Allocation step produced an instance of the wrong type
    InvalidAllocation {
        type_name: String,
        produced: String,
    },
    /// Step argument missing or of the wrong kind
    InvalidArgument(String),
    /// User-supplied allocation or initialization logic failed
    Initialization {
        type_name: String,
        message: String,
    },
    /// Invalid engine configuration value
    Config(String),
}

impl SingletonError {
    /// Arguments recorded by the cache, for the variants that carry them.
    pub fn stored_arguments(&self) -> Option<&ArgTuple> {
        match self {
            SingletonError::StaleArguments { stored, .. } => Some(stored),
            SingletonError::AlreadyPopulated { stored, .. } => Some(stored),
            _ => None,
        }
    }

    /// True for errors raised while declaring or wrapping a type.
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            SingletonError::InvalidBaseType(_)
                | SingletonError::DoubleWrapping { .. }
                | SingletonError::ConflictingBasePolicies { .. }
        )
    }
}

impl fmt::Display for SingletonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SingletonError::InvalidBaseType(name) => {
                write!(f, "type '{}' is not an acceptable base type", name)
            }
            SingletonError::DoubleWrapping { type_name, existing } => write!(
                f,
                "type '{}' already carries the {} policy; re-wrapping requires an explicit override",
                type_name, existing
            ),
            SingletonError::StaleArguments { type_name, stored, requested } => write!(
                f,
                "'{}' has already been created and cannot be constructed with different arguments; stored arguments: {}, requested: {}",
                type_name, stored, requested
            ),
            SingletonError::AlreadyPopulated { type_name, stored } => write!(
                f,
                "Instance cache of '{}' is already populated with arguments {}",
                type_name, stored
            ),
            SingletonError::NotSingleton(name) => {
                write!(f, "type '{}' is not singleton-flavored", name)
            }
            SingletonError::ConflictingBasePolicies { type_name, bases } => {
                let listed: Vec<String> = bases
                    .iter()
                    .map(|(name, policy)| format!("{} ({})", name, policy))
                    .collect();
                write!(
                    f,
                    "bases of '{}' carry conflicting policies: {}",
                    type_name,
                    listed.join(", ")
                )
            }
            SingletonError::ReentrantConstruction(path) => {
                write!(f, "Re-entrant construction: {}", path.join(" -> "))
            }
            SingletonError::DepthExceeded(depth) => {
                write!(f, "Max construction depth {} exceeded", depth)
            }
            SingletonError::ForeignType(name) => {
                write!(f, "type '{}' was declared by a different engine", name)
            }
            SingletonError::InvalidAllocation { type_name, produced } => write!(
                f,
                "allocation step of '{}' returned an instance of '{}'",
                type_name, produced
            ),
            SingletonError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            SingletonError::Initialization { type_name, message } => {
                write!(f, "construction of '{}' failed: {}", type_name, message)
            }
            SingletonError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SingletonError {}

/// Result type for engine operations
pub type SingletonResult<T> = Result<T, SingletonError>;
