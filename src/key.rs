//! Type identity keys.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global counter handing out type identities
static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a declared type.
///
/// Every declaration (including a re-declaration under the same name and the
/// descriptor produced by wrapping) gets a fresh numeric id. The display name
/// is kept for diagnostics only: equality, ordering and hashing look at the id
/// alone, so two declarations named `Config` are distinct keys.
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::{SingletonEngine, TypeSpec};
///
/// let engine = SingletonEngine::new();
/// let first = engine.declare(TypeSpec::new("Config")).unwrap();
/// let second = engine.declare(TypeSpec::new("Config")).unwrap();
///
/// assert_eq!(first.key().display_name(), second.key().display_name());
/// assert_ne!(first.key(), second.key());
/// ```
#[derive(Debug, Clone)]
pub struct TypeKey {
    id: u64,
    name: Arc<str>,
}

impl TypeKey {
    pub(crate) fn next(name: &str) -> Self {
        Self {
            id: NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
        }
    }

    /// Numeric identity, unique for the life of the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The name the type was declared with.
    pub fn display_name(&self) -> &str {
        &self.name
    }
}

// Identity only: the name is diagnostics
impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for TypeKey {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
