//! Re-entrant construction detection.

use std::cell::RefCell;

use crate::error::{SingletonError, SingletonResult};
use crate::key::TypeKey;

// Thread-local stack of types currently under construction
thread_local! {
    static CONSTRUCTION_TLS: RefCell<Vec<TypeKey>> = const { RefCell::new(Vec::new()) };
}

/// Guard for the thread-local construction stack.
///
/// Entering pushes the type; dropping pops it, so the stack unwinds on every
/// exit path including step failures and panics.
pub(crate) struct ConstructionGuard {
    key: TypeKey,
}

impl ConstructionGuard {
    /// Enters a singleton construction; the type must not already be on the
    /// stack.
    pub(crate) fn enter(key: &TypeKey, max_depth: usize) -> SingletonResult<Self> {
        Self::push(key, max_depth, true)
    }

    /// Enters an uncached construction. Nesting the same type is allowed,
    /// only the depth bound applies.
    pub(crate) fn enter_uncached(key: &TypeKey, max_depth: usize) -> SingletonResult<Self> {
        Self::push(key, max_depth, false)
    }

    fn push(key: &TypeKey, max_depth: usize, reject_reentry: bool) -> SingletonResult<Self> {
        CONSTRUCTION_TLS.with(|tls| {
            let mut stack = tls.borrow_mut();

            // Re-entry check BEFORE pushing
            if reject_reentry && stack.iter().any(|k| k == key) {
                let mut path: Vec<String> = stack
                    .iter()
                    .skip_while(|k| *k != key)
                    .map(|k| k.display_name().to_string())
                    .collect();
                path.push(key.display_name().to_string());
                return Err(SingletonError::ReentrantConstruction(path));
            }

            if stack.len() >= max_depth {
                return Err(SingletonError::DepthExceeded(stack.len()));
            }

            stack.push(key.clone());
            Ok(())
        })?;

        Ok(Self { key: key.clone() })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTION_TLS.with(|tls| {
            if let Some(last) = tls.borrow_mut().pop() {
                debug_assert_eq!(last, self.key);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth() -> usize {
        CONSTRUCTION_TLS.with(|tls| tls.borrow().len())
    }

    #[test]
    fn test_nested_distinct_types() {
        let a = TypeKey::next("A");
        let b = TypeKey::next("B");

        let outer = ConstructionGuard::enter(&a, 8).unwrap();
        {
            let _inner = ConstructionGuard::enter(&b, 8).unwrap();
            assert_eq!(depth(), 2);
        }
        assert_eq!(depth(), 1);
        drop(outer);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_reentry_reports_path() {
        let a = TypeKey::next("A");
        let b = TypeKey::next("B");

        let _outer = ConstructionGuard::enter(&a, 8).unwrap();
        let _inner = ConstructionGuard::enter(&b, 8).unwrap();
        match ConstructionGuard::enter(&a, 8) {
            Err(SingletonError::ReentrantConstruction(path)) => {
                assert_eq!(path, vec!["A", "B", "A"]);
            }
            other => panic!("Expected re-entrant error, got {:?}", other.err()),
        }
        // A failed entry leaves the stack alone
        assert_eq!(depth(), 2);
    }

    #[test]
    fn test_depth_limit() {
        let a = TypeKey::next("A");
        let b = TypeKey::next("B");

        let _outer = ConstructionGuard::enter(&a, 1).unwrap();
        assert!(matches!(
            ConstructionGuard::enter(&b, 1),
            Err(SingletonError::DepthExceeded(1))
        ));
    }

    #[test]
    fn test_uncached_nesting_is_depth_bound_only() {
        let node = TypeKey::next("Node");

        let _outer = ConstructionGuard::enter_uncached(&node, 3).unwrap();
        let _inner = ConstructionGuard::enter_uncached(&node, 3).unwrap();
        assert_eq!(depth(), 2);

        // A singleton entry still sees the uncached frames
        assert!(matches!(
            ConstructionGuard::enter(&node, 3),
            Err(SingletonError::ReentrantConstruction(_))
        ));
        let _third = ConstructionGuard::enter_uncached(&node, 3).unwrap();
        assert!(matches!(
            ConstructionGuard::enter_uncached(&node, 3),
            Err(SingletonError::DepthExceeded(3))
        ));
    }
}
