//! Internal implementation details.

pub(crate) mod reentrancy;
pub(crate) mod sync;

pub(crate) use reentrancy::ConstructionGuard;
