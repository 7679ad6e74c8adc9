//! Lock aliases so callers don't care whether parking_lot is enabled.
//!
//! The std variants recover from poisoning: a panicking step must not make a
//! type permanently unconstructible.

#[cfg(feature = "parking-lot")]
pub(crate) use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
#[cfg(all(feature = "parking-lot", not(feature = "once-cell")))]
pub(crate) use parking_lot::{Mutex, MutexGuard};

#[cfg(not(feature = "parking-lot"))]
pub(crate) use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
#[cfg(all(not(feature = "parking-lot"), not(feature = "once-cell")))]
pub(crate) use std::sync::{Mutex, MutexGuard};

#[cfg(not(feature = "once-cell"))]
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    #[cfg(feature = "parking-lot")]
    {
        mutex.lock()
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[inline]
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    #[cfg(feature = "parking-lot")]
    {
        lock.read()
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[inline]
pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    #[cfg(feature = "parking-lot")]
    {
        lock.write()
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
