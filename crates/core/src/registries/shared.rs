//! Lock helpers shared by the registries and the queue engine.
//!
//! A poisoned lock means another thread panicked mid-update. Callers get
//! [`QueueError::LockPoisoned`] naming the structure instead of a second panic.

use crate::{QueueError, QueueResult};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn read<'a, T>(lock: &'a RwLock<T>, name: &'static str) -> QueueResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| {
        tracing::warn!("{} lock poisoned", name);
        QueueError::LockPoisoned(name)
    })
}

pub(crate) fn write<'a, T>(
    lock: &'a RwLock<T>,
    name: &'static str,
) -> QueueResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| {
        tracing::warn!("{} lock poisoned", name);
        QueueError::LockPoisoned(name)
    })
}

pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> QueueResult<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| {
        tracing::warn!("{} lock poisoned", name);
        QueueError::LockPoisoned(name)
    })
}
