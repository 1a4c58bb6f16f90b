// Copyright (c) 2024 SIGMA ENGINE

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// State shared between one writer and many readers.
///
/// Readers never block each other, a writer excludes everybody.
#[derive(Debug, Default)]
pub struct SharedDatabase<S> {
    inner: Arc<RwLock<S>>,
}

impl<S> Clone for SharedDatabase<S> {
    fn clone(&self) -> Self {
        SharedDatabase {
            inner: self.inner.clone(),
        }
    }
}

impl<S> SharedDatabase<S> {
    /// Wraps `state`
    pub fn new(state: S) -> Self {
        SharedDatabase {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Runs `f` under the shared lock
    pub fn with_read_lock<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.read())
    }

    /// Runs `f` under the exclusive lock
    pub fn with_write_lock<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Shared guard, for callers that need to hold the lock across calls
    pub fn read(&self) -> RwLockReadGuard<'_, S> {
        self.inner.read()
    }

    /// Exclusive guard
    pub fn write(&self) -> RwLockWriteGuard<'_, S> {
        self.inner.write()
    }
}
