//! The engine lock.
//!
//! One mutex guards the transport, pattern selection and note queues. Control
//! threads block on [`EngineLock::lock`]; the audio thread only ever uses
//! [`EngineLock::try_lock_for`] and treats a timeout as a skipped cycle.
//!
//! The lock is not recursive. Acquiring it again on the same thread while a
//! guard is alive deadlocks (or times out, for the bounded variants).

use crate::compat::{Arc, AtomicU64, Mutex, MutexGuard, Ordering};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::Location;
use std::time::Duration;

/// Log the first timeout and then every Nth.
const TIMEOUT_LOG_INTERVAL: u64 = 64;

/// Hook invoked on every acquire and release, with the caller's location.
pub trait LockObserver: Send + Sync {
    fn acquired(&self, location: &'static Location<'static>);
    fn released(&self, location: &'static Location<'static>);
}

pub struct EngineLock<T> {
    inner: Mutex<T>,
    observer: Option<Arc<dyn LockObserver>>,
    timeouts: AtomicU64,
}

impl<T> EngineLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            observer: None,
            timeouts: AtomicU64::new(0),
        }
    }

    pub fn with_observer(value: T, observer: Arc<dyn LockObserver>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::new(value)
        }
    }

    /// Blocking acquire. Not for the audio thread.
    #[track_caller]
    pub fn lock(&self) -> EngineGuard<'_, T> {
        let location = Location::caller();
        self.wrap(self.inner.lock(), location)
    }

    #[track_caller]
    pub fn try_lock(&self) -> Option<EngineGuard<'_, T>> {
        let location = Location::caller();
        self.inner.try_lock().map(|g| self.wrap(g, location))
    }

    /// Bounded acquire. A timeout is counted and logged at a throttled rate.
    #[track_caller]
    pub fn try_lock_for(&self, timeout: Duration) -> Option<EngineGuard<'_, T>> {
        let location = Location::caller();
        match self.inner.try_lock_for(timeout) {
            Some(guard) => Some(self.wrap(guard, location)),
            None => {
                let count = self.timeouts.fetch_add(1, Ordering::Relaxed) + 1;
                if count == 1 || count % TIMEOUT_LOG_INTERVAL == 0 {
                    tracing::warn!(
                        timeouts = count,
                        "Engine lock not acquired within {:?} at {}",
                        timeout,
                        location
                    );
                }
                None
            }
        }
    }

    /// Number of `try_lock_for` timeouts so far.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    fn wrap<'a>(
        &'a self,
        guard: MutexGuard<'a, T>,
        location: &'static Location<'static>,
    ) -> EngineGuard<'a, T> {
        let observer = self.observer.as_deref();
        if let Some(observer) = observer {
            observer.acquired(location);
        }
        EngineGuard {
            guard,
            observer,
            location,
        }
    }
}

impl<T> fmt::Debug for EngineLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineLock")
            .field("locked", &self.is_locked())
            .field("timeouts", &self.timeouts())
            .finish()
    }
}

/// Releases the lock (and notifies the observer) on drop.
pub struct EngineGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    observer: Option<&'a dyn LockObserver>,
    location: &'static Location<'static>,
}

impl<T> EngineGuard<'_, T> {
    /// Where this guard was acquired.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl<T> Deref for EngineGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for EngineGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for EngineGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(observer) = self.observer {
            observer.released(self.location);
        }
    }
}
