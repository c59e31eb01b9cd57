//! Shared re-exports for locks, atomics and collections.

pub use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

pub use std::sync::atomic::{
    AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering,
};
pub use std::sync::Arc;

pub use std::collections::VecDeque;
