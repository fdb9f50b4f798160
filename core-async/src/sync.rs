//! Synchronization primitives.
//!
//! Async-aware locks and channels. Guards may be held across `.await`
//! without blocking the executor thread.
//!
//! ```rust
//! use core_async::sync::RwLock;
//!
//! # core_async::runtime::block_on(async {
//! let lock = RwLock::new(vec![1, 2, 3]);
//! lock.write().await.push(4);
//! assert_eq!(lock.read().await.len(), 4);
//! # });
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};
