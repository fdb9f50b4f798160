//! Task spawning.
//!
//! Besides plain [`spawn`], this module exposes [`TaskTracker`] for detached
//! work that callers never await individually but that shutdown code (or a
//! test) may want to drain.
//!
//! ```rust
//! use core_async::task::{spawn, TaskTracker};
//!
//! # core_async::runtime::block_on(async {
//! let tracker = TaskTracker::new();
//! tracker.spawn(async { /* fire and forget */ });
//! tracker.close();
//! tracker.wait().await;
//!
//! assert_eq!(spawn(async { 7 }).await.unwrap(), 7);
//! # });
//! ```

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};
pub use tokio_util::sync::CancellationToken;
pub use tokio_util::task::TaskTracker;

/// Spawns a new asynchronous task on the current runtime.
///
/// The returned handle may be dropped; the task keeps running to completion
/// either way.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
