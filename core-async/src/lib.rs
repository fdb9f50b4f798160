//! Async runtime facade for the offline shell crates.
//!
//! Every `core-*` and `bridge-*` crate reaches the executor through this crate
//! instead of depending on Tokio directly, so the runtime choice lives in one
//! place.
//!
//! # Modules
//!
//! - `task`: spawning, detached work tracking
//! - `time`: sleep, timeout, instants
//! - `sync`: async-aware locks and channels
//! - `runtime`: `block_on` for synchronous entry points and tests
//!
//! ```rust
//! use core_async::task;
//!
//! # core_async::runtime::block_on(async {
//! let handle = task::spawn(async { 21 * 2 });
//! assert_eq!(handle.await.unwrap(), 42);
//! # });
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
