//! Runtime entry points.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs a future to completion on a fresh current-thread runtime.
///
/// Used by the `#[core_async::test]` and `#[core_async::main]` macros and by
/// synchronous callers that need a one-off async call. Must not be called from
/// inside another runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be constructed (e.g. the OS refuses to create
/// the I/O driver).
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}
