//! Client Control Primitives
//!
//! Lets the core take over clients (open pages/windows) that were loaded
//! under a previous version.

use async_trait::async_trait;

use crate::{error::Result, platform::PlatformSendSync};

/// Client control trait
///
/// # Platform Support
///
/// - **Browser hosts**: `clients.claim()` and `skipWaiting()`
/// - **Desktop**: in-process bookkeeping (`bridge-desktop`)
#[async_trait]
pub trait ClientControl: PlatformSendSync {
    /// Start governing every open client now instead of on its next load.
    ///
    /// Returns the number of clients that were claimed.
    async fn claim(&self) -> Result<usize>;

    /// Let a freshly provisioned version activate without waiting for
    /// clients of the previous version to close.
    async fn skip_waiting(&self) -> Result<()>;
}
