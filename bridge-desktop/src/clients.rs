//! In-process client control
//!
//! Desktop hosts have no browser tabs to take over. Clients are windows or
//! views the host registers itself; claiming marks all of them as governed by
//! the current version.

use async_trait::async_trait;
use bridge_traits::{clients::ClientControl, error::Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
pub struct DesktopClientControl {
    open_clients: AtomicUsize,
    claimed: AtomicUsize,
    skipped_waiting: AtomicBool,
}

impl DesktopClientControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened client window.
    pub fn register_client(&self) {
        self.open_clients.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a closed client window.
    pub fn unregister_client(&self) {
        let _ = self
            .open_clients
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Number of clients governed after the most recent claim.
    pub fn claimed(&self) -> usize {
        self.claimed.load(Ordering::SeqCst)
    }

    pub fn skipped_waiting(&self) -> bool {
        self.skipped_waiting.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientControl for DesktopClientControl {
    async fn claim(&self) -> Result<usize> {
        let count = self.open_clients.load(Ordering::SeqCst);
        self.claimed.store(count, Ordering::SeqCst);
        debug!(clients = count, "Claimed open clients");
        Ok(count)
    }

    async fn skip_waiting(&self) -> Result<()> {
        self.skipped_waiting.store(true, Ordering::SeqCst);
        debug!("Skip-waiting requested");
        Ok(())
    }
}
