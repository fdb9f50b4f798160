use bridge_traits::BridgeError;
use thiserror::Error;

use crate::lifecycle::LifecycleState;

#[derive(Error, Debug)]
pub enum OfflineError {
    /// The application shell could not be fully provisioned. Nothing from
    /// this attempt is served; the controller is back to uninstalled.
    #[error("Provisioning failed at {entry}: {reason}")]
    ProvisionFailed { entry: String, reason: String },

    #[error("Cache store error: {0}")]
    Store(#[source] BridgeError),

    /// The network fetch failed and nothing could stand in for it. Carries
    /// the host's error unchanged.
    #[error("Network fetch failed: {0}")]
    Fetch(#[source] BridgeError),

    #[error("Sync procedure for tag {tag} failed: {message}")]
    SyncProcedure { tag: String, message: String },

    #[error("{operation} is not valid while {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error(transparent)]
    Config(#[from] core_runtime::Error),
}

impl OfflineError {
    /// The underlying host error when this is a network failure.
    pub fn as_fetch_error(&self) -> Option<&BridgeError> {
        match self {
            OfflineError::Fetch(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, OfflineError>;
