//! Workspace facade crate.
//!
//! Host applications depend on `offline-shell` and get the offline cache core,
//! its configuration, and the bridge traits they must implement from one place.
//! The `desktop-shims` feature (enabled by default) wires reqwest-backed
//! networking and an in-memory cache store when no bridge is injected.

pub use bridge_traits as bridges;
pub use core_offline::{
    ActivationReport, HostEvent, HostReply, LifecycleController, LifecycleState, OfflineError,
    OfflineWorker, ProvisionReport, RoutingDecision, RoutingPolicy, SyncOutcome, SyncProcedure,
    SyncTrigger,
};
pub use core_runtime::config::{OfflineConfig, OfflineConfigBuilder};
pub use core_runtime::events::{CoreEvent, EventBus};
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
