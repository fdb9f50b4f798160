//! # Offline Cache Core
//!
//! The cache lifecycle state machine behind an offline-capable web
//! application: versioned cache namespaces, provisioning of the application
//! shell, pruning of stale versions, per-request routing and the background
//! sync hook.
//!
//! ## Overview
//!
//! A host runtime (browser worker, desktop shell, test harness) forwards its
//! lifecycle events to an [`OfflineWorker`]:
//!
//! - `Provision` - fetch and store every manifest entry, all or nothing
//! - `Activate` - delete every namespace but the current one, claim clients
//! - `Intercept` - serve a request cache-first, network-first, straight from
//!   the network, or with the offline document as a fallback
//! - `Sync` - run the caller's [`SyncProcedure`] for a registered tag
//!
//! Network access and storage go through the `bridge-traits` capabilities
//! carried by [`OfflineConfig`](core_runtime::config::OfflineConfig).
//!
//! ## Usage
//!
//! ```ignore
//! use core_offline::{HostEvent, OfflineWorker};
//! use core_runtime::{config::OfflineConfig, events::EventBus};
//!
//! let config = OfflineConfig::builder()
//!     .origin("https://app.example")
//!     .manifest(["/", "/index.html", "/app.js", "/offline.html"])
//!     .offline_fallback("/offline.html")
//!     .build()?;
//!
//! let worker = OfflineWorker::new(config, EventBus::default());
//! worker.handle(HostEvent::Provision).await?;
//! worker.handle(HostEvent::Activate).await?;
//! ```

pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod namespace;
pub mod policy;
pub mod request;
pub mod strategy;
pub mod sync_trigger;
pub mod worker;
pub mod writer;

pub use error::{OfflineError, Result};
pub use lifecycle::{ActivationReport, LifecycleController, LifecycleState, ProvisionReport};
pub use manifest::Manifest;
pub use namespace::Namespace;
pub use policy::{is_cacheable, RoutingDecision, RoutingPolicy};
pub use request::RequestDescriptor;
pub use strategy::StrategyExecutor;
pub use sync_trigger::{SyncOutcome, SyncProcedure, SyncTrigger};
pub use worker::{HostEvent, HostReply, OfflineWorker};
pub use writer::BackgroundWriter;
