//! # Host Bridge Traits
//!
//! Capabilities the offline cache core needs from its host runtime.
//!
//! ## Overview
//!
//! The core never talks to a network stack or a storage engine directly.
//! Each capability below is a trait the host implements (a browser worker
//! runtime, a desktop shell, a test harness), injected through
//! `core_runtime::config::OfflineConfig`.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Network fetch for intercepted and manifest requests
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity status and change stream
//!
//! ### Storage
//! - [`CacheStorage`](cache_storage::CacheStorage) - Named, versioned cache namespaces
//! - [`Cache`](cache_storage::Cache) - Entries of one namespace
//!
//! ### Client control
//! - [`ClientControl`](clients::ClientControl) - Claim open clients, skip waiting
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Every trait returns [`BridgeError`](error::BridgeError). A fetch that
//! produced no response at all must surface as `BridgeError::Network` so the
//! core can tell "offline" apart from "the server answered 500".
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; implementations are shared behind
//! `Arc` across concurrently running intercepts.

pub mod cache_storage;
pub mod clients;
pub mod error;
pub mod http;
pub mod network;
pub mod platform;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use cache_storage::{Cache, CacheKey, CacheStorage};
pub use clients::ClientControl;
pub use http::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, RequestMode, ResponseType, RetryPolicy,
};
pub use network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
