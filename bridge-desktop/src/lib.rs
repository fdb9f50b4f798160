//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop hosts and tests.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with same-origin / CORS / opaque
//!   classification relative to the application origin
//! - `CacheStorage` kept in memory ([`MemoryCacheStorage`]) or on disk as one
//!   directory per namespace ([`FsCacheStorage`])
//! - `NetworkMonitor` using a TCP reachability probe
//! - `ClientControl` as in-process client bookkeeping
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{MemoryCacheStorage, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::for_origin("https://app.example")?);
//! let storage = Arc::new(MemoryCacheStorage::new());
//! ```

mod cache_fs;
mod cache_memory;
mod clients;
mod http;
mod network;

pub use cache_fs::FsCacheStorage;
pub use cache_memory::MemoryCacheStorage;
pub use clients::DesktopClientControl;
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
