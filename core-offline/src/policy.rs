//! Request routing policy.
//!
//! One parameterized decision procedure for every intercepted request. The
//! policy is pure: it looks only at the request descriptor and the configured
//! API prefixes, never at the cache or the network.

use bridge_traits::{HttpResponse, ResponseType};
use core_runtime::config::OfflineConfig;
use serde::Serialize;
use std::fmt;
use url::Origin;

use crate::request::RequestDescriptor;

/// How one intercepted request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingDecision {
    /// Stored response if present, else network and store in the background.
    CacheFirst,
    /// Network first; stored response or fallback document only on failure.
    NetworkFirst,
    /// Straight to the network, the cache is neither read nor written.
    Passthrough,
    /// Cache-first for navigations, with the offline document standing in
    /// for a failed fetch.
    OfflineFallback,
}

impl RoutingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingDecision::CacheFirst => "cache-first",
            RoutingDecision::NetworkFirst => "network-first",
            RoutingDecision::Passthrough => "passthrough",
            RoutingDecision::OfflineFallback => "offline-fallback",
        }
    }

    /// Whether this decision may read from the cache on the happy path.
    pub fn reads_cache_first(&self) -> bool {
        matches!(
            self,
            RoutingDecision::CacheFirst | RoutingDecision::OfflineFallback
        )
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    origin: Origin,
    api_prefixes: Vec<String>,
}

impl RoutingPolicy {
    pub fn new(origin: Origin, api_prefixes: Vec<String>) -> Self {
        Self {
            origin,
            api_prefixes,
        }
    }

    pub fn from_config(config: &OfflineConfig) -> Self {
        Self::new(config.origin.origin(), config.api_prefixes.clone())
    }

    /// Decide how `request` is served.
    ///
    /// Rules apply in order:
    /// 1. anything but `GET` passes through
    /// 2. same-origin paths under an API prefix are network-first
    /// 3. navigations get the offline fallback strategy
    /// 4. everything else is cache-first
    pub fn decide(&self, request: &RequestDescriptor) -> RoutingDecision {
        if !request.method.is_retrieval() {
            return RoutingDecision::Passthrough;
        }
        if request.is_same_origin(&self.origin) && self.is_api_path(request.path()) {
            return RoutingDecision::NetworkFirst;
        }
        if request.is_navigation() {
            return RoutingDecision::OfflineFallback;
        }
        RoutingDecision::CacheFirst
    }

    pub fn is_api_path(&self, path: &str) -> bool {
        self.api_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Whether a network response may be stored.
///
/// Only complete successful responses whose body the client can read:
/// a 2xx status other than 206, and a basic or CORS response type.
pub fn is_cacheable(response: &HttpResponse) -> bool {
    response.is_success()
        && response.status != 206
        && matches!(
            response.response_type,
            ResponseType::Basic | ResponseType::Cors
        )
}
