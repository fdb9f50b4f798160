//! Cache Storage Abstraction
//!
//! A named, versioned set of caches. Each cache (a *namespace*) maps a
//! normalized request identity to a stored response snapshot.
//!
//! Implementations must serialize conflicting writes to the same key; last
//! write wins. Entries are immutable snapshots, so a reader sees either the
//! previous value or the new one, never a mix.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::http::{HttpMethod, HttpResponse};
use crate::platform::PlatformSendSync;

/// Identity of a cached request: method plus normalized absolute URL.
///
/// The caller is responsible for normalization (resolving relative URLs,
/// dropping fragments); the store compares keys byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: HttpMethod,
    pub url: String,
}

impl CacheKey {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// One cache namespace.
#[async_trait]
pub trait Cache: PlatformSendSync {
    /// Look up the stored response for `key`.
    async fn get(&self, key: &CacheKey) -> Result<Option<HttpResponse>>;

    /// Store `response` under `key`, replacing any previous entry.
    async fn put(&self, key: CacheKey, response: HttpResponse) -> Result<()>;

    /// List every key currently stored.
    async fn keys(&self) -> Result<Vec<CacheKey>>;

    /// Remove one entry. Returns `false` if it was absent.
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
}

/// The set of cache namespaces owned by the application.
///
/// # Platform Support
///
/// - **Browser hosts**: the Cache Storage API (`caches.open`, `caches.keys`, ...)
/// - **Desktop**: in-memory or filesystem stores from `bridge-desktop`
///
/// # Example
///
/// ```ignore
/// use bridge_traits::cache_storage::{CacheKey, CacheStorage};
///
/// async fn is_cached(storage: &dyn CacheStorage, url: &str) -> Result<bool> {
///     let cache = storage.open("shell-v1").await?;
///     Ok(cache.get(&CacheKey::get(url)).await?.is_some())
/// }
/// ```
#[async_trait]
pub trait CacheStorage: PlatformSendSync {
    /// Open a namespace, creating it if it does not exist.
    async fn open(&self, namespace: &str) -> Result<Arc<dyn Cache>>;

    /// Check whether a namespace exists.
    async fn has(&self, namespace: &str) -> Result<bool>;

    /// List all namespace names.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Delete a namespace and every entry it owns. Returns `false` if it was
    /// absent.
    async fn delete(&self, namespace: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display() {
        let key = CacheKey::get("https://app.example/app.js");
        assert_eq!(key.to_string(), "GET https://app.example/app.js");
    }

    #[test]
    fn test_cache_keys_differ_by_method() {
        let get = CacheKey::get("https://app.example/items");
        let head = CacheKey::new(HttpMethod::Head, "https://app.example/items");
        assert_ne!(get, head);
    }

    #[test]
    fn test_cache_key_serialization() {
        let key = CacheKey::get("https://app.example/");
        let json = serde_json::to_string(&key).unwrap();
        assert!(json.contains("\"GET\""));
        let back: CacheKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
