//! Normalized view of an intercepted request.

use bridge_traits::{CacheKey, HttpMethod, HttpRequest, RequestMode};
use core_runtime::config::OfflineConfig;
use url::{Origin, Url};

use crate::error::Result;

/// Method, normalized URL and mode of one intercepted request.
///
/// The URL is absolute with its fragment removed, so two requests that only
/// differ by `#anchor` share a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: Url,
    pub mode: RequestMode,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: Url, mode: RequestMode) -> Self {
        Self { method, url, mode }
    }

    /// Normalize `request` against the configured origin.
    ///
    /// # Errors
    ///
    /// Returns a config error if the URL cannot be resolved.
    pub fn from_request(request: &HttpRequest, config: &OfflineConfig) -> Result<Self> {
        let url = config.resolve_url(&request.url)?;
        Ok(Self::new(request.method, url, request.mode))
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn is_same_origin(&self, origin: &Origin) -> bool {
        &self.url.origin() == origin
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.method, self.url.as_str())
    }

    /// The request to send to the network, with the normalized URL.
    pub(crate) fn rebase(&self, original: &HttpRequest) -> HttpRequest {
        let mut request = original.clone();
        request.url = self.url.to_string();
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::{MemoryCacheStorage, ReqwestHttpClient};
    use std::sync::Arc;

    fn config() -> OfflineConfig {
        OfflineConfig::builder()
            .origin("https://app.example")
            .manifest_entry("/")
            .http_client(Arc::new(ReqwestHttpClient::new()))
            .cache_storage(Arc::new(MemoryCacheStorage::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_relative_url_resolves_against_origin() {
        let request = HttpRequest::get("/app.js");
        let descriptor = RequestDescriptor::from_request(&request, &config()).unwrap();

        assert_eq!(descriptor.url.as_str(), "https://app.example/app.js");
        assert_eq!(descriptor.path(), "/app.js");
        assert_eq!(
            descriptor.cache_key(),
            CacheKey::get("https://app.example/app.js")
        );
    }

    #[test]
    fn test_fragment_is_dropped() {
        let request = HttpRequest::navigate("https://app.example/#/settings");
        let descriptor = RequestDescriptor::from_request(&request, &config()).unwrap();

        assert_eq!(descriptor.url.as_str(), "https://app.example/");
        assert!(descriptor.is_navigation());
    }

    #[test]
    fn test_same_origin_check() {
        let config = config();
        let origin = config.origin.origin();

        let local = RequestDescriptor::from_request(&HttpRequest::get("/x"), &config).unwrap();
        let remote = RequestDescriptor::from_request(
            &HttpRequest::get("https://cdn.example/x"),
            &config,
        )
        .unwrap();

        assert!(local.is_same_origin(&origin));
        assert!(!remote.is_same_origin(&origin));
    }

    #[test]
    fn test_rebase_keeps_method_and_body() {
        let original = HttpRequest::new(HttpMethod::Post, "/api/items#x")
            .body(bytes::Bytes::from_static(b"{}"));
        let descriptor = RequestDescriptor::from_request(&original, &config()).unwrap();

        let rebased = descriptor.rebase(&original);
        assert_eq!(rebased.url, "https://app.example/api/items");
        assert_eq!(rebased.method, HttpMethod::Post);
        assert_eq!(rebased.body, original.body);
    }
}
