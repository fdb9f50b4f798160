//! Application shell manifest.
//!
//! The ordered list of resources that must all be stored before the
//! controller may serve offline. Provisioning fetches every entry first and
//! writes nothing unless all of them succeed.

use bridge_traits::{
    CacheKey, HttpClient, HttpRequest, HttpResponse, RequestMode, RetryPolicy,
};
use core_runtime::config::OfflineConfig;
use core_runtime::logging::redact_url;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::error::{OfflineError, Result};
use crate::policy::is_cacheable;

#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub url: Url,
    /// Cross-origin entries are fetched in `cors` mode.
    pub mode: RequestMode,
}

impl ManifestEntry {
    pub fn key(&self) -> CacheKey {
        CacheKey::get(self.url.as_str())
    }

    fn request(&self) -> HttpRequest {
        HttpRequest::get(self.url.as_str()).mode(self.mode)
    }
}

#[derive(Debug, Clone)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    fallback: Option<CacheKey>,
}

impl Manifest {
    pub fn from_config(config: &OfflineConfig) -> Self {
        let origin = config.origin.origin();
        let entries = config
            .manifest
            .iter()
            .map(|url| ManifestEntry {
                url: url.clone(),
                mode: if url.origin() == origin {
                    RequestMode::SameOrigin
                } else {
                    RequestMode::Cors
                },
            })
            .collect();

        Self {
            entries,
            fallback: config
                .offline_fallback
                .as_ref()
                .map(|url| CacheKey::get(url.as_str())),
        }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of the offline fallback document, if one is registered.
    pub fn fallback_key(&self) -> Option<&CacheKey> {
        self.fallback.as_ref()
    }

    /// Fetch every entry, at most `concurrency` at a time.
    ///
    /// Results come back in manifest order. The first failure aborts the
    /// whole batch with [`OfflineError::ProvisionFailed`] naming the entry:
    /// a transport error, a non-success status, or a response that may not
    /// be cached.
    pub async fn fetch_all(
        &self,
        http: &Arc<dyn HttpClient>,
        concurrency: usize,
    ) -> Result<Vec<(CacheKey, HttpResponse)>> {
        stream::iter(self.entries.iter().cloned())
            .map(|entry| {
                let http = Arc::clone(http);
                async move { fetch_entry(http.as_ref(), entry).await }
            })
            .buffered(concurrency.max(1))
            .try_collect()
            .await
    }
}

async fn fetch_entry(
    http: &dyn HttpClient,
    entry: ManifestEntry,
) -> Result<(CacheKey, HttpResponse)> {
    let failed = |reason: String| OfflineError::ProvisionFailed {
        entry: redact_url(entry.url.as_str()),
        reason,
    };

    let response = http
        .execute_with_retry(entry.request(), RetryPolicy::default())
        .await
        .map_err(|e| failed(e.to_string()))?;

    if !response.is_success() {
        return Err(failed(format!("HTTP {}", response.status)));
    }
    if !is_cacheable(&response) {
        return Err(failed(format!(
            "response is not cacheable (status {}, type {:?})",
            response.status, response.response_type
        )));
    }

    debug!(
        url = %redact_url(entry.url.as_str()),
        bytes = response.body.len(),
        "Fetched manifest entry"
    );
    Ok((entry.key(), response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, CacheStorage, Cache, ResponseType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type BridgeResult<T> = std::result::Result<T, BridgeError>;

    /// Answers every URL with its own path, except configured failures.
    struct EchoClient {
        fail_path: Option<&'static str>,
        status: u16,
        calls: AtomicUsize,
    }

    impl EchoClient {
        fn ok() -> Self {
            Self {
                fail_path: None,
                status: 200,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpClient for EchoClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let url = Url::parse(&request.url).unwrap();
            if Some(url.path()) == self.fail_path {
                return Err(BridgeError::Network("unreachable".to_string()));
            }
            Ok(HttpResponse::new(self.status, url.path().to_string()))
        }
    }

    struct NoStorage;

    #[async_trait]
    impl CacheStorage for NoStorage {
        async fn open(&self, _namespace: &str) -> BridgeResult<Arc<dyn Cache>> {
            Err(BridgeError::NotAvailable("unused".to_string()))
        }
        async fn has(&self, _namespace: &str) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn keys(&self) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn delete(&self, _namespace: &str) -> BridgeResult<bool> {
            Ok(false)
        }
    }

    fn config(entries: &[&str], fallback: Option<&str>) -> OfflineConfig {
        let mut builder = OfflineConfig::builder()
            .origin("https://app.example")
            .manifest(entries.iter().copied())
            .http_client(Arc::new(EchoClient::ok()))
            .cache_storage(Arc::new(NoStorage));
        if let Some(fallback) = fallback {
            builder = builder.offline_fallback(fallback);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_cross_origin_entries_use_cors_mode() {
        let manifest = Manifest::from_config(&config(
            &["/", "https://cdn.example/xlsx.full.min.js"],
            None,
        ));

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries()[0].mode, RequestMode::SameOrigin);
        assert_eq!(manifest.entries()[1].mode, RequestMode::Cors);
    }

    #[test]
    fn test_fallback_key() {
        let manifest = Manifest::from_config(&config(&["/", "/offline.html"], Some("/offline.html")));
        assert_eq!(
            manifest.fallback_key(),
            Some(&CacheKey::get("https://app.example/offline.html"))
        );
    }

    #[tokio::test]
    async fn test_fetch_all_preserves_order() {
        let manifest = Manifest::from_config(&config(&["/", "/app.js", "/style.css"], None));
        let http: Arc<dyn HttpClient> = Arc::new(EchoClient::ok());

        let fetched = manifest.fetch_all(&http, 2).await.unwrap();

        let bodies: Vec<String> = fetched.iter().map(|(_, r)| r.text().unwrap()).collect();
        assert_eq!(bodies, vec!["/", "/app.js", "/style.css"]);
        assert_eq!(fetched[1].0, CacheKey::get("https://app.example/app.js"));
    }

    #[tokio::test]
    async fn test_fetch_all_names_failing_entry() {
        let manifest = Manifest::from_config(&config(&["/", "/app.js"], None));
        let http: Arc<dyn HttpClient> = Arc::new(EchoClient {
            fail_path: Some("/app.js"),
            ..EchoClient::ok()
        });

        let err = manifest.fetch_all(&http, 4).await.unwrap_err();
        match err {
            OfflineError::ProvisionFailed { entry, .. } => {
                assert_eq!(entry, "https://app.example/app.js")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_rejects_error_status() {
        let manifest = Manifest::from_config(&config(&["/"], None));
        let http: Arc<dyn HttpClient> = Arc::new(EchoClient {
            status: 404,
            ..EchoClient::ok()
        });

        let err = manifest.fetch_all(&http, 4).await.unwrap_err();
        assert!(matches!(
            err,
            OfflineError::ProvisionFailed { ref reason, .. } if reason == "HTTP 404"
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_rejects_opaque() {
        struct OpaqueClient;

        #[async_trait]
        impl HttpClient for OpaqueClient {
            async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
                Ok(HttpResponse::new(200, "").with_type(ResponseType::Opaque))
            }
        }

        let manifest = Manifest::from_config(&config(&["/"], None));
        let http: Arc<dyn HttpClient> = Arc::new(OpaqueClient);

        assert!(matches!(
            manifest.fetch_all(&http, 1).await,
            Err(OfflineError::ProvisionFailed { .. })
        ));
    }
}
