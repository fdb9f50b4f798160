//! Strategy execution for routed requests.
//!
//! Runs one [`RoutingDecision`] against the current namespace and the
//! network. A stored response always wins over the network for cache-first
//! decisions; the two are never raced.

use bridge_traits::{CacheKey, CacheStorage, HttpClient, HttpRequest, HttpResponse};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{OfflineError, Result};
use crate::namespace::Namespace;
use crate::policy::{is_cacheable, RoutingDecision};
use crate::request::RequestDescriptor;
use crate::writer::BackgroundWriter;

pub struct StrategyExecutor {
    http: Arc<dyn HttpClient>,
    storage: Arc<dyn CacheStorage>,
    namespace: Namespace,
    fallback: Option<CacheKey>,
    cache_api_responses: bool,
    writer: BackgroundWriter,
    events: EventBus,
}

impl StrategyExecutor {
    pub fn new(
        http: Arc<dyn HttpClient>,
        storage: Arc<dyn CacheStorage>,
        namespace: Namespace,
        fallback: Option<CacheKey>,
        cache_api_responses: bool,
        events: EventBus,
    ) -> Self {
        let writer = BackgroundWriter::new(Arc::clone(&storage), namespace.clone(), events.clone());
        Self {
            http,
            storage,
            namespace,
            fallback,
            cache_api_responses,
            writer,
            events,
        }
    }

    pub fn writer(&self) -> &BackgroundWriter {
        &self.writer
    }

    /// Serve `request` according to `decision`.
    ///
    /// # Errors
    ///
    /// [`OfflineError::Fetch`] with the host's error when the network failed
    /// and nothing stored could stand in for it.
    #[instrument(
        skip(self, decision, descriptor, request),
        fields(decision = %decision, url = %redact_url(descriptor.url.as_str()))
    )]
    pub async fn execute(
        &self,
        decision: RoutingDecision,
        descriptor: &RequestDescriptor,
        request: HttpRequest,
    ) -> Result<HttpResponse> {
        let request = descriptor.rebase(&request);
        match decision {
            RoutingDecision::Passthrough => self.fetch(request).await,
            RoutingDecision::CacheFirst => self.cache_first(descriptor, request, false).await,
            RoutingDecision::OfflineFallback => self.cache_first(descriptor, request, true).await,
            RoutingDecision::NetworkFirst => self.network_first(descriptor, request).await,
        }
    }

    async fn cache_first(
        &self,
        descriptor: &RequestDescriptor,
        request: HttpRequest,
        with_fallback: bool,
    ) -> Result<HttpResponse> {
        let key = descriptor.cache_key();
        let url = redact_url(&key.url);

        if let Some(stored) = self.lookup(&key).await {
            debug!("Serving from cache");
            self.emit(CacheEvent::Hit { url });
            return Ok(stored);
        }

        self.emit(CacheEvent::Miss { url: url.clone() });

        match self.fetch(request).await {
            Ok(response) => {
                self.store_if_cacheable(key, &response);
                Ok(response)
            }
            Err(err) if with_fallback => match self.fallback_document().await {
                Some((served, document)) => {
                    warn!(error = %err, served = %served, "Network failed, serving offline document");
                    self.emit(CacheEvent::FallbackServed { url, served });
                    Ok(document)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    async fn network_first(
        &self,
        descriptor: &RequestDescriptor,
        request: HttpRequest,
    ) -> Result<HttpResponse> {
        let key = descriptor.cache_key();

        let err = match self.fetch(request).await {
            Ok(response) => {
                if self.cache_api_responses {
                    self.store_if_cacheable(key, &response);
                }
                return Ok(response);
            }
            Err(err) => err,
        };

        let url = redact_url(&key.url);
        if let Some(stored) = self.lookup(&key).await {
            warn!(error = %err, "Network failed, serving stored response");
            self.emit(CacheEvent::FallbackServed {
                url: url.clone(),
                served: url,
            });
            return Ok(stored);
        }

        match self.fallback_document().await {
            Some((served, document)) => {
                warn!(error = %err, served = %served, "Network failed, serving offline document");
                self.emit(CacheEvent::FallbackServed { url, served });
                Ok(document)
            }
            None => Err(err),
        }
    }

    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.http.execute(request).await.map_err(OfflineError::Fetch)
    }

    /// Stored response for `key`. A store that cannot be read counts as a
    /// miss.
    async fn lookup(&self, key: &CacheKey) -> Option<HttpResponse> {
        let result = match self.storage.open(self.namespace.as_str()).await {
            Ok(cache) => cache.get(key).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    namespace = %self.namespace,
                    key = %redact_url(&key.url),
                    error = %e,
                    "Cache read failed, treating as miss"
                );
                None
            }
        }
    }

    async fn fallback_document(&self) -> Option<(String, HttpResponse)> {
        let key = self.fallback.as_ref()?;
        let document = self.lookup(key).await?;
        Some((redact_url(&key.url), document))
    }

    fn store_if_cacheable(&self, key: CacheKey, response: &HttpResponse) {
        if is_cacheable(response) {
            self.writer.schedule(key, response.clone());
        } else {
            debug!(
                status = response.status,
                response_type = ?response.response_type,
                "Response not cacheable"
            );
        }
    }

    fn emit(&self, event: CacheEvent) {
        self.events.emit(CoreEvent::Cache(event)).ok();
    }
}
