//! Shared fakes for core-offline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::MemoryCacheStorage;
use bridge_traits::error::Result;
use bridge_traits::{
    BridgeError, Cache, CacheKey, CacheStorage, HttpClient, HttpMethod, HttpRequest, HttpResponse,
};
use core_runtime::config::OfflineConfig;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

pub const ORIGIN: &str = "https://app.example";

pub fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

/// A network that answers from a per-URL script and can be switched off.
pub struct ScriptedNetwork {
    responses: Mutex<HashMap<String, HttpResponse>>,
    online: AtomicBool,
    calls: Mutex<Vec<(HttpMethod, String)>>,
}

impl ScriptedNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Serve `body` with status 200 for `path` on the app origin.
    pub fn serve(&self, path: &str, body: &'static str) {
        self.respond(path, HttpResponse::new(200, body));
    }

    pub fn respond(&self, path: &str, response: HttpResponse) {
        self.responses.lock().unwrap().insert(url(path), response);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(HttpMethod, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl HttpClient for ScriptedNetwork {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((request.method, request.url.clone()));

        if !self.online.load(Ordering::SeqCst) {
            return Err(BridgeError::Network("network unreachable".to_string()));
        }

        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| HttpResponse::new(404, "not found")))
    }
}

/// Wraps a [`ScriptedNetwork`] and holds the first request for one URL until
/// [`GatedNetwork::release`] is called.
pub struct GatedNetwork {
    inner: Arc<ScriptedNetwork>,
    gated_url: String,
    armed: AtomicBool,
    entered: Notify,
    released: Semaphore,
}

impl GatedNetwork {
    pub fn new(inner: Arc<ScriptedNetwork>, path: &str) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gated_url: url(path),
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            released: Semaphore::new(0),
        })
    }

    /// Resolves once the gated request is being held.
    pub async fn held(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.add_permits(1);
    }
}

#[async_trait]
impl HttpClient for GatedNetwork {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        if request.url == self.gated_url && self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.released
                .acquire()
                .await
                .map_err(|e| BridgeError::Network(e.to_string()))?
                .forget();
        }
        self.inner.execute(request).await
    }
}

/// In-memory storage that counts entry reads and writes and can be told to
/// reject writes for particular URLs.
#[derive(Clone)]
pub struct RecordingStorage {
    inner: MemoryCacheStorage,
    counters: Arc<Counters>,
}

#[derive(Default)]
pub struct Counters {
    reads: AtomicUsize,
    writes: AtomicUsize,
    rejected: Mutex<HashSet<String>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryCacheStorage::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn reads(&self) -> usize {
        self.counters.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.counters.writes.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.counters.reads.store(0, Ordering::SeqCst);
        self.counters.writes.store(0, Ordering::SeqCst);
    }

    pub fn reject_writes_for(&self, path: &str) {
        self.counters.rejected.lock().unwrap().insert(url(path));
    }

    pub fn accept_all_writes(&self) {
        self.counters.rejected.lock().unwrap().clear();
    }

    /// Read an entry without touching the counters.
    pub async fn peek(&self, namespace: &str, path: &str) -> Option<HttpResponse> {
        if !self.inner.has(namespace).await.unwrap() {
            return None;
        }
        let cache = self.inner.open(namespace).await.unwrap();
        cache.get(&CacheKey::get(url(path))).await.unwrap()
    }

    /// Write an entry without touching the counters.
    pub async fn seed(&self, namespace: &str, path: &str, response: HttpResponse) {
        let cache = self.inner.open(namespace).await.unwrap();
        cache.put(CacheKey::get(url(path)), response).await.unwrap();
    }

    pub async fn namespaces(&self) -> Vec<String> {
        self.inner.keys().await.unwrap()
    }
}

#[async_trait]
impl CacheStorage for RecordingStorage {
    async fn open(&self, namespace: &str) -> Result<Arc<dyn Cache>> {
        let inner = self.inner.open(namespace).await?;
        Ok(Arc::new(RecordingCache {
            inner,
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn has(&self, namespace: &str) -> Result<bool> {
        self.inner.has(namespace).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn delete(&self, namespace: &str) -> Result<bool> {
        self.inner.delete(namespace).await
    }
}

struct RecordingCache {
    inner: Arc<dyn Cache>,
    counters: Arc<Counters>,
}

#[async_trait]
impl Cache for RecordingCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<HttpResponse>> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: CacheKey, response: HttpResponse) -> Result<()> {
        if self.counters.rejected.lock().unwrap().contains(&key.url) {
            return Err(BridgeError::Storage("quota exceeded".to_string()));
        }
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, response).await
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        self.inner.keys().await
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.inner.delete(key).await
    }
}

/// Config on the test origin with explicit version `v1`.
pub fn config(
    network: &Arc<ScriptedNetwork>,
    storage: &RecordingStorage,
    manifest: &[&str],
    fallback: Option<&str>,
) -> OfflineConfig {
    config_with_http(network.clone(), storage, manifest, fallback)
}

pub fn config_with_http(
    http: Arc<dyn HttpClient>,
    storage: &RecordingStorage,
    manifest: &[&str],
    fallback: Option<&str>,
) -> OfflineConfig {
    let mut builder = OfflineConfig::builder()
        .cache_prefix("shell")
        .version("v1")
        .origin(ORIGIN)
        .manifest(manifest.iter().copied())
        .http_client(http)
        .cache_storage(Arc::new(storage.clone()));
    if let Some(fallback) = fallback {
        builder = builder.offline_fallback(fallback);
    }
    builder.build().unwrap()
}
