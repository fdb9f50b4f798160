//! In-memory cache storage
//!
//! Backs tests and short-lived hosts. Contents are lost when the storage is
//! dropped.

use async_trait::async_trait;
use bridge_traits::{
    cache_storage::{Cache, CacheKey, CacheStorage},
    error::Result,
    http::HttpResponse,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One namespace held in memory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, HttpResponse>>,
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<HttpResponse>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: CacheKey, response: HttpResponse) -> Result<()> {
        self.entries.write().await.insert(key, response);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}

/// [`CacheStorage`] keeping every namespace in process memory.
///
/// A handle returned by [`CacheStorage::open`] stays usable after its
/// namespace is deleted, but writes through it are no longer reachable from
/// the storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryCacheStorage {
    namespaces: Arc<RwLock<HashMap<String, Arc<MemoryCache>>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, namespace: &str) -> Result<Arc<dyn Cache>> {
        if let Some(cache) = self.namespaces.read().await.get(namespace) {
            return Ok(cache.clone());
        }

        let mut namespaces = self.namespaces.write().await;
        let cache = namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::default()))
            .clone();
        Ok(cache)
    }

    async fn has(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces.read().await.contains_key(namespace))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces.write().await.remove(namespace).is_some())
    }
}
