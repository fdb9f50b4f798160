//! Fire-and-forget cache writes.
//!
//! A response served from the network is returned to the client first and
//! stored afterwards on a detached task. Dropping the request future does
//! not cancel the write. Failures never reach the request; they are logged
//! and published as [`CacheEvent::WriteFailed`].

use bridge_traits::{CacheKey, CacheStorage, HttpResponse};
use core_async::sync::Notify;
use core_async::task::TaskTracker;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::namespace::Namespace;

#[derive(Clone)]
pub struct BackgroundWriter {
    storage: Arc<dyn CacheStorage>,
    namespace: Namespace,
    tracker: TaskTracker,
    in_flight: Arc<InFlight>,
    events: EventBus,
}

/// Count of scheduled writes that have not finished yet.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Held by a write task; the count drops when the task ends or is cancelled.
struct WriteGuard(Arc<InFlight>);

impl WriteGuard {
    fn acquire(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl BackgroundWriter {
    pub fn new(storage: Arc<dyn CacheStorage>, namespace: Namespace, events: EventBus) -> Self {
        Self {
            storage,
            namespace,
            tracker: TaskTracker::new(),
            in_flight: Arc::default(),
            events,
        }
    }

    /// Store `response` under `key` in the current namespace without waiting.
    pub fn schedule(&self, key: CacheKey, response: HttpResponse) {
        let storage = Arc::clone(&self.storage);
        let namespace = self.namespace.clone();
        let events = self.events.clone();
        let guard = WriteGuard::acquire(&self.in_flight);

        self.tracker.spawn(async move {
            let _guard = guard;
            let url = redact_url(&key.url);
            let result = match storage.open(namespace.as_str()).await {
                Ok(cache) => cache.put(key, response).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    debug!(namespace = %namespace, url = %url, "Stored response");
                    events
                        .emit(CoreEvent::Cache(CacheEvent::Stored {
                            namespace: namespace.to_string(),
                            url,
                        }))
                        .ok();
                }
                Err(e) => {
                    warn!(
                        namespace = %namespace,
                        url = %url,
                        error = %e,
                        "Background cache write failed"
                    );
                    events
                        .emit(CoreEvent::Cache(CacheEvent::WriteFailed {
                            namespace: namespace.to_string(),
                            url,
                            message: e.to_string(),
                        }))
                        .ok();
                }
            }
        });
    }

    /// Number of writes still in flight.
    pub fn pending(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until no write is in flight.
    ///
    /// Writes scheduled while waiting are waited for as well. Any number of
    /// callers may wait at once.
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the check so a wakeup in between is not lost.
            let idle = self.in_flight.idle.notified();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::MemoryCacheStorage;
    use bridge_traits::{BridgeError, Cache};
    use core_runtime::events::EventStream;

    struct BrokenStorage;

    #[async_trait::async_trait]
    impl CacheStorage for BrokenStorage {
        async fn open(&self, _namespace: &str) -> bridge_traits::error::Result<Arc<dyn Cache>> {
            Err(BridgeError::Storage("disk full".to_string()))
        }
        async fn has(&self, _namespace: &str) -> bridge_traits::error::Result<bool> {
            Ok(false)
        }
        async fn keys(&self) -> bridge_traits::error::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn delete(&self, _namespace: &str) -> bridge_traits::error::Result<bool> {
            Ok(false)
        }
    }

    #[core_async::test]
    async fn test_scheduled_write_lands_after_wait_idle() {
        let storage = MemoryCacheStorage::new();
        let writer = BackgroundWriter::new(
            Arc::new(storage.clone()),
            Namespace::from("shell-v1"),
            EventBus::new(16),
        );
        let key = CacheKey::get("https://app.example/app.js");

        writer.schedule(key.clone(), HttpResponse::new(200, "console.log(1)"));
        writer.wait_idle().await;

        assert_eq!(writer.pending(), 0);
        let cache = storage.open("shell-v1").await.unwrap();
        let stored = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.body.as_ref(), b"console.log(1)");
    }

    #[core_async::test]
    async fn test_failed_write_is_published() {
        let bus = EventBus::new(16);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Cache(CacheEvent::WriteFailed { .. })));
        let writer = BackgroundWriter::new(Arc::new(BrokenStorage), Namespace::from("shell-v1"), bus);

        writer.schedule(CacheKey::get("https://app.example/a.css"), HttpResponse::new(200, "a{}"));
        writer.wait_idle().await;

        match stream.recv().await.unwrap() {
            CoreEvent::Cache(CacheEvent::WriteFailed { namespace, url, .. }) => {
                assert_eq!(namespace, "shell-v1");
                assert_eq!(url, "https://app.example/a.css");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[core_async::test]
    async fn test_writer_accepts_work_after_wait_idle() {
        let storage = MemoryCacheStorage::new();
        let writer = BackgroundWriter::new(
            Arc::new(storage.clone()),
            Namespace::from("shell-v1"),
            EventBus::new(16),
        );

        writer.wait_idle().await;
        writer.schedule(CacheKey::get("https://app.example/b.js"), HttpResponse::new(200, "b"));
        writer.wait_idle().await;

        let cache = storage.open("shell-v1").await.unwrap();
        assert_eq!(cache.keys().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_waiters_all_return() {
        let storage = MemoryCacheStorage::new();
        let writer = BackgroundWriter::new(
            Arc::new(storage.clone()),
            Namespace::from("shell-v1"),
            EventBus::new(256),
        );

        for round in 0..20 {
            for i in 0..8 {
                writer.schedule(
                    CacheKey::get(format!("https://app.example/{round}/{i}.js")),
                    HttpResponse::new(200, "x"),
                );
            }
            let waiters: Vec<_> = (0..4)
                .map(|_| {
                    let writer = writer.clone();
                    tokio::spawn(async move { writer.wait_idle().await })
                })
                .collect();
            for waiter in waiters {
                tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
                    .await
                    .expect("wait_idle did not return")
                    .unwrap();
            }
            assert_eq!(writer.pending(), 0);
        }

        let cache = storage.open("shell-v1").await.unwrap();
        assert_eq!(cache.keys().await.unwrap().len(), 160);
    }
}
