//! Host event dispatch through `OfflineWorker`.

mod common;

use async_trait::async_trait;
use bridge_desktop::{DesktopClientControl, FsCacheStorage, MemoryCacheStorage};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{CacheStorage, HttpClient, HttpRequest, HttpResponse};
use common::{url, ScriptedNetwork};
use core_offline::{HostEvent, HostReply, OfflineError, OfflineWorker, SyncOutcome, SyncProcedure};
use core_runtime::config::OfflineConfig;
use core_runtime::events::EventBus;
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

struct FlakyOutbox {
    runs: AtomicUsize,
    fail_first: bool,
}

#[async_trait]
impl SyncProcedure for FlakyOutbox {
    async fn run(&self, _tag: &str) -> anyhow::Result<()> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail_first && run == 0 {
            anyhow::bail!("POST /api/outbox returned 503");
        }
        Ok(())
    }
}

fn builder(http: Arc<dyn HttpClient>, storage: Arc<dyn CacheStorage>) -> core_runtime::config::OfflineConfigBuilder {
    OfflineConfig::builder()
        .cache_prefix("shell")
        .origin(common::ORIGIN)
        .manifest(["/", "/app.js"])
        .http_client(http)
        .cache_storage(storage)
}

#[core_async::test]
async fn test_provision_fetches_each_manifest_entry_once() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| request.url == url("/"))
        .times(1)
        .returning(|_| Ok(HttpResponse::new(200, "<html>")));
    http.expect_execute()
        .withf(|request| request.url == url("/app.js"))
        .times(1)
        .returning(|_| Ok(HttpResponse::new(200, "app")));

    let config = builder(Arc::new(http), Arc::new(MemoryCacheStorage::new()))
        .version("v1")
        .build()
        .unwrap();
    let worker = OfflineWorker::new(config, EventBus::default());

    let reply = worker.handle(HostEvent::Provision).await.unwrap();
    match reply {
        HostReply::Provisioned(report) => {
            assert_eq!(report.namespace, "shell-v1");
            assert_eq!(report.entries, 2);
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    let reply = worker
        .handle(HostEvent::Intercept(HttpRequest::get("/app.js")))
        .await
        .unwrap();
    assert_eq!(reply, HostReply::Response(HttpResponse::new(200, "app")));
}

#[core_async::test]
async fn test_activate_claims_clients_and_skips_waiting() {
    let network = ScriptedNetwork::new();
    network.serve("/", "<html>");
    network.serve("/app.js", "app");
    let control = Arc::new(DesktopClientControl::new());
    control.register_client();
    control.register_client();

    let config = builder(network.clone(), Arc::new(MemoryCacheStorage::new()))
        .version("v1")
        .skip_waiting(true)
        .claim_clients(true)
        .client_control(control.clone())
        .build()
        .unwrap();
    let worker = OfflineWorker::new(config, EventBus::default());

    worker.handle(HostEvent::Provision).await.unwrap();
    assert!(control.skipped_waiting());

    match worker.handle(HostEvent::Activate).await.unwrap() {
        HostReply::Activated(report) => assert_eq!(report.clients_claimed, 2),
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(control.claimed(), 2);
}

#[core_async::test]
async fn test_new_version_prunes_previous_on_disk() {
    let root = std::env::temp_dir().join(format!("offline-shell-worker-{}", uuid::Uuid::new_v4()));
    let documents = root.join("Documents");
    std::fs::create_dir_all(&documents).unwrap();
    std::fs::write(documents.join("report.txt"), "keep me").unwrap();
    let storage: Arc<dyn CacheStorage> = Arc::new(FsCacheStorage::new(&root));
    let network = ScriptedNetwork::new();
    network.serve("/", "<html>");
    network.serve("/app.js", "app v1");

    let v1 = OfflineWorker::new(
        builder(network.clone(), storage.clone())
            .version("v1")
            .build()
            .unwrap(),
        EventBus::default(),
    );
    v1.handle(HostEvent::Provision).await.unwrap();
    v1.handle(HostEvent::Activate).await.unwrap();

    network.serve("/app.js", "app v2");
    let v2 = OfflineWorker::new(
        builder(network.clone(), storage.clone())
            .version("v2")
            .build()
            .unwrap(),
        EventBus::default(),
    );
    v2.handle(HostEvent::Provision).await.unwrap();

    // v1 keeps serving until v2 activates.
    assert_eq!(
        storage.keys().await.unwrap(),
        vec!["shell-v1".to_string(), "shell-v2".to_string()]
    );

    match v2.handle(HostEvent::Activate).await.unwrap() {
        HostReply::Activated(report) => assert_eq!(report.deleted, vec!["shell-v1".to_string()]),
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(storage.keys().await.unwrap(), vec!["shell-v2".to_string()]);
    assert!(documents.join("report.txt").exists());

    network.set_online(false);
    let reply = v2
        .handle(HostEvent::Intercept(HttpRequest::get("/app.js")))
        .await
        .unwrap();
    assert_eq!(reply, HostReply::Response(HttpResponse::new(200, "app v2")));

    std::fs::remove_dir_all(&root).ok();
}

#[core_async::test]
async fn test_derived_version_follows_manifest() {
    let network = ScriptedNetwork::new();
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());

    let first = builder(network.clone(), storage.clone()).build().unwrap();
    let same = builder(network.clone(), storage.clone()).build().unwrap();
    let changed = builder(network.clone(), storage.clone())
        .manifest_entry("/style.css")
        .build()
        .unwrap();

    let namespace = |config: OfflineConfig| {
        OfflineWorker::new(config, EventBus::default())
            .controller()
            .namespace()
            .to_string()
    };
    let first = namespace(first);
    assert_eq!(first, namespace(same));
    assert_ne!(first, namespace(changed));
    assert!(first.starts_with("shell-"));
}

#[core_async::test]
async fn test_sync_signal_runs_procedure() {
    let network = ScriptedNetwork::new();
    let outbox = Arc::new(FlakyOutbox {
        runs: AtomicUsize::new(0),
        fail_first: false,
    });
    let worker = OfflineWorker::new(
        builder(network, Arc::new(MemoryCacheStorage::new()))
            .build()
            .unwrap(),
        EventBus::default(),
    )
    .with_sync_procedure(outbox.clone());

    let reply = worker
        .handle(HostEvent::Sync("sync-data".to_string()))
        .await
        .unwrap();
    assert_eq!(reply, HostReply::Sync(SyncOutcome::Completed));

    let reply = worker
        .handle(HostEvent::Sync("unrelated".to_string()))
        .await
        .unwrap();
    assert_eq!(reply, HostReply::Sync(SyncOutcome::Ignored));

    assert_eq!(outbox.runs.load(Ordering::SeqCst), 1);
}

#[core_async::test]
async fn test_failed_sync_is_reported_and_retried() {
    let network = ScriptedNetwork::new();
    let outbox = Arc::new(FlakyOutbox {
        runs: AtomicUsize::new(0),
        fail_first: true,
    });
    let worker = OfflineWorker::new(
        builder(network, Arc::new(MemoryCacheStorage::new()))
            .sync_tag("outbox")
            .build()
            .unwrap(),
        EventBus::default(),
    )
    .with_sync_procedure(outbox.clone());

    let err = worker
        .handle(HostEvent::Sync("outbox".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, OfflineError::SyncProcedure { ref tag, .. } if tag == "outbox"));

    let reply = worker
        .handle(HostEvent::Sync("outbox".to_string()))
        .await
        .unwrap();
    assert_eq!(reply, HostReply::Sync(SyncOutcome::Completed));
    assert_eq!(outbox.runs.load(Ordering::SeqCst), 2);
}

#[core_async::test]
async fn test_connectivity_watch_needs_a_monitor() {
    let worker = OfflineWorker::new(
        builder(ScriptedNetwork::new(), Arc::new(MemoryCacheStorage::new()))
            .build()
            .unwrap(),
        EventBus::default(),
    );

    assert!(worker.start_connectivity_watch().is_none());
}
