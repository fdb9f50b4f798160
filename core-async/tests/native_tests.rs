//! Integration tests for the runtime facade.

use core_async::{sync, task, time};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[core_async::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[core_async::test]
async fn test_dropped_handle_still_completes() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = sync::oneshot::channel();

    let task_counter = Arc::clone(&counter);
    drop(task::spawn(async move {
        task_counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(());
    }));

    rx.await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[core_async::test]
async fn test_task_tracker_waits_for_detached_work() {
    let tracker = task::TaskTracker::new();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let counter = Arc::clone(&counter);
        tracker.spawn(async move {
            time::sleep(time::Duration::from_millis(5)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    tracker.close();
    tracker.wait().await;
    assert_eq!(counter.load(Ordering::SeqCst), 5);
}

#[core_async::test]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(200)).await;
    })
    .await;

    assert!(result.is_err());
}

#[core_async::test]
async fn test_rwlock_allows_concurrent_readers() {
    let lock = Arc::new(sync::RwLock::new(5));
    let first = lock.read().await;
    let second = lock.read().await;
    assert_eq!(*first + *second, 10);
}
