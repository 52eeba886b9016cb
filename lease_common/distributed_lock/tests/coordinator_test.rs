use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use distributed_lock::{DistributedLockError, InstanceId, LockCoordinator, LockOptions};
use lease_store::{LeaseStore, MemoryStore, StoreError};
use mockall::mock;
use tokio::time::Instant;

mock! {
    pub Store {}

    #[async_trait]
    impl LeaseStore for Store {
        async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> lease_store::Result<bool>;
        async fn get(&self, key: &str) -> lease_store::Result<Option<String>>;
        async fn delete(&self, key: &str) -> lease_store::Result<()>;
        async fn delete_if_value(&self, key: &str, value: &str) -> lease_store::Result<bool>;
        async fn expire_if_value(&self, key: &str, value: &str, ttl: Duration) -> lease_store::Result<bool>;
        async fn ttl(&self, key: &str) -> lease_store::Result<Option<Duration>>;
    }
}

/// A store whose calls never complete
struct StalledStore;

#[async_trait]
impl LeaseStore for StalledStore {
    async fn set_if_absent(&self, _key: &str, _value: &str, _ttl: Duration) -> lease_store::Result<bool> {
        std::future::pending().await
    }
    async fn get(&self, _key: &str) -> lease_store::Result<Option<String>> {
        std::future::pending().await
    }
    async fn delete(&self, _key: &str) -> lease_store::Result<()> {
        std::future::pending().await
    }
    async fn delete_if_value(&self, _key: &str, _value: &str) -> lease_store::Result<bool> {
        std::future::pending().await
    }
    async fn expire_if_value(&self, _key: &str, _value: &str, _ttl: Duration) -> lease_store::Result<bool> {
        std::future::pending().await
    }
    async fn ttl(&self, _key: &str) -> lease_store::Result<Option<Duration>> {
        std::future::pending().await
    }
}

fn coordinator(store: &Arc<MemoryStore>, name: &str) -> LockCoordinator {
    let store: Arc<dyn LeaseStore> = store.clone();
    LockCoordinator::new(store, InstanceId::new(name))
}

fn single_attempt() -> LockOptions {
    LockOptions::new().wait_budget(Duration::ZERO)
}

#[tokio::test]
async fn test_concurrent_acquire_grants_one_instance() {
    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();
    for i in 0..8 {
        let coordinator = coordinator(&store, &format!("worker-{}", i));
        handles.push(tokio::spawn(async move {
            coordinator.acquire_lock("my_lock", &single_attempt()).await.unwrap()
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_lease_can_be_acquired_again() {
    let store = Arc::new(MemoryStore::new());
    let first = coordinator(&store, "worker-a");
    let second = coordinator(&store, "worker-b");
    let options = single_attempt().ttl(Duration::from_secs(5));

    let lease = first.acquire_lock("my_lock", &options).await.unwrap();
    assert!(lease.is_some());

    tokio::time::advance(Duration::from_millis(4900)).await;
    assert!(second.acquire_lock("my_lock", &options).await.unwrap().is_none());

    tokio::time::advance(Duration::from_millis(100)).await;
    assert!(second.acquire_lock("my_lock", &options).await.unwrap().is_some());
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let worker = coordinator(&store, "worker-a");

    let lease = worker.acquire_lock("my_lock", &single_attempt()).await.unwrap().unwrap();
    assert!(worker.release_lock(&lease).await.unwrap());
    assert!(!worker.release_lock(&lease).await.unwrap());
    assert!(store.get("my_lock").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_acquire_gives_up_within_wait_budget() {
    let store = Arc::new(MemoryStore::new());
    store.insert_persistent("my_lock", "someone-else");
    let worker = coordinator(&store, "worker-a");
    let options = LockOptions::new()
        .wait_budget(Duration::from_secs(1))
        .retry_interval(Duration::from_millis(100));

    let start = Instant::now();
    let lease = worker.acquire_lock("my_lock", &options).await.unwrap();
    let elapsed = start.elapsed();

    assert!(lease.is_none());
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed <= Duration::from_millis(1100));
    assert_eq!(store.call_count("set_if_absent"), 11);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_succeeds_when_holder_releases_during_wait() {
    let store = Arc::new(MemoryStore::new());
    let holder = coordinator(&store, "worker-a");
    let waiter = coordinator(&store, "worker-b");
    let lease = holder.acquire_lock("my_lock", &single_attempt()).await.unwrap().unwrap();

    let waiting = tokio::spawn(async move {
        let options = LockOptions::new().wait_budget(Duration::from_secs(2));
        waiter.acquire_lock("my_lock", &options).await.unwrap()
    });

    tokio::time::sleep(Duration::from_millis(250)).await;
    holder.release_lock(&lease).await.unwrap();

    let granted = waiting.await.unwrap().expect("waiter should get the lock");
    assert!(granted.token().starts_with("worker-b:"));
}

#[tokio::test]
async fn test_zero_wait_budget_makes_one_attempt() {
    let store = Arc::new(MemoryStore::new());
    store.insert_persistent("my_lock", "someone-else");
    let worker = coordinator(&store, "worker-a");

    assert!(worker.acquire_lock("my_lock", &single_attempt()).await.unwrap().is_none());
    assert_eq!(store.call_count("set_if_absent"), 1);
}

#[tokio::test]
async fn test_store_outage_is_not_reported_as_held() {
    let store = Arc::new(MemoryStore::new());
    store.set_available(false);
    let worker = coordinator(&store, "worker-a");
    let options = LockOptions::new().wait_budget(Duration::from_secs(5));

    let result = worker.acquire_lock("my_lock", &options).await;
    assert!(matches!(result, Err(DistributedLockError::StoreUnavailable(_))));
    assert_eq!(store.call_count("set_if_absent"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_store_is_bounded_by_store_timeout() {
    let store: Arc<dyn LeaseStore> = Arc::new(StalledStore);
    let worker = LockCoordinator::new(store, InstanceId::new("worker-a")).with_store_timeout(Duration::from_millis(300));

    let result = worker.acquire_lock("my_lock", &LockOptions::default()).await;
    match result {
        Err(DistributedLockError::StoreUnavailable(StoreError::Timeout(msg))) => assert!(msg.contains("set_if_absent")),
        other => panic!("expected a store timeout, got {:?}", other.map(|lease| lease.is_some())),
    }
}

#[tokio::test(start_paused = true)]
async fn test_late_release_does_not_remove_new_holder() {
    let store = Arc::new(MemoryStore::new());
    let slow = coordinator(&store, "worker-a");
    let next = coordinator(&store, "worker-b");
    let options = single_attempt().ttl(Duration::from_secs(1));

    let stale = slow.acquire_lock("my_lock", &options).await.unwrap().unwrap();
    tokio::time::advance(Duration::from_secs(1)).await;
    let current = next.acquire_lock("my_lock", &options).await.unwrap().unwrap();

    assert!(!slow.release_lock(&stale).await.unwrap());
    assert_eq!(store.get("my_lock").await.unwrap().as_deref(), Some(current.token()));
}

#[tokio::test(start_paused = true)]
async fn test_extend_keeps_lease_alive() {
    let store = Arc::new(MemoryStore::new());
    let worker = coordinator(&store, "worker-a");
    let other = coordinator(&store, "worker-b");
    let options = single_attempt().ttl(Duration::from_secs(2));

    let lease = worker.acquire_lock("my_lock", &options).await.unwrap().unwrap();
    tokio::time::advance(Duration::from_secs(1)).await;
    let renewed = worker.extend_lock(&lease, Duration::from_secs(5)).await.unwrap().unwrap();
    assert_eq!(renewed.ttl(), Duration::from_secs(5));

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(other.acquire_lock("my_lock", &options).await.unwrap().is_none());
    assert_eq!(worker.lock_ttl("my_lock").await.unwrap(), Some(Duration::from_secs(2)));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(worker.extend_lock(&renewed, Duration::from_secs(5)).await.unwrap().is_none());
    assert_eq!(worker.lock_ttl("my_lock").await.unwrap(), None);
}

#[tokio::test]
async fn test_empty_key_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let worker = coordinator(&store, "worker-a");
    let result = worker.acquire_lock("", &LockOptions::default()).await;
    assert!(matches!(result, Err(DistributedLockError::InvalidArgument(_))));
    assert_eq!(store.call_count("set_if_absent"), 0);
}

#[tokio::test]
async fn test_with_lock_releases_after_body_error() {
    let store = Arc::new(MemoryStore::new());
    let worker = coordinator(&store, "worker-a");

    let outcome = worker
        .with_lock("my_lock", &single_attempt(), || async { Err::<(), String>("body failed".to_string()) })
        .await
        .unwrap();

    assert_eq!(outcome, Some(Err("body failed".to_string())));
    assert_eq!(store.call_count("delete_if_value"), 1);
    assert!(store.get("my_lock").await.unwrap().is_none());
}

#[tokio::test]
async fn test_with_lock_releases_when_body_panics() {
    let store = Arc::new(MemoryStore::new());
    let worker = Arc::new(coordinator(&store, "worker-a"));

    let task_worker = Arc::clone(&worker);
    let handle = tokio::spawn(async move {
        task_worker
            .with_lock("my_lock", &single_attempt(), || async {
                panic!("task body exploded");
            })
            .await
    });

    let joined = handle.await;
    assert!(joined.unwrap_err().is_panic());
    assert_eq!(store.call_count("delete_if_value"), 1);
    assert!(store.get("my_lock").await.unwrap().is_none());
}

#[tokio::test]
async fn test_with_lock_skips_body_when_not_granted() {
    let store = Arc::new(MemoryStore::new());
    store.insert_persistent("my_lock", "someone-else");
    let worker = coordinator(&store, "worker-a");
    let runs = AtomicU32::new(0);

    let outcome = worker
        .with_lock("my_lock", &single_attempt(), || async {
            runs.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(store.call_count("delete_if_value"), 0);
}

#[tokio::test]
async fn test_dropped_guard_releases_in_background() {
    let store = Arc::new(MemoryStore::new());
    let worker = coordinator(&store, "worker-a");

    let guard = worker.lock_guard("my_lock", &single_attempt()).await.unwrap().unwrap();
    drop(guard);

    for _ in 0..10 {
        if store.get("my_lock").await.unwrap().is_none() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(store.get("my_lock").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_guard_extend_and_release() {
    let store = Arc::new(MemoryStore::new());
    let worker = coordinator(&store, "worker-a");

    let mut guard = worker
        .lock_guard("my_lock", &single_attempt().ttl(Duration::from_secs(1)))
        .await
        .unwrap()
        .unwrap();
    assert!(guard.extend(Duration::from_secs(10)).await.unwrap());
    assert_eq!(guard.lease().ttl(), Duration::from_secs(10));

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(guard.release().await.unwrap());
    assert!(store.get("my_lock").await.unwrap().is_none());
}

#[tokio::test]
async fn test_release_failure_is_reported() {
    let mut mock = MockStore::new();
    mock.expect_set_if_absent().returning(|_, _, _| Ok(true));
    mock.expect_delete_if_value()
        .times(1)
        .returning(|_, _| Err(StoreError::Unavailable("connection reset".to_string())));
    let store: Arc<dyn LeaseStore> = Arc::new(mock);
    let worker = LockCoordinator::new(store, InstanceId::new("worker-a"));

    let lease = worker.acquire_lock("my_lock", &single_attempt()).await.unwrap().unwrap();
    let result = worker.release_lock(&lease).await;
    assert!(matches!(result, Err(DistributedLockError::ReleaseFailed(_))));
}

#[tokio::test]
async fn test_with_lock_does_not_escalate_release_failure() {
    let mut mock = MockStore::new();
    mock.expect_set_if_absent()
        .withf(|key, value, ttl| key == "my_lock" && value.starts_with("worker-a:") && *ttl == Duration::from_secs(5))
        .returning(|_, _, _| Ok(true));
    mock.expect_delete_if_value()
        .times(1)
        .returning(|_, _| Err(StoreError::Unavailable("connection reset".to_string())));
    let store: Arc<dyn LeaseStore> = Arc::new(mock);
    let worker = LockCoordinator::new(store, InstanceId::new("worker-a"));

    let outcome = worker.with_lock("my_lock", &single_attempt(), || async { 42 }).await.unwrap();
    assert_eq!(outcome, Some(42));
}
