use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use distributed_lock::{DistributedLockError, InstanceId, LockCoordinator, LockOptions};
use lease_store::{LeaseStore, MemoryStore};
use schedule_job::{boxed_task, BoxedTask, FiringOutcome, JobError, ScheduledTaskRunner, SchedulerBuilders, SchedulerConfig};
use tokio::time::sleep;

const LOCK_KEY: &str = "my_lock";

fn lock_options() -> LockOptions {
    LockOptions::new()
        .ttl(Duration::from_secs(5))
        .wait_budget(Duration::from_millis(500))
        .retry_interval(Duration::from_millis(100))
}

fn sleeping_body(runs: &Arc<AtomicU32>, duration: Duration) -> BoxedTask {
    let runs = Arc::clone(runs);
    boxed_task(move || {
        let runs = Arc::clone(&runs);
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
            sleep(duration).await;
            Ok(())
        }
    })
}

fn runner(store: &Arc<MemoryStore>, instance: &str, body: BoxedTask) -> ScheduledTaskRunner {
    let store: Arc<dyn LeaseStore> = store.clone();
    let coordinator = Arc::new(LockCoordinator::new(store, InstanceId::new(instance)));
    ScheduledTaskRunner::new("report", coordinator, LOCK_KEY, lock_options(), body)
}

#[tokio::test(start_paused = true)]
async fn test_simultaneous_firings_execute_once() {
    let store = Arc::new(MemoryStore::new());
    let runs = Arc::new(AtomicU32::new(0));
    let first = runner(&store, "instance-a", sleeping_body(&runs, Duration::from_secs(2)));
    let second = runner(&store, "instance-b", sleeping_body(&runs, Duration::from_secs(2)));

    for round in 0..2 {
        let (a, b) = tokio::join!(first.fire(), second.fire());
        let executed = [&a, &b].iter().filter(|outcome| outcome.is_executed()).count();
        let skipped = [&a, &b].iter().filter(|outcome| outcome.is_skipped()).count();
        assert_eq!((executed, skipped), (1, 1), "round {} should run the body once", round);
        assert_eq!(runs.load(Ordering::SeqCst), round + 1);
        assert!(store.get(LOCK_KEY).await.unwrap().is_none(), "winner must release the lock");

        sleep(Duration::from_secs(8)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_body_error_propagates_and_releases() {
    let store = Arc::new(MemoryStore::new());
    let failing = boxed_task(|| async { Err(JobError::ExecutionError("report generation failed".to_string())) });
    let worker = runner(&store, "instance-a", failing);

    match worker.fire().await {
        FiringOutcome::Executed(Err(e)) => assert!(e.to_string().contains("report generation failed")),
        other => panic!("expected a failed execution, got {:?}", other),
    }
    assert_eq!(store.call_count("delete_if_value"), 1);
    assert!(store.get(LOCK_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_store_outage_is_reported_separately() {
    let store = Arc::new(MemoryStore::new());
    store.set_available(false);
    let runs = Arc::new(AtomicU32::new(0));
    let worker = runner(&store, "instance-a", sleeping_body(&runs, Duration::ZERO));

    let outcome = worker.fire().await;
    assert!(matches!(outcome, FiringOutcome::AcquireFailed(DistributedLockError::StoreUnavailable(_))));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_crashed_holder_blocks_until_ttl() {
    let store = Arc::new(MemoryStore::new());
    store.set_if_absent(LOCK_KEY, "crashed-instance:token", Duration::from_secs(5)).await.unwrap();
    let runs = Arc::new(AtomicU32::new(0));
    let worker = runner(&store, "instance-a", sleeping_body(&runs, Duration::from_secs(1)));

    assert!(worker.fire().await.is_skipped());

    sleep(Duration::from_secs(5)).await;
    assert!(worker.fire().await.is_executed());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_into_task_maps_outcomes() {
    let store = Arc::new(MemoryStore::new());
    let runs = Arc::new(AtomicU32::new(0));

    let task = runner(&store, "instance-a", sleeping_body(&runs, Duration::ZERO)).into_task();
    assert!(task().await.is_ok());
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    store.insert_persistent(LOCK_KEY, "someone-else");
    let skipped = runner(&store, "instance-b", sleeping_body(&runs, Duration::ZERO)).into_task();
    assert!(skipped().await.is_ok());
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    store.set_available(false);
    assert!(matches!(task().await, Err(JobError::LockError(_))));
}

/// Body that records how often it overlapped with another running copy.
fn exclusive_body(runs: &Arc<AtomicU32>, active: &Arc<AtomicU32>, overlaps: &Arc<AtomicU32>) -> BoxedTask {
    let runs = Arc::clone(runs);
    let active = Arc::clone(active);
    let overlaps = Arc::clone(overlaps);
    boxed_task(move || {
        let runs = Arc::clone(&runs);
        let active = Arc::clone(&active);
        let overlaps = Arc::clone(&overlaps);
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
            if active.fetch_add(1, Ordering::SeqCst) > 0 {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            sleep(Duration::from_secs(2)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_two_scheduled_instances_share_each_firing() {
    let store = Arc::new(MemoryStore::new());
    let runs = Arc::new(AtomicU32::new(0));
    let active = Arc::new(AtomicU32::new(0));
    let overlaps = Arc::new(AtomicU32::new(0));
    let executed = Arc::new(AtomicU32::new(0));
    let skipped = Arc::new(AtomicU32::new(0));

    let mut instances = Vec::new();
    for name in ["instance-a", "instance-b"] {
        let worker = Arc::new(runner(&store, name, exclusive_body(&runs, &active, &overlaps)));
        let executed = Arc::clone(&executed);
        let skipped = Arc::clone(&skipped);
        let task = boxed_task(move || {
            let worker = Arc::clone(&worker);
            let executed = Arc::clone(&executed);
            let skipped = Arc::clone(&skipped);
            async move {
                match worker.fire().await {
                    FiringOutcome::Executed(result) => {
                        executed.fetch_add(1, Ordering::SeqCst);
                        result
                    },
                    FiringOutcome::Skipped => {
                        skipped.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    },
                    FiringOutcome::AcquireFailed(e) => Err(JobError::LockError(e)),
                }
            }
        });

        let mut builders = SchedulerBuilders::new();
        builders.add(SchedulerConfig::new().name(name).intervals(10).unwrap(), task);
        instances.push(builders);
    }

    for builders in &instances {
        builders.start_all().await.unwrap();
    }
    sleep(Duration::from_secs(35)).await;
    for builders in &instances {
        builders.stop_all().await;
    }

    // Both schedulers read the real clock for their first delay. When the two
    // starts fall on either side of a 10s boundary, one instance fires alone once.
    let executed = executed.load(Ordering::SeqCst);
    let skipped = skipped.load(Ordering::SeqCst);
    assert!(executed >= 3, "expected one execution per firing, got {}", executed);
    assert!(skipped <= executed && executed - skipped <= 1, "executed {}, skipped {}", executed, skipped);
    assert_eq!(runs.load(Ordering::SeqCst), executed);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0, "bodies of the two instances must never overlap");
}

#[tokio::test(start_paused = true)]
async fn test_panicking_body_does_not_stall_later_firings() {
    let store = Arc::new(MemoryStore::new());
    let runs = Arc::new(AtomicU32::new(0));
    let runs_clone = Arc::clone(&runs);
    let body = boxed_task(move || {
        let runs = Arc::clone(&runs_clone);
        async move {
            if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("report generation crashed");
            }
            Ok(())
        }
    });
    let task = runner(&store, "instance-a", body).into_task();

    let mut builders = SchedulerBuilders::new();
    builders.add(SchedulerConfig::new().name("report").intervals(1).unwrap(), task);
    builders.start_all().await.unwrap();
    sleep(Duration::from_secs(10)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(60), builders.stop_all()).await;
    assert!(stopped.is_ok(), "stop_all should return after a panicked firing");
    assert!(runs.load(Ordering::SeqCst) >= 8, "later firings should still execute");
    assert!(store.get(LOCK_KEY).await.unwrap().is_none(), "the panicked firing must release its lease");
}
