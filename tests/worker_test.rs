//! End-to-end worker tests: submission protocol, lifecycle, diagnostics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use rtc_workers::builders::WorkerBuilder;
use rtc_workers::core::{Location, Worker, WorkerError, WorkerPool};
use rtc_workers::util::init_tracing;

#[test]
fn test_async_tasks_run_in_fifo_order_on_worker_thread() {
    init_tracing();
    let worker = Worker::spawn("fifo");
    let worker_thread = worker.thread_id().unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..10 {
        let order = Arc::clone(&order);
        worker
            .async_call(Location::capture(), move || {
                assert_eq!(thread::current().id(), worker_thread);
                order.lock().push(i);
            })
            .unwrap();
    }
    // A sync call behind the batch doubles as a completion barrier.
    worker.sync_call(Location::capture(), || {}).unwrap();
    assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    worker.stop();
}

#[test]
fn test_concurrent_submissions_all_execute_exactly_once() {
    let worker = Worker::spawn("storm");
    let counter = Arc::new(AtomicUsize::new(0));
    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let worker = worker.clone();
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..125 {
                    let counter = Arc::clone(&counter);
                    worker
                        .async_call(Location::capture(), move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in submitters {
        handle.join().unwrap();
    }
    worker.sync_call(Location::capture(), || {}).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1000);
    worker.stop();
}

#[test]
fn test_sync_call_from_own_thread_runs_inline() {
    let worker = Worker::spawn("inline");
    let clone = worker.clone();
    let nested = worker
        .sync_call(Location::capture(), move || {
            // Re-entering the same worker must not enqueue or block.
            clone.sync_call(Location::capture(), || 7).unwrap()
        })
        .unwrap();
    assert_eq!(nested, 7);
    worker.stop();
}

#[test]
fn test_invoke_inline_on_own_thread_async_elsewhere() {
    let worker = Worker::spawn("invoke");
    let worker_thread = worker.thread_id().unwrap();

    let seen = Arc::new(Mutex::new(None));
    let record = Arc::clone(&seen);
    let probe = Arc::clone(&seen);
    let clone = worker.clone();
    worker
        .sync_call(Location::capture(), move || {
            clone
                .invoke(Location::capture(), move || {
                    *record.lock() = Some(thread::current().id());
                })
                .unwrap();
            // Inline: the effect is visible before invoke returns.
            assert!(probe.lock().is_some());
        })
        .unwrap();
    assert_eq!(*seen.lock(), Some(worker_thread));

    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    worker
        .invoke(Location::capture(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    worker.sync_call(Location::capture(), || {}).unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    worker.stop();
}

#[test]
fn test_nested_sync_call_across_two_workers() {
    let first = Worker::spawn("first");
    let second = Worker::spawn("second");
    let inner = second.clone();
    let value = first
        .sync_call(Location::capture(), move || {
            inner.sync_call(Location::capture(), || 40 + 2).unwrap()
        })
        .unwrap();
    assert_eq!(value, 42);
    first.stop();
    second.stop();
}

#[test]
fn test_sync_call_timeout_expires_but_worker_survives() {
    let worker = Worker::spawn("slow");
    let started = Instant::now();
    let result = worker.sync_call_timeout(
        Location::capture(),
        || {
            thread::sleep(Duration::from_millis(300));
            1
        },
        Duration::from_millis(50),
    );
    assert!(matches!(result, Err(WorkerError::Timeout)));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(45));
    assert!(elapsed < Duration::from_millis(250));
    // The timed-out registration is gone and the worker still answers.
    assert_eq!(worker.pending_sync_invokers(), 0);
    let value = worker.sync_call(Location::capture(), || 5).unwrap();
    assert_eq!(value, 5);
    worker.stop();
}

#[test]
fn test_cancel_discards_pending_and_worker_stays_usable() {
    let worker = Worker::spawn("cancelled");
    let ran = Arc::new(AtomicUsize::new(0));

    // Occupy the worker so the follow-up tasks stay pending.
    worker
        .async_call(Location::capture(), || {
            thread::sleep(Duration::from_millis(150));
        })
        .unwrap();
    for _ in 0..5 {
        let ran = Arc::clone(&ran);
        worker
            .async_call(Location::capture(), move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    thread::sleep(Duration::from_millis(30));
    worker.cancel();
    // Reentrant cancel is a no-op, not a deadlock.
    worker.cancel();

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert!(worker.is_valid());
    let value = worker.sync_call(Location::capture(), || 11).unwrap();
    assert_eq!(value, 11);
    let counters = worker.queue_counters().unwrap();
    assert_eq!(counters.discarded, 5);
    worker.stop();
}

#[test]
fn test_discarded_sync_call_reports_internal_error() {
    let worker = Worker::spawn("discarding");
    worker
        .async_call(Location::capture(), || {
            thread::sleep(Duration::from_millis(400));
        })
        .unwrap();

    let target = worker.clone();
    let caller = thread::spawn(move || target.sync_call(Location::capture(), || 1));
    // Let the sync task queue up behind the blocker before cancelling.
    thread::sleep(Duration::from_millis(100));
    worker.cancel();

    let result = caller.join().unwrap();
    assert!(matches!(result, Err(WorkerError::Internal(_))));
    assert_eq!(worker.pending_sync_invokers(), 0);
    worker.stop();
}

#[test]
fn test_stop_is_one_shot_and_invalidates() {
    let worker = Worker::spawn("stopped");
    worker.sync_call(Location::capture(), || {}).unwrap();
    worker.stop();
    worker.stop();
    assert!(!worker.is_valid());
    assert!(!worker.is_alive());
    assert!(matches!(
        worker.async_call(Location::capture(), || {}),
        Err(WorkerError::NotInitialized)
    ));
    assert!(matches!(
        worker.sync_call(Location::capture(), || 0),
        Err(WorkerError::NotInitialized)
    ));
}

#[test]
fn test_delayed_async_call_fires_after_delay() {
    let worker = Worker::spawn("delayed");
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    let started = Instant::now();
    worker
        .delayed_async_call(
            Location::capture(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_millis(40),
        )
        .unwrap();
    while ran.load(Ordering::SeqCst) == 0 {
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "delayed task never fired"
        );
        thread::sleep(Duration::from_millis(5));
    }
    assert!(started.elapsed() >= Duration::from_millis(35));
    worker.stop();
}

#[test]
fn test_external_worker_driven_by_host_thread() {
    let worker = WorkerBuilder::new("hosted").external_thread().build().unwrap();
    let driver_worker = worker.clone();
    let driver = thread::spawn(move || {
        driver_worker.run_on_current_thread().unwrap();
    });
    // Wait for the driver to attach.
    let started = Instant::now();
    while worker.thread_id().is_none() {
        assert!(started.elapsed() < Duration::from_secs(5), "driver never attached");
        thread::sleep(Duration::from_millis(5));
    }
    let value = worker.sync_call(Location::capture(), || 21 * 2).unwrap();
    assert_eq!(value, 42);
    worker.stop();
    driver.join().unwrap();
}

#[test]
fn test_owned_thread_worker_rejects_external_driving() {
    let worker = Worker::spawn("owned");
    assert!(matches!(
        worker.run_on_current_thread(),
        Err(WorkerError::InvalidArgument(_))
    ));
    assert!(matches!(worker.pump(), Err(WorkerError::InvalidArgument(_))));
    worker.stop();
}

#[test]
fn test_audit_history_tracks_locations_in_order() {
    let worker = Worker::spawn("audit");
    worker.sync_call(Location::capture(), || {}).unwrap();
    worker
        .sync_call(Location::capture(), || thread::sleep(Duration::from_millis(20)))
        .unwrap();
    let history = worker.task_history();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|r| r.location.file.ends_with("worker_test.rs")));
    assert!(history[0].location.line < history[1].location.line);
    let longest = worker.longest_tasks();
    assert_eq!(longest[0].location.line, history[1].location.line);
    assert!(longest[0].ran_for >= Duration::from_millis(15));
    worker.stop();
}

#[test]
fn test_pool_round_trip() {
    let pool = WorkerPool::new();
    let signaling = pool.get_or_spawn("signaling").unwrap();
    let media = pool.get_or_spawn("media").unwrap();
    assert_ne!(signaling.thread_id(), media.thread_id());
    assert_eq!(pool.len(), 2);
    let mut names = pool.names();
    names.sort();
    assert_eq!(names, vec!["media", "signaling"]);
    pool.stop_all();
    assert!(pool.is_empty());
}
