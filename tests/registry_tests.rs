use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use optrack::infrastructure::mocks::{FailingSink, RecordingSink};
use optrack::{
    BuildError, Message, Severity, ShardedStorage, Sink, SourceType, SystemClock, TextFormatter,
    Tracker, TrackerIdentity, TrackerRegistry,
};

type Registry = TrackerRegistry<Arc<ShardedStorage<TrackerIdentity, Arc<Tracker>>>>;

fn registry() -> Registry {
    TrackerRegistry::new(Arc::new(ShardedStorage::new()))
}

fn identity(name: &str) -> TrackerIdentity {
    TrackerIdentity::new(name, SourceType::Application)
}

fn build_tracker(identity: &TrackerIdentity, sink: Arc<dyn Sink>) -> Result<Tracker, BuildError> {
    Tracker::builder(identity.clone())
        .with_sink(sink)
        .with_clock(Arc::new(SystemClock::new()))
        .with_formatter(Arc::new(TextFormatter::new()))
        .build()
}

#[test]
fn test_concurrent_acquisition_runs_factory_once() {
    let registry = registry();
    let identity = identity("orders");
    let factory_runs = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));
    let mut handles = vec![];

    for _ in 0..8 {
        let registry = registry.clone();
        let identity = identity.clone();
        let factory_runs = Arc::clone(&factory_runs);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            registry
                .get_or_create(&identity, |identity| {
                    factory_runs.fetch_add(1, Ordering::SeqCst);
                    build_tracker(identity, Arc::new(RecordingSink::new()))
                })
                .unwrap()
        }));
    }

    let trackers: Vec<Arc<Tracker>> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    // One winner; every caller observes the same handle.
    assert_eq!(factory_runs.load(Ordering::SeqCst), 1);
    for tracker in &trackers[1..] {
        assert!(Arc::ptr_eq(&trackers[0], tracker));
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_factory_failure_registers_nothing() {
    let registry = registry();
    let identity = identity("orders");

    let result = registry.get_or_create(&identity, |identity| {
        Tracker::builder(identity.clone()).build()
    });
    assert_eq!(result.unwrap_err(), BuildError::MissingSink);
    assert!(registry.is_empty());
    assert!(registry.get(&identity).is_none());

    // The failed attempt does not poison the slot.
    let tracker = registry
        .get_or_create(&identity, |identity| {
            build_tracker(identity, Arc::new(RecordingSink::new()))
        })
        .unwrap();
    assert_eq!(registry.len(), 1);
    assert!(!tracker.is_closed());
}

#[test]
fn test_flush_all_continues_past_failures() {
    let registry = registry();
    let first_sink = Arc::new(RecordingSink::new());
    let failing_sink = Arc::new(FailingSink::new());
    failing_sink.set_fail_flush(true);
    let third_sink = Arc::new(RecordingSink::new());

    for (name, sink) in [
        ("first", Arc::clone(&first_sink) as Arc<dyn Sink>),
        ("broken", Arc::clone(&failing_sink) as Arc<dyn Sink>),
        ("third", Arc::clone(&third_sink) as Arc<dyn Sink>),
    ] {
        registry
            .get_or_create(&identity(name), |identity| build_tracker(identity, sink))
            .unwrap();
    }

    registry.flush_all();

    // The broken sink refused its flush; the other two still saw theirs.
    assert_eq!(first_sink.flush_count(), 1);
    assert_eq!(third_sink.flush_count(), 1);
}

#[test]
fn test_close_removes_and_closes_tracker() {
    let registry = registry();
    let identity = identity("orders");
    let tracker = registry
        .get_or_create(&identity, |identity| {
            build_tracker(identity, Arc::new(RecordingSink::new()))
        })
        .unwrap();

    assert!(registry.close(&identity));
    assert!(tracker.is_closed());
    assert!(registry.get(&identity).is_none());

    // Nothing left to close.
    assert!(!registry.close(&identity));
}

#[test]
fn test_remove_detaches_without_closing() {
    let registry = registry();
    let identity = identity("orders");
    registry
        .get_or_create(&identity, |identity| {
            build_tracker(identity, Arc::new(RecordingSink::new()))
        })
        .unwrap();

    let detached = registry.remove(&identity).unwrap();
    assert!(registry.is_empty());

    // The handle keeps working; only registry bookkeeping changed.
    assert!(!detached.is_closed());
    detached
        .log(Severity::Info, Message::new("still alive"))
        .unwrap();
}

#[test]
fn test_shutdown_all_closes_every_tracker() {
    let registry = registry();
    let mut trackers = vec![];
    for name in ["a", "b", "c"] {
        trackers.push(
            registry
                .get_or_create(&identity(name), |identity| {
                    build_tracker(identity, Arc::new(RecordingSink::new()))
                })
                .unwrap(),
        );
    }

    registry.shutdown_all();

    assert!(registry.is_empty());
    for tracker in trackers {
        assert!(tracker.is_closed());
    }
}

#[test]
fn test_list_returns_point_in_time_copy() {
    let registry = registry();
    for name in ["a", "b"] {
        registry
            .get_or_create(&identity(name), |identity| {
                build_tracker(identity, Arc::new(RecordingSink::new()))
            })
            .unwrap();
    }

    let mut listed = registry.list();
    assert_eq!(listed.len(), 2);

    // Dropping the snapshot does not touch the registry.
    listed.clear();
    assert_eq!(registry.len(), 2);
}
