//! Per-tracker instrumentation statistics.
//!
//! Counts what a tracker has seen and delivered, for monitoring and for the
//! registry dump provider.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Statistics tracking one tracker's instrumentation traffic.
///
/// All counters use atomic operations for thread-safe updates and reads.
/// Cloning shares the underlying counters, so the tracker and any observer
/// see the same numbers.
#[derive(Debug, Clone)]
pub struct TrackerStats {
    inner: Arc<StatsInner>,
}

#[derive(Debug)]
struct StatsInner {
    /// Activities started
    activities_started: AtomicU64,
    /// Activities stopped and dispatched
    activities_completed: AtomicU64,
    /// Events recorded (attached or standalone)
    events_recorded: AtomicU64,
    /// Snapshots recorded
    snapshots_recorded: AtomicU64,
    /// Direct messages logged
    messages_logged: AtomicU64,
    /// Records that reached the sink successfully
    records_delivered: AtomicU64,
    /// Records whose delivery failed
    delivery_errors: AtomicU64,
    /// Records rejected by the severity gate
    records_filtered: AtomicU64,
    /// Wall-clock microseconds since the UNIX epoch of the last
    /// instrumentation call; 0 = never
    last_activity_micros: AtomicU64,
}

impl TrackerStats {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StatsInner {
                activities_started: AtomicU64::new(0),
                activities_completed: AtomicU64::new(0),
                events_recorded: AtomicU64::new(0),
                snapshots_recorded: AtomicU64::new(0),
                messages_logged: AtomicU64::new(0),
                records_delivered: AtomicU64::new(0),
                delivery_errors: AtomicU64::new(0),
                records_filtered: AtomicU64::new(0),
                last_activity_micros: AtomicU64::new(0),
            }),
        }
    }

    /// Record an activity start.
    pub(crate) fn record_activity_started(&self) {
        self.inner.activities_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an activity stop.
    pub(crate) fn record_activity_completed(&self) {
        self.inner
            .activities_completed
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event.
    pub(crate) fn record_event(&self) {
        self.inner.events_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a snapshot.
    pub(crate) fn record_snapshot(&self) {
        self.inner.snapshots_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a direct message.
    pub(crate) fn record_message(&self) {
        self.inner.messages_logged.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful delivery.
    pub(crate) fn record_delivered(&self) {
        self.inner.records_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed delivery.
    pub(crate) fn record_delivery_error(&self) {
        self.inner.delivery_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a severity-gate rejection.
    pub(crate) fn record_filtered(&self) {
        self.inner.records_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the wall-clock time of an instrumentation call.
    pub(crate) fn touch(&self, wall: SystemTime) {
        let micros = wall
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        self.inner
            .last_activity_micros
            .store(micros, Ordering::Relaxed);
    }

    /// Get the number of activities started.
    pub fn activities_started(&self) -> u64 {
        self.inner.activities_started.load(Ordering::Relaxed)
    }

    /// Get the number of activities completed.
    pub fn activities_completed(&self) -> u64 {
        self.inner.activities_completed.load(Ordering::Relaxed)
    }

    /// Get the number of events recorded.
    pub fn events_recorded(&self) -> u64 {
        self.inner.events_recorded.load(Ordering::Relaxed)
    }

    /// Get the number of snapshots recorded.
    pub fn snapshots_recorded(&self) -> u64 {
        self.inner.snapshots_recorded.load(Ordering::Relaxed)
    }

    /// Get the number of direct messages logged.
    pub fn messages_logged(&self) -> u64 {
        self.inner.messages_logged.load(Ordering::Relaxed)
    }

    /// Get the number of records delivered.
    pub fn records_delivered(&self) -> u64 {
        self.inner.records_delivered.load(Ordering::Relaxed)
    }

    /// Get the number of delivery failures.
    pub fn delivery_errors(&self) -> u64 {
        self.inner.delivery_errors.load(Ordering::Relaxed)
    }

    /// Get the number of records rejected by the severity gate.
    pub fn records_filtered(&self) -> u64 {
        self.inner.records_filtered.load(Ordering::Relaxed)
    }

    /// Get the wall-clock time of the last instrumentation call.
    pub fn last_activity(&self) -> Option<SystemTime> {
        let micros = self.inner.last_activity_micros.load(Ordering::Relaxed);
        if micros == 0 {
            None
        } else {
            Some(UNIX_EPOCH + Duration::from_micros(micros))
        }
    }

    /// Get a snapshot of all statistics.
    pub fn snapshot(&self) -> TrackerStatsSnapshot {
        TrackerStatsSnapshot {
            activities_started: self.activities_started(),
            activities_completed: self.activities_completed(),
            events_recorded: self.events_recorded(),
            snapshots_recorded: self.snapshots_recorded(),
            messages_logged: self.messages_logged(),
            records_delivered: self.records_delivered(),
            delivery_errors: self.delivery_errors(),
            records_filtered: self.records_filtered(),
            last_activity: self.last_activity(),
        }
    }
}

impl Default for TrackerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of tracker statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TrackerStatsSnapshot {
    /// Activities started
    pub activities_started: u64,
    /// Activities stopped and dispatched
    pub activities_completed: u64,
    /// Events recorded (attached or standalone)
    pub events_recorded: u64,
    /// Snapshots recorded
    pub snapshots_recorded: u64,
    /// Direct messages logged
    pub messages_logged: u64,
    /// Records that reached the sink successfully
    pub records_delivered: u64,
    /// Records whose delivery failed
    pub delivery_errors: u64,
    /// Records rejected by the severity gate
    pub records_filtered: u64,
    /// Wall-clock time of the last instrumentation call
    pub last_activity: Option<SystemTime>,
}

impl TrackerStatsSnapshot {
    /// Calculate the delivery failure rate (0.0 to 1.0).
    ///
    /// Returns the ratio of failed deliveries to attempted deliveries, or
    /// 0.0 if nothing has been dispatched yet.
    pub fn delivery_error_rate(&self) -> f64 {
        let total = self.records_delivered.saturating_add(self.delivery_errors);
        if total == 0 {
            0.0
        } else {
            self.delivery_errors as f64 / total as f64
        }
    }

    /// Get the number of activities still open (started but not completed).
    pub fn activities_open(&self) -> u64 {
        self.activities_started
            .saturating_sub(self.activities_completed)
    }
}
