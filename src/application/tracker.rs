//! The per-identity instrumentation handle.
//!
//! A [`Tracker`] is what application code holds: it starts and stops
//! activities through its activity timer, records events, snapshots, and
//! direct messages, and hands everything that completes to its delivery
//! pipeline. One tracker exists per identity; the registry owns creation and
//! teardown. A closed tracker rejects instrumentation calls with
//! [`TrackerError::Closed`] and is never silently recreated.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::dispatch::SinkDispatch;
use super::limiter::RateLimiter;
use super::ports::{Clock, Formatter, Record, Sink, SinkError};
use super::selector::ConditionalSelector;
use super::stats::TrackerStats;
use super::timer::ActivityTimer;
use crate::domain::activity::{Activity, ActivityId, StateError};
use crate::domain::event::Event;
use crate::domain::identity::TrackerIdentity;
use crate::domain::message::Message;
use crate::domain::severity::Severity;
use crate::domain::snapshot::Snapshot;

/// Error from tracker construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// No sink was supplied
    MissingSink,
    /// No clock was supplied
    MissingClock,
    /// No formatter was supplied
    MissingFormatter,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::MissingSink => write!(f, "tracker requires a sink"),
            BuildError::MissingClock => write!(f, "tracker requires a clock"),
            BuildError::MissingFormatter => write!(f, "tracker requires a formatter"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Error from tracker operations.
#[derive(Debug)]
pub enum TrackerError {
    /// The tracker has been closed
    Closed,
    /// An illegal lifecycle transition
    State(StateError),
    /// A sink failure surfaced by a deliberate maintenance call
    Delivery(SinkError),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Closed => write!(f, "tracker is closed"),
            TrackerError::State(err) => err.fmt(f),
            TrackerError::Delivery(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrackerError::Closed => None,
            TrackerError::State(err) => Some(err),
            TrackerError::Delivery(err) => Some(err),
        }
    }
}

impl From<StateError> for TrackerError {
    fn from(err: StateError) -> Self {
        TrackerError::State(err)
    }
}

impl From<SinkError> for TrackerError {
    fn from(err: SinkError) -> Self {
        TrackerError::Delivery(err)
    }
}

/// Validating builder for [`Tracker`].
///
/// Sink, clock, and formatter are required; selector, limiter, and
/// statistics default to fresh instances when not supplied.
#[derive(Debug)]
pub struct TrackerBuilder {
    identity: TrackerIdentity,
    sink: Option<Arc<dyn Sink>>,
    clock: Option<Arc<dyn Clock>>,
    formatter: Option<Arc<dyn Formatter>>,
    selector: Option<Arc<ConditionalSelector>>,
    limiter: Option<Arc<RateLimiter>>,
    rate_limits: Option<(u64, u64)>,
}

impl TrackerBuilder {
    /// Start building a tracker for the given identity.
    pub fn new(identity: TrackerIdentity) -> Self {
        Self {
            identity,
            sink: None,
            clock: None,
            formatter: None,
            selector: None,
            limiter: None,
            rate_limits: None,
        }
    }

    /// Set the delivery destination.
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the record formatter.
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Share an existing selector instead of a fresh one.
    pub fn with_selector(mut self, selector: Arc<ConditionalSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Share an existing rate limiter instead of building one.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build a dedicated limiter with these limits (0 = unlimited).
    ///
    /// Ignored when [`TrackerBuilder::with_limiter`] supplies one.
    pub fn with_rate_limits(mut self, max_mps: u64, max_bps: u64) -> Self {
        self.rate_limits = Some((max_mps, max_bps));
        self
    }

    /// Validate and assemble the tracker.
    ///
    /// # Errors
    /// One `Missing*` variant per absent required collaborator.
    pub fn build(self) -> Result<Tracker, BuildError> {
        let sink = self.sink.ok_or(BuildError::MissingSink)?;
        let clock = self.clock.ok_or(BuildError::MissingClock)?;
        let formatter = self.formatter.ok_or(BuildError::MissingFormatter)?;

        let selector = self
            .selector
            .unwrap_or_else(|| Arc::new(ConditionalSelector::new()));
        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None => {
                let (max_mps, max_bps) = self.rate_limits.unwrap_or((0, 0));
                Arc::new(RateLimiter::new(max_mps, max_bps, Arc::clone(&clock)))
            }
        };
        let stats = TrackerStats::new();
        let dispatch = SinkDispatch::new(
            sink,
            formatter,
            Arc::clone(&selector),
            limiter,
            stats.clone(),
        );

        debug!(
            target: "optrack::tracker",
            identity = %self.identity,
            "tracker built"
        );

        Ok(Tracker {
            identity: self.identity,
            timer: Mutex::new(ActivityTimer::new(Arc::clone(&clock))),
            clock,
            selector,
            dispatch,
            stats,
            closed: AtomicBool::new(false),
        })
    }
}

/// Instrumentation handle bound to one identity.
#[derive(Debug)]
pub struct Tracker {
    identity: TrackerIdentity,
    clock: Arc<dyn Clock>,
    timer: Mutex<ActivityTimer>,
    selector: Arc<ConditionalSelector>,
    dispatch: SinkDispatch,
    stats: TrackerStats,
    closed: AtomicBool,
}

impl Tracker {
    /// Start building a tracker for the given identity.
    pub fn builder(identity: TrackerIdentity) -> TrackerBuilder {
        TrackerBuilder::new(identity)
    }

    /// Get the identity this tracker is registered under.
    pub fn identity(&self) -> &TrackerIdentity {
        &self.identity
    }

    /// Get the shared statistics handle.
    pub fn stats(&self) -> TrackerStats {
        self.stats.clone()
    }

    /// Get the conditional-emission selector.
    pub fn selector(&self) -> &Arc<ConditionalSelector> {
        &self.selector
    }

    /// Get the rate limiter in front of the sink.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        self.dispatch.limiter()
    }

    /// Start an activity.
    ///
    /// The activity nests under any currently open one.
    ///
    /// # Returns
    /// The identifier to pass to [`Tracker::stop_activity`].
    pub fn start_activity(&self, activity: Activity) -> Result<ActivityId, TrackerError> {
        self.ensure_open()?;
        let id = self.timer().start(activity)?;
        self.stats.record_activity_started();
        self.stats.touch(self.clock.wall_now());
        Ok(id)
    }

    /// Stop an activity, dispatch it, and hand it back for inspection.
    ///
    /// # Errors
    /// * [`StateError::OutOfOrderStop`] (wrapped) when a nested activity is
    ///   still open
    /// * [`StateError::NoActiveActivity`] (wrapped) when nothing is open
    pub fn stop_activity(&self, id: ActivityId) -> Result<Activity, TrackerError> {
        self.ensure_open()?;
        let activity = self.timer().stop(id)?;
        self.dispatch.dispatch(Record::Activity(&activity));
        self.stats.record_activity_completed();
        self.stats.touch(self.clock.wall_now());
        Ok(activity)
    }

    /// Identifier of the innermost open activity, if any.
    pub fn current_activity(&self) -> Option<ActivityId> {
        self.timer().current_id()
    }

    /// Number of open activities.
    pub fn activity_depth(&self) -> usize {
        self.timer().depth()
    }

    /// Stamp an event's start time from this tracker's clock.
    pub fn start_event(&self, event: &mut Event) -> Result<(), TrackerError> {
        self.ensure_open()?;
        event.start_at(self.clock.now(), self.clock.wall_now())?;
        Ok(())
    }

    /// Stamp an event's stop time from this tracker's clock.
    pub fn stop_event(&self, event: &mut Event) -> Result<(), TrackerError> {
        self.ensure_open()?;
        event.stop_at(self.clock.now(), self.clock.wall_now())?;
        Ok(())
    }

    /// Attach fault text and stamp the event's stop time in one step.
    pub fn stop_event_faulted(
        &self,
        event: &mut Event,
        fault: impl Into<String>,
    ) -> Result<(), TrackerError> {
        self.ensure_open()?;
        event.stop_faulted_at(self.clock.now(), self.clock.wall_now(), fault)?;
        Ok(())
    }

    /// Record a finished event.
    ///
    /// While an activity is open the event attaches to it and is delivered
    /// with the activity when it stops; otherwise the event is dispatched
    /// standalone immediately.
    ///
    /// # Errors
    /// Returns [`StateError::NotStopped`] (wrapped) for a running event.
    pub fn record_event(&self, event: Event) -> Result<(), TrackerError> {
        self.ensure_open()?;
        let standalone = self.timer().attach_event(event)?;
        if let Some(event) = standalone {
            self.dispatch.dispatch(Record::Event(&event));
        }
        self.stats.record_event();
        self.stats.touch(self.clock.wall_now());
        Ok(())
    }

    /// Record a property snapshot, stamping its timestamp if unset.
    pub fn record_snapshot(&self, mut snapshot: Snapshot) -> Result<(), TrackerError> {
        self.ensure_open()?;
        if snapshot.timestamp().is_none() {
            snapshot.set_timestamp(self.clock.wall_now());
        }
        self.dispatch.dispatch(Record::Snapshot(&snapshot));
        self.stats.record_snapshot();
        self.stats.touch(self.clock.wall_now());
        Ok(())
    }

    /// Log a direct message at the given severity.
    ///
    /// The message's age is observed against this tracker's wall clock.
    pub fn log(&self, severity: Severity, mut message: Message) -> Result<(), TrackerError> {
        self.ensure_open()?;
        message.observed_at(self.clock.wall_now());
        self.dispatch.dispatch(Record::Message(severity, &message));
        self.stats.record_message();
        self.stats.touch(self.clock.wall_now());
        Ok(())
    }

    /// Flush the sink, surfacing its error to the caller.
    pub fn flush(&self) -> Result<(), TrackerError> {
        self.ensure_open()?;
        self.dispatch.flush()?;
        Ok(())
    }

    /// Close the tracker, releasing the sink. Idempotent.
    ///
    /// The first close performs the sink teardown and returns its result;
    /// later calls succeed without effect.
    pub fn close(&self) -> Result<(), TrackerError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        debug!(target: "optrack::tracker", identity = %self.identity, "tracker closed");
        self.dispatch.close()?;
        Ok(())
    }

    /// Whether the tracker has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), TrackerError> {
        if self.is_closed() {
            return Err(TrackerError::Closed);
        }
        Ok(())
    }

    fn timer(&self) -> std::sync::MutexGuard<'_, ActivityTimer> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::OpType;
    use crate::domain::identity::SourceType;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::format::TextFormatter;
    use crate::infrastructure::mocks::{MockClock, RecordingSink};

    fn build_tracker(sink: Arc<RecordingSink>) -> Tracker {
        Tracker::builder(TrackerIdentity::new("orders", SourceType::Application))
            .with_sink(sink)
            .with_clock(Arc::new(SystemClock::new()))
            .with_formatter(Arc::new(TextFormatter::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_sink_clock_formatter() {
        let identity = TrackerIdentity::new("orders", SourceType::Application);
        let err = Tracker::builder(identity.clone()).build().unwrap_err();
        assert_eq!(err, BuildError::MissingSink);

        let err = Tracker::builder(identity.clone())
            .with_sink(Arc::new(RecordingSink::new()))
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::MissingClock);

        let err = Tracker::builder(identity)
            .with_sink(Arc::new(RecordingSink::new()))
            .with_clock(Arc::new(SystemClock::new()))
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::MissingFormatter);
    }

    #[test]
    fn test_activity_round_trip_dispatches_once() {
        let sink = Arc::new(RecordingSink::new());
        let tracker = build_tracker(sink.clone());

        let id = tracker.start_activity(Activity::new("job")).unwrap();
        let done = tracker.stop_activity(id).unwrap();

        assert!(done.is_stopped());
        assert_eq!(sink.writes().len(), 1);
        assert_eq!(tracker.stats().activities_completed(), 1);
    }

    #[test]
    fn test_event_attaches_to_open_activity() {
        let sink = Arc::new(RecordingSink::new());
        let tracker = build_tracker(sink.clone());

        let id = tracker.start_activity(Activity::new("job")).unwrap();

        let mut event = Event::new("op", OpType::Call);
        tracker.start_event(&mut event).unwrap();
        tracker.stop_event(&mut event).unwrap();
        tracker.record_event(event).unwrap();

        // Attached events ride with the activity, not on their own.
        assert!(sink.writes().is_empty());

        let done = tracker.stop_activity(id).unwrap();
        assert_eq!(done.events().len(), 1);
        assert_eq!(sink.writes().len(), 1);
    }

    #[test]
    fn test_event_without_activity_dispatches_standalone() {
        let sink = Arc::new(RecordingSink::new());
        let tracker = build_tracker(sink.clone());

        let mut event = Event::new("op", OpType::Call);
        tracker.start_event(&mut event).unwrap();
        tracker.stop_event(&mut event).unwrap();
        tracker.record_event(event).unwrap();

        assert_eq!(sink.writes().len(), 1);
        assert_eq!(tracker.stats().events_recorded(), 1);
    }

    #[test]
    fn test_out_of_order_stop_surfaces() {
        let sink = Arc::new(RecordingSink::new());
        let tracker = build_tracker(sink);

        let outer = tracker.start_activity(Activity::new("outer")).unwrap();
        let _inner = tracker.start_activity(Activity::new("inner")).unwrap();

        match tracker.stop_activity(outer) {
            Err(TrackerError::State(StateError::OutOfOrderStop { requested, .. })) => {
                assert_eq!(requested, outer);
            }
            other => panic!("expected OutOfOrderStop, got {:?}", other.map(|a| a.id())),
        }
    }

    #[test]
    fn test_snapshot_gets_timestamp_from_clock() {
        let sink = Arc::new(RecordingSink::new());
        let clock = MockClock::new();
        let tracker = Tracker::builder(TrackerIdentity::new("orders", SourceType::Application))
            .with_sink(sink)
            .with_clock(Arc::new(clock.clone()))
            .with_formatter(Arc::new(TextFormatter::new()))
            .build()
            .unwrap();

        tracker
            .record_snapshot(Snapshot::new("gc", "memory", Severity::Info))
            .unwrap();
        assert_eq!(tracker.stats().snapshots_recorded(), 1);
    }

    #[test]
    fn test_closed_tracker_rejects_instrumentation() {
        let sink = Arc::new(RecordingSink::new());
        let tracker = build_tracker(sink);

        tracker.close().unwrap();
        assert!(tracker.is_closed());

        assert!(matches!(
            tracker.start_activity(Activity::new("job")),
            Err(TrackerError::Closed)
        ));
        assert!(matches!(
            tracker.log(Severity::Info, Message::new("late")),
            Err(TrackerError::Closed)
        ));
        assert!(matches!(tracker.flush(), Err(TrackerError::Closed)));

        // Idempotent close.
        assert!(tracker.close().is_ok());
    }

    #[test]
    fn test_log_observes_message_age() {
        let sink = Arc::new(RecordingSink::new());
        let tracker = build_tracker(sink.clone());

        tracker.log(Severity::Info, Message::new("hello")).unwrap();
        assert_eq!(tracker.stats().messages_logged(), 1);
        assert_eq!(sink.writes().len(), 1);
    }

    #[test]
    fn test_shared_selector_filters_across_use() {
        let sink = Arc::new(RecordingSink::new());
        let tracker = build_tracker(sink.clone());

        tracker.selector().set_floor(Severity::Error);
        tracker.log(Severity::Info, Message::new("quiet")).unwrap();
        assert!(sink.writes().is_empty());
        assert_eq!(tracker.stats().records_filtered(), 1);
    }

    #[test]
    fn test_concurrent_standalone_events() {
        use std::thread;

        let sink = Arc::new(RecordingSink::new());
        let tracker = Arc::new(build_tracker(sink.clone()));
        let mut handles = vec![];

        for _ in 0..4 {
            let t = Arc::clone(&tracker);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    let mut event = Event::new("op", OpType::Call);
                    t.start_event(&mut event).unwrap();
                    t.stop_event(&mut event).unwrap();
                    t.record_event(event).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sink.writes().len(), 200);
        assert_eq!(tracker.stats().events_recorded(), 200);
    }
}
