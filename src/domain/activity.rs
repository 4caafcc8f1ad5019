//! Named, timed, nestable units of work.
//!
//! An [`Activity`] groups a sequence of [`Event`]s under one named span of
//! work. Activities nest: the timer that manages them records each activity's
//! parent and depth at start time. The lifecycle state machine
//! (`Created -> Started -> Stopped`) is shared with events through
//! [`StateError`]; timestamps are immutable once set.

use std::fmt;
use std::time::{Instant, SystemTime};

use uuid::Uuid;

use super::event::{CompletionCode, Event};
use super::severity::Severity;

/// Unique identifier of an activity instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivityId(Uuid);

impl ActivityId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error for illegal lifecycle transitions on activities and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// The unit was never started
    NotStarted,
    /// The unit was already started
    AlreadyStarted,
    /// The unit was already stopped
    AlreadyStopped,
    /// The unit must be stopped first
    NotStopped,
    /// A nested activity is still open; only the innermost may be stopped
    OutOfOrderStop {
        /// The innermost open activity, which must stop first
        expected: ActivityId,
        /// The activity the caller tried to stop
        requested: ActivityId,
    },
    /// No activity is currently open
    NoActiveActivity,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::NotStarted => write!(f, "unit of work has not been started"),
            StateError::AlreadyStarted => write!(f, "unit of work was already started"),
            StateError::AlreadyStopped => write!(f, "unit of work was already stopped"),
            StateError::NotStopped => write!(f, "unit of work has not been stopped"),
            StateError::OutOfOrderStop {
                expected,
                requested,
            } => write!(
                f,
                "activity {} cannot stop while nested activity {} is open",
                requested, expected
            ),
            StateError::NoActiveActivity => write!(f, "no activity is currently open"),
        }
    }
}

impl std::error::Error for StateError {}

/// A named, timed unit of work owning an ordered list of events.
///
/// Nesting metadata (`parent_id`, `depth`) is assigned by the activity timer
/// when the activity starts; a standalone activity has depth 0 and no parent.
#[derive(Debug, Clone)]
pub struct Activity {
    id: ActivityId,
    name: String,
    severity: Severity,
    correlators: Vec<String>,
    depth: usize,
    parent_id: Option<ActivityId>,
    completion_override: Option<CompletionCode>,
    events: Vec<Event>,
    started: Option<(Instant, SystemTime)>,
    stopped: Option<(Instant, SystemTime)>,
}

impl Activity {
    /// Create an activity in the `Created` state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ActivityId::new(),
            name: name.into(),
            severity: Severity::Info,
            correlators: Vec::new(),
            depth: 0,
            parent_id: None,
            completion_override: None,
            events: Vec::new(),
            started: None,
            stopped: None,
        }
    }

    /// Builder-style severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Builder-style correlator.
    pub fn with_correlator(mut self, correlator: impl Into<String>) -> Self {
        self.correlators.push(correlator.into());
        self
    }

    /// Get the identifier.
    pub fn id(&self) -> ActivityId {
        self.id
    }

    /// Get the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Get the correlators.
    pub fn correlators(&self) -> &[String] {
        &self.correlators
    }

    /// Get the nesting depth (0 = outermost).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Get the enclosing activity's identifier, if nested.
    pub fn parent_id(&self) -> Option<ActivityId> {
        self.parent_id
    }

    /// Record nesting assigned at start time.
    pub(crate) fn set_nesting(&mut self, parent_id: Option<ActivityId>, depth: usize) {
        self.parent_id = parent_id;
        self.depth = depth;
    }

    /// Get the events recorded under this activity, in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Append a finished event.
    ///
    /// # Errors
    /// Returns [`StateError::NotStopped`] if the event is still running and
    /// [`StateError::AlreadyStopped`] if this activity has already stopped.
    pub fn add_event(&mut self, event: Event) -> Result<(), StateError> {
        if self.stopped.is_some() {
            return Err(StateError::AlreadyStopped);
        }
        if !event.is_stopped() {
            return Err(StateError::NotStopped);
        }
        self.events.push(event);
        Ok(())
    }

    /// Set an explicit completion code.
    ///
    /// # Errors
    /// Returns [`StateError::AlreadyStopped`] once the activity is stopped.
    pub fn set_completion(&mut self, code: CompletionCode) -> Result<(), StateError> {
        if self.stopped.is_some() {
            return Err(StateError::AlreadyStopped);
        }
        self.completion_override = Some(code);
        Ok(())
    }

    /// Mark the activity started at the given timestamps.
    ///
    /// # Errors
    /// Returns [`StateError::AlreadyStarted`] on a second start and
    /// [`StateError::AlreadyStopped`] once stopped.
    pub fn start_at(&mut self, now: Instant, wall: SystemTime) -> Result<(), StateError> {
        if self.stopped.is_some() {
            return Err(StateError::AlreadyStopped);
        }
        if self.started.is_some() {
            return Err(StateError::AlreadyStarted);
        }
        self.started = Some((now, wall));
        Ok(())
    }

    /// Mark the activity stopped at the given timestamps.
    ///
    /// # Errors
    /// Returns [`StateError::NotStarted`] before a start and
    /// [`StateError::AlreadyStopped`] on a second stop.
    pub fn stop_at(&mut self, now: Instant, wall: SystemTime) -> Result<(), StateError> {
        if self.started.is_none() {
            return Err(StateError::NotStarted);
        }
        if self.stopped.is_some() {
            return Err(StateError::AlreadyStopped);
        }
        self.stopped = Some((now, wall));
        Ok(())
    }

    /// Whether the activity has been started.
    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// Whether the activity has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    /// Get the wall-clock start time, if started.
    pub fn start_wall(&self) -> Option<SystemTime> {
        self.started.map(|(_, wall)| wall)
    }

    /// Get the wall-clock stop time, if stopped.
    pub fn stop_wall(&self) -> Option<SystemTime> {
        self.stopped.map(|(_, wall)| wall)
    }

    /// Get the elapsed time in microseconds, once stopped.
    pub fn elapsed_micros(&self) -> Option<u64> {
        match (self.started, self.stopped) {
            (Some((start, _)), Some((stop, _))) => {
                let elapsed = stop.saturating_duration_since(start).as_micros();
                Some(u64::try_from(elapsed).unwrap_or(u64::MAX))
            }
            _ => None,
        }
    }

    /// Resolve the completion code: an explicit code, else success.
    pub fn completion(&self) -> CompletionCode {
        self.completion_override.unwrap_or(CompletionCode::Success)
    }
}
