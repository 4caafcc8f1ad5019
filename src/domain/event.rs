//! Timed sub-units of work.
//!
//! An [`Event`] is a named, timed operation that either belongs to an
//! in-flight activity or stands alone. It carries the operation vocabulary
//! ([`OpType`], [`CompletionCode`]), correlators and tags for cross-record
//! grouping, an optional [`Message`] payload, and an optional fault. Start and
//! stop timestamps are immutable once set; elapsed time is derived from the
//! monotonic clock unless the caller supplies an explicit override.

use std::fmt;
use std::time::{Instant, SystemTime};

use super::activity::StateError;
use super::message::Message;
use super::severity::Severity;

/// The kind of operation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum OpType {
    /// A synchronous call into another component
    Call,
    /// A generic point-in-time occurrence
    Event,
    /// An outbound transfer
    Send,
    /// An inbound transfer
    Receive,
    /// The beginning of a larger unit
    Start,
    /// The end of a larger unit
    Stop,
    /// Anything not covered by the other kinds
    Other,
}

impl OpType {
    /// Get the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Call => "CALL",
            OpType::Event => "EVENT",
            OpType::Send => "SEND",
            OpType::Receive => "RECEIVE",
            OpType::Start => "START",
            OpType::Stop => "STOP",
            OpType::Other => "OTHER",
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a timed unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CompletionCode {
    /// Completed normally
    Success,
    /// Completed with a non-fatal fault attached
    Warning,
    /// Completed with an error
    Error,
}

impl CompletionCode {
    /// Get the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionCode::Success => "SUCCESS",
            CompletionCode::Warning => "WARNING",
            CompletionCode::Error => "ERROR",
        }
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, timed sub-unit of work.
///
/// Lifecycle is `Created -> Started -> Stopped`, enforced by
/// [`Event::start_at`] and [`Event::stop_at`]. Timestamps come in pairs: a
/// monotonic [`Instant`] for elapsed-time derivation and a wall-clock
/// [`SystemTime`] for correlation and display. Stopping with an attached
/// fault and no explicit completion code resolves to
/// [`CompletionCode::Warning`].
#[derive(Debug, Clone)]
pub struct Event {
    name: String,
    severity: Severity,
    op_type: OpType,
    correlators: Vec<String>,
    tags: Vec<String>,
    message: Option<Message>,
    fault: Option<String>,
    completion_override: Option<CompletionCode>,
    elapsed_override_micros: Option<u64>,
    started: Option<(Instant, SystemTime)>,
    stopped: Option<(Instant, SystemTime)>,
}

impl Event {
    /// Create an event in the `Created` state.
    ///
    /// # Arguments
    /// * `name` - Operation name, e.g. `"db.query"`
    /// * `op_type` - The kind of operation
    pub fn new(name: impl Into<String>, op_type: OpType) -> Self {
        Self {
            name: name.into(),
            severity: Severity::Info,
            op_type,
            correlators: Vec::new(),
            tags: Vec::new(),
            message: None,
            fault: None,
            completion_override: None,
            elapsed_override_micros: None,
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

    /// Builder-style tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Builder-style message payload.
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }

    /// Get the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Get the operation kind.
    pub fn op_type(&self) -> OpType {
        self.op_type
    }

    /// Get the correlators.
    pub fn correlators(&self) -> &[String] {
        &self.correlators
    }

    /// Get the tags.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Get the message payload, if any.
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Get the attached fault text, if any.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Attach fault text.
    ///
    /// # Errors
    /// Returns [`StateError::AlreadyStopped`] once the event is stopped.
    pub fn set_fault(&mut self, fault: impl Into<String>) -> Result<(), StateError> {
        if self.stopped.is_some() {
            return Err(StateError::AlreadyStopped);
        }
        self.fault = Some(fault.into());
        Ok(())
    }

    /// Set an explicit completion code, overriding fault-derived resolution.
    ///
    /// # Errors
    /// Returns [`StateError::AlreadyStopped`] once the event is stopped.
    pub fn set_completion(&mut self, code: CompletionCode) -> Result<(), StateError> {
        if self.stopped.is_some() {
            return Err(StateError::AlreadyStopped);
        }
        self.completion_override = Some(code);
        Ok(())
    }

    /// Set a caller-supplied elapsed time in microseconds.
    ///
    /// The override takes precedence over the clock-derived duration.
    ///
    /// # Errors
    /// Returns [`StateError::AlreadyStopped`] once the event is stopped.
    pub fn set_elapsed_override_micros(&mut self, micros: u64) -> Result<(), StateError> {
        if self.stopped.is_some() {
            return Err(StateError::AlreadyStopped);
        }
        self.elapsed_override_micros = Some(micros);
        Ok(())
    }

    /// Mark the event started at the given timestamps.
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

    /// Mark the event stopped at the given timestamps.
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

    /// Attach fault text and stop in one step.
    ///
    /// # Errors
    /// Same conditions as [`Event::stop_at`].
    pub fn stop_faulted_at(
        &mut self,
        now: Instant,
        wall: SystemTime,
        fault: impl Into<String>,
    ) -> Result<(), StateError> {
        if self.started.is_none() {
            return Err(StateError::NotStarted);
        }
        if self.stopped.is_some() {
            return Err(StateError::AlreadyStopped);
        }
        self.fault = Some(fault.into());
        self.stopped = Some((now, wall));
        Ok(())
    }

    /// Whether the event has been started.
    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// Whether the event has been stopped.
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

    /// Get the elapsed time in microseconds.
    ///
    /// A caller-supplied override takes precedence; otherwise the duration is
    /// derived from the monotonic start/stop instants once both exist.
    pub fn elapsed_micros(&self) -> Option<u64> {
        if let Some(micros) = self.elapsed_override_micros {
            return Some(micros);
        }
        match (self.started, self.stopped) {
            (Some((start, _)), Some((stop, _))) => {
                let elapsed = stop.saturating_duration_since(start).as_micros();
                Some(u64::try_from(elapsed).unwrap_or(u64::MAX))
            }
            _ => None,
        }
    }

    /// Resolve the completion code.
    ///
    /// An explicit code wins; an attached fault without one resolves to
    /// [`CompletionCode::Warning`]; otherwise [`CompletionCode::Success`].
    pub fn completion(&self) -> CompletionCode {
        match self.completion_override {
            Some(code) => code,
            None if self.fault.is_some() => CompletionCode::Warning,
            None => CompletionCode::Success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn clock_pair() -> (Instant, SystemTime) {
        (Instant::now(), SystemTime::now())
    }

    #[test]
    fn test_stop_before_start_rejected() {
        let (now, wall) = clock_pair();
        let mut event = Event::new("op", OpType::Call);
        assert_eq!(event.stop_at(now, wall), Err(StateError::NotStarted));
    }

    #[test]
    fn test_double_start_rejected() {
        let (now, wall) = clock_pair();
        let mut event = Event::new("op", OpType::Call);
        event.start_at(now, wall).unwrap();
        assert_eq!(event.start_at(now, wall), Err(StateError::AlreadyStarted));
    }

    #[test]
    fn test_double_stop_rejected() {
        let (now, wall) = clock_pair();
        let mut event = Event::new("op", OpType::Call);
        event.start_at(now, wall).unwrap();
        event.stop_at(now, wall).unwrap();
        assert_eq!(event.stop_at(now, wall), Err(StateError::AlreadyStopped));
    }

    #[test]
    fn test_elapsed_derived_from_instants() {
        let start = Instant::now();
        let stop = start + Duration::from_millis(25);
        let wall = SystemTime::now();

        let mut event = Event::new("op", OpType::Call);
        event.start_at(start, wall).unwrap();
        event.stop_at(stop, wall).unwrap();

        assert_eq!(event.elapsed_micros(), Some(25_000));
    }

    #[test]
    fn test_elapsed_override_takes_precedence() {
        let start = Instant::now();
        let stop = start + Duration::from_millis(25);
        let wall = SystemTime::now();

        let mut event = Event::new("op", OpType::Call);
        event.set_elapsed_override_micros(7).unwrap();
        event.start_at(start, wall).unwrap();
        event.stop_at(stop, wall).unwrap();

        assert_eq!(event.elapsed_micros(), Some(7));
    }

    #[test]
    fn test_elapsed_absent_before_stop() {
        let (now, wall) = clock_pair();
        let mut event = Event::new("op", OpType::Call);
        assert_eq!(event.elapsed_micros(), None);
        event.start_at(now, wall).unwrap();
        assert_eq!(event.elapsed_micros(), None);
    }

    #[test]
    fn test_completion_defaults_to_success() {
        let (now, wall) = clock_pair();
        let mut event = Event::new("op", OpType::Call);
        event.start_at(now, wall).unwrap();
        event.stop_at(now, wall).unwrap();
        assert_eq!(event.completion(), CompletionCode::Success);
    }

    #[test]
    fn test_fault_resolves_to_warning() {
        let (now, wall) = clock_pair();
        let mut event = Event::new("op", OpType::Call);
        event.start_at(now, wall).unwrap();
        event.stop_faulted_at(now, wall, "timeout").unwrap();
        assert_eq!(event.completion(), CompletionCode::Warning);
        assert_eq!(event.fault(), Some("timeout"));
    }

    #[test]
    fn test_explicit_completion_wins_over_fault() {
        let (now, wall) = clock_pair();
        let mut event = Event::new("op", OpType::Call);
        event.set_completion(CompletionCode::Error).unwrap();
        event.start_at(now, wall).unwrap();
        event.stop_faulted_at(now, wall, "broken pipe").unwrap();
        assert_eq!(event.completion(), CompletionCode::Error);
    }

    #[test]
    fn test_stopped_event_rejects_mutation() {
        let (now, wall) = clock_pair();
        let mut event = Event::new("op", OpType::Call);
        event.start_at(now, wall).unwrap();
        event.stop_at(now, wall).unwrap();

        assert_eq!(event.set_fault("late"), Err(StateError::AlreadyStopped));
        assert_eq!(
            event.set_completion(CompletionCode::Error),
            Err(StateError::AlreadyStopped)
        );
        assert_eq!(
            event.set_elapsed_override_micros(1),
            Err(StateError::AlreadyStopped)
        );
    }

    #[test]
    fn test_wall_timestamps_recorded() {
        let start_wall = SystemTime::now();
        let stop_wall = start_wall + Duration::from_secs(1);
        let now = Instant::now();

        let mut event = Event::new("op", OpType::Send);
        event.start_at(now, start_wall).unwrap();
        event.stop_at(now, stop_wall).unwrap();

        assert_eq!(event.start_wall(), Some(start_wall));
        assert_eq!(event.stop_wall(), Some(stop_wall));
    }

    #[test]
    fn test_vocabulary_display() {
        assert_eq!(OpType::Receive.to_string(), "RECEIVE");
        assert_eq!(CompletionCode::Warning.to_string(), "WARNING");
    }
}
