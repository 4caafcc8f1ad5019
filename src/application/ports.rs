//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports: clocks, sinks,
//! formatters, dump providers and destinations, and the listener protocols
//! through which delivery outcomes are observed.

use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Instant, SystemTime};

use crate::domain::activity::Activity;
use crate::domain::event::Event;
use crate::domain::message::Message;
use crate::domain::severity::Severity;
use crate::domain::snapshot::{DumpCollection, Snapshot};

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time
/// without depending on system clock implementation details.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
///
/// Monotonic instants drive elapsed-time derivation; wall-clock times are
/// recorded separately for correlation and display.
pub trait Clock: Send + Sync + Debug {
    /// Get the current monotonic instant.
    fn now(&self) -> Instant;

    /// Get the current wall-clock time.
    fn wall_now(&self) -> SystemTime;
}

/// Port for concurrent key-value storage.
///
/// This abstraction allows the application layer to keep shared registries
/// without depending on specific concurrent data structure implementations.
/// Infrastructure provides concrete implementations (ShardedStorage).
///
/// Values cross the port by clone; registries store `Arc`ed values so clones
/// are handle copies.
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Fetch the value for a key.
    fn get(&self, key: &K) -> Option<V>;

    /// Fetch the value for a key, creating it when absent.
    ///
    /// The factory runs at most once per missing key even under concurrent
    /// callers; losers of the creation race observe the winner's value. A
    /// factory error leaves the storage without an entry for the key.
    fn get_or_try_insert<E, F>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>;

    /// Remove a key, returning its value when present.
    fn remove(&self, key: &K) -> Option<V>;

    /// Remove every entry, returning the removed pairs.
    fn drain(&self) -> Vec<(K, V)>;

    /// Iterate over all entries, providing access to both key and value.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V);

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;
}

/// Borrowed view over any record deliverable through a sink.
///
/// Dispatch passes this view to the formatter and the sink so neither needs
/// ownership; `approx_size` feeds the rate limiter's byte accounting before
/// any formatting happens.
#[derive(Debug, Clone, Copy)]
pub enum Record<'a> {
    /// A completed activity with its owned events
    Activity(&'a Activity),
    /// A standalone completed event
    Event(&'a Event),
    /// A user-recorded property snapshot
    Snapshot(&'a Snapshot),
    /// A direct log message at the given severity
    Message(Severity, &'a Message),
}

impl Record<'_> {
    /// Get the record's severity.
    pub fn severity(&self) -> Severity {
        match self {
            Record::Activity(activity) => activity.severity(),
            Record::Event(event) => event.severity(),
            Record::Snapshot(snapshot) => snapshot.severity(),
            Record::Message(severity, _) => *severity,
        }
    }

    /// Get the record kind as an upper-case name.
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Activity(_) => "ACTIVITY",
            Record::Event(_) => "EVENT",
            Record::Snapshot(_) => "SNAPSHOT",
            Record::Message(_, _) => "MESSAGE",
        }
    }

    /// Approximate intrinsic payload size in bytes.
    ///
    /// Computed from unformatted content so rate limiting can account for a
    /// record before the formatter runs.
    pub fn approx_size(&self) -> u64 {
        let size = match self {
            Record::Activity(activity) => {
                activity.name().len()
                    + activity
                        .events()
                        .iter()
                        .map(event_size)
                        .sum::<usize>()
            }
            Record::Event(event) => event_size(event),
            Record::Snapshot(snapshot) => {
                snapshot.name().len()
                    + snapshot.category().len()
                    + snapshot
                        .properties()
                        .iter()
                        .map(|(k, v)| k.len() + v.len())
                        .sum::<usize>()
            }
            Record::Message(_, message) => message.size(),
        };
        size as u64
    }
}

fn event_size(event: &Event) -> usize {
    event.name().len() + event.message().map(Message::size).unwrap_or(0)
}

/// Error produced by sink and dump-destination operations.
#[derive(Debug)]
pub enum SinkError {
    /// The destination has not been opened
    NotOpen,
    /// An underlying I/O failure
    Io(std::io::Error),
    /// A destination-specific failure described by the adapter
    Failed(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::NotOpen => write!(f, "sink is not open"),
            SinkError::Io(err) => write!(f, "sink I/O failure: {}", err),
            SinkError::Failed(reason) => write!(f, "sink failure: {}", reason),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

/// Error produced when a dump provider fails to collect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpError {
    message: String,
}

impl DumpError {
    /// Describe a collection failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dump collection failed: {}", self.message)
    }
}

impl std::error::Error for DumpError {}

/// A failure attached to a dump phase notification.
#[derive(Debug)]
pub enum DumpFault {
    /// A destination open/write/close failure
    Sink(SinkError),
    /// A provider collection failure
    Collection(DumpError),
}

impl fmt::Display for DumpFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpFault::Sink(err) => fmt::Display::fmt(err, f),
            DumpFault::Collection(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for DumpFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DumpFault::Sink(err) => Some(err),
            DumpFault::Collection(err) => Some(err),
        }
    }
}

/// Port for delivering formatted records to a destination.
///
/// This abstraction is the only coupling between the tracking core and
/// concrete destinations. All operations are fallible; write failures are
/// routed to error listeners by the dispatch layer, never back into the
/// instrumentation call path.
pub trait Sink: Send + Sync + Debug {
    /// Open the destination.
    fn open(&self) -> Result<(), SinkError>;

    /// Close the destination, releasing its resources.
    fn close(&self) -> Result<(), SinkError>;

    /// Whether the destination is currently open.
    fn is_open(&self) -> bool;

    /// Deliver one record.
    ///
    /// # Arguments
    /// * `record` - The structured view, for destinations that re-serialize
    /// * `formatted` - The formatter's text rendering of the same record
    fn write(&self, record: Record<'_>, formatted: &str) -> Result<(), SinkError>;

    /// Flush any buffered records.
    fn flush(&self) -> Result<(), SinkError>;
}

/// Port for rendering records as text.
///
/// Implementations must be pure: same record in, same text out, no I/O.
/// Infrastructure provides the default implementation (TextFormatter).
pub trait Formatter: Send + Sync + Debug {
    /// Render one record.
    fn format(&self, record: Record<'_>) -> String;
}

/// Port for collecting one category of process introspection state.
///
/// Providers are registered with the dump orchestrator and invoked on every
/// dump pass. A failing provider never aborts the pass; its failure is
/// isolated and reported through an `Error`-phase notification.
pub trait DumpProvider: Send + Sync + Debug {
    /// Stable provider name, used to attribute notifications.
    fn name(&self) -> &str;

    /// Category of state this provider describes.
    fn category(&self) -> &str;

    /// Collect the current state.
    fn collect(&self) -> Result<DumpCollection, DumpError>;
}

/// Port for writing dump collections to a destination.
///
/// Destinations are opened once per dump pass, written per collection, and
/// closed at the end; each step is independently fallible per destination.
pub trait DumpSink: Send + Sync + Debug {
    /// Stable destination name, used in notifications.
    fn name(&self) -> &str;

    /// Open the destination for a dump pass.
    fn open(&self) -> Result<(), SinkError>;

    /// Close the destination after a dump pass.
    fn close(&self) -> Result<(), SinkError>;

    /// Write one collection.
    fn write(&self, collection: &DumpCollection) -> Result<(), SinkError>;
}

/// Where in the dump pass a notification was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpPhase {
    /// A provider's collection succeeded and is about to be written
    Before,
    /// A provider's collection has been written to all destinations
    After,
    /// The whole pass finished
    Complete,
    /// An open, close, or collection failure occurred
    Error,
}

impl DumpPhase {
    /// Get the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DumpPhase::Before => "BEFORE",
            DumpPhase::After => "AFTER",
            DumpPhase::Complete => "COMPLETE",
            DumpPhase::Error => "ERROR",
        }
    }
}

impl fmt::Display for DumpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dump phase notification.
///
/// `source` is the provider name for Before/After and collection errors, the
/// destination name for open/close errors, and the orchestrator's own name
/// for Complete.
#[derive(Debug)]
pub struct DumpEvent<'a> {
    /// Who the notification is about
    pub source: &'a str,
    /// Where in the pass it was raised
    pub phase: DumpPhase,
    /// The collection involved, for Before/After
    pub collection: Option<&'a DumpCollection>,
    /// Names of the destinations targeted by this pass
    pub destinations: &'a [String],
    /// The failure being reported, for Error and faulted After phases
    pub fault: Option<&'a DumpFault>,
}

/// Port for observing dump phase notifications.
///
/// Notifications are fire-and-forget: a panicking listener is isolated and
/// never prevents other listeners from running nor aborts the dump pass.
pub trait DumpListener: Send + Sync + Debug {
    /// Receive one phase notification.
    fn on_dump(&self, event: &DumpEvent<'_>);
}

/// Port for observing per-record delivery failures.
pub trait SinkErrorListener: Send + Sync + Debug {
    /// Receive one delivery failure.
    fn on_error(&self, record: Record<'_>, error: &SinkError);
}

/// Port for observing successful record deliveries.
pub trait SinkLogListener: Send + Sync + Debug {
    /// Receive one delivered record.
    fn on_write(&self, record: Record<'_>);
}
