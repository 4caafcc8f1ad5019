//! Mock dump providers, destinations, and listeners for testing.

use crate::application::ports::{
    DumpError, DumpEvent, DumpListener, DumpPhase, DumpProvider, DumpSink, SinkError,
};
use crate::domain::snapshot::DumpCollection;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Dump destination keeping every written collection in memory.
///
/// Open, write, and close can each be made to fail independently.
#[derive(Debug)]
pub struct MemoryDumpSink {
    name: String,
    written: Mutex<Vec<DumpCollection>>,
    open_count: AtomicUsize,
    close_count: AtomicUsize,
    fail_open: AtomicBool,
    fail_writes: AtomicBool,
    fail_close: AtomicBool,
}

impl MemoryDumpSink {
    /// Create an empty destination with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: Mutex::new(Vec::new()),
            open_count: AtomicUsize::new(0),
            close_count: AtomicUsize::new(0),
            fail_open: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
        }
    }

    /// Collections written so far.
    pub fn written(&self) -> Vec<DumpCollection> {
        self.written
            .lock()
            .expect("MemoryDumpSink mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }

    /// How many times the destination was opened.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// How many times the destination was closed.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Make `open` fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make `write` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `close` fail.
    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }
}

impl DumpSink for MemoryDumpSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), SinkError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SinkError::Failed("open refused".to_string()));
        }
        self.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(SinkError::Failed("close refused".to_string()));
        }
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write(&self, collection: &DumpCollection) -> Result<(), SinkError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SinkError::Failed("write refused".to_string()));
        }
        self.written
            .lock()
            .expect("MemoryDumpSink mutex poisoned - a test thread panicked while holding the lock")
            .push(collection.clone());
        Ok(())
    }
}

/// Provider returning a fixed property set on every collection pass.
#[derive(Debug)]
pub struct StaticDumpProvider {
    name: String,
    category: String,
    properties: Vec<(String, String)>,
}

impl StaticDumpProvider {
    /// Create a provider with no properties.
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            properties: Vec::new(),
        }
    }

    /// Add a property to every produced collection.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }
}

impl DumpProvider for StaticDumpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn collect(&self) -> Result<DumpCollection, DumpError> {
        let mut collection = DumpCollection::new(self.name.clone(), self.category.clone());
        for (key, value) in &self.properties {
            collection.set_property(key.clone(), value.clone());
        }
        Ok(collection)
    }
}

/// Provider whose collection pass always fails.
#[derive(Debug)]
pub struct FailingDumpProvider {
    name: String,
}

impl FailingDumpProvider {
    /// Create a provider with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl DumpProvider for FailingDumpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> &str {
        "failing"
    }

    fn collect(&self) -> Result<DumpCollection, DumpError> {
        Err(DumpError::new("collection refused"))
    }
}

/// One observed dump notification.
#[derive(Debug, Clone)]
pub struct CapturedDump {
    /// Provider or destination the event names
    pub source: String,
    /// Phase of the pass
    pub phase: DumpPhase,
    /// Destination names carried on the event
    pub destinations: Vec<String>,
    /// Whether a fault rode along
    pub had_fault: bool,
}

/// Listener recording every dump notification it receives.
#[derive(Debug, Default)]
pub struct CaptureDumpListener {
    events: Mutex<Vec<CapturedDump>>,
}

impl CaptureDumpListener {
    /// Create an empty listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications captured so far, in arrival order.
    pub fn captured(&self) -> Vec<CapturedDump> {
        self.events
            .lock()
            .expect("listener mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }
}

impl DumpListener for CaptureDumpListener {
    fn on_dump(&self, event: &DumpEvent<'_>) {
        self.events
            .lock()
            .expect("listener mutex poisoned - a test thread panicked while holding the lock")
            .push(CapturedDump {
                source: event.source.to_string(),
                phase: event.phase,
                destinations: event.destinations.to_vec(),
                had_fault: event.fault.is_some(),
            });
    }
}

/// Dump listener that panics when notified.
#[derive(Debug)]
pub struct PanickingDumpListener;

impl DumpListener for PanickingDumpListener {
    fn on_dump(&self, _event: &DumpEvent<'_>) {
        panic!("listener exploded");
    }
}
