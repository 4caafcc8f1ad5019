//! Mock sinks and delivery listeners for testing.

use crate::application::ports::{Record, Sink, SinkError, SinkErrorListener, SinkLogListener};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Sink that records every formatted line it receives.
///
/// Thread-safe; clones of the `Arc` handle observe the same state.
#[derive(Debug, Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<String>>,
    open: AtomicBool,
    open_count: AtomicUsize,
    flush_count: AtomicUsize,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Formatted lines written so far.
    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .expect("RecordingSink mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }

    /// How many times the sink was opened.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// How many times the sink was flushed.
    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }
}

impl Sink for RecordingSink {
    fn open(&self) -> Result<(), SinkError> {
        self.open.store(true, Ordering::SeqCst);
        self.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn write(&self, _record: Record<'_>, formatted: &str) -> Result<(), SinkError> {
        self.writes
            .lock()
            .expect("RecordingSink mutex poisoned - a test thread panicked while holding the lock")
            .push(formatted.to_string());
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink whose operations fail on demand.
///
/// Each stage has its own switch so tests can fail exactly one of open,
/// write, flush, or close.
#[derive(Debug, Default)]
pub struct FailingSink {
    open: AtomicBool,
    fail_open: AtomicBool,
    fail_writes: AtomicBool,
    fail_flush: AtomicBool,
    fail_close: AtomicBool,
}

impl FailingSink {
    /// Create a sink with every switch off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open` fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make `write` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `flush` fail.
    pub fn set_fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Make `close` fail.
    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }
}

impl Sink for FailingSink {
    fn open(&self) -> Result<(), SinkError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SinkError::Failed("open refused".to_string()));
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(SinkError::Failed("close refused".to_string()));
        }
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn write(&self, _record: Record<'_>, _formatted: &str) -> Result<(), SinkError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SinkError::Failed("write refused".to_string()));
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(SinkError::Failed("flush refused".to_string()));
        }
        Ok(())
    }
}

/// Error listener capturing every delivery failure it is told about.
#[derive(Debug, Default)]
pub struct CaptureErrorListener {
    errors: Mutex<Vec<String>>,
}

impl CaptureErrorListener {
    /// Create an empty listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered errors captured so far.
    pub fn captured(&self) -> Vec<String> {
        self.errors
            .lock()
            .expect("listener mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }
}

impl SinkErrorListener for CaptureErrorListener {
    fn on_error(&self, _record: Record<'_>, error: &SinkError) {
        self.errors
            .lock()
            .expect("listener mutex poisoned - a test thread panicked while holding the lock")
            .push(error.to_string());
    }
}

/// Log listener counting successful deliveries.
#[derive(Debug, Default)]
pub struct CaptureLogListener {
    written: AtomicUsize,
}

impl CaptureLogListener {
    /// Create a listener with a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful deliveries observed.
    pub fn count(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }
}

impl SinkLogListener for CaptureLogListener {
    fn on_write(&self, _record: Record<'_>) {
        self.written.fetch_add(1, Ordering::SeqCst);
    }
}

/// Error listener that panics when notified.
#[derive(Debug)]
pub struct PanickingErrorListener;

impl SinkErrorListener for PanickingErrorListener {
    fn on_error(&self, _record: Record<'_>, _error: &SinkError) {
        panic!("listener exploded");
    }
}
