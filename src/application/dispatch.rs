//! Record delivery pipeline.
//!
//! [`SinkDispatch`] is the thin layer between a tracker and its sink. Every
//! record passes four stages: the selector's severity floor, the rate
//! limiter, the formatter, and finally the sink write. Delivery failures are
//! reported to registered error listeners and logged; they never propagate
//! back into the instrumentation call path. Listener callbacks are
//! panic-isolated so a misbehaving observer cannot take down delivery.

use std::panic;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::limiter::RateLimiter;
use super::ports::{Formatter, Record, Sink, SinkError, SinkErrorListener, SinkLogListener};
use super::selector::ConditionalSelector;
use super::stats::TrackerStats;

/// Delivery pipeline for one tracker.
///
/// The sink is opened lazily on the first record that reaches it; `flush` and
/// `close`, being deliberate maintenance calls, return their sink's error to
/// the direct caller.
#[derive(Debug)]
pub struct SinkDispatch {
    sink: Arc<dyn Sink>,
    formatter: Arc<dyn Formatter>,
    selector: Arc<ConditionalSelector>,
    limiter: Arc<RateLimiter>,
    stats: TrackerStats,
    error_listeners: Mutex<Vec<Arc<dyn SinkErrorListener>>>,
    log_listeners: Mutex<Vec<Arc<dyn SinkLogListener>>>,
}

impl SinkDispatch {
    /// Assemble a pipeline.
    pub fn new(
        sink: Arc<dyn Sink>,
        formatter: Arc<dyn Formatter>,
        selector: Arc<ConditionalSelector>,
        limiter: Arc<RateLimiter>,
        stats: TrackerStats,
    ) -> Self {
        Self {
            sink,
            formatter,
            selector,
            limiter,
            stats,
            error_listeners: Mutex::new(Vec::new()),
            log_listeners: Mutex::new(Vec::new()),
        }
    }

    /// Deliver one record.
    ///
    /// Records below the selector's severity floor are counted and dropped.
    /// Everything else acquires limiter budget (blocking as required), is
    /// formatted once, and written. A write or open failure is routed to the
    /// error listeners; the caller never sees it.
    pub fn dispatch(&self, record: Record<'_>) {
        if !self.selector.severity_enabled(record.severity()) {
            self.stats.record_filtered();
            return;
        }

        self.limiter.obtain(1, record.approx_size());

        if let Err(err) = self.ensure_open() {
            self.deliver_failed(record, err);
            return;
        }

        let formatted = self.formatter.format(record);
        match self.sink.write(record, &formatted) {
            Ok(()) => {
                self.stats.record_delivered();
                self.notify_written(record);
            }
            Err(err) => self.deliver_failed(record, err),
        }
    }

    /// Flush the sink.
    pub fn flush(&self) -> Result<(), SinkError> {
        self.sink.flush()
    }

    /// Close the sink if it is open.
    pub fn close(&self) -> Result<(), SinkError> {
        if self.sink.is_open() {
            self.sink.close()?;
            debug!(target: "optrack::dispatch", "sink closed");
        }
        Ok(())
    }

    /// Whether the sink is currently open.
    pub fn is_open(&self) -> bool {
        self.sink.is_open()
    }

    /// Get the rate limiter in front of the sink.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Register a delivery-failure listener.
    pub fn add_error_listener(&self, listener: Arc<dyn SinkErrorListener>) {
        self.error_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Unregister a previously registered delivery-failure listener.
    pub fn remove_error_listener(&self, listener: &Arc<dyn SinkErrorListener>) {
        self.error_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// Register a successful-delivery listener.
    pub fn add_log_listener(&self, listener: Arc<dyn SinkLogListener>) {
        self.log_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Unregister a previously registered successful-delivery listener.
    pub fn remove_log_listener(&self, listener: &Arc<dyn SinkLogListener>) {
        self.log_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    fn ensure_open(&self) -> Result<(), SinkError> {
        if self.sink.is_open() {
            return Ok(());
        }
        self.sink.open()?;
        debug!(target: "optrack::dispatch", "sink opened");
        Ok(())
    }

    fn deliver_failed(&self, record: Record<'_>, err: SinkError) {
        self.stats.record_delivery_error();
        warn!(
            target: "optrack::dispatch",
            error = %err,
            kind = record.kind(),
            "record delivery failed"
        );

        let listeners = self
            .error_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                listener.on_error(record, &err);
            }));
            if result.is_err() {
                warn!(target: "optrack::dispatch", "sink error listener panicked");
            }
        }
    }

    fn notify_written(&self, record: Record<'_>) {
        let listeners = self
            .log_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                listener.on_write(record);
            }));
            if result.is_err() {
                warn!(target: "optrack::dispatch", "sink log listener panicked");
            }
        }
    }
}
