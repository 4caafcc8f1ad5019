//! Basic example demonstrating activity and event tracking.
//!
//! This example wires a runtime to a stdout sink, times a unit of work with
//! a nested event, and shows the severity floor and conditional tokens
//! steering what gets delivered.

use std::sync::Arc;

use tracing_subscriber::prelude::*;

use optrack::{
    Activity, Event, Message, OpType, Record, Severity, Sink, SinkError, TrackingRuntime,
};

/// Sink that prints every formatted record to stdout.
#[derive(Debug)]
struct StdoutSink;

impl Sink for StdoutSink {
    fn open(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }

    fn write(&self, _record: Record<'_>, formatted: &str) -> Result<(), SinkError> {
        println!("{}", formatted);
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

fn main() {
    // Internal diagnostics from the library go through `tracing`.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let runtime = TrackingRuntime::builder("checkout")
        .with_sink(Arc::new(StdoutSink))
        .build()
        .expect("a sink was supplied");

    println!("=== Basic Tracking Example ===\n");

    let tracker = runtime.tracker("orders").expect("tracker builds");

    // Time a unit of work. The event records inside the activity and is
    // delivered with it when the activity stops.
    println!("Tracking one order placement:");
    let id = tracker
        .start_activity(Activity::new("place-order"))
        .expect("no activity is open yet");

    let mut event = Event::new("reserve-stock", OpType::Call);
    tracker.start_event(&mut event).expect("tracker is open");
    std::thread::sleep(std::time::Duration::from_millis(25));
    tracker.stop_event(&mut event).expect("event was started");
    tracker.record_event(event).expect("event was stopped");

    tracker.stop_activity(id).expect("the activity is innermost");

    // Direct messages pass the severity floor before they reach the sink.
    println!("\nRaising the severity floor to WARNING:");
    tracker.selector().set_floor(Severity::Warning);
    tracker
        .log(Severity::Info, Message::new("this line is filtered out"))
        .expect("tracker is open");
    tracker
        .log(Severity::Error, Message::new("payment gateway unreachable"))
        .expect("tracker is open");

    // Conditional tokens gate optional instrumentation blocks.
    println!("\nConditional emission:");
    tracker.selector().set(Severity::Debug, "sql.trace");
    if tracker.selector().is_set(Severity::Debug, "sql.trace") {
        println!("sql.trace is on, collecting statement timings");
    }
    if !tracker.selector().is_set(Severity::Debug, "cache.trace") {
        println!("cache.trace is off, skipping that block");
    }

    runtime.shutdown();

    println!("\n=== Example Complete ===");
    println!(
        "Delivered {} records, filtered {}.",
        tracker.stats().records_delivered(),
        tracker.stats().records_filtered()
    );
}
