//! Example walking through process-state dumps.
//!
//! A custom provider contributes application state, the built-in registry
//! provider contributes tracker statistics, and a listener narrates the
//! phases of each dump pass as it reaches the destination.

use std::sync::Arc;

use tracing_subscriber::prelude::*;

use optrack::{
    DumpCollection, DumpError, DumpEvent, DumpListener, DumpProvider, DumpReason, DumpSink,
    Message, Record, Severity, Sink, SinkError, TrackingRuntime,
};

/// Delivery sink for the trackers; dumps use their own destination type.
#[derive(Debug)]
struct DeliverySink;

impl Sink for DeliverySink {
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

/// Destination that prints every collection to stdout.
#[derive(Debug)]
struct StdoutDumpSink;

impl DumpSink for StdoutDumpSink {
    fn name(&self) -> &str {
        "stdout"
    }

    fn open(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn write(&self, collection: &DumpCollection) -> Result<(), SinkError> {
        println!("--- {}/{} ---", collection.category(), collection.name());
        if let Some(reason) = collection.reason() {
            println!("reason: {:?}", reason);
        }
        for (key, value) in collection.properties() {
            println!("{} = {}", key, value);
        }
        Ok(())
    }
}

/// Provider reporting work queue depths.
#[derive(Debug)]
struct QueueDepthProvider;

impl DumpProvider for QueueDepthProvider {
    fn name(&self) -> &str {
        "queues"
    }

    fn category(&self) -> &str {
        "application"
    }

    fn collect(&self) -> Result<DumpCollection, DumpError> {
        let mut collection = DumpCollection::new("queues", "application");
        collection.set_property("orders.pending", "17");
        collection.set_property("refunds.pending", "2");
        Ok(collection)
    }
}

/// Listener narrating each phase of the pass.
#[derive(Debug)]
struct NarratingListener;

impl DumpListener for NarratingListener {
    fn on_dump(&self, event: &DumpEvent<'_>) {
        println!("[{}] {}", event.phase, event.source);
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let runtime = TrackingRuntime::builder("worker")
        .with_sink(Arc::new(DeliverySink))
        .with_dump_destination(Arc::new(StdoutDumpSink))
        .with_registry_provider(true)
        .dump_on_shutdown(true)
        .build()
        .expect("a sink was supplied");

    runtime.orchestrator().add_provider(Arc::new(QueueDepthProvider));
    runtime.orchestrator().add_listener(Arc::new(NarratingListener));

    // Put some state into the registry so the built-in provider has
    // something to report.
    let tracker = runtime.tracker("jobs").expect("tracker builds");
    tracker
        .log(Severity::Info, Message::new("job started"))
        .expect("tracker is open");
    tracker
        .log(Severity::Info, Message::new("job finished"))
        .expect("tracker is open");

    println!("=== On-Demand Dump ===\n");
    runtime.dump(Some(DumpReason::Requested("operator asked".to_string())));

    println!("\n=== Shutdown Dump ===\n");
    // dump_on_shutdown(true) runs one more pass with the Shutdown reason.
    runtime.shutdown();

    println!("\n=== Example Complete ===");
}
