//! # optrack
//!
//! An application-embeddable instrumentation runtime: track activities and
//! the events nested inside them, deliver the completed records through
//! pluggable sinks, and capture introspective process-state dumps on demand,
//! on shutdown, or on an uncaught panic.
//!
//! The crate has no async runtime and no background threads. Everything runs
//! on the calling thread; the only blocking points are the rate limiter
//! (which sleeps exactly as long as the configured budget requires) and
//! short internal locks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use optrack::{
//!     Activity, Event, OpType, Record, Severity, Sink, SinkError, TrackingRuntime,
//! };
//!
//! // A sink is the one piece the embedder always supplies: where formatted
//! // records go.
//! #[derive(Debug)]
//! struct StdoutSink;
//!
//! impl Sink for StdoutSink {
//!     fn open(&self) -> Result<(), SinkError> {
//!         Ok(())
//!     }
//!     fn close(&self) -> Result<(), SinkError> {
//!         Ok(())
//!     }
//!     fn is_open(&self) -> bool {
//!         true
//!     }
//!     fn write(&self, _record: Record<'_>, formatted: &str) -> Result<(), SinkError> {
//!         println!("{}", formatted);
//!         Ok(())
//!     }
//!     fn flush(&self) -> Result<(), SinkError> {
//!         Ok(())
//!     }
//! }
//!
//! let runtime = TrackingRuntime::builder("checkout")
//!     .with_sink(Arc::new(StdoutSink))
//!     .build()
//!     .unwrap();
//! let tracker = runtime.tracker("orders").unwrap();
//!
//! // Time a unit of work with a nested, timed step.
//! let order = tracker.start_activity(Activity::new("place-order")).unwrap();
//!
//! let mut step = Event::new("reserve-stock", OpType::Call);
//! tracker.start_event(&mut step).unwrap();
//! // ... the work being measured ...
//! tracker.stop_event(&mut step).unwrap();
//! tracker.record_event(step).unwrap();
//!
//! tracker.stop_activity(order).unwrap();
//!
//! // Log a direct message outside any activity.
//! tracker.log(Severity::Info, optrack::Message::new("order placed")).unwrap();
//!
//! runtime.shutdown();
//! ```
//!
//! ## Features
//!
//! ### Activity tracking
//! - **Nested activities**: activities stack per tracker; stops must come in
//!   LIFO order and an out-of-order stop is rejected, not papered over
//! - **Timed events**: events carry monotonic elapsed time plus wall-clock
//!   timestamps, an optional caller-supplied elapsed override, correlators,
//!   and fault text
//! - **Attachment**: an event recorded while an activity is open rides with
//!   that activity; otherwise it is dispatched standalone immediately
//! - **Snapshots and messages**: user property snapshots and direct log
//!   messages flow through the same delivery pipeline
//!
//! ### Delivery pipeline
//! - **Pluggable sinks**: one [`Sink`] implementation per destination;
//!   failures are routed to error listeners and never back into the
//!   instrumentation call path
//! - **Conditional emission**: a severity floor plus a token table
//!   ([`ConditionalSelector`]) gate what is formatted and written
//! - **Rate limiting**: a blocking [`RateLimiter`] bounds messages/sec and
//!   bytes/sec per tracker
//! - **Statistics**: every tracker counts what it started, completed,
//!   delivered, filtered, and failed ([`TrackerStats`])
//!
//! ### Process-state dumps
//! - **Providers**: each [`DumpProvider`] collects one category of
//!   introspection state into a [`DumpCollection`]
//! - **Destinations**: collections are written to every associated
//!   [`DumpSink`]; open/write/close failures are isolated per destination
//! - **Listeners**: [`DumpListener`]s observe `Before`/`After`/`Complete`/
//!   `Error` phases, panic-isolated
//! - **Triggers**: call [`TrackingRuntime::dump`] directly, let the shutdown
//!   hook run a pass, or chain the panic hook with
//!   [`TrackingRuntime::install_panic_dump`]
//!
//! ## Conditional emission
//!
//! Trackers share their selector with the embedding application, which can
//! flip emission at runtime without touching call sites:
//!
//! ```rust
//! use optrack::{ConditionalSelector, Severity};
//!
//! let selector = ConditionalSelector::new();
//! selector.set(Severity::Debug, "sql.trace");
//!
//! // Enabled at Debug and above for this key only.
//! assert!(selector.is_set(Severity::Error, "sql.trace"));
//! assert!(!selector.is_set(Severity::Trace, "sql.trace"));
//! assert!(!selector.is_set(Severity::Error, "http.trace"));
//! ```
//!
//! ## Rate limiting
//!
//! The limiter paces emission over the window since its last reset. Either
//! axis may be 0 (unlimited); accounting accumulates regardless:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use optrack::infrastructure::mocks::MockClock;
//! use optrack::RateLimiter;
//!
//! let limiter = RateLimiter::new(1_000, 0, Arc::new(MockClock::new()));
//! assert!(limiter.try_obtain(1, 64));
//! assert_eq!(limiter.total_msgs(), 1);
//! assert_eq!(limiter.total_bytes(), 64);
//! ```
//!
//! `obtain` blocks for however long the budget requires, `try_obtain` never
//! blocks, and `try_obtain_for` blocks up to a timeout and consumes nothing
//! when it refuses.
//!
//! ## Shutdown and fault dumps
//!
//! [`TrackingRuntime::shutdown`] runs the registered shutdown hooks once, in
//! registration order, then closes every tracker. The builder can register
//! two built-in hooks: a dump pass with `DumpReason::Shutdown` and a
//! best-effort flush of every tracker. Environment switches (read by
//! [`RuntimeSettings::from_env`]) drive the same wiring without code
//! changes:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `OPTRACK_DEFAULT_DUMP_PROVIDERS` | register the registry dump provider |
//! | `OPTRACK_DUMP_ON_SHUTDOWN` | dump pass during `shutdown()` |
//! | `OPTRACK_DUMP_ON_PANIC` | chain the process panic hook |
//! | `OPTRACK_FLUSH_ON_SHUTDOWN` | flush all trackers during `shutdown()` |
//! | `OPTRACK_MAX_MSGS_PER_SEC` | default per-tracker message budget |
//! | `OPTRACK_MAX_BYTES_PER_SEC` | default per-tracker byte budget |
//!
//! All booleans default to off; the rate limits default to 0 (unlimited).
//!
//! ## Memory and concurrency
//!
//! Trackers are `Arc`-shared handles safe to use from any thread. The
//! identity-to-tracker map and the selector token table are sharded
//! concurrent maps; statistics and limiter counters are individual atomics.
//! The per-tracker activity stack is a mutex because nesting is inherently
//! ordered. Dump passes serialize behind a gate so two triggers cannot
//! interleave their phase notifications.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - concrete adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    activity::{Activity, ActivityId, StateError},
    event::{CompletionCode, Event, OpType},
    identity::{ConfigDigest, SourceType, TrackerIdentity},
    message::{Message, MessageError},
    severity::{ParseSeverityError, Severity},
    snapshot::{DumpCollection, DumpReason, Snapshot},
};

pub use application::{
    dispatch::SinkDispatch,
    limiter::RateLimiter,
    orchestrator::DumpOrchestrator,
    ports::{
        Clock, DumpError, DumpEvent, DumpFault, DumpListener, DumpPhase, DumpProvider, DumpSink,
        Formatter, Record, Sink, SinkError, SinkErrorListener, SinkLogListener, Storage,
    },
    registry::TrackerRegistry,
    selector::{ConditionalSelector, SelectorToken},
    stats::{TrackerStats, TrackerStatsSnapshot},
    timer::ActivityTimer,
    tracker::{BuildError, Tracker, TrackerBuilder, TrackerError},
};

pub use infrastructure::{
    clock::SystemClock,
    format::TextFormatter,
    hooks::ShutdownHooks,
    introspect::RegistryDumpProvider,
    runtime::{TrackerStore, TrackingRuntime, TrackingRuntimeBuilder},
    settings::RuntimeSettings,
    storage::ShardedStorage,
};
