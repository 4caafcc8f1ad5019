//! Process-scoped runtime assembly.
//!
//! [`TrackingRuntime`] wires the tracker registry, the dump orchestrator, and
//! the shutdown hook list into one context object an application embeds and
//! owns. There are no process-wide statics: tests and embedders construct as
//! many independent runtimes as they need, and `shutdown()` tears one down
//! explicitly.
//!
//! The builder fills in everything a tracker needs so call sites only name
//! the operation source they instrument:
//!
//! ```
//! use std::sync::Arc;
//!
//! use optrack::domain::message::Message;
//! use optrack::domain::severity::Severity;
//! use optrack::infrastructure::mocks::RecordingSink;
//! use optrack::infrastructure::runtime::TrackingRuntime;
//!
//! let sink = Arc::new(RecordingSink::new());
//! let runtime = TrackingRuntime::builder("billing")
//!     .with_sink(sink.clone())
//!     .build()
//!     .unwrap();
//!
//! let tracker = runtime.tracker("invoices").unwrap();
//! tracker.log(Severity::Info, Message::new("invoice generated")).unwrap();
//! runtime.shutdown();
//!
//! assert_eq!(sink.writes().len(), 1);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::application::orchestrator::DumpOrchestrator;
use crate::application::ports::{Clock, DumpSink, Formatter, Sink};
use crate::application::registry::TrackerRegistry;
use crate::application::tracker::{BuildError, Tracker, TrackerBuilder};
use crate::domain::identity::{SourceType, TrackerIdentity};
use crate::domain::snapshot::DumpReason;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::format::TextFormatter;
use crate::infrastructure::hooks::ShutdownHooks;
use crate::infrastructure::introspect::RegistryDumpProvider;
use crate::infrastructure::settings::RuntimeSettings;
use crate::infrastructure::storage::ShardedStorage;

/// Concrete storage backing the runtime's tracker registry.
pub type TrackerStore = Arc<ShardedStorage<TrackerIdentity, Arc<Tracker>>>;

/// Builder assembling a [`TrackingRuntime`].
///
/// A delivery sink is the only required piece. The clock defaults to
/// [`SystemClock`], the formatter to [`TextFormatter`], and the remaining
/// switches follow the supplied [`RuntimeSettings`] unless overridden here.
#[derive(Debug)]
pub struct TrackingRuntimeBuilder {
    source: String,
    source_type: SourceType,
    sink: Option<Arc<dyn Sink>>,
    clock: Option<Arc<dyn Clock>>,
    formatter: Option<Arc<dyn Formatter>>,
    settings: RuntimeSettings,
    dump_destination: Option<Arc<dyn DumpSink>>,
    dump_on_shutdown: Option<bool>,
    flush_on_shutdown: Option<bool>,
    dump_on_panic: Option<bool>,
    registry_provider: Option<bool>,
    rate_limits: Option<(u64, u64)>,
}

impl TrackingRuntimeBuilder {
    /// Start a builder for the named operation source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_type: SourceType::Application,
            sink: None,
            clock: None,
            formatter: None,
            settings: RuntimeSettings::default(),
            dump_destination: None,
            dump_on_shutdown: None,
            flush_on_shutdown: None,
            dump_on_panic: None,
            registry_provider: None,
            rate_limits: None,
        }
    }

    /// Set the source kind recorded in every tracker identity.
    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    /// Set the delivery sink handed to every tracker. Required.
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the default [`SystemClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the default [`TextFormatter`].
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Supply the settings the unset switches fall back to.
    pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the default destination dumps are written to.
    pub fn with_dump_destination(mut self, destination: Arc<dyn DumpSink>) -> Self {
        self.dump_destination = Some(destination);
        self
    }

    /// Run a dump pass with [`DumpReason::Shutdown`] during `shutdown()`.
    pub fn dump_on_shutdown(mut self, enabled: bool) -> Self {
        self.dump_on_shutdown = Some(enabled);
        self
    }

    /// Flush every registered tracker during `shutdown()`.
    pub fn flush_on_shutdown(mut self, enabled: bool) -> Self {
        self.flush_on_shutdown = Some(enabled);
        self
    }

    /// Chain the process panic hook to run a dump pass on an uncaught panic.
    pub fn dump_on_panic(mut self, enabled: bool) -> Self {
        self.dump_on_panic = Some(enabled);
        self
    }

    /// Register the built-in [`RegistryDumpProvider`] with the orchestrator.
    pub fn with_registry_provider(mut self, enabled: bool) -> Self {
        self.registry_provider = Some(enabled);
        self
    }

    /// Default per-tracker rate limits, overriding the settings values.
    pub fn with_rate_limits(mut self, max_mps: u64, max_bps: u64) -> Self {
        self.rate_limits = Some((max_mps, max_bps));
        self
    }

    /// Assemble the runtime.
    ///
    /// Fails with [`BuildError::MissingSink`] when no delivery sink was
    /// supplied.
    pub fn build(self) -> Result<TrackingRuntime, BuildError> {
        let sink = self.sink.ok_or(BuildError::MissingSink)?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock::new()),
        };
        let formatter: Arc<dyn Formatter> = match self.formatter {
            Some(formatter) => formatter,
            None => Arc::new(TextFormatter::new()),
        };
        let settings = self.settings;
        let rate_limits = self
            .rate_limits
            .unwrap_or((settings.max_msgs_per_sec, settings.max_bytes_per_sec));

        let registry = TrackerRegistry::new(Arc::new(ShardedStorage::new()));
        let orchestrator = Arc::new(DumpOrchestrator::new());
        if let Some(destination) = self.dump_destination {
            orchestrator.set_default_destination(destination);
        }
        if self
            .registry_provider
            .unwrap_or(settings.default_dump_providers)
        {
            orchestrator.add_provider(Arc::new(RegistryDumpProvider::new(registry.clone())));
        }

        let hooks = ShutdownHooks::new();
        if self.dump_on_shutdown.unwrap_or(settings.dump_on_shutdown) {
            let orchestrator = Arc::clone(&orchestrator);
            hooks.register("dump-on-shutdown", move || {
                orchestrator.dump(Some(DumpReason::Shutdown));
            });
        }
        if self.flush_on_shutdown.unwrap_or(settings.flush_on_shutdown) {
            let registry = registry.clone();
            hooks.register("flush-on-shutdown", move || {
                registry.flush_all();
            });
        }

        let runtime = TrackingRuntime {
            source: self.source,
            source_type: self.source_type,
            sink,
            clock,
            formatter,
            rate_limits,
            settings,
            registry,
            orchestrator,
            hooks,
        };
        if self.dump_on_panic.unwrap_or(settings.dump_on_panic) {
            runtime.install_panic_dump();
        }
        debug!(
            target: "optrack::runtime",
            source = %runtime.source,
            "runtime built"
        );
        Ok(runtime)
    }
}

/// Process-scoped context owning the tracker registry, the dump
/// orchestrator, and the shutdown hook list.
#[derive(Debug)]
pub struct TrackingRuntime {
    source: String,
    source_type: SourceType,
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
    formatter: Arc<dyn Formatter>,
    rate_limits: (u64, u64),
    settings: RuntimeSettings,
    registry: TrackerRegistry<TrackerStore>,
    orchestrator: Arc<DumpOrchestrator>,
    hooks: ShutdownHooks,
}

impl TrackingRuntime {
    /// Start building a runtime for the named operation source.
    pub fn builder(source: impl Into<String>) -> TrackingRuntimeBuilder {
        TrackingRuntimeBuilder::new(source)
    }

    /// The operation source this runtime instruments.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The settings the runtime was assembled with.
    pub fn settings(&self) -> RuntimeSettings {
        self.settings
    }

    /// The tracker registry.
    pub fn registry(&self) -> &TrackerRegistry<TrackerStore> {
        &self.registry
    }

    /// The dump orchestrator, for registering providers and listeners.
    pub fn orchestrator(&self) -> &Arc<DumpOrchestrator> {
        &self.orchestrator
    }

    /// Fetch or create the tracker for `name` under this runtime's source
    /// kind, wired with the runtime defaults.
    pub fn tracker(&self, name: impl Into<String>) -> Result<Arc<Tracker>, BuildError> {
        let identity = TrackerIdentity::new(name, self.source_type);
        self.tracker_for(&identity)
    }

    /// Fetch or create the tracker for an explicit identity.
    pub fn tracker_for(&self, identity: &TrackerIdentity) -> Result<Arc<Tracker>, BuildError> {
        self.tracker_with(identity, |builder| builder)
    }

    /// Fetch or create a tracker, customizing its builder first.
    ///
    /// The builder arrives pre-wired with the runtime's sink, clock,
    /// formatter, and default rate limits; `configure` may replace any of
    /// them. It only runs when the identity is not registered yet.
    pub fn tracker_with<F>(
        &self,
        identity: &TrackerIdentity,
        configure: F,
    ) -> Result<Arc<Tracker>, BuildError>
    where
        F: FnOnce(TrackerBuilder) -> TrackerBuilder,
    {
        self.registry.get_or_create(identity, |identity| {
            let builder = Tracker::builder(identity.clone())
                .with_sink(Arc::clone(&self.sink))
                .with_clock(Arc::clone(&self.clock))
                .with_formatter(Arc::clone(&self.formatter))
                .with_rate_limits(self.rate_limits.0, self.rate_limits.1);
            configure(builder).build()
        })
    }

    /// Run a dump pass now.
    pub fn dump(&self, reason: Option<DumpReason>) {
        self.orchestrator.dump(reason);
    }

    /// Register a hook to run during `shutdown()`, after any built-in hooks.
    pub fn on_shutdown(&self, name: impl Into<String>, hook: impl FnOnce() + Send + 'static) {
        self.hooks.register(name, hook);
    }

    /// Tear the runtime down: run the registered shutdown hooks once, in
    /// registration order, then close every tracker.
    ///
    /// Calling `shutdown` again is harmless; hooks already consumed do not
    /// run twice.
    pub fn shutdown(&self) {
        debug!(
            target: "optrack::runtime",
            source = %self.source,
            "runtime shutting down"
        );
        self.hooks.run();
        self.registry.shutdown_all();
    }

    /// Chain the process panic hook so an uncaught panic runs a dump pass
    /// with [`DumpReason::Fault`] before normal panic reporting continues.
    ///
    /// The previous hook still runs afterwards. A panic raised inside the
    /// dump pass itself is contained and does not mask the original fault;
    /// re-entrant invocations skip the dump. Installing repeatedly chains
    /// repeatedly, so call this once per process.
    pub fn install_panic_dump(&self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let dumping = AtomicBool::new(false);
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if dumping
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let reason = DumpReason::Fault(describe_panic(info));
                // A panic inside the dump pass must not mask the fault
                // being reported.
                let _ = panic::catch_unwind(AssertUnwindSafe(|| {
                    orchestrator.dump(Some(reason));
                }));
                dumping.store(false, Ordering::Release);
            }
            previous(info);
        }));
    }
}

fn describe_panic(info: &panic::PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    let message = if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    };
    match info.location() {
        Some(location) => format!("{} at {}", message, location),
        None => message,
    }
}
