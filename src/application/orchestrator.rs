//! Process-wide dump coordination.
//!
//! The orchestrator holds the provider/destination association table and runs
//! the dump pass: open every distinct destination, collect from each provider
//! in registration order, write each collection to its destinations, and close
//! everything. Listeners observe the pass through phased [`DumpEvent`]s; any
//! single failure is confined to an `Error`-phase event and the pass carries
//! on. One dump runs at a time per orchestrator.

use std::panic;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::ports::{DumpEvent, DumpFault, DumpListener, DumpPhase, DumpProvider, DumpSink};
use crate::domain::snapshot::DumpReason;

#[derive(Debug)]
struct ProviderEntry {
    provider: Arc<dyn DumpProvider>,
    /// Empty means the process-wide default destination applies.
    destinations: Vec<Arc<dyn DumpSink>>,
}

/// Registry of dump providers, destinations, and listeners.
#[derive(Debug)]
pub struct DumpOrchestrator {
    providers: Mutex<Vec<ProviderEntry>>,
    default_destination: Mutex<Option<Arc<dyn DumpSink>>>,
    listeners: Mutex<Vec<Arc<dyn DumpListener>>>,
    /// Serializes dump passes.
    gate: Mutex<()>,
}

impl DumpOrchestrator {
    /// Create an empty orchestrator.
    pub fn new() -> Self {
        Self {
            providers: Mutex::new(Vec::new()),
            default_destination: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            gate: Mutex::new(()),
        }
    }

    /// Register a provider writing to the default destination.
    pub fn add_provider(&self, provider: Arc<dyn DumpProvider>) {
        self.add_provider_with_destinations(provider, Vec::new());
    }

    /// Register a provider with its own destinations.
    ///
    /// An empty destination list falls back to the default destination.
    pub fn add_provider_with_destinations(
        &self,
        provider: Arc<dyn DumpProvider>,
        destinations: Vec<Arc<dyn DumpSink>>,
    ) {
        let mut providers = self.lock_providers();
        providers.push(ProviderEntry {
            provider,
            destinations,
        });
    }

    /// Set the destination used by providers registered without their own.
    pub fn set_default_destination(&self, sink: Arc<dyn DumpSink>) {
        let mut default = self
            .default_destination
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *default = Some(sink);
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.lock_providers().len()
    }

    /// Register a dump listener.
    pub fn add_listener(&self, listener: Arc<dyn DumpListener>) {
        let mut listeners = self.lock_listeners();
        listeners.push(listener);
    }

    /// Remove a previously registered listener by identity.
    pub fn remove_listener(&self, listener: &Arc<dyn DumpListener>) {
        let mut listeners = self.lock_listeners();
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    /// Run one dump pass.
    ///
    /// The reason, when given, is attached to every successfully collected
    /// snapshot before it is written. Failures never escape: open, collect,
    /// write, and close errors each surface as an `Error`-phase event to the
    /// listeners while the pass continues.
    pub fn dump(&self, reason: Option<DumpReason>) {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        // Snapshot the association table; registrations made while the pass
        // runs apply from the next dump.
        let entries: Vec<(Arc<dyn DumpProvider>, Vec<Arc<dyn DumpSink>>)> = {
            let default = self
                .default_destination
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            let providers = self.lock_providers();
            providers
                .iter()
                .map(|entry| {
                    let destinations = if entry.destinations.is_empty() {
                        default.iter().cloned().collect()
                    } else {
                        entry.destinations.clone()
                    };
                    (Arc::clone(&entry.provider), destinations)
                })
                .collect()
        };

        // Distinct destinations by handle identity, first-registration order.
        let mut distinct: Vec<Arc<dyn DumpSink>> = Vec::new();
        for (_, destinations) in &entries {
            for destination in destinations {
                if !distinct.iter().any(|seen| Arc::ptr_eq(seen, destination)) {
                    distinct.push(Arc::clone(destination));
                }
            }
        }

        debug!(
            target: "optrack::dump",
            providers = entries.len(),
            destinations = distinct.len(),
            "dump pass started"
        );

        let mut opened: Vec<Arc<dyn DumpSink>> = Vec::new();
        for destination in &distinct {
            match destination.open() {
                Ok(()) => opened.push(Arc::clone(destination)),
                Err(err) => {
                    warn!(
                        target: "optrack::dump",
                        destination = destination.name(),
                        error = %err,
                        "dump destination failed to open"
                    );
                    let fault = DumpFault::Sink(err);
                    self.notify(&DumpEvent {
                        source: destination.name(),
                        phase: DumpPhase::Error,
                        collection: None,
                        destinations: &[],
                        fault: Some(&fault),
                    });
                }
            }
        }

        for (provider, destinations) in &entries {
            let usable: Vec<Arc<dyn DumpSink>> = destinations
                .iter()
                .filter(|destination| opened.iter().any(|open| Arc::ptr_eq(open, destination)))
                .cloned()
                .collect();
            let destination_names: Vec<String> =
                usable.iter().map(|d| d.name().to_string()).collect();

            let mut collection = match provider.collect() {
                Ok(collection) => collection,
                Err(err) => {
                    warn!(
                        target: "optrack::dump",
                        provider = provider.name(),
                        error = %err,
                        "dump collection failed"
                    );
                    let fault = DumpFault::Collection(err);
                    self.notify(&DumpEvent {
                        source: provider.name(),
                        phase: DumpPhase::Error,
                        collection: None,
                        destinations: &destination_names,
                        fault: Some(&fault),
                    });
                    continue;
                }
            };
            if let Some(reason) = &reason {
                collection.set_reason(reason.clone());
            }

            self.notify(&DumpEvent {
                source: provider.name(),
                phase: DumpPhase::Before,
                collection: Some(&collection),
                destinations: &destination_names,
                fault: None,
            });

            let mut first_fault: Option<DumpFault> = None;
            for destination in &usable {
                if let Err(err) = destination.write(&collection) {
                    warn!(
                        target: "optrack::dump",
                        provider = provider.name(),
                        destination = destination.name(),
                        error = %err,
                        "dump write failed"
                    );
                    if first_fault.is_none() {
                        first_fault = Some(DumpFault::Sink(err));
                    }
                }
            }

            self.notify(&DumpEvent {
                source: provider.name(),
                phase: DumpPhase::After,
                collection: Some(&collection),
                destinations: &destination_names,
                fault: first_fault.as_ref(),
            });
        }

        self.notify(&DumpEvent {
            source: "dump",
            phase: DumpPhase::Complete,
            collection: None,
            destinations: &[],
            fault: None,
        });

        for destination in &opened {
            if let Err(err) = destination.close() {
                warn!(
                    target: "optrack::dump",
                    destination = destination.name(),
                    error = %err,
                    "dump destination failed to close"
                );
                let fault = DumpFault::Sink(err);
                self.notify(&DumpEvent {
                    source: destination.name(),
                    phase: DumpPhase::Error,
                    collection: None,
                    destinations: &[],
                    fault: Some(&fault),
                });
            }
        }
    }

    fn notify(&self, event: &DumpEvent<'_>) {
        let listeners: Vec<Arc<dyn DumpListener>> = self.lock_listeners().clone();
        for listener in listeners {
            // A panicking listener must not starve the others or the pass.
            let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                listener.on_dump(event);
            }));
            if outcome.is_err() {
                warn!(
                    target: "optrack::dump",
                    source = event.source,
                    phase = %event.phase,
                    "dump listener panicked"
                );
            }
        }
    }

    fn lock_providers(&self) -> std::sync::MutexGuard<'_, Vec<ProviderEntry>> {
        self.providers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn DumpListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DumpOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}
