//! Built-in dump provider over the tracker registry.
//!
//! Makes the runtime's own state dumpable alongside application providers:
//! one collection pass reports the tracker count plus per-tracker identity
//! and statistics properties.

use std::sync::Arc;

use crate::application::ports::{DumpError, DumpProvider, Storage};
use crate::application::registry::TrackerRegistry;
use crate::application::tracker::Tracker;
use crate::domain::identity::TrackerIdentity;
use crate::domain::snapshot::DumpCollection;

/// Dump provider reporting registry and tracker statistics.
#[derive(Debug)]
pub struct RegistryDumpProvider<S>
where
    S: Storage<TrackerIdentity, Arc<Tracker>> + Clone,
{
    registry: TrackerRegistry<S>,
}

impl<S> RegistryDumpProvider<S>
where
    S: Storage<TrackerIdentity, Arc<Tracker>> + Clone,
{
    /// Create a provider over the given registry.
    pub fn new(registry: TrackerRegistry<S>) -> Self {
        Self { registry }
    }
}

impl<S> DumpProvider for RegistryDumpProvider<S>
where
    S: Storage<TrackerIdentity, Arc<Tracker>> + Clone,
{
    fn name(&self) -> &str {
        "registry"
    }

    fn category(&self) -> &str {
        "runtime"
    }

    fn collect(&self) -> Result<DumpCollection, DumpError> {
        let mut collection = DumpCollection::new("registry", "runtime");
        collection.set_property("tracker.count", self.registry.len().to_string());

        self.registry.for_each(|identity, tracker| {
            let key = identity.to_string();
            let stats = tracker.stats().snapshot();
            collection.set_property(
                format!("{}.activities.started", key),
                stats.activities_started.to_string(),
            );
            collection.set_property(
                format!("{}.activities.completed", key),
                stats.activities_completed.to_string(),
            );
            collection.set_property(
                format!("{}.events", key),
                stats.events_recorded.to_string(),
            );
            collection.set_property(
                format!("{}.snapshots", key),
                stats.snapshots_recorded.to_string(),
            );
            collection.set_property(
                format!("{}.messages", key),
                stats.messages_logged.to_string(),
            );
            collection.set_property(
                format!("{}.delivered", key),
                stats.records_delivered.to_string(),
            );
            collection.set_property(
                format!("{}.delivery.errors", key),
                stats.delivery_errors.to_string(),
            );
            collection.set_property(
                format!("{}.filtered", key),
                stats.records_filtered.to_string(),
            );
            collection.set_property(format!("{}.closed", key), tracker.is_closed().to_string());
        });

        Ok(collection)
    }
}
