//! Central registry of live trackers.
//!
//! The registry owns one tracker per identity. Callers reach a tracker with
//! `get_or_create`, which settles concurrent creation races so the supplied
//! factory runs at most once per identity. Registry-wide maintenance
//! (`flush_all`, `shutdown_all`) never aborts on a failing tracker: failures
//! are logged and the sweep continues.

use std::sync::Arc;

use tracing::{debug, warn};

use super::ports::Storage;
use super::tracker::{BuildError, Tracker};
use crate::domain::identity::TrackerIdentity;

/// Registry managing all live trackers.
///
/// Uses the Storage port for concurrent access. This type is generic over
/// the storage implementation; in production, use `Arc<ShardedStorage>`.
#[derive(Debug, Clone)]
pub struct TrackerRegistry<S>
where
    S: Storage<TrackerIdentity, Arc<Tracker>> + Clone,
{
    storage: S,
}

impl<S> TrackerRegistry<S>
where
    S: Storage<TrackerIdentity, Arc<Tracker>> + Clone,
{
    /// Create a new registry over the given storage.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Get the tracker registered under an identity, creating it if absent.
    ///
    /// The factory runs at most once per identity even under concurrent
    /// callers; losers of the creation race receive the winner's tracker.
    /// A factory error propagates to the caller and registers nothing, so a
    /// later call may retry.
    ///
    /// # Arguments
    /// * `identity` - The identity to look up
    /// * `factory` - Builds the tracker on first access
    pub fn get_or_create<F>(
        &self,
        identity: &TrackerIdentity,
        factory: F,
    ) -> Result<Arc<Tracker>, BuildError>
    where
        F: FnOnce(&TrackerIdentity) -> Result<Tracker, BuildError>,
    {
        self.storage.get_or_try_insert(identity.clone(), || {
            let tracker = factory(identity)?;
            debug!(target: "optrack::registry", identity = %identity, "tracker registered");
            Ok(Arc::new(tracker))
        })
    }

    /// Get the tracker registered under an identity, if any.
    pub fn get(&self, identity: &TrackerIdentity) -> Option<Arc<Tracker>> {
        self.storage.get(identity)
    }

    /// Detach a tracker from the registry without closing it.
    ///
    /// Existing holders keep a working handle; the identity becomes free
    /// for re-creation.
    pub fn remove(&self, identity: &TrackerIdentity) -> Option<Arc<Tracker>> {
        self.storage.remove(identity)
    }

    /// Remove a tracker and close it.
    ///
    /// Sink teardown failures are logged and swallowed.
    ///
    /// # Returns
    /// Whether a tracker was registered under the identity.
    pub fn close(&self, identity: &TrackerIdentity) -> bool {
        match self.storage.remove(identity) {
            Some(tracker) => {
                if let Err(err) = tracker.close() {
                    warn!(
                        target: "optrack::registry",
                        identity = %identity,
                        error = %err,
                        "tracker close failed"
                    );
                }
                true
            }
            None => false,
        }
    }

    /// Point-in-time snapshot of all registered trackers.
    ///
    /// The returned handles stay valid after removal; mutating the vector
    /// does not affect the registry.
    pub fn list(&self) -> Vec<Arc<Tracker>> {
        let mut trackers = Vec::with_capacity(self.storage.len());
        self.storage
            .for_each(|_, tracker| trackers.push(Arc::clone(tracker)));
        trackers
    }

    /// Visit every registered tracker.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&TrackerIdentity, &Arc<Tracker>),
    {
        self.storage.for_each(|identity, tracker| f(identity, tracker));
    }

    /// Get the number of registered trackers.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Flush every registered tracker.
    ///
    /// A failing tracker is logged and skipped; the sweep always visits
    /// every tracker.
    pub fn flush_all(&self) {
        self.storage.for_each(|identity, tracker| {
            if let Err(err) = tracker.flush() {
                warn!(
                    target: "optrack::registry",
                    identity = %identity,
                    error = %err,
                    "tracker flush failed"
                );
            }
        });
    }

    /// Drain the registry and close every tracker.
    ///
    /// Close failures are logged and the sweep continues. The registry is
    /// empty afterwards; identities become free for re-creation.
    pub fn shutdown_all(&self) {
        let drained = self.storage.drain();
        debug!(
            target: "optrack::registry",
            trackers = drained.len(),
            "registry shutdown"
        );
        for (identity, tracker) in drained {
            if let Err(err) = tracker.close() {
                warn!(
                    target: "optrack::registry",
                    identity = %identity,
                    error = %err,
                    "tracker close failed during shutdown"
                );
            }
        }
    }
}
