//! Property-set records: user snapshots and dump collections.
//!
//! A [`Snapshot`] is a user-recordable set of named properties delivered
//! through the normal sink path like any other record. A [`DumpCollection`]
//! is the result of one dump provider's collection pass, written through dump
//! destinations instead. Both keep properties in a `BTreeMap` so iteration
//! order (and therefore formatted output) is deterministic.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use super::severity::Severity;

/// Why a dump was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DumpReason {
    /// Process shutdown
    Shutdown,
    /// An uncaught fault, carrying its description
    Fault(String),
    /// An explicit caller request, carrying its stated reason
    Requested(String),
}

impl fmt::Display for DumpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpReason::Shutdown => f.write_str("shutdown"),
            DumpReason::Fault(description) => write!(f, "fault: {}", description),
            DumpReason::Requested(reason) => write!(f, "requested: {}", reason),
        }
    }
}

/// A user-recordable named property set.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Snapshot {
    name: String,
    category: String,
    severity: Severity,
    timestamp: Option<SystemTime>,
    properties: BTreeMap<String, String>,
}

impl Snapshot {
    /// Create an empty snapshot.
    ///
    /// The timestamp is stamped by the tracker at record time unless the
    /// caller sets one explicitly.
    pub fn new(name: impl Into<String>, category: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            severity,
            timestamp: None,
            properties: BTreeMap::new(),
        }
    }

    /// Get the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the category.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Get the severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Get the wall-clock timestamp, if stamped.
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    /// Stamp the wall-clock timestamp.
    pub fn set_timestamp(&mut self, wall: SystemTime) {
        self.timestamp = Some(wall);
    }

    /// Set a property, replacing any previous value for the key.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Builder-style form of [`Snapshot::set_property`].
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Get the properties in key order.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the snapshot holds no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// The result of one dump provider's collection pass.
///
/// Named after the provider that produced it; the originating [`DumpReason`]
/// is attached by the orchestrator after collection succeeds.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DumpCollection {
    name: String,
    category: String,
    reason: Option<DumpReason>,
    properties: BTreeMap<String, String>,
}

impl DumpCollection {
    /// Create an empty collection.
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            reason: None,
            properties: BTreeMap::new(),
        }
    }

    /// Get the producing provider's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the category.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Get the originating reason, if attached.
    pub fn reason(&self) -> Option<&DumpReason> {
        self.reason.as_ref()
    }

    /// Attach the originating reason.
    pub fn set_reason(&mut self, reason: DumpReason) {
        self.reason = Some(reason);
    }

    /// Set a property, replacing any previous value for the key.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Builder-style form of [`DumpCollection::set_property`].
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Get the properties in key order.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the collection holds no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
