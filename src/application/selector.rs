//! Conditional-emission gate.
//!
//! The [`ConditionalSelector`] answers one question cheaply: "is tracking
//! enabled for this severity and key right now?" Callers consult it before
//! constructing expensive records; the dispatch layer consults its severity
//! floor before delivering anything. Token reads are lock-free `DashMap`
//! lookups and the floor is a single atomic, so both checks are safe on the
//! hot path.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::domain::severity::Severity;

/// A registered enablement token.
///
/// The token matches queries at or above its severity threshold; a token
/// without a value is a wildcard that matches any queried value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorToken {
    severity: Severity,
    value: Option<String>,
}

impl SelectorToken {
    /// Get the severity threshold.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Get the required value, or `None` for a wildcard token.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// In-memory severity/key/value token table plus the dispatch severity floor.
#[derive(Debug)]
pub struct ConditionalSelector {
    tokens: DashMap<String, SelectorToken>,
    /// Minimum severity the dispatch layer lets through, stored as the
    /// severity's numeric rank
    floor: AtomicU8,
}

impl ConditionalSelector {
    /// Create an empty selector whose floor passes everything.
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
            floor: AtomicU8::new(Severity::Trace as u8),
        }
    }

    /// Register a wildcard token for a key.
    pub fn set(&self, severity: Severity, key: impl Into<String>) {
        self.tokens.insert(
            key.into(),
            SelectorToken {
                severity,
                value: None,
            },
        );
    }

    /// Register a value-matching token for a key.
    pub fn set_value(&self, severity: Severity, key: impl Into<String>, value: impl Into<String>) {
        self.tokens.insert(
            key.into(),
            SelectorToken {
                severity,
                value: Some(value.into()),
            },
        );
    }

    /// Whether tracking is enabled for this severity and key.
    ///
    /// True only if a token is registered for the key and its threshold is at
    /// or below the queried severity.
    pub fn is_set(&self, severity: Severity, key: &str) -> bool {
        match self.tokens.get(key) {
            Some(entry) => entry.value().severity <= severity,
            None => false,
        }
    }

    /// Whether tracking is enabled for this severity, key, and value.
    ///
    /// Like [`ConditionalSelector::is_set`], additionally requiring the
    /// token's value to be a wildcard or equal to the queried value.
    pub fn is_set_value(&self, severity: Severity, key: &str, value: &str) -> bool {
        match self.tokens.get(key) {
            Some(entry) => {
                let token = entry.value();
                token.severity <= severity
                    && token.value.as_deref().map_or(true, |want| want == value)
            }
            None => false,
        }
    }

    /// Get the token registered for a key.
    pub fn get(&self, key: &str) -> Option<SelectorToken> {
        self.tokens.get(key).map(|entry| entry.value().clone())
    }

    /// Get all registered keys.
    pub fn keys(&self) -> Vec<String> {
        self.tokens.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Remove the token for a key.
    pub fn unset(&self, key: &str) {
        self.tokens.remove(key);
    }

    /// Remove every token.
    pub fn clear(&self) {
        self.tokens.clear();
    }

    /// Number of registered tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no tokens are registered.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Set the minimum severity the dispatch layer delivers.
    pub fn set_floor(&self, severity: Severity) {
        self.floor.store(severity as u8, Ordering::Relaxed);
    }

    /// Get the current dispatch floor.
    pub fn floor(&self) -> Severity {
        Severity::from(self.floor.load(Ordering::Relaxed))
    }

    /// Whether a record at this severity passes the dispatch floor.
    pub fn severity_enabled(&self, severity: Severity) -> bool {
        severity as u8 >= self.floor.load(Ordering::Relaxed)
    }
}

impl Default for ConditionalSelector {
    fn default() -> Self {
        Self::new()
    }
}
