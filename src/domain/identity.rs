//! Tracker identity derivation.
//!
//! A tracker is keyed by [`TrackerIdentity`]: the source name, the
//! [`SourceType`], and a fingerprint of the configuration it was built from.
//! Two acquisitions with the same identity share one tracker; differing
//! configuration yields a distinct identity. Absent configuration is a
//! sentinel variant rather than a reserved hash value, so it can never collide
//! with a real fingerprint.

use ahash::AHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The kind of source a tracker instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    /// An application
    Application,
    /// An operating-system process
    Process,
    /// A long-running service
    Service,
    /// A server host
    Server,
    /// An end user
    User,
    /// A physical or virtual device
    Device,
    /// Anything not covered by the other kinds
    Other,
}

impl SourceType {
    /// Get the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Application => "APPLICATION",
            SourceType::Process => "PROCESS",
            SourceType::Service => "SERVICE",
            SourceType::Server => "SERVER",
            SourceType::User => "USER",
            SourceType::Device => "DEVICE",
            SourceType::Other => "OTHER",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fingerprint of the configuration a tracker was built from.
///
/// `Absent` marks a tracker built with no configuration at all; it is a
/// distinct variant, not a magic hash value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigDigest {
    /// No configuration was supplied
    Absent,
    /// Hash of the configuration entries
    Fingerprint(u64),
}

impl ConfigDigest {
    /// Fingerprint a configuration map.
    ///
    /// Entries are hashed in key order (which `BTreeMap` guarantees), so two
    /// maps with the same entries always produce the same digest regardless
    /// of insertion order.
    pub fn of(config: &BTreeMap<String, String>) -> Self {
        let mut hasher = AHasher::default();
        for (key, value) in config {
            key.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        ConfigDigest::Fingerprint(hasher.finish())
    }
}

impl fmt::Display for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigDigest::Absent => f.write_str("absent"),
            ConfigDigest::Fingerprint(hash) => write!(f, "{:016x}", hash),
        }
    }
}

/// The registry key identifying one tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackerIdentity {
    name: String,
    source_type: SourceType,
    config: ConfigDigest,
}

impl TrackerIdentity {
    /// Identity for a source with no configuration.
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            name: name.into(),
            source_type,
            config: ConfigDigest::Absent,
        }
    }

    /// Identity for a source plus its configuration map.
    pub fn with_config(
        name: impl Into<String>,
        source_type: SourceType,
        config: &BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_type,
            config: ConfigDigest::of(config),
        }
    }

    /// Get the source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the source type.
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    /// Get the configuration digest.
    pub fn config_digest(&self) -> ConfigDigest {
        self.config
    }
}

impl fmt::Display for TrackerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.source_type, self.name, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_same_inputs_produce_equal_identities() {
        let a = TrackerIdentity::new("orders", SourceType::Application);
        let b = TrackerIdentity::new("orders", SourceType::Application);
        assert_eq!(a, b);
    }

    #[test]
    fn test_name_and_type_distinguish_identities() {
        let a = TrackerIdentity::new("orders", SourceType::Application);
        let b = TrackerIdentity::new("billing", SourceType::Application);
        let c = TrackerIdentity::new("orders", SourceType::Service);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_config_order_independence() {
        let first = config(&[("a", "1"), ("z", "2")]);
        let mut second = BTreeMap::new();
        second.insert("z".to_string(), "2".to_string());
        second.insert("a".to_string(), "1".to_string());

        assert_eq!(ConfigDigest::of(&first), ConfigDigest::of(&second));
    }

    #[test]
    fn test_config_values_distinguish_identities() {
        let a = TrackerIdentity::with_config(
            "orders",
            SourceType::Application,
            &config(&[("endpoint", "primary")]),
        );
        let b = TrackerIdentity::with_config(
            "orders",
            SourceType::Application,
            &config(&[("endpoint", "fallback")]),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_absent_config_never_collides_with_fingerprint() {
        // Even an empty map hashes to a Fingerprint variant, distinct from Absent.
        let absent = TrackerIdentity::new("orders", SourceType::Application);
        let empty = TrackerIdentity::with_config("orders", SourceType::Application, &config(&[]));
        assert_ne!(absent, empty);
        assert_eq!(absent.config_digest(), ConfigDigest::Absent);
        assert!(matches!(
            empty.config_digest(),
            ConfigDigest::Fingerprint(_)
        ));
    }

    #[test]
    fn test_display_includes_all_parts() {
        let identity = TrackerIdentity::new("orders", SourceType::Application);
        let display = identity.to_string();
        assert!(display.contains("APPLICATION"));
        assert!(display.contains("orders"));
        assert!(display.contains("absent"));
    }
}
