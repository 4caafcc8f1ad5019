//! Domain layer - pure tracking model with no external dependencies.
//!
//! This layer contains the core concepts and invariants of the tracking
//! system:
//! - Severity and completion vocabulary
//! - Timed activities and events with lifecycle state machines
//! - Bounded message payloads with tracking signatures
//! - Tracker identity derivation
//! - Snapshot and dump-collection property sets
//!
//! All types in this layer are pure and easily testable.

pub mod activity;
pub mod event;
pub mod identity;
pub mod message;
pub mod severity;
pub mod snapshot;
