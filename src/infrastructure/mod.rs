//! Infrastructure layer - concrete adapters and process integration.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - Record formatting (plain text)
//! - Storage implementations (sharded maps)
//! - Environment-driven settings
//! - Runtime assembly, shutdown hooks, and registry introspection

pub mod clock;
pub mod format;
pub mod hooks;
pub mod introspect;
pub mod runtime;
pub mod settings;
pub mod storage;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides controllable test doubles for the
/// clock, the delivery sink, and the dump pipeline.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// optrack = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
