//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain model and manages runtime behavior:
//! - Tracker registry (one live tracker per identity)
//! - Tracker and activity timer (lifecycle and timing)
//! - Sink dispatch (filter, throttle, format, deliver)
//! - Rate limiter (message/byte budgets)
//! - Conditional selector (severity gates and debug tokens)
//! - Dump orchestrator (diagnostic snapshot passes)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod dispatch;
pub mod limiter;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod selector;
pub mod stats;
pub mod timer;
pub mod tracker;
