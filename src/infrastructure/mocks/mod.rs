//! Mock implementations for testing.
//!
//! This module provides test doubles for infrastructure adapters,
//! enabling controlled testing of application logic.

pub mod clock;
pub mod dump;
pub mod sink;

pub use clock::MockClock;
pub use dump::{
    CaptureDumpListener, CapturedDump, FailingDumpProvider, MemoryDumpSink, PanickingDumpListener,
    StaticDumpProvider,
};
pub use sink::{
    CaptureErrorListener, CaptureLogListener, FailingSink, PanickingErrorListener, RecordingSink,
};
