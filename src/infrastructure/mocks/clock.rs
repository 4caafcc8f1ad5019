//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

#[derive(Debug, Clone, Copy)]
struct MockTime {
    instant: Instant,
    wall: SystemTime,
}

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling
/// deterministic testing of rate limiting windows and elapsed-time
/// derivation. Monotonic and wall time advance in lockstep.
///
/// # Examples
///
/// ```
/// use optrack::infrastructure::mocks::MockClock;
/// use optrack::application::ports::Clock;
/// use std::time::Duration;
///
/// let clock = MockClock::new();
/// let origin = clock.now();
///
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), origin + Duration::from_secs(10));
/// ```
///
/// # Thread Safety
///
/// `MockClock` is thread-safe and can be cloned to share across threads.
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<MockTime>>,
}

impl MockClock {
    /// Create a mock clock anchored at the current real time.
    pub fn new() -> Self {
        Self {
            current_time: Arc::new(Mutex::new(MockTime {
                instant: Instant::now(),
                wall: SystemTime::now(),
            })),
        }
    }

    /// Advance both the monotonic and wall clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        time.instant += duration;
        time.wall += duration;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
            .instant
    }

    fn wall_now(&self) -> SystemTime {
        self.current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
            .wall
    }
}
