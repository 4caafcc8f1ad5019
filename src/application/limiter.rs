//! Throughput rate limiting by message count and byte volume.
//!
//! The [`RateLimiter`] paces emission so that neither the configured
//! messages-per-second nor bytes-per-second rate is exceeded over the window
//! since the last reset. Three acquisition modes are offered:
//!
//! - [`RateLimiter::obtain`] blocks for however long the budget requires and
//!   reports the delay incurred
//! - [`RateLimiter::try_obtain`] never blocks
//! - [`RateLimiter::try_obtain_for`] blocks up to a caller-supplied timeout
//!
//! The hot path is lock-free: every counter is an individual atomic and a
//! request reserves its slot with `fetch_add`. Only `reset` and `set_limits`
//! take the config lock. A refused timed acquisition rolls its reservation
//! back with a saturating compare-exchange loop so a concurrent `reset` can
//! never underflow the counters.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use super::ports::Clock;

/// A blocking rate limiter bounding messages/sec and bytes/sec.
///
/// Either limit may be 0, meaning unlimited: acquisition never delays on that
/// axis but the cumulative accounting still accumulates. Disabling the
/// limiter turns every acquisition into a non-blocking no-op with no
/// accounting at all.
#[derive(Debug)]
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    /// Base instant of the clock's timeline; window offsets are stored
    /// relative to it
    epoch: Instant,
    enabled: AtomicBool,
    max_mps: AtomicU64,
    max_bps: AtomicU64,
    total_msgs: AtomicU64,
    total_bytes: AtomicU64,
    deny_count: AtomicU64,
    delay_count: AtomicU64,
    last_delay_nanos: AtomicU64,
    total_delay_nanos: AtomicU64,
    /// Nanoseconds after `epoch` at which the current window started
    window_start_nanos: AtomicU64,
    /// Wall-clock time of the current window's start
    window_start_wall_micros: AtomicU64,
    config_lock: Mutex<()>,
}

impl RateLimiter {
    /// Create a limiter with the given limits.
    ///
    /// # Arguments
    /// * `max_mps` - Maximum messages per second, 0 = unlimited
    /// * `max_bps` - Maximum bytes per second, 0 = unlimited
    /// * `clock` - Time source for the measurement window
    pub fn new(max_mps: u64, max_bps: u64, clock: Arc<dyn Clock>) -> Self {
        let epoch = clock.now();
        let wall_micros = wall_to_micros(clock.wall_now());
        Self {
            clock,
            epoch,
            enabled: AtomicBool::new(true),
            max_mps: AtomicU64::new(max_mps),
            max_bps: AtomicU64::new(max_bps),
            total_msgs: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            deny_count: AtomicU64::new(0),
            delay_count: AtomicU64::new(0),
            last_delay_nanos: AtomicU64::new(0),
            total_delay_nanos: AtomicU64::new(0),
            window_start_nanos: AtomicU64::new(0),
            window_start_wall_micros: AtomicU64::new(wall_micros),
            config_lock: Mutex::new(()),
        }
    }

    /// Create an unlimited limiter that only accumulates accounting.
    pub fn unlimited(clock: Arc<dyn Clock>) -> Self {
        Self::new(0, 0, clock)
    }

    /// Acquire budget for a request, blocking as long as the limits require.
    ///
    /// # Arguments
    /// * `msgs` - Number of messages this request represents
    /// * `bytes` - Number of payload bytes this request represents
    ///
    /// # Returns
    /// The delay actually incurred; `Duration::ZERO` when the request fit
    /// within budget or the limiter is unlimited or disabled.
    pub fn obtain(&self, msgs: u64, bytes: u64) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }
        let prior_msgs = self.total_msgs.fetch_add(msgs, Ordering::Relaxed);
        let prior_bytes = self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        let delay = self.required_delay(prior_msgs, prior_bytes);
        if delay > Duration::ZERO {
            thread::sleep(delay);
            self.record_delay(delay);
        }
        delay
    }

    /// Acquire budget only if it is available right now.
    ///
    /// Equivalent to [`RateLimiter::try_obtain_for`] with a zero timeout.
    /// When the answer is false, none of the requested budget is consumed.
    pub fn try_obtain(&self, msgs: u64, bytes: u64) -> bool {
        self.try_obtain_for(msgs, bytes, Duration::ZERO)
    }

    /// Acquire budget, blocking at most `timeout`.
    ///
    /// When the required delay exceeds the timeout the request is refused:
    /// the denial counter is incremented and the cumulative message/byte
    /// accounting is left untouched.
    pub fn try_obtain_for(&self, msgs: u64, bytes: u64, timeout: Duration) -> bool {
        if !self.is_enabled() {
            return true;
        }

        // Optimistic check before touching the counters.
        let prior_msgs = self.total_msgs.load(Ordering::Relaxed);
        let prior_bytes = self.total_bytes.load(Ordering::Relaxed);
        if self.required_delay(prior_msgs, prior_bytes) > timeout {
            self.deny_count.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // Reserve, then recompute from the slot actually obtained; another
        // caller may have landed between the check and the reservation.
        let prior_msgs = self.total_msgs.fetch_add(msgs, Ordering::Relaxed);
        let prior_bytes = self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        let delay = self.required_delay(prior_msgs, prior_bytes);
        if delay > timeout {
            rollback(&self.total_msgs, msgs);
            rollback(&self.total_bytes, bytes);
            self.deny_count.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if delay > Duration::ZERO {
            thread::sleep(delay);
            self.record_delay(delay);
        }
        true
    }

    /// Zero all counters and restart the measurement window.
    pub fn reset(&self) {
        let _guard = self
            .config_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now_nanos = duration_to_nanos(self.clock.now().saturating_duration_since(self.epoch));
        let wall_micros = wall_to_micros(self.clock.wall_now());

        self.total_msgs.store(0, Ordering::Relaxed);
        self.total_bytes.store(0, Ordering::Relaxed);
        self.deny_count.store(0, Ordering::Relaxed);
        self.delay_count.store(0, Ordering::Relaxed);
        self.last_delay_nanos.store(0, Ordering::Relaxed);
        self.total_delay_nanos.store(0, Ordering::Relaxed);
        self.window_start_nanos.store(now_nanos, Ordering::Release);
        self.window_start_wall_micros
            .store(wall_micros, Ordering::Release);
    }

    /// Reconfigure the limits without disturbing the window.
    ///
    /// # Arguments
    /// * `max_mps` - Maximum messages per second, 0 = unlimited
    /// * `max_bps` - Maximum bytes per second, 0 = unlimited
    pub fn set_limits(&self, max_mps: u64, max_bps: u64) {
        let _guard = self
            .config_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.max_mps.store(max_mps, Ordering::Relaxed);
        self.max_bps.store(max_bps, Ordering::Relaxed);
    }

    /// Enable or disable limiting.
    ///
    /// While disabled, every acquisition succeeds immediately and nothing is
    /// accounted.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether limiting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Get the configured maximum messages per second (0 = unlimited).
    pub fn max_mps(&self) -> u64 {
        self.max_mps.load(Ordering::Relaxed)
    }

    /// Get the configured maximum bytes per second (0 = unlimited).
    pub fn max_bps(&self) -> u64 {
        self.max_bps.load(Ordering::Relaxed)
    }

    /// Get the cumulative message count since the last reset.
    pub fn total_msgs(&self) -> u64 {
        self.total_msgs.load(Ordering::Relaxed)
    }

    /// Get the cumulative byte count since the last reset.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Get the number of refused acquisitions since the last reset.
    pub fn deny_count(&self) -> u64 {
        self.deny_count.load(Ordering::Relaxed)
    }

    /// Get the number of delayed acquisitions since the last reset.
    pub fn delay_count(&self) -> u64 {
        self.delay_count.load(Ordering::Relaxed)
    }

    /// Get the most recent single delay.
    pub fn last_delay(&self) -> Duration {
        Duration::from_nanos(self.last_delay_nanos.load(Ordering::Relaxed))
    }

    /// Get the cumulative delay since the last reset.
    pub fn total_delay(&self) -> Duration {
        Duration::from_nanos(self.total_delay_nanos.load(Ordering::Relaxed))
    }

    /// Get the actual message rate over the current window, in messages/sec.
    pub fn mps(&self) -> f64 {
        rate(self.total_msgs(), self.age())
    }

    /// Get the actual byte rate over the current window, in bytes/sec.
    pub fn bps(&self) -> f64 {
        rate(self.total_bytes(), self.age())
    }

    /// Get the elapsed time since the window started.
    pub fn age(&self) -> Duration {
        self.clock
            .now()
            .saturating_duration_since(self.window_start())
    }

    /// Get the wall-clock time at which the window started.
    pub fn start_time(&self) -> SystemTime {
        let micros = self.window_start_wall_micros.load(Ordering::Acquire);
        SystemTime::UNIX_EPOCH + Duration::from_micros(micros)
    }

    /// Delay needed so the work admitted before this slot stays within both
    /// configured rates.
    fn required_delay(&self, prior_msgs: u64, prior_bytes: u64) -> Duration {
        let required = required_elapsed(prior_msgs, self.max_mps())
            .max(required_elapsed(prior_bytes, self.max_bps()));
        required.saturating_sub(self.age())
    }

    fn window_start(&self) -> Instant {
        let nanos = self.window_start_nanos.load(Ordering::Acquire);
        self.epoch + Duration::from_nanos(nanos)
    }

    fn record_delay(&self, delay: Duration) {
        let nanos = duration_to_nanos(delay);
        self.delay_count.fetch_add(1, Ordering::Relaxed);
        self.last_delay_nanos.store(nanos, Ordering::Relaxed);
        self.total_delay_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

/// Minimum window age at which `count` units stay within `per_sec`.
fn required_elapsed(count: u64, per_sec: u64) -> Duration {
    if per_sec == 0 {
        return Duration::ZERO;
    }
    let micros = (count as u128) * 1_000_000 / (per_sec as u128);
    Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
}

/// Subtract a refused reservation.
///
/// Saturating compare-exchange loop: if a concurrent `reset` zeroed the
/// counter between the reservation and this rollback, the subtraction
/// saturates at zero instead of wrapping.
fn rollback(counter: &AtomicU64, amount: u64) {
    if amount == 0 {
        return;
    }
    let mut current = counter.load(Ordering::Relaxed);
    loop {
        let next = current.saturating_sub(amount);
        match counter.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

fn rate(count: u64, age: Duration) -> f64 {
    let secs = age.as_secs_f64();
    if secs == 0.0 {
        0.0
    } else {
        count as f64 / secs
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn wall_to_micros(wall: SystemTime) -> u64 {
    wall.duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
