use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use optrack::infrastructure::mocks::MockClock;
use optrack::{RateLimiter, SystemClock};

#[test]
fn test_blocking_obtain_paces_the_caller() {
    let started = Instant::now();
    // 50 msgs/sec leaves 20ms between messages; the first one rides free.
    let limiter = RateLimiter::new(50, 0, Arc::new(SystemClock::new()));

    for _ in 0..4 {
        limiter.obtain(1, 0);
    }

    assert!(started.elapsed() >= Duration::from_millis(55));
    assert_eq!(limiter.total_msgs(), 4);
    assert!(limiter.delay_count() >= 1);
    assert!(limiter.total_delay() > Duration::ZERO);
}

#[test]
fn test_refusal_consumes_no_budget() {
    let clock = MockClock::new();
    let limiter = RateLimiter::new(1, 0, Arc::new(clock.clone()));

    assert!(limiter.try_obtain(1, 0));

    // A second message inside the same second is over budget.
    assert!(!limiter.try_obtain(1, 0));
    assert_eq!(limiter.total_msgs(), 1);
    assert_eq!(limiter.deny_count(), 1);

    clock.advance(Duration::from_secs(1));
    assert!(limiter.try_obtain(1, 0));
    assert_eq!(limiter.total_msgs(), 2);
}

#[test]
fn test_byte_budget_is_tracked_separately() {
    let clock = MockClock::new();
    let limiter = RateLimiter::new(0, 100, Arc::new(clock.clone()));

    assert!(limiter.try_obtain(1, 50));

    // 50 bytes already admitted; the next payload must wait half a second.
    assert!(!limiter.try_obtain(1, 60));
    assert_eq!(limiter.total_bytes(), 50);

    clock.advance(Duration::from_millis(500));
    assert!(limiter.try_obtain(1, 60));
    assert_eq!(limiter.total_msgs(), 2);
    assert_eq!(limiter.total_bytes(), 110);
}

#[test]
fn test_reset_restarts_the_window() {
    let clock = MockClock::new();
    let limiter = RateLimiter::new(5, 0, Arc::new(clock.clone()));

    assert!(limiter.try_obtain(1, 10));
    assert!(!limiter.try_obtain(1, 10));
    clock.advance(Duration::from_secs(1));
    assert!(limiter.try_obtain(1, 10));

    limiter.reset();

    assert_eq!(limiter.total_msgs(), 0);
    assert_eq!(limiter.total_bytes(), 0);
    assert_eq!(limiter.deny_count(), 0);
    assert_eq!(limiter.delay_count(), 0);
    assert_eq!(limiter.age(), Duration::ZERO);

    // A fresh window grants the first request immediately again.
    assert!(limiter.try_obtain(1, 10));
}

#[test]
fn test_try_obtain_for_honors_the_timeout() {
    // 4 msgs/sec leaves 250ms between messages.
    let limiter = RateLimiter::new(4, 0, Arc::new(SystemClock::new()));

    limiter.obtain(1, 0);

    // A 1ms timeout cannot cover the pacing gap; the slot is handed back.
    assert!(!limiter.try_obtain_for(1, 0, Duration::from_millis(1)));
    assert_eq!(limiter.total_msgs(), 1);
    assert_eq!(limiter.deny_count(), 1);

    // A generous timeout covers it.
    let waited = Instant::now();
    assert!(limiter.try_obtain_for(1, 0, Duration::from_secs(2)));
    assert!(waited.elapsed() >= Duration::from_millis(100));
    assert_eq!(limiter.total_msgs(), 2);
}

#[test]
fn test_disabled_limiter_accounts_nothing() {
    let limiter = RateLimiter::new(1, 1, Arc::new(MockClock::new()));
    limiter.set_enabled(false);

    for _ in 0..5 {
        assert!(limiter.try_obtain(1, 1_000));
        assert_eq!(limiter.obtain(1, 1_000), Duration::ZERO);
    }

    assert_eq!(limiter.total_msgs(), 0);
    assert_eq!(limiter.total_bytes(), 0);
    assert_eq!(limiter.deny_count(), 0);
}

#[test]
fn test_set_limits_reconfigures_in_place() {
    let limiter = RateLimiter::new(1, 1, Arc::new(MockClock::new()));

    limiter.set_limits(100, 200);

    assert_eq!(limiter.max_mps(), 100);
    assert_eq!(limiter.max_bps(), 200);
    assert!(limiter.is_enabled());
}

#[test]
fn test_observed_rates_follow_the_window() {
    let clock = MockClock::new();
    let limiter = RateLimiter::new(1_000, 0, Arc::new(clock.clone()));

    assert!(limiter.try_obtain(1, 100));
    clock.advance(Duration::from_secs(1));
    assert!(limiter.try_obtain(1, 100));
    clock.advance(Duration::from_secs(1));

    assert_eq!(limiter.age(), Duration::from_secs(2));
    assert!((limiter.mps() - 1.0).abs() < 0.01);
    assert!((limiter.bps() - 100.0).abs() < 0.5);
}

#[test]
fn test_unlimited_accounting_is_thread_safe() {
    let limiter = Arc::new(RateLimiter::unlimited(Arc::new(SystemClock::new())));
    let mut handles = vec![];

    for _ in 0..8 {
        let limiter = Arc::clone(&limiter);
        handles.push(thread::spawn(move || {
            for _ in 0..1_000 {
                limiter.obtain(1, 10);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(limiter.total_msgs(), 8_000);
    assert_eq!(limiter.total_bytes(), 80_000);
    assert_eq!(limiter.delay_count(), 0);
}
