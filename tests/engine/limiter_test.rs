//! Tests for `src/engine/limiter.rs`.

use std::sync::Arc;

use outreach::config::LimitsConfig;
use outreach::engine::limiter::{Clock, ConfigStore, ManualClock, RateLimitError, RateLimiter};

const T0: i64 = 1_700_000_000_000;

fn limiter(config: ConfigStore, clock: &Arc<ManualClock>) -> RateLimiter {
    RateLimiter::new(Arc::new(config), Arc::clone(clock) as Arc<dyn Clock>)
}

#[test]
fn window_gate_passes_before_any_session() {
    let clock = Arc::new(ManualClock::new(T0));
    let limiter = limiter(ConfigStore::default(), &clock);
    clock.advance(100 * 36_000_000);
    assert!(limiter.window_open());
    assert_eq!(limiter.window_remaining_ms(), None);
}

#[test]
fn window_expires_one_ms_after_limit() {
    let clock = Arc::new(ManualClock::new(T0));
    let limiter = limiter(ConfigStore::default(), &clock);
    assert_eq!(limiter.mark_started(), T0);

    clock.set(T0 + 36_000_000);
    assert!(limiter.check_window().is_ok());
    assert_eq!(limiter.window_remaining_ms(), Some(0));

    clock.set(T0 + 36_000_001);
    assert_eq!(
        limiter.check_window(),
        Err(RateLimitError::WindowExpired {
            elapsed_ms: 36_000_001,
            max_window_ms: 36_000_000,
        })
    );
}

#[test]
fn mark_started_keeps_first_value_until_reset() {
    let clock = Arc::new(ManualClock::new(T0));
    let limiter = limiter(ConfigStore::default(), &clock);
    limiter.mark_started();
    clock.advance(5_000);
    assert_eq!(limiter.mark_started(), T0);

    limiter.reset_window();
    assert_eq!(limiter.started_at(), None);
    assert_eq!(limiter.mark_started(), T0 + 5_000);
}

#[test]
fn cap_closes_at_exactly_the_limit() {
    let clock = Arc::new(ManualClock::new(T0));
    let config = ConfigStore::default();
    config.set_max_messages_per_day(Some(3));
    let limiter = limiter(config, &clock);

    assert!(limiter.cap_open(2));
    assert!(!limiter.cap_open(3));
    assert_eq!(
        limiter.check_cap(3),
        Err(RateLimitError::DailyCapReached { sent: 3, limit: 3 })
    );
}

#[test]
fn combined_check_reports_window_first() {
    let clock = Arc::new(ManualClock::new(T0));
    let config = ConfigStore::default();
    config.set_max_messages_per_day(Some(1));
    let limiter = limiter(config, &clock);
    limiter.mark_started();
    clock.advance(36_000_001);

    assert!(matches!(
        limiter.check(5),
        Err(RateLimitError::WindowExpired { .. })
    ));
}

#[test]
fn limit_changes_apply_to_the_next_check() {
    let clock = Arc::new(ManualClock::new(T0));
    let store = Arc::new(ConfigStore::default());
    let limiter = RateLimiter::new(Arc::clone(&store), Arc::clone(&clock) as Arc<dyn Clock>);
    limiter.mark_started();
    clock.advance(2 * 3_600_000);
    assert!(limiter.window_open());

    store.set_max_window_hours(Some(1.5));
    assert!(!limiter.window_open());

    store.set_max_window_hours(Some(-1.0));
    assert_eq!(store.max_window_ms(), 5_400_000);
}

#[test]
fn store_seeds_from_config_limits() {
    let limits = LimitsConfig {
        max_messages_per_day: 25,
        max_window_hours: 0.5,
    };
    let store = ConfigStore::from_limits(&limits);
    assert_eq!(store.max_messages_per_day(), 25);
    assert_eq!(store.max_window_ms(), 1_800_000);
}

#[test]
fn rate_limit_errors_read_well() {
    let err = RateLimitError::DailyCapReached { sent: 200, limit: 200 };
    assert!(err.to_string().contains("200"));
}
