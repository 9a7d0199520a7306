//! Rate limiting: daily send cap and rolling session window.
//!
//! [`ConfigStore`] holds the tunable limits as atomics so a running driver
//! picks up setter changes on its next check. [`RateLimiter`] owns the
//! session window start and evaluates the two independent gates.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::LimitsConfig;

/// Default maximum sends per session window.
pub const DEFAULT_MAX_MESSAGES_PER_DAY: u64 = 200;

/// Default session window: 10 hours.
pub const DEFAULT_MAX_WINDOW_MS: u64 = 36_000_000;

const MS_PER_HOUR: u64 = 3_600_000;

/// Errors produced when a rate-limit gate is closed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// The session window has elapsed.
    #[error("session window over: {elapsed_ms}ms elapsed of {max_window_ms}ms")]
    WindowExpired {
        /// Milliseconds since the window started.
        elapsed_ms: u64,
        /// Configured window length.
        max_window_ms: u64,
    },

    /// The daily send cap has been reached.
    #[error("max messages per day reached: sent {sent} of {limit}")]
    DailyCapReached {
        /// Sends already recorded.
        sent: u64,
        /// Configured cap.
        limit: u64,
    },
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Millisecond wall clock used by the window gate.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Wall clock backed by [`chrono::Utc`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `now_ms`.
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::Relaxed);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        let _ = self
            .now
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| {
                Some(t.saturating_add(delta_ms))
            });
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Tunable limits, adjustable at runtime.
///
/// Setters silently ignore invalid values and keep the prior setting.
/// There is no upper bound.
#[derive(Debug)]
pub struct ConfigStore {
    max_messages_per_day: AtomicU64,
    max_window_ms: AtomicU64,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self {
            max_messages_per_day: AtomicU64::new(DEFAULT_MAX_MESSAGES_PER_DAY),
            max_window_ms: AtomicU64::new(DEFAULT_MAX_WINDOW_MS),
        }
    }
}

impl ConfigStore {
    /// Seed a store from file configuration, applying the setter rules.
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        let store = Self::default();
        let cap = i64::try_from(limits.max_messages_per_day).unwrap_or(i64::MAX);
        store.set_max_messages_per_day(Some(cap));
        store.set_max_window_hours(Some(limits.max_window_hours));
        store
    }

    /// Set the daily cap. Ignores `None` and non-positive values.
    pub fn set_max_messages_per_day(&self, n: Option<i64>) {
        let Some(n) = n.filter(|n| *n > 0) else {
            debug!(?n, "ignoring invalid max_messages_per_day");
            return;
        };
        let n = u64::try_from(n).unwrap_or(u64::MAX);
        self.max_messages_per_day.store(n, Ordering::Relaxed);
    }

    /// Set the window length in hours. Ignores `None`, NaN and `h <= 0`.
    pub fn set_max_window_hours(&self, h: Option<f64>) {
        let Some(h) = h.filter(|h| h.is_finite() && *h > 0.0) else {
            debug!(?h, "ignoring invalid max_window_hours");
            return;
        };
        self.max_window_ms.store(hours_to_ms(h), Ordering::Relaxed);
    }

    /// Current daily cap.
    pub fn max_messages_per_day(&self) -> u64 {
        self.max_messages_per_day.load(Ordering::Relaxed)
    }

    /// Current window length in milliseconds.
    pub fn max_window_ms(&self) -> u64 {
        self.max_window_ms.load(Ordering::Relaxed)
    }
}

/// Convert positive, finite hours to whole milliseconds (saturating).
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::arithmetic_side_effects
)]
fn hours_to_ms(h: f64) -> u64 {
    (h * MS_PER_HOUR as f64).round() as u64
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Window and cap gates for one engine.
///
/// Shared between the engine and its driver; `started_at` follows
/// first-call-wins semantics and only [`reset_window`](Self::reset_window)
/// clears it.
pub struct RateLimiter {
    config: Arc<ConfigStore>,
    clock: Arc<dyn Clock>,
    started_at: Mutex<Option<i64>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("started_at", &self.started_at())
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter reading limits from `config` and time from `clock`.
    pub fn new(config: Arc<ConfigStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            started_at: Mutex::new(None),
        }
    }

    /// The shared limit store.
    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// Current time according to the injected clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Window start, if a session has started.
    pub fn started_at(&self) -> Option<i64> {
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the window start unless one is already set.
    ///
    /// Returns the effective start time.
    pub fn mark_started(&self) -> i64 {
        let mut started = self.started_at.lock().unwrap_or_else(PoisonError::into_inner);
        *started.get_or_insert_with(|| self.clock.now_ms())
    }

    /// Forget the window start so the next session opens a fresh window.
    pub fn reset_window(&self) {
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner) = None;
        info!("session window reset");
    }

    /// Milliseconds elapsed since the window started (0 if unset).
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at()
            .map(|start| u64::try_from(self.clock.now_ms().saturating_sub(start)).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Milliseconds left in the window, or `None` when no window is open.
    pub fn window_remaining_ms(&self) -> Option<u64> {
        self.started_at()?;
        Some(self.config.max_window_ms().saturating_sub(self.elapsed_ms()))
    }

    /// Window gate. Passes trivially when no session has started.
    pub fn window_open(&self) -> bool {
        self.check_window().is_ok()
    }

    /// Cap gate for `sent` messages already dispatched.
    pub fn cap_open(&self, sent: u64) -> bool {
        self.check_cap(sent).is_ok()
    }

    /// Evaluate the window gate.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::WindowExpired`] once `now - started_at`
    /// exceeds the configured window.
    pub fn check_window(&self) -> Result<(), RateLimitError> {
        if self.started_at().is_none() {
            return Ok(());
        }
        let elapsed_ms = self.elapsed_ms();
        let max_window_ms = self.config.max_window_ms();
        if elapsed_ms > max_window_ms {
            warn!(elapsed_ms, max_window_ms, "session window over; stopping automation");
            return Err(RateLimitError::WindowExpired {
                elapsed_ms,
                max_window_ms,
            });
        }
        Ok(())
    }

    /// Evaluate the cap gate.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::DailyCapReached`] when `sent` has reached
    /// the configured cap.
    pub fn check_cap(&self, sent: u64) -> Result<(), RateLimitError> {
        let limit = self.config.max_messages_per_day();
        if sent >= limit {
            warn!(sent, limit, "max messages per day reached; stopping");
            return Err(RateLimitError::DailyCapReached { sent, limit });
        }
        Ok(())
    }

    /// Evaluate both gates, window first.
    ///
    /// # Errors
    ///
    /// Returns the first closed gate as a [`RateLimitError`].
    pub fn check(&self, sent: u64) -> Result<(), RateLimitError> {
        self.check_window()?;
        self.check_cap(sent)
    }
}
