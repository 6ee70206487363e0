//! Adaptive submission throttle: a pure state machine over
//! success/error observations in a rolling window, with the clock
//! injected so adjustment is deterministically testable.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Error rate above which the rate is halved when the window closes.
const BACKOFF_ERROR_RATE: f64 = 0.20;

/// Error rate below which the rate grows 10% when the window closes.
const RECOVERY_ERROR_RATE: f64 = 0.05;

/// Error rate at or above which the downstream counts as unhealthy.
const UNHEALTHY_ERROR_RATE: f64 = 0.30;

/// Observations below which the window is too thin to call unhealthy.
const MIN_OBSERVATIONS: u64 = 5;

/// Injected time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The process clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct ThrottleState {
    rate: f64,
    window_start: Instant,
    successes: u64,
    errors: u64,
}

/// Rate controller reacting to downstream health.
///
/// The rate `r` starts at `base_rate` and stays clamped to
/// `[0.1 * base_rate, 2 * base_rate]`. When a window closes with an error
/// rate above 20% the rate halves; below 5% it grows 10%; otherwise it
/// holds.
pub struct AdaptiveThrottle {
    base_rate: f64,
    min_rate: f64,
    max_rate: f64,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<ThrottleState>,
}

impl AdaptiveThrottle {
    /// A throttle over the standard 60-second window and process clock.
    pub fn new(base_rate: f64) -> Self {
        Self::with_clock(base_rate, Duration::from_secs(60), Arc::new(SystemClock))
    }

    /// Full control over window and clock, for tests.
    pub fn with_clock(base_rate: f64, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            base_rate,
            min_rate: 0.1 * base_rate,
            max_rate: 2.0 * base_rate,
            window,
            clock,
            state: Mutex::new(ThrottleState {
                rate: base_rate,
                window_start: now,
                successes: 0,
                errors: 0,
            }),
        }
    }

    /// Record a successful submission.
    pub fn observe_success(&self) {
        let mut state = self.lock();
        self.roll_if_due(&mut state);
        state.successes += 1;
    }

    /// Record a failed submission (or a dropped order).
    pub fn observe_error(&self) {
        let mut state = self.lock();
        self.roll_if_due(&mut state);
        state.errors += 1;
    }

    /// The current rate in submissions per second.
    pub fn rate(&self) -> f64 {
        let mut state = self.lock();
        self.roll_if_due(&mut state);
        state.rate
    }

    /// The pause to insert between successive submissions: `1s / rate`.
    pub fn submit_delay(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate().max(f64::EPSILON))
    }

    /// Whether the downstream looks healthy enough to keep generating:
    /// fewer than five observations this window, or an error rate below
    /// 30%.
    pub fn is_healthy(&self) -> bool {
        let mut state = self.lock();
        self.roll_if_due(&mut state);
        let observations = state.successes + state.errors;
        if observations < MIN_OBSERVATIONS {
            return true;
        }
        (state.errors as f64 / observations as f64) < UNHEALTHY_ERROR_RATE
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ThrottleState> {
        self.state.lock().expect("throttle lock poisoned")
    }

    /// Close out every elapsed window, applying one adjustment per window.
    fn roll_if_due(&self, state: &mut ThrottleState) {
        let now = self.clock.now();
        while now.duration_since(state.window_start) >= self.window {
            let observations = state.successes + state.errors;
            if observations > 0 {
                let error_rate = state.errors as f64 / observations as f64;
                let previous = state.rate;
                if error_rate > BACKOFF_ERROR_RATE {
                    state.rate = (state.rate / 2.0).max(self.min_rate);
                } else if error_rate < RECOVERY_ERROR_RATE && state.rate < self.max_rate {
                    state.rate = (state.rate * 1.1).min(self.max_rate);
                }
                state.rate = state.rate.clamp(self.min_rate, self.max_rate);
                if (state.rate - previous).abs() > f64::EPSILON {
                    debug!(
                        error_rate,
                        previous, rate = state.rate, "throttle rate adjusted"
                    );
                }
            }
            state.successes = 0;
            state.errors = 0;
            state.window_start += self.window;
        }
    }
}
