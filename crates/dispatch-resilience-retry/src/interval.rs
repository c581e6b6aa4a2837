//! Wait strategies between retry attempts.

use std::sync::Arc;
use std::time::Duration;

/// Computes how long to wait before the next attempt.
pub trait IntervalFunction: Send + Sync {
    /// Delay before retry number `retry` (0 for the first retry).
    fn next_interval(&self, retry: usize) -> Duration;
}

/// The same delay before every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Creates a fixed interval.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _retry: usize) -> Duration {
        self.duration
    }
}

/// Exponentially growing delay, optionally capped.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Doubles `initial_interval` on every retry.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    /// Sets the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps the delay.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, retry: usize) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let interval = if factor.is_finite() {
            Duration::try_from_secs_f64(self.initial_interval.as_secs_f64() * factor)
                .unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        };
        match self.max_interval {
            Some(max) => interval.min(max),
            None => interval,
        }
    }
}

/// Delay computed by a closure, e.g. a jittered interval.
#[derive(Clone)]
pub struct FnInterval {
    f: Arc<dyn Fn(usize) -> Duration + Send + Sync>,
}

impl FnInterval {
    /// Wraps `f`, which receives the retry number.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }
}

impl IntervalFunction for FnInterval {
    fn next_interval(&self, retry: usize) -> Duration {
        (self.f)(retry)
    }
}

impl std::fmt::Debug for FnInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnInterval").finish_non_exhaustive()
    }
}
