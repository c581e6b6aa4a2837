use crate::events::RetryEvent;
use crate::interval::{ExponentialBackoff, FixedInterval, FnInterval, IntervalFunction};
use crate::RetryLayer;
use dispatch_resilience_core::{DispatchError, EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Predicate deciding whether an error is worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&DispatchError) -> bool + Send + Sync>;

/// Configuration for the retry middleware.
pub struct RetryConfig {
    pub(crate) max_attempts: usize,
    pub(crate) interval: Arc<dyn IntervalFunction>,
    pub(crate) retry_on: Option<RetryPredicate>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl RetryConfig {
    /// Creates a builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    pub(crate) fn should_retry(&self, error: &DispatchError) -> bool {
        if error.is_budget_exhausted() {
            return false;
        }
        self.retry_on.as_ref().map(|p| p(error)).unwrap_or(true)
    }
}

/// Builder for [`RetryLayer`].
pub struct RetryConfigBuilder {
    max_attempts: usize,
    interval: Option<Arc<dyn IntervalFunction>>,
    retry_on: Option<RetryPredicate>,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_attempts: 3
    /// - interval: fixed 100ms
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            interval: None,
            retry_on: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the maximum number of attempts, including the first.
    ///
    /// Values below 1 are treated as 1.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Waits `duration` between attempts.
    pub fn fixed_interval(mut self, duration: Duration) -> Self {
        self.interval = Some(Arc::new(FixedInterval::new(duration)));
        self
    }

    /// Waits exponentially longer between attempts, starting at `initial_interval`.
    pub fn exponential_backoff(mut self, initial_interval: Duration) -> Self {
        self.interval = Some(Arc::new(ExponentialBackoff::new(initial_interval)));
        self
    }

    /// Computes every wait with `f`, which receives the retry number.
    pub fn interval_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        self.interval = Some(Arc::new(FnInterval::new(f)));
        self
    }

    /// Sets a custom interval function.
    pub fn interval<I>(mut self, interval: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval = Some(Arc::new(interval));
        self
    }

    /// Only retries errors matching `predicate`.
    ///
    /// Caller budget errors are never retried, whatever the predicate says.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&DispatchError) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Some(Arc::new(predicate));
        self
    }

    /// Sets the name for this retry instance.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a listener for every [`RetryEvent`].
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(listener));
        self
    }

    /// Called with the retry number and delay before each retry.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Called with the attempt count when every attempt failed.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build_config(self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            interval: self
                .interval
                .unwrap_or_else(|| Arc::new(FixedInterval::new(Duration::from_millis(100)))),
            retry_on: self.retry_on,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the retry layer.
    pub fn build(self) -> RetryLayer {
        RetryLayer::new(self.build_config())
    }
}
