//! Configuration for the failover services.

use crate::recovery::{self, RecoveryFn};
use crate::{Cursor, FailoverEvent, RoundRobinFailover, ThresholdFailover};
use dispatch_resilience_core::{DispatchContext, DispatchError, EventListeners, FnListener};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for [`RoundRobinFailover`].
pub struct RoundRobinConfig {
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<FailoverEvent>,
}

/// Builder for [`RoundRobinFailover`].
pub struct RoundRobinConfigBuilder {
    name: String,
    event_listeners: EventListeners<FailoverEvent>,
}

impl Default for RoundRobinConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundRobinConfigBuilder {
    /// Creates a builder named `"<unnamed>"` with no listeners.
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the instance name used in events, logs, and metrics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a listener for every [`FailoverEvent`].
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&FailoverEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(listener));
        self
    }

    /// Called with the backend index and error each time a backend fails
    /// and the sweep moves on.
    pub fn on_attempt_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &DispatchError) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FailoverEvent::AttemptFailed { backend, error, .. } = event {
                f(*backend, error);
            }
        }));
        self
    }

    /// Called with `(from, to)` whenever the cursor advances.
    pub fn on_advance<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FailoverEvent::CursorAdvanced { from, to, .. } = event {
                f(*from, *to);
            }
        }));
        self
    }

    /// Called with the number of attempts when a sweep exhausts every backend.
    pub fn on_all_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FailoverEvent::AllBackendsFailed { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Builds the failover service over `backends`, in preference order.
    ///
    /// # Panics
    ///
    /// Panics if `backends` is empty.
    pub fn build<S, I>(self, backends: I) -> RoundRobinFailover<S>
    where
        I: IntoIterator<Item = S>,
    {
        let config = RoundRobinConfig {
            name: self.name,
            event_listeners: self.event_listeners,
        };
        RoundRobinFailover::from_config(backends.into_iter().collect(), config)
    }
}

/// Configuration for [`ThresholdFailover`].
pub struct ThresholdConfig {
    pub(crate) name: String,
    pub(crate) threshold: usize,
    pub(crate) recovery: Option<RecoveryFn>,
    pub(crate) event_listeners: EventListeners<FailoverEvent>,
}

/// Builder for [`ThresholdFailover`].
pub struct ThresholdConfigBuilder {
    name: String,
    threshold: usize,
    recovery: Option<RecoveryFn>,
    event_listeners: EventListeners<FailoverEvent>,
}

impl Default for ThresholdConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ThresholdConfigBuilder {
    /// Creates a builder with defaults.
    ///
    /// Defaults:
    /// - threshold: 3 consecutive timeouts
    /// - recovery: none (the cursor only ever moves forward)
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            threshold: 3,
            recovery: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the instance name used in events, logs, and metrics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets how many consecutive timeouts the active backend may return
    /// before the next call moves to the following backend.
    ///
    /// A threshold of 0 moves the cursor on every call.
    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the recovery procedure spawned after each failover.
    pub fn recovery<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(DispatchContext, Arc<Cursor>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.recovery = Some(recovery::recovery_fn(f));
        self
    }

    /// Sets an already boxed recovery procedure.
    pub fn recovery_fn(mut self, recovery: RecoveryFn) -> Self {
        self.recovery = Some(recovery);
        self
    }

    /// Moves the cursor back to backend 0 once `cooldown` has passed after
    /// each failover.
    pub fn recover_after(self, cooldown: Duration) -> Self {
        self.recovery_fn(recovery::reset_after(cooldown))
    }

    /// Adds a listener for every [`FailoverEvent`].
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&FailoverEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(listener));
        self
    }

    /// Called with the backend index and the new consecutive count each
    /// time a timeout is recorded.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FailoverEvent::TimeoutRecorded {
                backend,
                consecutive,
                ..
            } = event
            {
                f(*backend, *consecutive);
            }
        }));
        self
    }

    /// Called with `(from, to)` when a threshold breach moves the cursor.
    pub fn on_failover<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FailoverEvent::CursorAdvanced { from, to, .. } = event {
                f(*from, *to);
            }
        }));
        self
    }

    /// Builds the failover service over `backends`, in preference order.
    ///
    /// # Panics
    ///
    /// Panics if `backends` is empty.
    pub fn build<S, I>(self, backends: I) -> ThresholdFailover<S>
    where
        I: IntoIterator<Item = S>,
    {
        let config = ThresholdConfig {
            name: self.name,
            threshold: self.threshold,
            recovery: self.recovery,
            event_listeners: self.event_listeners,
        };
        ThresholdFailover::from_config(backends.into_iter().collect(), config)
    }
}
