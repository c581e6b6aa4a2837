use crate::events::RateLimitEvent;
use crate::limiter::{FixedWindowLimiter, Limiter};
use crate::RateLimitLayer;
use dispatch_resilience_core::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the rate-limit gate.
pub struct RateLimitConfig {
    pub(crate) key: String,
    pub(crate) limiter: Arc<dyn Limiter>,
    pub(crate) event_listeners: EventListeners<RateLimitEvent>,
    pub(crate) name: String,
}

impl RateLimitConfig {
    /// Creates a builder.
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// The key every dispatch is limited under.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Builder for [`RateLimitLayer`].
pub struct RateLimitConfigBuilder {
    key: String,
    limiter: Option<Arc<dyn Limiter>>,
    event_listeners: EventListeners<RateLimitEvent>,
    name: String,
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitConfigBuilder {
    /// Creates a new builder.
    ///
    /// A limiter must be set with [`limiter`](Self::limiter) or
    /// [`fixed_window`](Self::fixed_window) before building.
    pub fn new() -> Self {
        Self {
            key: "dispatch".to_string(),
            limiter: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the limiter key, typically one per provider or channel.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Uses `limiter` to decide whether dispatches are rejected.
    pub fn limiter<L>(mut self, limiter: L) -> Self
    where
        L: Limiter + 'static,
    {
        self.limiter = Some(Arc::new(limiter));
        self
    }

    /// Uses an in-process [`FixedWindowLimiter`].
    pub fn fixed_window(self, limit: usize, window: Duration) -> Self {
        self.limiter(FixedWindowLimiter::new(limit, window))
    }

    /// Sets the name for this instance.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a listener for every [`RateLimitEvent`].
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&RateLimitEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(listener));
        self
    }

    /// Called with the key whenever a dispatch is rejected.
    pub fn on_limited<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimitEvent::Limited { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// Panics if no limiter was configured.
    pub fn build_config(self) -> RateLimitConfig {
        let limiter = self
            .limiter
            .expect("a limiter must be configured before building a rate-limit layer");
        RateLimitConfig {
            key: self.key,
            limiter,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the rate-limit layer.
    ///
    /// # Panics
    ///
    /// Panics if no limiter was configured.
    pub fn build(self) -> RateLimitLayer {
        RateLimitLayer::new(self.build_config())
    }
}
