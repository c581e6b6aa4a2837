use crate::{RateLimit, RateLimitConfig, RateLimitConfigBuilder};
use std::sync::Arc;
use tower::Layer;

/// A Tower [`Layer`] that gates dispatches behind a [`Limiter`](crate::Limiter).
#[derive(Clone)]
pub struct RateLimitLayer {
    config: Arc<RateLimitConfig>,
}

impl RateLimitLayer {
    pub(crate) fn new(config: RateLimitConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Creates a builder.
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimit<S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimit::new(service, Arc::clone(&self.config))
    }
}
