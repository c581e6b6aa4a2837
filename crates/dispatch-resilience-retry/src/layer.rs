use crate::{Retry, RetryConfig, RetryConfigBuilder};
use std::sync::Arc;
use tower::Layer;

/// A Tower [`Layer`] that retries failed dispatches.
///
/// ```
/// use dispatch_resilience_retry::RetryLayer;
/// use std::time::Duration;
///
/// let layer = RetryLayer::builder()
///     .max_attempts(3)
///     .fixed_interval(Duration::from_millis(200))
///     .build();
/// ```
#[derive(Clone)]
pub struct RetryLayer {
    config: Arc<RetryConfig>,
}

impl RetryLayer {
    pub(crate) fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Creates a builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retry<S>;

    fn layer(&self, service: S) -> Self::Service {
        Retry::new(service, Arc::clone(&self.config))
    }
}
