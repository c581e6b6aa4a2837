//! Retry middleware for dispatch services.
//!
//! [`Retry`] re-sends a failed [`Dispatch`] up to a configured number of
//! attempts, waiting between attempts according to an [`IntervalFunction`].
//! The wait is bounded by the request's [`DispatchContext`]: if the caller
//! cancels or the deadline passes while waiting, the context error is
//! returned as is and no further attempt is made.
//!
//! ```
//! use dispatch_resilience_core::{Dispatch, DispatchError};
//! use dispatch_resilience_retry::RetryLayer;
//! use std::time::Duration;
//! use tower::{service_fn, Layer, Service, ServiceExt};
//!
//! # async fn example() -> Result<(), DispatchError> {
//! let provider = service_fn(|_req: Dispatch<()>| async { Ok::<_, DispatchError>("queued") });
//!
//! let mut service = RetryLayer::builder()
//!     .max_attempts(3)
//!     .exponential_backoff(Duration::from_millis(50))
//!     .retry_on(|e| !matches!(e, DispatchError::RateLimited { .. }))
//!     .build()
//!     .layer(provider);
//!
//! let status = service.ready().await?.call(Dispatch::new("welcome", ())).await?;
//! assert_eq!(status, "queued");
//! # Ok(())
//! # }
//! ```
//!
//! [`DispatchContext`]: dispatch_resilience_core::DispatchContext

mod config;
mod events;
mod interval;
mod layer;

pub use config::{RetryConfig, RetryConfigBuilder, RetryPredicate};
pub use events::RetryEvent;
pub use interval::{ExponentialBackoff, FixedInterval, FnInterval, IntervalFunction};
pub use layer::RetryLayer;

use dispatch_resilience_core::{Dispatch, DispatchError};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Service, ServiceExt};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// A Tower [`Service`] that retries failed dispatches.
pub struct Retry<S> {
    inner: S,
    config: Arc<RetryConfig>,
}

impl<S> Retry<S> {
    /// Creates a new `Retry` service wrapping `inner`.
    pub fn new(inner: S, config: Arc<RetryConfig>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "retry_calls_total",
                "Dispatches handled by the retry middleware, by final result"
            );
        });

        Self { inner, config }
    }

    /// The maximum number of attempts per dispatch.
    pub fn max_attempts(&self) -> usize {
        self.config.max_attempts
    }
}

impl<S> Clone for Retry<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

#[cfg(feature = "metrics")]
fn record(name: &str, result: &'static str) {
    counter!("retry_calls_total", "retry" => name.to_string(), "result" => result).increment(1);
}

impl<S, T> Service<Dispatch<T>> for Retry<S>
where
    S: Service<Dispatch<T>, Error = DispatchError> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    T: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Dispatch<T>) -> Self::Future {
        // Take the service that was driven to readiness, leave a clone behind.
        let clone = self.inner.clone();
        let mut service = std::mem::replace(&mut self.inner, clone);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let ctx = req.ctx.clone();
            let mut attempt = 1;
            let mut first = true;

            loop {
                let result = if first {
                    first = false;
                    service.call(req.clone()).await
                } else {
                    match service.ready().await {
                        Ok(ready) => ready.call(req.clone()).await,
                        Err(e) => Err(e),
                    }
                };

                let error = match result {
                    Ok(response) => {
                        config.event_listeners.emit(&RetryEvent::Success {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        });
                        #[cfg(feature = "metrics")]
                        record(&config.name, "success");
                        return Ok(response);
                    }
                    Err(error) => error,
                };

                if !config.should_retry(&error) {
                    config.event_listeners.emit(&RetryEvent::IgnoredError {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                    });
                    #[cfg(feature = "metrics")]
                    record(&config.name, "not_retried");
                    return Err(error);
                }

                if attempt >= config.max_attempts {
                    #[cfg(feature = "tracing")]
                    warn!(
                        retry = %config.name,
                        attempts = attempt,
                        error = %error,
                        "dispatch failed after every attempt"
                    );
                    config.event_listeners.emit(&RetryEvent::Exhausted {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });
                    #[cfg(feature = "metrics")]
                    record(&config.name, "exhausted");
                    return Err(DispatchError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    });
                }

                let delay = config.interval.next_interval(attempt - 1);
                #[cfg(feature = "tracing")]
                debug!(
                    retry = %config.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying dispatch"
                );
                config.event_listeners.emit(&RetryEvent::Retry {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    attempt,
                    delay,
                });

                if let Err(budget) = ctx
                    .run(async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await
                {
                    #[cfg(feature = "metrics")]
                    record(&config.name, "budget_exhausted");
                    return Err(budget);
                }
                attempt += 1;
            }
        })
    }
}
