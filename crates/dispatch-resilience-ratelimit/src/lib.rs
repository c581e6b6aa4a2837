//! Keyed rate-limit gate for dispatch services.
//!
//! [`RateLimit`] asks a [`Limiter`] whether the configured key is over its
//! limit before every dispatch:
//!
//! - limited: the dispatch is rejected with [`DispatchError::RateLimited`]
//!   and the inner service is not called;
//! - limiter failure: the dispatch is rejected with [`DispatchError::Limiter`]
//!   wrapping the cause;
//! - otherwise the dispatch is forwarded unchanged.
//!
//! The limiter call is bounded by the request's context, so a slow limiter
//! cannot outlive the caller's deadline.
//!
//! ```
//! use dispatch_resilience_core::{Dispatch, DispatchError};
//! use dispatch_resilience_ratelimit::RateLimitLayer;
//! use std::time::Duration;
//! use tower::{service_fn, Layer, Service, ServiceExt};
//!
//! # async fn example() {
//! let provider = service_fn(|_req: Dispatch<()>| async { Ok::<_, DispatchError>(()) });
//! let mut service = RateLimitLayer::builder()
//!     .key("sms:login")
//!     .fixed_window(1, Duration::from_secs(60))
//!     .build()
//!     .layer(provider);
//!
//! assert!(service.ready().await.unwrap().call(Dispatch::new("otp", ())).await.is_ok());
//! let err = service.ready().await.unwrap().call(Dispatch::new("otp", ())).await.unwrap_err();
//! assert!(err.is_rate_limited());
//! # }
//! ```

mod config;
mod events;
mod layer;
mod limiter;

pub use config::{RateLimitConfig, RateLimitConfigBuilder};
pub use events::RateLimitEvent;
pub use layer::RateLimitLayer;
pub use limiter::{FixedWindowLimiter, Limiter};

use dispatch_resilience_core::{Dispatch, DispatchError};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// A Tower [`Service`] that rejects dispatches once their key is limited.
pub struct RateLimit<S> {
    inner: S,
    config: Arc<RateLimitConfig>,
}

impl<S> RateLimit<S> {
    /// Creates a new `RateLimit` service wrapping `inner`.
    pub fn new(inner: S, config: Arc<RateLimitConfig>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "ratelimit_calls_total",
                "Dispatches seen by the rate-limit gate, by outcome"
            );
        });

        Self { inner, config }
    }

    /// The key dispatches are limited under.
    pub fn key(&self) -> &str {
        &self.config.key
    }
}

impl<S> Clone for RateLimit<S>
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

impl<S, T> Service<Dispatch<T>> for RateLimit<S>
where
    S: Service<Dispatch<T>, Error = DispatchError> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    T: Send + 'static,
{
    type Response = S::Response;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Dispatch<T>) -> Self::Future {
        let clone = self.inner.clone();
        let mut service = std::mem::replace(&mut self.inner, clone);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let verdict = req
                .ctx
                .run(async {
                    config
                        .limiter
                        .limit(&config.key)
                        .await
                        .map_err(DispatchError::limiter)
                })
                .await;

            match verdict {
                Ok(false) => {
                    config.event_listeners.emit(&RateLimitEvent::Permitted {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        key: config.key.clone(),
                    });
                    #[cfg(feature = "metrics")]
                    counter!("ratelimit_calls_total", "ratelimit" => config.name.clone(), "result" => "permitted")
                        .increment(1);
                    service.call(req).await
                }
                Ok(true) => {
                    #[cfg(feature = "tracing")]
                    debug!(ratelimit = %config.name, key = %config.key, "dispatch rate limited");
                    config.event_listeners.emit(&RateLimitEvent::Limited {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        key: config.key.clone(),
                    });
                    #[cfg(feature = "metrics")]
                    counter!("ratelimit_calls_total", "ratelimit" => config.name.clone(), "result" => "limited")
                        .increment(1);
                    Err(DispatchError::RateLimited {
                        key: config.key.clone(),
                    })
                }
                Err(error) if error.is_budget_exhausted() => Err(error),
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    warn!(ratelimit = %config.name, key = %config.key, error = %error, "rate limiter failed");
                    config.event_listeners.emit(&RateLimitEvent::LimiterFailed {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        key: config.key.clone(),
                        error: error.to_string(),
                    });
                    #[cfg(feature = "metrics")]
                    counter!("ratelimit_calls_total", "ratelimit" => config.name.clone(), "result" => "limiter_error")
                        .increment(1);
                    Err(error)
                }
            }
        })
    }
}
