//! Error-driven round-robin failover.

use crate::config::{RoundRobinConfig, RoundRobinConfigBuilder};
use crate::{call_backend, Cursor, FailoverEvent};
use dispatch_resilience_core::{Dispatch, DispatchError};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Sends each dispatch to the preferred backend and sweeps forward through
/// the rest on failure.
///
/// Every call reads the cursor once and tries at most one full pass over
/// the backends, starting there. Each failure that leaves the caller's
/// budget intact advances the shared cursor before the next attempt, so a
/// broken backend is skipped by later calls too. The cursor is a hint and
/// is not reset on success.
///
/// A failed sweep returns [`DispatchError::AllBackendsFailed`] and leaves
/// the cursor on the last backend it tried. Cancellation or expiry of the
/// caller's own [`DispatchContext`](dispatch_resilience_core::DispatchContext)
/// ends the call immediately and the context error is returned as-is. A
/// backend that reports `Cancelled` or `DeadlineExceeded` while the caller's
/// context is still live is treated like any other failed backend.
///
/// Clones share the cursor.
///
/// ```
/// use dispatch_resilience_core::{Dispatch, DispatchError};
/// use dispatch_resilience_failover::RoundRobinFailover;
/// use tower::{service_fn, Service, ServiceExt};
///
/// # async fn example() -> Result<(), DispatchError> {
/// let gateway = |name: &'static str| {
///     service_fn(move |req: Dispatch<()>| async move {
///         println!("{name} -> {:?}", req.recipients);
///         Ok::<_, DispatchError>(())
///     })
/// };
///
/// let mut sms = RoundRobinFailover::builder()
///     .name("sms")
///     .build([gateway("primary"), gateway("secondary")]);
///
/// sms.ready().await?.call(Dispatch::new("login_code", ()).to("+15550100")).await?;
/// # Ok(())
/// # }
/// ```
pub struct RoundRobinFailover<S> {
    backends: Arc<[S]>,
    cursor: Arc<Cursor>,
    config: Arc<RoundRobinConfig>,
}

impl<S> RoundRobinFailover<S> {
    /// Creates a round-robin failover with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if `backends` is empty.
    pub fn new<I>(backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        RoundRobinConfigBuilder::new().build(backends)
    }

    pub(crate) fn from_config(backends: Vec<S>, config: RoundRobinConfig) -> Self {
        crate::describe_metrics();
        Self {
            cursor: Arc::new(Cursor::new(backends.len())),
            backends: backends.into(),
            config: Arc::new(config),
        }
    }

    /// Index of the backend the next call starts with.
    pub fn current_index(&self) -> usize {
        self.cursor.get()
    }

    /// Forces the next call to start with backend `index`.
    ///
    /// Out-of-range indices select backend 0.
    pub fn set_current_index(&self, index: usize) {
        self.cursor.set(index);
    }

    /// The shared cursor.
    pub fn cursor(&self) -> &Arc<Cursor> {
        &self.cursor
    }

    /// Number of backends.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.config.name
    }
}

impl RoundRobinFailover<()> {
    /// Creates a builder.
    ///
    /// The backend type is chosen by [`RoundRobinConfigBuilder::build`].
    pub fn builder() -> RoundRobinConfigBuilder {
        RoundRobinConfigBuilder::new()
    }
}

impl<S> Clone for RoundRobinFailover<S> {
    fn clone(&self) -> Self {
        Self {
            backends: Arc::clone(&self.backends),
            cursor: Arc::clone(&self.cursor),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, T> Service<Dispatch<T>> for RoundRobinFailover<S>
where
    S: Service<Dispatch<T>, Error = DispatchError> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    T: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    // Backend readiness is awaited per attempt inside the sweep.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Dispatch<T>) -> Self::Future {
        let backends = Arc::clone(&self.backends);
        let cursor = Arc::clone(&self.cursor);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let ctx = req.ctx.clone();
            let len = backends.len();
            let start = cursor.get();
            let mut last_error = None;

            for offset in 0..len {
                let index = (start + offset) % len;

                match call_backend(&backends[index], req.clone()).await {
                    Ok(response) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(failover = %config.name, backend = index, "dispatch succeeded");

                        #[cfg(feature = "metrics")]
                        counter!(
                            "failover_attempts_total",
                            "failover" => config.name.clone(),
                            "backend" => index.to_string(),
                            "result" => "success"
                        )
                        .increment(1);

                        config.event_listeners.emit(&FailoverEvent::Succeeded {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            backend: index,
                            attempts: offset + 1,
                        });
                        return Ok(response);
                    }
                    Err(error) if error.is_budget_exhausted() && ctx.err().is_some() => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            failover = %config.name,
                            backend = index,
                            error = %error,
                            "caller budget exhausted, abandoning sweep"
                        );

                        config.event_listeners.emit(&FailoverEvent::BudgetExhausted {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            backend: index,
                        });
                        return Err(error);
                    }
                    Err(error) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            failover = %config.name,
                            backend = index,
                            error = %error,
                            "dispatch failed, trying next backend"
                        );

                        #[cfg(feature = "metrics")]
                        counter!(
                            "failover_attempts_total",
                            "failover" => config.name.clone(),
                            "backend" => index.to_string(),
                            "result" => "failure"
                        )
                        .increment(1);

                        config.event_listeners.emit(&FailoverEvent::AttemptFailed {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            backend: index,
                            error: error.clone(),
                        });

                        if offset + 1 < len {
                            let to = cursor.advance();

                            #[cfg(feature = "metrics")]
                            counter!("failover_advances_total", "failover" => config.name.clone())
                                .increment(1);

                            config.event_listeners.emit(&FailoverEvent::CursorAdvanced {
                                pattern_name: config.name.clone(),
                                timestamp: Instant::now(),
                                from: index,
                                to,
                            });
                        }
                        last_error = Some(Box::new(error));
                    }
                }
            }

            #[cfg(feature = "tracing")]
            tracing::error!(failover = %config.name, attempts = len, "all backends failed");

            #[cfg(feature = "metrics")]
            counter!("failover_exhausted_total", "failover" => config.name.clone()).increment(1);

            config.event_listeners.emit(&FailoverEvent::AllBackendsFailed {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                attempts: len,
            });

            Err(DispatchError::AllBackendsFailed {
                attempts: len,
                last: last_error,
            })
        })
    }
}
