//! Consecutive-timeout threshold failover.

use crate::config::{ThresholdConfig, ThresholdConfigBuilder};
use crate::{call_backend, Cursor, FailoverEvent};
use dispatch_resilience_core::{Dispatch, DispatchContext, DispatchError};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Sends each dispatch to the active backend and moves to the next one
/// after too many consecutive timeouts.
///
/// The service counts consecutive timeout outcomes ([`DispatchError::Timeout`]
/// and [`DispatchError::DeadlineExceeded`]) against the active backend. Any
/// success resets the count; other errors leave it alone. Once the count
/// reaches the threshold, the next call advances the cursor with a
/// compare-and-set and is sent to the following backend. Only the caller
/// whose compare-and-set wins resets the count and spawns the recovery
/// task, so a breach observed by many concurrent callers moves the cursor
/// once.
///
/// Errors are always returned to the caller; this policy never retries
/// within a call.
///
/// ```
/// use dispatch_resilience_core::{Dispatch, DispatchError};
/// use dispatch_resilience_failover::ThresholdFailover;
/// use std::time::Duration;
/// use tower::{service_fn, Service, ServiceExt};
///
/// # async fn example() -> Result<(), DispatchError> {
/// let provider = service_fn(|_req: Dispatch<()>| async { Ok::<_, DispatchError>(()) });
///
/// let mut push = ThresholdFailover::builder()
///     .name("push")
///     .threshold(3)
///     .recover_after(Duration::from_secs(60))
///     .build([provider.clone(), provider]);
///
/// push.ready().await?.call(Dispatch::new("order_shipped", ()).to("device-token")).await?;
/// # Ok(())
/// # }
/// ```
pub struct ThresholdFailover<S> {
    backends: Arc<[S]>,
    cursor: Arc<Cursor>,
    failures: Arc<AtomicUsize>,
    recovery_root: DispatchContext,
    config: Arc<ThresholdConfig>,
}

impl<S> ThresholdFailover<S> {
    /// Creates a threshold failover without recovery.
    ///
    /// # Panics
    ///
    /// Panics if `backends` is empty.
    pub fn new<I>(backends: I, threshold: usize) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        ThresholdConfigBuilder::new()
            .threshold(threshold)
            .build(backends)
    }

    pub(crate) fn from_config(backends: Vec<S>, config: ThresholdConfig) -> Self {
        crate::describe_metrics();
        Self {
            cursor: Arc::new(Cursor::new(backends.len())),
            backends: backends.into(),
            failures: Arc::new(AtomicUsize::new(0)),
            recovery_root: DispatchContext::new(),
            config: Arc::new(config),
        }
    }

    /// Index of the active backend.
    pub fn current_index(&self) -> usize {
        self.cursor.get()
    }

    /// Makes backend `index` the active one.
    ///
    /// Out-of-range indices select backend 0. The consecutive timeout count
    /// is not touched.
    pub fn set_current_index(&self, index: usize) {
        self.cursor.set(index);
    }

    /// Consecutive timeouts recorded against the active backend.
    pub fn consecutive_timeouts(&self) -> usize {
        self.failures.load(Ordering::Acquire)
    }

    /// The configured threshold.
    pub fn threshold(&self) -> usize {
        self.config.threshold
    }

    /// Returns `true` if a recovery procedure is configured.
    pub fn has_recovery(&self) -> bool {
        self.config.recovery.is_some()
    }

    /// Parent of every recovery task's context.
    ///
    /// Cancelling it stops all pending recovery tasks of this instance and
    /// every clone, including ones spawned later.
    pub fn recovery_context(&self) -> &DispatchContext {
        &self.recovery_root
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

impl ThresholdFailover<()> {
    /// Creates a builder.
    ///
    /// The backend type is chosen by [`ThresholdConfigBuilder::build`].
    pub fn builder() -> ThresholdConfigBuilder {
        ThresholdConfigBuilder::new()
    }
}

impl<S> Clone for ThresholdFailover<S> {
    fn clone(&self) -> Self {
        Self {
            backends: Arc::clone(&self.backends),
            cursor: Arc::clone(&self.cursor),
            failures: Arc::clone(&self.failures),
            recovery_root: self.recovery_root.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

/// Picks the backend for one call, failing over first if the threshold was
/// reached.
fn select_backend(
    cursor: &Arc<Cursor>,
    failures: &AtomicUsize,
    recovery_root: &DispatchContext,
    config: &ThresholdConfig,
) -> usize {
    let consecutive = failures.load(Ordering::Acquire);
    let current = cursor.get();
    if consecutive < config.threshold {
        return current;
    }

    let next = cursor.successor(current);
    if cursor.compare_and_set(current, next) {
        failures.store(0, Ordering::Release);

        #[cfg(feature = "tracing")]
        tracing::info!(
            failover = %config.name,
            from = current,
            to = next,
            consecutive,
            "timeout threshold reached, failing over"
        );

        #[cfg(feature = "metrics")]
        counter!("failover_advances_total", "failover" => config.name.clone()).increment(1);

        config.event_listeners.emit(&FailoverEvent::CursorAdvanced {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            from: current,
            to: next,
        });

        if let Some(recovery) = &config.recovery {
            tokio::spawn(recovery(recovery_root.child(), Arc::clone(cursor)));

            #[cfg(feature = "metrics")]
            counter!("failover_recoveries_spawned_total", "failover" => config.name.clone())
                .increment(1);

            config.event_listeners.emit(&FailoverEvent::RecoverySpawned {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                failed_over_to: next,
            });
        }
    }
    next
}

impl<S, T> Service<Dispatch<T>> for ThresholdFailover<S>
where
    S: Service<Dispatch<T>, Error = DispatchError> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    T: Send + 'static,
{
    type Response = S::Response;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    // Backend readiness is awaited inside the call.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Dispatch<T>) -> Self::Future {
        let backends = Arc::clone(&self.backends);
        let cursor = Arc::clone(&self.cursor);
        let failures = Arc::clone(&self.failures);
        let recovery_root = self.recovery_root.clone();
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let index = select_backend(&cursor, &failures, &recovery_root, &config);
            let result = call_backend(&backends[index], req).await;

            match &result {
                Ok(_) => {
                    failures.store(0, Ordering::Release);

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
                        attempts: 1,
                    });
                }
                Err(error) if error.is_timeout() => {
                    let consecutive = failures.fetch_add(1, Ordering::AcqRel) + 1;

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        failover = %config.name,
                        backend = index,
                        consecutive,
                        threshold = config.threshold,
                        "dispatch timed out"
                    );

                    #[cfg(feature = "metrics")]
                    counter!(
                        "failover_attempts_total",
                        "failover" => config.name.clone(),
                        "backend" => index.to_string(),
                        "result" => "timeout"
                    )
                    .increment(1);

                    config.event_listeners.emit(&FailoverEvent::TimeoutRecorded {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        backend: index,
                        consecutive,
                    });
                }
                Err(error) if error.is_cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        failover = %config.name,
                        backend = index,
                        error = %error,
                        "dispatch cancelled, timeout count unchanged"
                    );

                    config.event_listeners.emit(&FailoverEvent::BudgetExhausted {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        backend: index,
                    });
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        failover = %config.name,
                        backend = index,
                        error = %error,
                        "dispatch failed"
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
                }
            }

            result
        })
    }
}
