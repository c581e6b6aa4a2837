//! Failover across redundant dispatch backends.
//!
//! Two policies are provided, both lock-free and both implementing the same
//! `tower::Service<Dispatch<T>>` capability as the backends they wrap:
//!
//! - [`RoundRobinFailover`]: on any failure that leaves the caller's
//!   budget intact, advance the shared cursor and try the next backend,
//!   for at most one full sweep per call.
//! - [`ThresholdFailover`]: stay on the active backend until it returns a
//!   configured number of consecutive timeouts, then move on for later
//!   calls and optionally spawn a [recovery](recovery) task that moves the
//!   cursor back after a cool-down.
//!
//! The only shared mutable state is the [`Cursor`] (and, for the threshold
//! policy, the consecutive timeout count). Both are plain atomics.
//!
//! # Example
//!
//! ```
//! use dispatch_resilience_core::{Dispatch, DispatchContext, DispatchError};
//! use dispatch_resilience_failover::RoundRobinFailover;
//! use std::time::Duration;
//! use tower::{service_fn, Service, ServiceExt};
//!
//! # async fn example() -> Result<(), DispatchError> {
//! let flaky = service_fn(|_req: Dispatch<()>| async {
//!     Err::<(), _>(DispatchError::backend("gateway returned 503"))
//! });
//! let healthy = service_fn(|_req: Dispatch<()>| async { Ok::<(), DispatchError>(()) });
//!
//! // Both backends must share a type; box them or use an enum for mixed providers.
//! let mut failover = RoundRobinFailover::builder()
//!     .name("sms")
//!     .on_attempt_failed(|backend, error| eprintln!("backend {backend} failed: {error}"))
//!     .build(vec![
//!         tower::util::Either::Left(flaky),
//!         tower::util::Either::Right(healthy),
//!     ]);
//!
//! let req = Dispatch::new("login_code", ())
//!     .to("+15550100")
//!     .with_context(DispatchContext::new().with_timeout(Duration::from_secs(5)));
//!
//! failover.ready().await?.call(req).await?;
//! assert_eq!(failover.current_index(), 1);
//! # Ok(())
//! # }
//! ```

mod config;
mod cursor;
mod events;
pub mod recovery;
mod round_robin;
mod threshold;

pub use config::{RoundRobinConfig, RoundRobinConfigBuilder, ThresholdConfig, ThresholdConfigBuilder};
pub use cursor::Cursor;
pub use events::FailoverEvent;
pub use recovery::RecoveryFn;
pub use round_robin::RoundRobinFailover;
pub use threshold::ThresholdFailover;

use dispatch_resilience_core::{Dispatch, DispatchError};
use tower::{Service, ServiceExt};

#[cfg(feature = "metrics")]
use metrics::describe_counter;

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "failover_attempts_total",
            "Backend attempts made by failover services, by backend and result"
        );
        describe_counter!(
            "failover_advances_total",
            "Times a failover service moved its cursor to another backend"
        );
        describe_counter!(
            "failover_exhausted_total",
            "Round-robin sweeps that failed on every backend"
        );
        describe_counter!(
            "failover_recoveries_spawned_total",
            "Recovery tasks spawned after a threshold failover"
        );
    });
}

/// Sends `req` to one backend within the caller's budget.
///
/// The backend is cloned so concurrent calls never contend on it. If the
/// caller's context is cancelled or expires first, the backend future is
/// dropped and the context error returned.
pub(crate) async fn call_backend<S, T>(backend: &S, req: Dispatch<T>) -> Result<S::Response, DispatchError>
where
    S: Service<Dispatch<T>, Error = DispatchError> + Clone,
{
    let mut backend = backend.clone();
    let ctx = req.ctx.clone();
    ctx.run(async move { backend.ready().await?.call(req).await })
        .await
}
