//! Resilience middleware for notification dispatch.
//!
//! Every backend (an SMS gateway, an email provider, a push service) is a
//! [`tower::Service`] taking a [`Dispatch`] request and failing with a
//! [`DispatchError`]. The patterns in this crate wrap such backends and
//! expose the same capability, so they nest freely:
//!
//! - [`failover`]: round-robin or timeout-threshold failover across
//!   redundant backends, with optional recovery back to the primary
//! - [`retry`]: re-send a failed dispatch with a configurable interval
//! - [`ratelimit`]: reject dispatches once a key is over its limit
//!
//! Each pattern is behind a cargo feature of the same name; `full`
//! enables all of them.
//!
//! ```
//! # #[cfg(all(feature = "failover", feature = "retry"))]
//! # async fn example() -> Result<(), dispatch_resilience::DispatchError> {
//! use dispatch_resilience::failover::ThresholdFailover;
//! use dispatch_resilience::retry::RetryLayer;
//! use dispatch_resilience::{Dispatch, DispatchError};
//! use std::time::Duration;
//! use tower::{service_fn, Layer, Service, ServiceExt};
//!
//! let primary = service_fn(|_req: Dispatch<u32>| async { Ok::<_, DispatchError>(()) });
//! let secondary = primary.clone();
//!
//! let failover = ThresholdFailover::builder()
//!     .threshold(3)
//!     .recover_after(Duration::from_secs(300))
//!     .build(vec![primary, secondary]);
//!
//! let mut service = RetryLayer::builder()
//!     .max_attempts(2)
//!     .build()
//!     .layer(failover);
//!
//! service
//!     .ready()
//!     .await?
//!     .call(Dispatch::new("order_shipped", 1042).to("user@example.com"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub use dispatch_resilience_core as core;
pub use dispatch_resilience_core::{Dispatch, DispatchContext, DispatchError};

#[cfg(feature = "failover")]
pub use dispatch_resilience_failover as failover;

#[cfg(feature = "ratelimit")]
pub use dispatch_resilience_ratelimit as ratelimit;

#[cfg(feature = "retry")]
pub use dispatch_resilience_retry as retry;
