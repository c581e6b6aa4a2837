//! The single error type shared by backends and decorators.
//!
//! Because every layer in a dispatch stack speaks the same
//! `Service<Dispatch<T>, Error = DispatchError>` contract, decorators can be
//! nested in any order without error conversion glue. The variants split
//! into three groups that decorators inspect to decide control flow:
//!
//! - **caller budget**: [`Cancelled`](DispatchError::Cancelled) and
//!   [`DeadlineExceeded`](DispatchError::DeadlineExceeded). Only produced by
//!   the caller's [`DispatchContext`](crate::DispatchContext); never retried,
//!   never swept past.
//! - **backend**: [`Timeout`](DispatchError::Timeout) and
//!   [`Backend`](DispatchError::Backend), raised by a concrete provider.
//! - **decorator verdicts**: terminal outcomes such as
//!   [`AllBackendsFailed`](DispatchError::AllBackendsFailed).

use std::sync::Arc;
use thiserror::Error;

/// Boxed error accepted by [`DispatchError::backend`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared form of a foreign error, cheap to clone.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Error returned by any dispatch-capable service.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The caller cancelled its context.
    #[error("dispatch cancelled by caller")]
    Cancelled,

    /// The caller's deadline passed before the dispatch completed.
    #[error("caller deadline exceeded")]
    DeadlineExceeded,

    /// The backend itself gave up waiting (gateway timeout, socket timeout).
    #[error("backend timed out")]
    Timeout,

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(#[source] SharedError),

    /// A round-robin sweep tried every backend and none succeeded.
    #[error("all {attempts} backends failed")]
    AllBackendsFailed {
        /// Number of backends attempted in the sweep.
        attempts: usize,
        /// Error returned by the last backend of the sweep.
        #[source]
        last: Option<Box<DispatchError>>,
    },

    /// The rate limiter rejected the dispatch.
    #[error("rate limited on key {key:?}")]
    RateLimited {
        /// Limit key that was exhausted.
        key: String,
    },

    /// The rate limiter could not be consulted.
    #[error("rate limiter unavailable: {0}")]
    Limiter(#[source] SharedError),

    /// The retry decorator ran out of attempts.
    #[error("dispatch failed after {attempts} attempts")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: usize,
        /// Error returned by the final attempt.
        #[source]
        last: Box<DispatchError>,
    },
}

impl DispatchError {
    /// Wraps an arbitrary backend error.
    pub fn backend(error: impl Into<BoxError>) -> Self {
        Self::Backend(Arc::from(error.into()))
    }

    /// Wraps an error raised by a rate limiter.
    pub fn limiter(error: impl Into<BoxError>) -> Self {
        Self::Limiter(Arc::from(error.into()))
    }

    /// Returns `true` when the caller's own budget is spent.
    ///
    /// Decorators stop immediately on these errors and return them verbatim.
    pub fn is_budget_exhausted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns `true` for deadline and timeout signals.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout | Self::DeadlineExceeded)
    }

    /// Returns `true` if the caller cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` for a failed round-robin sweep.
    pub fn is_all_backends_failed(&self) -> bool {
        matches!(self, Self::AllBackendsFailed { .. })
    }

    /// Returns `true` if a rate limiter rejected the dispatch.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
