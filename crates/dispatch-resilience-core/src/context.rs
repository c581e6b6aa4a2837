//! Caller-side cancellation and deadline budget.

use crate::DispatchError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The caller's budget for one dispatch: a cancellation signal plus an
/// optional deadline.
///
/// The context travels inside every [`Dispatch`](crate::Dispatch) request,
/// so each layer of a stack observes the same budget. Cloning is cheap and
/// clones share the same cancellation state.
///
/// ```
/// use dispatch_resilience_core::DispatchContext;
/// use std::time::Duration;
///
/// let ctx = DispatchContext::new().with_timeout(Duration::from_secs(2));
/// assert!(ctx.err().is_none());
///
/// ctx.cancel();
/// assert!(ctx.err().unwrap().is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl DispatchContext {
    /// Unbounded context: never expires, cancelled only explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline, keeping the earlier one if already set.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Sets the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a context that is cancelled with this one but can also be
    /// cancelled on its own. The deadline is inherited.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called here or on a parent.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` for unbounded contexts.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Why the context is done, or `None` if the budget is still available.
    ///
    /// Cancellation takes precedence over an elapsed deadline.
    pub fn err(&self) -> Option<DispatchError> {
        if self.token.is_cancelled() {
            return Some(DispatchError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DispatchError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> DispatchError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => DispatchError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => DispatchError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                DispatchError::Cancelled
            }
        }
    }

    /// Runs `fut` within this budget.
    ///
    /// Returns the context error without polling `fut` if the budget is
    /// already spent, and drops `fut` as soon as the budget runs out while it
    /// is in flight.
    pub async fn run<F, R>(&self, fut: F) -> Result<R, DispatchError>
    where
        F: Future<Output = Result<R, DispatchError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            result = fut => result,
            err = self.done() => Err(err),
        }
    }
}
