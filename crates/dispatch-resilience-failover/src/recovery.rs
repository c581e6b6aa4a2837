//! Background tasks that undo a threshold failover.
//!
//! When [`ThresholdFailover`](crate::ThresholdFailover) moves its cursor it
//! may spawn a recovery task. The task gets its own [`DispatchContext`]
//! (not the triggering request's) and the shared [`Cursor`], and decides on
//! its own whether and when to move the cursor back. Several recovery
//! tasks may be running at once and race on the cursor; each one only
//! performs atomic cursor operations.

use crate::Cursor;
use dispatch_resilience_core::DispatchContext;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A recovery procedure.
pub type RecoveryFn =
    Arc<dyn Fn(DispatchContext, Arc<Cursor>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Boxes a closure into a [`RecoveryFn`].
pub fn recovery_fn<F, Fut>(f: F) -> RecoveryFn
where
    F: Fn(DispatchContext, Arc<Cursor>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |ctx, cursor| Box::pin(f(ctx, cursor)))
}

/// Waits `cooldown`, then points the cursor back at backend 0.
///
/// Exits without touching the cursor if the context is cancelled first.
pub fn reset_after(cooldown: Duration) -> RecoveryFn {
    reset_to_after(0, cooldown)
}

/// Waits `cooldown`, then points the cursor at `index` (0 if out of range).
///
/// Exits without touching the cursor if the context is cancelled first.
pub fn reset_to_after(index: usize, cooldown: Duration) -> RecoveryFn {
    recovery_fn(move |ctx: DispatchContext, cursor: Arc<Cursor>| async move {
        tokio::select! {
            biased;
            _ = ctx.done() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(index, "recovery cancelled before cool-down elapsed");
            }
            _ = tokio::time::sleep(cooldown) => {
                cursor.set(index);
                #[cfg(feature = "tracing")]
                tracing::info!(index = cursor.get(), "recovery restored preferred backend");
            }
        }
    })
}
