use dispatch_resilience_core::BoxError;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Decides whether a dispatch under `key` must be rejected.
///
/// Implementations are usually backed by shared storage (Redis, a
/// database) so that limits hold across processes. [`FixedWindowLimiter`]
/// is an in-process implementation.
pub trait Limiter: Send + Sync {
    /// Returns `Ok(true)` if the dispatch should be rejected.
    fn limit<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, BoxError>>;
}

impl<L: Limiter + ?Sized> Limiter for Arc<L> {
    fn limit<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, BoxError>> {
        (**self).limit(key)
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    used: usize,
}

/// Allows `limit` dispatches per key in each fixed window.
///
/// Windows start at the first dispatch for a key and are tracked per key.
///
/// ```
/// use dispatch_resilience_ratelimit::{FixedWindowLimiter, Limiter};
/// use std::time::Duration;
///
/// # async fn example() {
/// let limiter = FixedWindowLimiter::new(2, Duration::from_secs(60));
/// assert!(!limiter.limit("sms").await.unwrap());
/// assert!(!limiter.limit("sms").await.unwrap());
/// assert!(limiter.limit("sms").await.unwrap());
/// assert!(!limiter.limit("email").await.unwrap());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FixedWindowLimiter {
    limit: usize,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl FixedWindowLimiter {
    /// Creates a limiter allowing `limit` dispatches per `window`.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Dispatches still allowed for `key` in its current window.
    pub fn remaining(&self, key: &str) -> usize {
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        match windows.get(key) {
            Some(w) if w.started.elapsed() < self.window => self.limit.saturating_sub(w.used),
            _ => self.limit,
        }
    }

    fn try_acquire(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            used: 0,
        });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.used = 0;
        }

        if window.used < self.limit {
            window.used += 1;
            true
        } else {
            false
        }
    }
}

impl Limiter for FixedWindowLimiter {
    fn limit<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, BoxError>> {
        let limited = !self.try_acquire(key);
        Box::pin(async move { Ok(limited) })
    }
}
