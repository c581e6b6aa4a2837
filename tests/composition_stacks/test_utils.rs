//! Shared helpers for composition tests.

use dispatch_resilience_core::{Dispatch, DispatchError};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// Answers from a script, then delivers forever.
///
/// Accepts text payloads only, so `ready()` resolves without annotations.
#[derive(Clone)]
pub struct ScriptedGateway {
    script: Arc<Mutex<VecDeque<DispatchError>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    pub fn new(failures: impl IntoIterator<Item = DispatchError>) -> Self {
        Self {
            script: Arc::new(Mutex::new(failures.into_iter().collect())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn healthy() -> Self {
        Self::new([])
    }

    pub fn failing(n: usize) -> Self {
        Self::new((0..n).map(|_| DispatchError::backend("gateway returned 503")))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Service<Dispatch<String>> for ScriptedGateway {
    type Response = ();
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<(), DispatchError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Dispatch<String>) -> Self::Future {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }
}
