//! Property tests for threshold failover.
//!
//! Invariants tested:
//! - The backend only changes once `threshold` consecutive timeouts were seen
//! - The consecutive count never exceeds the threshold while calls are serial

use dispatch_resilience_core::{Dispatch, DispatchError};
use dispatch_resilience_failover::ThresholdFailover;
use futures::future::BoxFuture;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::runtime::Runtime;
use tower::{Service, ServiceExt};

/// Times out or delivers according to a shared script of outcomes.
#[derive(Clone)]
struct Backend {
    script: Arc<Mutex<Vec<bool>>>,
}

impl Service<Dispatch<()>> for Backend {
    type Response = ();
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<(), DispatchError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Dispatch<()>) -> Self::Future {
        let timed_out = self.script.lock().unwrap().pop().unwrap_or(false);
        Box::pin(async move {
            if timed_out {
                Err(DispatchError::Timeout)
            } else {
                Ok(())
            }
        })
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: index moves exactly when the previous calls hit the threshold
    #[test]
    fn index_moves_only_at_threshold(
        threshold in 1usize..5,
        len in 1usize..5,
        outcomes in prop::collection::vec(any::<bool>(), 0..40),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let script: Vec<bool> = outcomes.iter().rev().copied().collect();
            let backend = Backend { script: Arc::new(Mutex::new(script)) };
            let mut failover = ThresholdFailover::new(vec![backend; len], threshold);

            let mut consecutive = 0;
            let mut index = 0;
            for timed_out in &outcomes {
                if consecutive >= threshold {
                    index = (index + 1) % len;
                    consecutive = 0;
                }
                let _ = failover.ready().await.unwrap().call(Dispatch::new("t", ())).await;
                consecutive = if *timed_out { consecutive + 1 } else { 0 };

                prop_assert_eq!(failover.current_index(), index);
                prop_assert_eq!(failover.consecutive_timeouts(), consecutive);
                prop_assert!(consecutive <= threshold);
            }
            Ok(())
        })?;
    }
}
