//! Many callers sharing one failover instance.

use super::{providers, request, Behavior};
use dispatch_resilience_failover::{Cursor, FailoverEvent, RoundRobinFailover, ThresholdFailover};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;
use tower::{Service, ServiceExt};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_advances_are_never_lost() {
    let cursor = Arc::new(Cursor::new(7));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let cursor = Arc::clone(&cursor);
        handles.push(tokio::spawn(async move {
            for _ in 0..1000 {
                cursor.advance();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(cursor.get(), 8000 % 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn round_robin_under_contention() {
    let backends = providers(&[Behavior::Reject, Behavior::Deliver]);
    let failover = RoundRobinFailover::new(backends.clone());
    let barrier = Arc::new(Barrier::new(32));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let mut failover = failover.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            failover.ready().await.unwrap().call(request()).await
        }));
    }

    for handle in handles {
        // Every sweep reaches the healthy backend within two attempts.
        assert_eq!(handle.await.unwrap().unwrap(), "secondary");
    }
    assert!(failover.current_index() < 2);
    assert_eq!(backends[1].calls(), 32);
    assert!(backends[0].calls() <= 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn threshold_breach_seen_by_many_callers() {
    let advances = Arc::new(AtomicUsize::new(0));
    let spawned = Arc::new(AtomicUsize::new(0));
    let recoveries = Arc::new(AtomicUsize::new(0));
    let (a, s, r) = (Arc::clone(&advances), Arc::clone(&spawned), Arc::clone(&recoveries));

    let backends = providers(&[Behavior::TimeOut, Behavior::Deliver]);
    let mut failover = ThresholdFailover::builder()
        .threshold(1)
        .recovery(move |_ctx, _cursor| {
            r.fetch_add(1, Ordering::SeqCst);
            async {}
        })
        .on_event(move |event| match event {
            FailoverEvent::CursorAdvanced { .. } => {
                a.fetch_add(1, Ordering::SeqCst);
            }
            FailoverEvent::RecoverySpawned { .. } => {
                s.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        })
        .build(backends.clone());

    // Reach the threshold on the primary.
    failover.ready().await.unwrap().call(request()).await.unwrap_err();
    backends[0].set(Behavior::Deliver);

    let barrier = Arc::new(Barrier::new(16));
    let mut handles = Vec::new();
    for _ in 0..16 {
        let mut failover = failover.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            failover.ready().await.unwrap().call(request()).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    // Only compare-and-set winners advance and spawn recovery.
    let advances = advances.load(Ordering::SeqCst);
    assert!(advances >= 1);
    assert_eq!(spawned.load(Ordering::SeqCst), advances);
    assert_eq!(recoveries.load(Ordering::SeqCst), advances);
    assert!(failover.current_index() < 2);
    assert_eq!(failover.consecutive_timeouts(), 0);
}
