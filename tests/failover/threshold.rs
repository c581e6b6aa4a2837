//! Threshold failover behavior.

use super::{providers, request, Behavior, Provider};
use dispatch_resilience_core::{DispatchContext, DispatchError};
use dispatch_resilience_failover::ThresholdFailover;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::{Service, ServiceExt};

async fn send(failover: &mut ThresholdFailover<Provider>) -> Result<&'static str, DispatchError> {
    failover.ready().await?.call(request()).await
}

#[tokio::test]
async fn timeouts_below_threshold_keep_the_backend() {
    let backends = providers(&[Behavior::TimeOut, Behavior::Deliver]);
    let mut failover = ThresholdFailover::new(backends.clone(), 3);

    for expected in 1..=3 {
        let err = send(&mut failover).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout));
        assert_eq!(failover.consecutive_timeouts(), expected);
        assert_eq!(failover.current_index(), 0);
    }
    assert_eq!(backends[0].calls(), 3);
    assert_eq!(backends[1].calls(), 0);
}

#[tokio::test]
async fn call_after_threshold_goes_to_next_backend() {
    let backends = providers(&[Behavior::TimeOut, Behavior::Deliver]);
    let mut failover = ThresholdFailover::new(backends.clone(), 2);

    send(&mut failover).await.unwrap_err();
    send(&mut failover).await.unwrap_err();

    let sent_by = send(&mut failover).await.unwrap();
    assert_eq!(sent_by, "secondary");
    assert_eq!(failover.current_index(), 1);
    assert_eq!(failover.consecutive_timeouts(), 0);
    assert_eq!(backends[0].calls(), 2);
}

#[tokio::test]
async fn failover_call_error_is_returned() {
    let backends = providers(&[Behavior::TimeOut, Behavior::Reject]);
    let mut failover = ThresholdFailover::new(backends.clone(), 1);

    send(&mut failover).await.unwrap_err();
    let err = send(&mut failover).await.unwrap_err();
    assert!(matches!(err, DispatchError::Backend(_)));
    assert_eq!(failover.current_index(), 1);
    assert_eq!(backends[1].calls(), 1);
}

#[tokio::test]
async fn success_resets_the_count() {
    let backends = providers(&[Behavior::TimeOut, Behavior::Deliver]);
    let mut failover = ThresholdFailover::new(backends.clone(), 3);

    send(&mut failover).await.unwrap_err();
    send(&mut failover).await.unwrap_err();
    assert_eq!(failover.consecutive_timeouts(), 2);

    backends[0].set(Behavior::Deliver);
    send(&mut failover).await.unwrap();
    assert_eq!(failover.consecutive_timeouts(), 0);

    backends[0].set(Behavior::TimeOut);
    send(&mut failover).await.unwrap_err();
    send(&mut failover).await.unwrap_err();
    assert_eq!(failover.current_index(), 0);
}

#[tokio::test]
async fn non_timeout_errors_do_not_count() {
    let backends = providers(&[Behavior::Reject, Behavior::Deliver]);
    let mut failover = ThresholdFailover::new(backends.clone(), 1);

    for _ in 0..5 {
        let err = send(&mut failover).await.unwrap_err();
        assert!(matches!(err, DispatchError::Backend(_)));
    }
    assert_eq!(failover.consecutive_timeouts(), 0);
    assert_eq!(failover.current_index(), 0);
}

#[tokio::test(start_paused = true)]
async fn caller_deadline_counts_as_timeout() {
    let hanging = Provider::new("primary", Behavior::Hang);
    let backup = Provider::new("secondary", Behavior::Deliver);
    let mut failover = ThresholdFailover::new(vec![hanging, backup], 1);

    let req = request().with_context(DispatchContext::new().with_timeout(Duration::from_millis(100)));
    let err = failover.ready().await.unwrap().call(req).await.unwrap_err();
    assert!(matches!(err, DispatchError::DeadlineExceeded));
    assert_eq!(failover.consecutive_timeouts(), 1);

    assert_eq!(send(&mut failover).await.unwrap(), "secondary");
}

#[tokio::test]
async fn cancellation_does_not_count() {
    let backends = providers(&[Behavior::Deliver, Behavior::Deliver]);
    let mut failover = ThresholdFailover::new(backends, 1);

    let ctx = DispatchContext::new();
    ctx.cancel();
    let err = failover
        .ready()
        .await
        .unwrap()
        .call(request().with_context(ctx))
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(failover.consecutive_timeouts(), 0);
}

#[tokio::test]
async fn last_backend_wraps_to_first() {
    let backends = providers(&[Behavior::Deliver, Behavior::TimeOut, Behavior::TimeOut]);
    let mut failover = ThresholdFailover::new(backends.clone(), 1);
    failover.set_current_index(1);

    send(&mut failover).await.unwrap_err();
    send(&mut failover).await.unwrap_err();
    assert_eq!(failover.current_index(), 2);

    assert_eq!(send(&mut failover).await.unwrap(), "primary");
    assert_eq!(failover.current_index(), 0);
}

#[tokio::test]
async fn zero_threshold_advances_every_call() {
    let backends = providers(&[Behavior::Deliver, Behavior::Deliver, Behavior::Deliver]);
    let mut failover = ThresholdFailover::new(backends.clone(), 0);

    let mut served = Vec::new();
    for _ in 0..4 {
        served.push(send(&mut failover).await.unwrap());
    }
    assert_eq!(served, vec!["secondary", "tertiary", "primary", "secondary"]);
}

#[tokio::test]
async fn set_index_normalizes_and_keeps_count() {
    let backends = providers(&[Behavior::TimeOut, Behavior::Deliver]);
    let mut failover = ThresholdFailover::new(backends, 5);

    send(&mut failover).await.unwrap_err();
    failover.set_current_index(7);
    assert_eq!(failover.current_index(), 0);
    assert_eq!(failover.consecutive_timeouts(), 1);

    failover.set_current_index(1);
    assert_eq!(send(&mut failover).await.unwrap(), "secondary");
}

#[tokio::test]
async fn typed_callbacks_fire() {
    let timeouts = Arc::new(Mutex::new(Vec::new()));
    let failovers = Arc::new(Mutex::new(Vec::new()));
    let (t, f) = (Arc::clone(&timeouts), Arc::clone(&failovers));

    let mut failover = ThresholdFailover::builder()
        .name("push")
        .threshold(2)
        .on_timeout(move |backend, consecutive| t.lock().unwrap().push((backend, consecutive)))
        .on_failover(move |from, to| f.lock().unwrap().push((from, to)))
        .build(providers(&[Behavior::TimeOut, Behavior::Deliver]));

    send(&mut failover).await.unwrap_err();
    send(&mut failover).await.unwrap_err();
    send(&mut failover).await.unwrap();

    assert_eq!(*timeouts.lock().unwrap(), vec![(0, 1), (0, 2)]);
    assert_eq!(*failovers.lock().unwrap(), vec![(0, 1)]);
}
