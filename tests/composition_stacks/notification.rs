//! Typical notification stacks.

use super::test_utils::ScriptedGateway;
use dispatch_resilience::failover::{RoundRobinFailover, ThresholdFailover};
use dispatch_resilience::ratelimit::RateLimitLayer;
use dispatch_resilience::retry::RetryLayer;
use dispatch_resilience::{Dispatch, DispatchContext, DispatchError};
use std::time::Duration;
use tower::{Layer, Service, ServiceBuilder, ServiceExt};

fn sms(code: u32) -> Dispatch<String> {
    Dispatch::new("login_code", code.to_string()).to("+15550100")
}

/// Retry around a round-robin failover: every retry is a fresh sweep.
#[tokio::test(start_paused = true)]
async fn retry_over_round_robin() {
    let primary = ScriptedGateway::failing(2);
    let secondary = ScriptedGateway::failing(1);
    let failover = RoundRobinFailover::builder()
        .name("sms")
        .build(vec![primary.clone(), secondary.clone()]);

    let mut service = ServiceBuilder::new()
        .layer(
            RetryLayer::builder()
                .max_attempts(3)
                .fixed_interval(Duration::from_millis(100))
                .build(),
        )
        .service(failover.clone());

    service.ready().await.unwrap().call(sms(1)).await.unwrap();

    // Sweep 1: primary fails, secondary fails. Sweep 2 starts at the
    // secondary, which now delivers.
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 2);
    assert_eq!(failover.current_index(), 1);
}

/// A rate-limited gateway is just another failing backend to failover.
#[tokio::test(start_paused = true)]
async fn failover_over_rate_limited_gateways() {
    let primary = ScriptedGateway::healthy();
    let secondary = ScriptedGateway::healthy();
    let limit = RateLimitLayer::builder()
        .key("sms:primary")
        .fixed_window(1, Duration::from_secs(60))
        .build();

    let mut failover = RoundRobinFailover::new(vec![
        tower::util::Either::Left(limit.layer(primary.clone())),
        tower::util::Either::Right(secondary.clone()),
    ]);

    failover.ready().await.unwrap().call(sms(1)).await.unwrap();
    failover.ready().await.unwrap().call(sms(2)).await.unwrap();

    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
    assert_eq!(failover.current_index(), 1);
}

/// A rate limit in front of the whole stack rejects before any backend runs.
#[tokio::test(start_paused = true)]
async fn rate_limit_in_front_of_threshold_failover() {
    let primary = ScriptedGateway::healthy();
    let secondary = ScriptedGateway::healthy();
    let failover = ThresholdFailover::new(vec![primary.clone(), secondary.clone()], 3);

    let mut service = ServiceBuilder::new()
        .layer(RateLimitLayer::builder().key("tenant-42").fixed_window(2, Duration::from_secs(1)).build())
        .service(failover);

    service.ready().await.unwrap().call(sms(1)).await.unwrap();
    service.ready().await.unwrap().call(sms(2)).await.unwrap();
    let err = service.ready().await.unwrap().call(sms(3)).await.unwrap_err();

    assert!(matches!(err, DispatchError::RateLimited { ref key } if key == "tenant-42"));
    assert_eq!(primary.calls(), 2);
    assert_eq!(secondary.calls(), 0);
}

/// The caller's deadline bounds the whole stack, including retry waits.
#[tokio::test(start_paused = true)]
async fn deadline_bounds_retry_and_failover() {
    let primary = ScriptedGateway::failing(10);
    let secondary = ScriptedGateway::failing(10);
    let failover = RoundRobinFailover::new(vec![primary.clone(), secondary.clone()]);

    let mut service = RetryLayer::builder()
        .max_attempts(10)
        .fixed_interval(Duration::from_secs(1))
        .build()
        .layer(failover);

    let req = sms(1).with_context(DispatchContext::new().with_timeout(Duration::from_millis(2500)));
    let err = service.ready().await.unwrap().call(req).await.unwrap_err();

    assert!(matches!(err, DispatchError::DeadlineExceeded));
    // Sweeps at t=0, 1s, and 2s; the wait for t=3s is cut short.
    assert_eq!(primary.calls() + secondary.calls(), 6);
}

/// Exhausted retries carry the failover's terminal error.
#[tokio::test(start_paused = true)]
async fn exhausted_retries_wrap_all_backends_failed() {
    let failover = RoundRobinFailover::new(vec![
        ScriptedGateway::failing(100),
        ScriptedGateway::failing(100),
    ]);
    let mut service = RetryLayer::builder()
        .max_attempts(2)
        .fixed_interval(Duration::from_millis(10))
        .build()
        .layer(failover);

    let err = service.ready().await.unwrap().call(sms(1)).await.unwrap_err();
    match err {
        DispatchError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(last.is_all_backends_failed());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
