//! Retry metrics regression tests

use super::helpers::*;
use dispatch_resilience_core::{Dispatch, DispatchError};
use dispatch_resilience_retry::RetryLayer;
use serial_test::serial;
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

#[tokio::test(start_paused = true)]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter_clone = counter.clone();
    let service = tower::service_fn(move |_: Dispatch<()>| {
        let count = counter_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        async move {
            if count < 2 {
                Err(DispatchError::backend("failure"))
            } else {
                Ok("queued")
            }
        }
    });

    let mut service = RetryLayer::builder()
        .name("test_retry")
        .max_attempts(3)
        .fixed_interval(Duration::from_millis(10))
        .build()
        .layer(service);

    let _ = service.ready().await.unwrap().call(Dispatch::new("t", ())).await;

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "test_retry");
    assert_metric_has_label("retry_calls_total", "result", "success");
}

#[tokio::test(start_paused = true)]
#[serial]
async fn retry_exhausted_metrics() {
    init_recorder();

    let service = tower::service_fn(|_: Dispatch<()>| async {
        Err::<(), _>(DispatchError::backend("failure"))
    });
    let mut service = RetryLayer::builder()
        .name("exhausted_retry")
        .max_attempts(2)
        .fixed_interval(Duration::from_millis(10))
        .build()
        .layer(service);

    let _ = service.ready().await.unwrap().call(Dispatch::new("t", ())).await;

    assert_metric_has_label("retry_calls_total", "result", "exhausted");
}
