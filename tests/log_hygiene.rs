//! Log output never carries parameter values or raw addresses.
//!
//! Each test installs a capturing subscriber for the current thread, drives
//! the orchestrator through a success or rejection path and inspects every
//! captured event.

use sms_guard::infrastructure::mocks::{MockCaptureLayer, MockClock, MockDispatcher};
use sms_guard::{
    DispatchReceipt, ErrorKind, ProviderFault, RateLimitPolicy, SceneRegistry, ScenePolicy,
    SendOrchestrator,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;

const ADDRESS: &str = "+1555000111";
const MASKED: &str = "+1*******11";
const CODE: &str = "482913";
const ORDER_NO: &str = "ORDER-7741-SECRET";

fn orchestrator(dispatcher: MockDispatcher, clock: MockClock) -> SendOrchestrator {
    let registry = SceneRegistry::new([
        (
            "login-otp",
            ScenePolicy::verification_code("Acme", "SMS_100", "code", 300)
                .with_rate_limit(RateLimitPolicy::unlimited().with_interval_seconds(60))
                .with_idempotency_window(120),
        ),
        (
            "order-notify",
            ScenePolicy::notification("Acme", "SMS_200", ["order_no"])
                .with_idempotency_window(120),
        ),
    ])
    .unwrap();

    SendOrchestrator::builder(registry, Arc::new(dispatcher))
        .with_clock(Arc::new(clock))
        .build()
}

fn assert_clean(capture: &MockCaptureLayer) {
    assert!(capture.count() > 0, "expected captured events");
    for event in capture.get_captured() {
        let rendered = event.rendered();
        assert!(!rendered.contains(CODE), "code leaked: {}", rendered);
        assert!(!rendered.contains(ORDER_NO), "param value leaked: {}", rendered);
        assert!(!rendered.contains(ADDRESS), "raw address leaked: {}", rendered);
    }
}

#[tokio::test]
async fn test_successful_send_logs_keys_and_masked_address() {
    let capture = MockCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let sms = orchestrator(MockDispatcher::new(), MockClock::at_epoch(1_709_251_200));
    sms.send_verification_code("login-otp", ADDRESS, CODE, "10.0.0.1")
        .await
        .unwrap();

    assert_clean(&capture);

    let sent = capture.with_message("message sent");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].field("address"), Some(MASKED));
    assert_eq!(sent[0].field("param_keys"), Some("[code]"));
    assert_eq!(sent[0].field("scene"), Some("login-otp"));
    assert!(sent[0].field("request_id").is_some());
}

#[tokio::test]
async fn test_rejections_stay_clean() {
    let capture = MockCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let clock = MockClock::at_epoch(1_709_251_200);
    let sms = orchestrator(MockDispatcher::new(), clock.clone());

    sms.send_verification_code("login-otp", ADDRESS, CODE, "10.0.0.1")
        .await
        .unwrap();

    let err = sms
        .send_verification_code("login-otp", ADDRESS, CODE, "10.0.0.1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);

    clock.advance(Duration::from_secs(61));
    let err = sms
        .send_verification_code("login-otp", ADDRESS, CODE, "10.0.0.1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateRequest);

    assert_clean(&capture);

    let limited = capture.with_message("send rejected by rate limit");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].field("address"), Some(MASKED));
    assert_eq!(limited[0].level, tracing::Level::WARN);

    let duplicate = capture.with_message("duplicate request suppressed");
    assert_eq!(duplicate.len(), 1);
    assert_eq!(duplicate[0].field("address"), Some(MASKED));
}

#[tokio::test]
async fn test_provider_failure_stays_clean() {
    let capture = MockCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let dispatcher = MockDispatcher::new();
    dispatcher.push_response(Ok(DispatchReceipt::rejected(
        "isv.BUSINESS_LIMIT_CONTROL",
        "too many messages",
    )));
    dispatcher.push_response(Err(ProviderFault::transport("connection reset")));

    let sms = orchestrator(dispatcher, MockClock::at_epoch(1_709_251_200));
    let params = HashMap::from([("order_no".to_string(), ORDER_NO.to_string())]);

    let err = sms
        .send_notification("order-notify", ADDRESS, &params, "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderThrottled);

    let err = sms
        .send_notification("order-notify", ADDRESS, &params, "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderError);

    assert_clean(&capture);

    let failed = capture.with_message("provider dispatch failed");
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].field("error_code"), Some("PROVIDER_THROTTLED"));
    assert_eq!(failed[1].field("error_code"), Some("PROVIDER_ERROR"));
}

#[tokio::test]
async fn test_errors_do_not_render_values() {
    let sms = orchestrator(MockDispatcher::new(), MockClock::at_epoch(1_709_251_200));
    sms.send_verification_code("login-otp", ADDRESS, CODE, "")
        .await
        .unwrap();

    let err = sms
        .send_verification_code("login-otp", ADDRESS, CODE, "")
        .await
        .unwrap_err();
    let rendered = format!("{} {:?}", err, err);

    assert!(!rendered.contains(CODE));
    assert!(!rendered.contains(ADDRESS));
    assert_eq!(err.masked_address(), Some(MASKED));
    assert_eq!(err.scene(), Some("login-otp"));
}
