//! Settings files drive a working orchestrator.

use sms_guard::infrastructure::mocks::{MockClock, MockDispatcher};
use sms_guard::{ErrorKind, SceneKind, SendOrchestrator, SmsSettings};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

const SETTINGS: &str = r#"
provider:
  access_key_id: id
  access_key_secret: secret
guard:
  utc_offset_seconds: 28800
  max_store_entries: 10000
scenes:
  login-otp:
    sign_identity: Acme
    template_identity: SMS_100
    kind: VERIFICATION_CODE
    expiry_seconds: 300
    code_param_key: code
    param_whitelist: [code]
    rate_limit:
      per_address_daily_limit: 2
  order-notify:
    sign_identity: Acme
    template_identity: SMS_200
    param_whitelist: [order_no]
"#;

fn write_settings(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_orchestrator_from_yaml_file() {
    let file = write_settings(SETTINGS, ".yaml");
    let settings = SmsSettings::from_path(file.path()).unwrap();

    let dispatcher = MockDispatcher::new();
    let sms = SendOrchestrator::from_settings(&settings, Arc::new(dispatcher.clone())).unwrap();

    assert_eq!(sms.registry().scene_names(), vec!["login-otp", "order-notify"]);
    assert_eq!(
        sms.registry().resolve("login-otp").unwrap().kind,
        SceneKind::VerificationCode
    );

    sms.send_verification_code("login-otp", "+1555000111", "482913", "")
        .await
        .unwrap();

    let calls = dispatcher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].sign_identity, "Acme");
    assert_eq!(calls[0].template_identity, "SMS_100");
    assert_eq!(calls[0].params.get("code"), Some("482913"));
}

#[tokio::test]
async fn test_daily_limit_follows_configured_offset() {
    let file = write_settings(SETTINGS, ".yml");
    let settings = SmsSettings::from_path(file.path()).unwrap();

    // 2024-03-01T15:59:00Z is 23:59 at UTC+8
    let clock = MockClock::at_epoch(1_709_308_740);
    let sms = SendOrchestrator::builder(
        settings.scene_registry().unwrap(),
        Arc::new(MockDispatcher::new()),
    )
    .with_clock(Arc::new(clock.clone()))
    .with_utc_offset(settings.utc_offset().unwrap())
    .build();

    for _ in 0..2 {
        sms.send_verification_code("login-otp", "+1555000111", "1", "")
            .await
            .unwrap();
    }
    let err = sms
        .send_verification_code("login-otp", "+1555000111", "1", "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);

    // Local midnight
    clock.set_epoch(1_709_308_800);
    sms.send_verification_code("login-otp", "+1555000111", "1", "")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_json_file() {
    let json = r#"{
        "scenes": {
            "order-notify": {
                "sign_identity": "Acme",
                "template_identity": "SMS_200",
                "param_whitelist": ["order_no"]
            }
        }
    }"#;
    let file = write_settings(json, ".json");
    let settings = SmsSettings::from_path(file.path()).unwrap();

    let dispatcher = MockDispatcher::new();
    let sms = SendOrchestrator::from_settings(&settings, Arc::new(dispatcher.clone())).unwrap();

    let params = HashMap::from([
        ("order_no".to_string(), "A-1".to_string()),
        ("coupon".to_string(), "FREE".to_string()),
    ]);
    sms.send_notification("order-notify", "+1555000111", &params, "")
        .await
        .unwrap();

    let calls = dispatcher.calls();
    assert_eq!(calls[0].params.len(), 1);
    assert_eq!(calls[0].params.get("coupon"), None);
}

#[test]
fn test_invalid_scene_fails_at_load() {
    let yaml = r#"
scenes:
  broken-otp:
    sign_identity: Acme
    template_identity: SMS_100
    kind: VERIFICATION_CODE
    param_whitelist: [code]
"#;
    let file = write_settings(yaml, ".yaml");
    let err = SmsSettings::from_path(file.path())
        .and_then(|settings| settings.scene_registry())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}

#[test]
fn test_unknown_extension_is_rejected() {
    let file = write_settings(SETTINGS, ".toml");
    let err = SmsSettings::from_path(file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}
