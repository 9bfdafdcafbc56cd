//! Basic example demonstrating guarded sends.
//!
//! Loads two scenes from inline YAML and sends through the dry-run
//! dispatcher, so no provider account is needed.
//!
//! Run with: `cargo run --example basic`

use sms_guard::{DryRunDispatcher, ErrorKind, SendOrchestrator, SmsSettings};
use std::collections::HashMap;
use std::sync::Arc;

const SETTINGS: &str = r#"
guard:
  utc_offset_seconds: 28800
scenes:
  login-otp:
    sign_identity: Acme
    template_identity: SMS_100
    type: VERIFICATION_CODE
    expiry_seconds: 300
    code_param_key: code
    param_whitelist: [code]
    rate_limit:
      per_address_interval_seconds: 60
      per_address_daily_limit: 5
  order-notify:
    sign_identity: Acme
    template_identity: SMS_200
    param_whitelist: [order_no]
    idempotency_window_seconds: 300
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let settings = SmsSettings::from_yaml_str(SETTINGS)?;
    let sms = SendOrchestrator::from_settings(&settings, Arc::new(DryRunDispatcher::new()))?;

    println!("=== Guarded Send Example ===\n");

    println!("Sending a verification code:");
    let receipt = sms
        .send_verification_code("login-otp", "+8613800138000", "482913", "203.0.113.7")
        .await?;
    println!("   accepted, request id {}\n", receipt.request_id);

    println!("Sending again inside the 60s interval:");
    match sms
        .send_verification_code("login-otp", "+8613800138000", "771204", "203.0.113.7")
        .await
    {
        Err(err) if err.kind() == ErrorKind::RateLimited => println!("   rejected: {}\n", err),
        other => println!("   unexpected outcome: {:?}\n", other),
    }

    println!("Sending a notification twice (unlisted params are dropped):");
    let params = HashMap::from([
        ("order_no".to_string(), "A-1001".to_string()),
        ("internal_note".to_string(), "never sent".to_string()),
    ]);
    for attempt in 1..=2 {
        match sms
            .send_notification("order-notify", "+8613800138000", &params, "")
            .await
        {
            Ok(receipt) => println!("   attempt {}: accepted ({})", attempt, receipt.request_id),
            Err(err) => println!("   attempt {}: rejected: {}", attempt, err),
        }
    }

    let snapshot = sms.metrics().snapshot();
    println!("\n=== Metrics ===");
    println!("   dispatched:   {}", snapshot.sends_dispatched);
    println!("   rate limited: {}", snapshot.rejected_rate_limited);
    println!("   duplicates:   {}", snapshot.rejected_duplicate);
    println!("   invalid:      {}", snapshot.rejected_invalid);

    Ok(())
}
