//! Example sharing governance state through Redis.
//!
//! Two orchestrators stand in for two service instances. Both use one
//! Redis store, so the daily limit is enforced across them.
//!
//! Start Redis first:
//!
//! ```text
//! docker run --rm -p 6379:6379 redis:7
//! ```
//!
//! Run with: `cargo run --example redis --features redis-storage`

use sms_guard::{
    DryRunDispatcher, RateLimitPolicy, RedisStore, RedisStoreConfig, SceneRegistry, ScenePolicy,
    SendOrchestrator,
};
use std::collections::HashMap;
use std::sync::Arc;

fn registry() -> Result<SceneRegistry, sms_guard::SmsError> {
    SceneRegistry::new([(
        "order-notify",
        ScenePolicy::notification("Acme", "SMS_200", ["order_no"])
            .with_rate_limit(RateLimitPolicy::unlimited().with_daily_limit(3)),
    )])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let config = RedisStoreConfig {
        key_prefix: format!("demo:{}:", uuid::Uuid::new_v4()),
    };
    let store = Arc::new(RedisStore::connect_with_config("redis://127.0.0.1/", config).await?);
    let dispatcher = Arc::new(DryRunDispatcher::new());

    let instances = [
        SendOrchestrator::builder(registry()?, dispatcher.clone())
            .with_store(store.clone())
            .build(),
        SendOrchestrator::builder(registry()?, dispatcher.clone())
            .with_store(store)
            .build(),
    ];

    println!("=== Shared Redis Store Example ===\n");
    println!("Daily limit: 3 per address, shared by both instances\n");

    let params = HashMap::from([("order_no".to_string(), "A-1001".to_string())]);
    for attempt in 0..5 {
        let instance = attempt % 2;
        match instances[instance]
            .send("order-notify", "+8613800138000", &params, "")
            .await
        {
            Ok(_) => println!("   instance {}: accepted", instance),
            Err(err) => println!("   instance {}: rejected: {}", instance, err),
        }
    }

    println!("\nDispatched: {}", dispatcher.sent());
    Ok(())
}
