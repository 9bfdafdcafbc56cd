//! # sms-guard
//!
//! Scene-bound governance in front of an SMS provider call.
//!
//! Business code never names a sign or template directly. It sends on behalf of
//! a *scene*, and the guard applies the scene's policy before the provider is
//! contacted:
//!
//! 1. resolve the scene's sign, template and parameter whitelist
//! 2. drop every parameter the scene does not whitelist
//! 3. enforce per-address interval, per-address daily and per-source minute limits
//! 4. suppress identical requests within the scene's idempotency window
//!
//! Any violation aborts before the provider call. Parameter values never appear
//! in logs, store keys or error messages, and addresses are masked wherever
//! they are logged.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sms_guard::{DryRunDispatcher, SendOrchestrator, SmsSettings};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), sms_guard::SmsError> {
//! let settings = SmsSettings::from_path("sms.yaml")?;
//! let orchestrator = SendOrchestrator::from_settings(&settings, Arc::new(DryRunDispatcher::new()))?;
//!
//! // Verification codes are injected under the scene's code parameter.
//! orchestrator
//!     .send_verification_code("login-otp", "+1555000111", "482913", "203.0.113.7")
//!     .await?;
//!
//! // Notifications forward whitelisted parameters only.
//! let params = HashMap::from([("order_no".to_string(), "A-1001".to_string())]);
//! orchestrator
//!     .send_notification("order-notify", "+1555000111", &params, "203.0.113.7")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Governance State
//!
//! Counters and idempotency entries live behind the [`GovernanceStore`] port:
//! - [`MemoryStore`]: sharded in-process map, optionally capped
//! - `RedisStore` (feature `redis-storage`): shared across instances
//!
//! Store failures reject the request with `ClientError`; the guard never
//! fails open.
//!
//! ## Duplicate Suppression
//!
//! A request is identified by scene, address and parameter *keys*. The
//! fingerprint is reserved atomically before dispatch, committed on success
//! and released on failure, so two concurrent identical requests never both
//! reach the provider, and a failed send can be retried at once.
//!
//! ## Errors
//!
//! Every operation returns [`SmsError`], classified by a closed [`ErrorKind`].
//! Provider error codes are mapped onto four provider kinds by
//! [`map_code`] and [`map_fault`].

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    error::{BoxError, ErrorKind, SmsError},
    fingerprint::Fingerprint,
    masking::mask_address,
    params::{filter_params, ParamLookup, SafeParams},
    provider_error::{map_code, map_fault, ProviderFault},
    scene::{ProviderKind, RateLimitPolicy, SceneKind, ScenePolicy},
    verification::hash_verification_code,
};

pub use application::{
    idempotency::{IdempotencyGuard, Reservation},
    limiter::RateLimiter,
    metrics::{GuardMetrics, MetricsSnapshot},
    orchestrator::{SendOrchestrator, SendOrchestratorBuilder, SendReceipt},
    ports::{
        Clock, DispatchReceipt, DispatchRequest, GovernanceStore, MessageDispatcher, StoreError,
    },
    registry::SceneRegistry,
};

pub use infrastructure::{
    clock::SystemClock,
    config::{GuardSettings, ProviderSettings, SmsSettings},
    dispatcher::DryRunDispatcher,
    storage::MemoryStore,
};

#[cfg(feature = "redis-storage")]
pub use infrastructure::redis_storage::{RedisStore, RedisStoreConfig};
