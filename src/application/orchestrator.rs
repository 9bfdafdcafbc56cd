//! Send orchestration.
//!
//! [`SendOrchestrator`] is the single entry point for outbound messages. Every
//! send runs the same pipeline, in order:
//!
//! 1. resolve the scene policy
//! 2. filter parameters through the scene whitelist
//! 3. check and record rate limits
//! 4. reserve the request fingerprint
//! 5. dispatch to the provider
//! 6. commit the reservation on success, release it on failure
//!
//! Any failure before step 5 aborts without calling the provider.

use crate::application::idempotency::IdempotencyGuard;
use crate::application::limiter::RateLimiter;
use crate::application::metrics::GuardMetrics;
use crate::application::ports::{
    Clock, DispatchReceipt, DispatchRequest, GovernanceStore, MessageDispatcher,
};
use crate::application::registry::SceneRegistry;
use crate::domain::error::SmsError;
use crate::domain::masking::mask_address;
use crate::domain::params::{filter_params, ParamLookup};
use crate::domain::provider_error::map_code;
use crate::domain::scene::{SceneKind, ScenePolicy};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::config::SmsSettings;
use crate::infrastructure::storage::MemoryStore;
use chrono::{FixedOffset, Offset, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of an accepted send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Identifier generated by the guard for this send
    pub request_id: Uuid,
    pub provider_request_id: Option<String>,
    pub provider_code: Option<String>,
    pub provider_message: Option<String>,
}

impl SendReceipt {
    fn from_dispatch(request_id: Uuid, receipt: DispatchReceipt) -> Self {
        Self {
            request_id,
            provider_request_id: receipt.provider_request_id,
            provider_code: receipt.provider_code,
            provider_message: receipt.provider_message,
        }
    }
}

/// Guarded entry point for outbound messages.
///
/// # Example
///
/// ```
/// use sms_guard::{DryRunDispatcher, SceneRegistry, ScenePolicy, RateLimitPolicy, SendOrchestrator};
/// use std::collections::HashMap;
/// use std::sync::Arc;
///
/// # tokio_test_block_on(async {
/// let registry = SceneRegistry::new([(
///     "login-otp",
///     ScenePolicy::verification_code("Acme", "SMS_100", "code", 300)
///         .with_rate_limit(RateLimitPolicy::unlimited().with_interval_seconds(60)),
/// )])?;
/// let orchestrator = SendOrchestrator::builder(registry, Arc::new(DryRunDispatcher::new())).build();
///
/// let receipt = orchestrator
///     .send_verification_code("login-otp", "+1555000111", "482913", "10.0.0.1")
///     .await?;
/// assert!(receipt.provider_request_id.is_some());
/// # Ok::<(), sms_guard::SmsError>(())
/// # }).unwrap();
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct SendOrchestrator {
    registry: SceneRegistry,
    limiter: RateLimiter,
    idempotency: IdempotencyGuard,
    dispatcher: Arc<dyn MessageDispatcher>,
    metrics: GuardMetrics,
}

impl SendOrchestrator {
    /// Start building an orchestrator.
    ///
    /// Defaults: in-process store, system clock, UTC calendar days.
    pub fn builder(
        registry: SceneRegistry,
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> SendOrchestratorBuilder {
        SendOrchestratorBuilder {
            registry,
            dispatcher,
            store: None,
            clock: None,
            utc_offset: Utc.fix(),
            metrics: None,
        }
    }

    /// Build an orchestrator from loaded settings with an in-process store.
    ///
    /// # Errors
    /// `InvalidConfig` when the settings are invalid.
    pub fn from_settings(
        settings: &SmsSettings,
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> Result<Self, SmsError> {
        let registry = settings.scene_registry()?;
        let store = match settings.guard.max_store_entries {
            Some(max_entries) => MemoryStore::with_max_entries(max_entries),
            None => MemoryStore::new(),
        };

        Ok(Self::builder(registry, dispatcher)
            .with_store(Arc::new(store))
            .with_utc_offset(settings.utc_offset()?)
            .build())
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &GuardMetrics {
        &self.metrics
    }

    /// Send a message for any scene.
    ///
    /// `source` identifies the caller for per-source limits (typically the
    /// client IP); blank disables that dimension for this request.
    ///
    /// # Errors
    /// - `SceneNotFound` for an unknown scene
    /// - `InvalidRequest` for a blank address or a missing code parameter
    /// - `RateLimited` or `DuplicateRequest` from governance
    /// - `ClientError` when the governance store fails
    /// - a provider kind when the dispatch fails
    pub async fn send(
        &self,
        scene: &str,
        address: &str,
        params: &HashMap<String, String>,
        source: &str,
    ) -> Result<SendReceipt, SmsError> {
        let result = match self.registry.resolve(scene) {
            Ok(policy) => self.send_with_policy(scene, &policy, address, params, source).await,
            Err(err) => Err(err),
        };
        self.record(result)
    }

    /// Send a message for a notification scene.
    ///
    /// # Errors
    /// As [`send`](Self::send); `InvalidRequest` when the scene is not a
    /// notification scene.
    pub async fn send_notification(
        &self,
        scene: &str,
        address: &str,
        params: &HashMap<String, String>,
        source: &str,
    ) -> Result<SendReceipt, SmsError> {
        let result = match self.resolve_kind(scene, SceneKind::Notification) {
            Ok(policy) => self.send_with_policy(scene, &policy, address, params, source).await,
            Err(err) => Err(err),
        };
        self.record(result)
    }

    /// Send a verification code.
    ///
    /// The code is placed under the scene's code parameter key. It is never
    /// logged.
    ///
    /// # Errors
    /// As [`send`](Self::send); `InvalidRequest` when the scene is not a
    /// verification-code scene or the code is blank.
    pub async fn send_verification_code(
        &self,
        scene: &str,
        address: &str,
        code: &str,
        source: &str,
    ) -> Result<SendReceipt, SmsError> {
        let result = match self.verification_params(scene, code) {
            Ok((policy, params)) => {
                self.send_with_policy(scene, &policy, address, &params, source)
                    .await
            }
            Err(err) => Err(err),
        };
        self.record(result)
    }

    fn resolve_kind(&self, scene: &str, kind: SceneKind) -> Result<Arc<ScenePolicy>, SmsError> {
        let policy = self.registry.resolve(scene)?;
        if policy.kind != kind {
            return Err(SmsError::invalid_request(format!(
                "scene kind is {:?}, expected {:?}",
                policy.kind, kind
            ))
            .with_scene(scene));
        }
        Ok(policy)
    }

    fn verification_params(
        &self,
        scene: &str,
        code: &str,
    ) -> Result<(Arc<ScenePolicy>, BTreeMap<String, String>), SmsError> {
        let policy = self.resolve_kind(scene, SceneKind::VerificationCode)?;
        if code.trim().is_empty() {
            return Err(SmsError::invalid_request("verification code must not be blank").with_scene(scene));
        }
        let key = policy.code_param_key().ok_or_else(|| {
            SmsError::invalid_config("verification code scene has no code parameter key")
                .with_scene(scene)
        })?;

        let params = BTreeMap::from([(key.to_owned(), code.to_owned())]);
        Ok((policy, params))
    }

    async fn send_with_policy<P>(
        &self,
        scene: &str,
        policy: &ScenePolicy,
        address: &str,
        raw: &P,
        source: &str,
    ) -> Result<SendReceipt, SmsError>
    where
        P: ParamLookup + Sync + ?Sized,
    {
        if address.trim().is_empty() {
            return Err(SmsError::invalid_request("address must not be blank").with_scene(scene));
        }

        let params = filter_params(policy, raw)
            .map_err(|err| err.with_scene(scene).with_address(address))?;

        self.limiter
            .check_and_record(scene, address, source, &policy.rate_limit)
            .await?;

        let reservation = self
            .idempotency
            .try_acquire(scene, address, &params, policy.idempotency_window_seconds)
            .await?;

        let request_id = Uuid::new_v4();
        let masked = mask_address(address);
        debug!(
            scene = scene,
            address = %masked,
            request_id = %request_id,
            template = %policy.template_identity,
            param_keys = %params,
            "dispatching message"
        );

        let outcome = self
            .dispatcher
            .dispatch(DispatchRequest {
                request_id,
                provider: policy.provider,
                sign_identity: &policy.sign_identity,
                template_identity: &policy.template_identity,
                address,
                params: &params,
            })
            .await;

        let failure = match outcome {
            Ok(receipt) if receipt.success => {
                if let Some(reservation) = &reservation {
                    if let Err(err) = self.idempotency.commit(reservation).await {
                        warn!(
                            scene = scene,
                            address = %masked,
                            request_id = %request_id,
                            error = %err,
                            "failed to commit idempotency entry"
                        );
                    }
                }
                info!(
                    scene = scene,
                    address = %masked,
                    request_id = %request_id,
                    param_keys = %params,
                    "message sent"
                );
                return Ok(SendReceipt::from_dispatch(request_id, receipt));
            }
            Ok(receipt) => rejected_receipt_error(&receipt),
            Err(fault) => fault.into_sms_error(),
        };
        let failure = failure.with_scene(scene).with_address(address);

        if let Some(reservation) = reservation {
            if let Err(err) = self.idempotency.release(reservation).await {
                warn!(
                    scene = scene,
                    address = %masked,
                    error = %err,
                    "failed to release idempotency reservation"
                );
            }
        }

        warn!(
            scene = scene,
            address = %masked,
            request_id = %request_id,
            error_code = failure.kind().code(),
            "provider dispatch failed"
        );
        Err(failure)
    }

    fn record(&self, result: Result<SendReceipt, SmsError>) -> Result<SendReceipt, SmsError> {
        match &result {
            Ok(_) => self.metrics.record_dispatched(),
            Err(err) => self.metrics.record_failure(err.kind()),
        }
        result
    }
}

fn rejected_receipt_error(receipt: &DispatchReceipt) -> SmsError {
    let code = receipt.provider_code.as_deref().unwrap_or_default().trim();
    let kind = map_code(code);
    let message = if code.is_empty() {
        "provider rejected the message".to_string()
    } else {
        format!("provider rejected the message with code {code}")
    };
    SmsError::new(kind, message)
}

impl fmt::Debug for SendOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendOrchestrator")
            .field("registry", &self.registry)
            .field("limiter", &self.limiter)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SendOrchestrator`].
pub struct SendOrchestratorBuilder {
    registry: SceneRegistry,
    dispatcher: Arc<dyn MessageDispatcher>,
    store: Option<Arc<dyn GovernanceStore>>,
    clock: Option<Arc<dyn Clock>>,
    utc_offset: FixedOffset,
    metrics: Option<GuardMetrics>,
}

impl SendOrchestratorBuilder {
    /// Shared state for rate limits and idempotency entries.
    pub fn with_store(mut self, store: Arc<dyn GovernanceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Offset of the calendar day used by daily limits.
    pub fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    /// Report into existing metrics instead of fresh ones.
    pub fn with_metrics(mut self, metrics: GuardMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> SendOrchestrator {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));

        SendOrchestrator {
            registry: self.registry,
            limiter: RateLimiter::with_utc_offset(
                Arc::clone(&store),
                Arc::clone(&clock),
                self.utc_offset,
            ),
            idempotency: IdempotencyGuard::new(store, clock),
            dispatcher: self.dispatcher,
            metrics: self.metrics.unwrap_or_default(),
        }
    }
}
