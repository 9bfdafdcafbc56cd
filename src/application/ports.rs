//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::error::{BoxError, SmsError};
use crate::domain::masking::mask_address;
use crate::domain::params::SafeParams;
use crate::domain::provider_error::ProviderFault;
use crate::domain::scene::ProviderKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::{self, Debug};
use thiserror::Error;
use uuid::Uuid;

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time
/// without depending on system clock implementation details.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Failure of a [`GovernanceStore`] operation.
///
/// Messages never contain keys, since keys embed recipient addresses.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The in-process store reached its entry cap and nothing had expired
    #[error("store capacity of {capacity} entries exhausted")]
    CapacityExhausted { capacity: usize },
    /// The backend could not be reached or rejected the command
    #[error("store backend failure")]
    Backend(#[source] BoxError),
    /// A stored value could not be read as a counter or timestamp
    #[error("stored value is not an integer")]
    CorruptValue,
}

impl StoreError {
    pub fn backend(source: impl Into<BoxError>) -> Self {
        StoreError::Backend(source.into())
    }
}

/// Store failures reject the request.
impl From<StoreError> for SmsError {
    fn from(err: StoreError) -> Self {
        SmsError::client("governance store unavailable").with_source(err)
    }
}

/// Port for the shared state behind rate limiting and duplicate suppression.
///
/// Every slot holds an integer and an absolute expiry in epoch seconds. A slot
/// whose expiry is at or before `now` is absent for every operation, whether or
/// not it has been physically removed yet.
///
/// Implementations must make [`increment_with_expiry`] and
/// [`insert_if_absent_with_expiry`] atomic per key: two concurrent callers
/// never observe the same count, and at most one of them inserts.
///
/// [`increment_with_expiry`]: GovernanceStore::increment_with_expiry
/// [`insert_if_absent_with_expiry`]: GovernanceStore::insert_if_absent_with_expiry
#[async_trait]
pub trait GovernanceStore: Send + Sync + Debug {
    /// Read a live value.
    async fn get(&self, key: &str, now: i64) -> Result<Option<i64>, StoreError>;

    /// Insert or overwrite a value.
    async fn put_with_expiry(
        &self,
        key: &str,
        value: i64,
        expires_at: i64,
        now: i64,
    ) -> Result<(), StoreError>;

    /// Increment a counter and return the new count.
    ///
    /// An absent counter starts at 1 and takes `expires_at`; a live counter
    /// keeps its expiry.
    async fn increment_with_expiry(
        &self,
        key: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<i64, StoreError>;

    /// Insert a value unless a live one exists. Returns whether it was inserted.
    async fn insert_if_absent_with_expiry(
        &self,
        key: &str,
        value: i64,
        expires_at: i64,
        now: i64,
    ) -> Result<bool, StoreError>;

    /// Remove a slot. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Physically drop expired slots and return how many were dropped.
    ///
    /// Backends with native expiry may return 0.
    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError>;
}

/// Payload handed to the provider for one send.
#[derive(Clone, Copy)]
pub struct DispatchRequest<'a> {
    /// Guard-generated identifier, also returned in the send receipt
    pub request_id: Uuid,
    pub provider: ProviderKind,
    pub sign_identity: &'a str,
    pub template_identity: &'a str,
    /// Unmasked recipient address
    pub address: &'a str,
    pub params: &'a SafeParams,
}

impl Debug for DispatchRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRequest")
            .field("request_id", &self.request_id)
            .field("provider", &self.provider)
            .field("sign_identity", &self.sign_identity)
            .field("template_identity", &self.template_identity)
            .field("address", &mask_address(self.address))
            .field("params", self.params)
            .finish()
    }
}

/// Provider response to a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchReceipt {
    /// Whether the provider accepted the message
    pub success: bool,
    pub provider_code: Option<String>,
    pub provider_message: Option<String>,
    pub provider_request_id: Option<String>,
}

impl DispatchReceipt {
    /// Receipt for an accepted message.
    pub fn accepted(provider_request_id: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_code: Some("OK".to_string()),
            provider_message: Some("OK".to_string()),
            provider_request_id: Some(provider_request_id.into()),
        }
    }

    /// Receipt for a message the provider answered but refused.
    pub fn rejected(provider_code: impl Into<String>, provider_message: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_code: Some(provider_code.into()),
            provider_message: Some(provider_message.into()),
            provider_request_id: None,
        }
    }
}

/// Port for the outbound provider call.
///
/// The guard treats the call as a black box: timeouts, connection handling and
/// provider authentication belong to the implementation. A refusal can be
/// reported either as a receipt with `success == false` or as a
/// [`ProviderFault`]; both are classified the same way.
#[async_trait]
pub trait MessageDispatcher: Send + Sync + Debug {
    async fn dispatch(&self, request: DispatchRequest<'_>)
        -> Result<DispatchReceipt, ProviderFault>;
}
