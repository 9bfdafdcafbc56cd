//! Closed error taxonomy for guarded sends.
//!
//! Every failure the guard can report is an [`SmsError`] carrying one
//! [`ErrorKind`]. Errors carry the scene and a *masked* address for operators;
//! parameter values never reach an error message.

use crate::domain::masking::mask_address;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed error used as the optional cause of an [`SmsError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of a guard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Scene configuration violates an invariant (fatal at startup)
    InvalidConfig,
    /// The scene identifier is not configured
    SceneNotFound,
    /// The request is malformed for its scene
    InvalidRequest,
    /// A rate limit dimension is exhausted
    RateLimited,
    /// An identical request was accepted within the idempotency window
    DuplicateRequest,
    /// Internal fault (storage backend, capacity, serialization)
    ClientError,
    /// Provider throttled the request
    ProviderThrottled,
    /// Provider rejected the request parameters
    ProviderInvalidParam,
    /// Provider rejected the credentials
    ProviderAuthError,
    /// Unclassified provider failure
    ProviderError,
}

impl ErrorKind {
    /// Stable, machine-readable code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::SceneNotFound => "SCENE_NOT_FOUND",
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::DuplicateRequest => "DUPLICATE_REQUEST",
            ErrorKind::ClientError => "CLIENT_ERROR",
            ErrorKind::ProviderThrottled => "PROVIDER_THROTTLED",
            ErrorKind::ProviderInvalidParam => "PROVIDER_INVALID_PARAM",
            ErrorKind::ProviderAuthError => "PROVIDER_AUTH_ERROR",
            ErrorKind::ProviderError => "PROVIDER_ERROR",
        }
    }

    /// Whether this kind originates from the provider call.
    pub fn is_provider(&self) -> bool {
        matches!(
            self,
            ErrorKind::ProviderThrottled
                | ErrorKind::ProviderInvalidParam
                | ErrorKind::ProviderAuthError
                | ErrorKind::ProviderError
        )
    }

    /// Whether a caller may retry once the underlying condition has passed.
    ///
    /// Configuration, request-shape and credential failures never clear on
    /// their own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::DuplicateRequest
                | ErrorKind::ProviderThrottled
                | ErrorKind::ProviderError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned by every guard operation.
#[derive(Debug, Error)]
#[error("{kind}: {message}{}", render_context(.scene, .masked_address))]
pub struct SmsError {
    kind: ErrorKind,
    message: String,
    scene: Option<String>,
    masked_address: Option<String>,
    #[source]
    source: Option<BoxError>,
}

fn render_context(scene: &Option<String>, masked_address: &Option<String>) -> String {
    match (scene, masked_address) {
        (Some(scene), Some(address)) => format!(" (scene={scene}, address={address})"),
        (Some(scene), None) => format!(" (scene={scene})"),
        (None, Some(address)) => format!(" (address={address})"),
        (None, None) => String::new(),
    }
}

impl SmsError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            scene: None,
            masked_address: None,
            source: None,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, message)
    }

    pub fn scene_not_found(scene: &str) -> Self {
        Self::new(ErrorKind::SceneNotFound, "scene is not configured").with_scene(scene)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn duplicate_request() -> Self {
        Self::new(
            ErrorKind::DuplicateRequest,
            "identical request already sent within the idempotency window",
        )
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClientError, message)
    }

    /// Attach the scene identifier. An already attached scene is kept.
    pub fn with_scene(mut self, scene: &str) -> Self {
        if self.scene.is_none() {
            self.scene = Some(scene.to_owned());
        }
        self
    }

    /// Attach the recipient address. The address is masked before it is stored.
    pub fn with_address(mut self, address: &str) -> Self {
        if self.masked_address.is_none() {
            self.masked_address = Some(mask_address(address));
        }
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    /// The masked recipient address, if one was attached.
    pub fn masked_address(&self) -> Option<&str> {
        self.masked_address.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
