//! Provider failure classification.
//!
//! Provider vocabulary (vendor error codes, SDK faults) stops here: the rest of
//! the crate only sees an [`ErrorKind`].

use crate::domain::error::{BoxError, ErrorKind, SmsError};
use thiserror::Error;

/// Failure reported by the dispatch collaborator instead of a receipt.
#[derive(Debug, Error)]
pub enum ProviderFault {
    /// The collaborator already produced a domain error
    #[error(transparent)]
    Domain(#[from] SmsError),
    /// Structured fault returned by the provider API or SDK
    #[error("provider fault (code={code:?}): {message}")]
    Provider {
        /// Error code on the fault itself
        code: Option<String>,
        /// `Code` entry of the fault's data payload, if any
        data_code: Option<String>,
        message: String,
    },
    /// Anything else: I/O, timeouts, unexpected responses
    #[error("transport fault: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl ProviderFault {
    /// Structured provider fault with a code.
    pub fn provider(code: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderFault::Provider {
            code: Some(code.into()),
            data_code: None,
            message: message.into(),
        }
    }

    /// Transport fault without a typed cause.
    pub fn transport(message: impl Into<String>) -> Self {
        ProviderFault::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Convert into the error reported to the caller.
    ///
    /// Domain errors pass through unchanged. Other faults become a provider
    /// error of the kind chosen by [`map_fault`], with the fault as its cause.
    pub fn into_sms_error(self) -> SmsError {
        let kind = map_fault(&self);
        match self {
            ProviderFault::Domain(err) => err,
            fault => SmsError::new(kind, "provider call failed").with_source(fault),
        }
    }
}

/// Classify a provider response code.
///
/// The code is trimmed before lookup. Blank and unknown codes map to
/// [`ErrorKind::ProviderError`]; the mapping is total.
pub fn map_code(provider_code: &str) -> ErrorKind {
    match provider_code.trim() {
        "isv.BUSINESS_LIMIT_CONTROL" | "BUSINESS_LIMIT_CONTROL" | "Throttling" => {
            ErrorKind::ProviderThrottled
        }
        "isv.INVALID_PARAMETERS"
        | "isv.MISSING_PARAMETER"
        | "MissingParameter"
        | "InvalidParameter"
        | "InvalidPhoneNumber"
        | "SignatureNonceUsed" => ErrorKind::ProviderInvalidParam,
        "InvalidAccessKeyId.NotFound"
        | "SignatureDoesNotMatch"
        | "isv.ACCOUNT_NOT_EXISTS"
        | "AuthFailure" => ErrorKind::ProviderAuthError,
        _ => ErrorKind::ProviderError,
    }
}

/// Classify a dispatch fault.
///
/// - domain errors keep their kind
/// - structured faults are classified by their code, falling back to the code
///   in their data payload
/// - anything else is throttling if its message mentions it, otherwise a
///   generic provider error
pub fn map_fault(fault: &ProviderFault) -> ErrorKind {
    match fault {
        ProviderFault::Domain(err) => err.kind(),
        ProviderFault::Provider {
            code, data_code, ..
        } => {
            let code = code
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .or(data_code.as_deref())
                .unwrap_or_default();
            map_code(code)
        }
        ProviderFault::Transport { message, .. } => {
            if message.to_lowercase().contains("throttl") {
                ErrorKind::ProviderThrottled
            } else {
                ErrorKind::ProviderError
            }
        }
    }
}
