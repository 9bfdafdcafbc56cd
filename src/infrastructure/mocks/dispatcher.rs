//! Mock dispatcher for testing.

use crate::application::ports::{DispatchReceipt, DispatchRequest, MessageDispatcher};
use crate::domain::params::SafeParams;
use crate::domain::provider_error::ProviderFault;
use crate::domain::scene::ProviderKind;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// A dispatch as seen by [`MockDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDispatch {
    pub request_id: Uuid,
    pub provider: ProviderKind,
    pub sign_identity: String,
    pub template_identity: String,
    pub address: String,
    pub params: SafeParams,
}

type Response = Result<DispatchReceipt, ProviderFault>;

/// Scripted dispatcher that records every call.
///
/// Responses queued with [`push_response`](Self::push_response) are returned
/// in order; once the queue is empty every dispatch is accepted. Clones share
/// the queue and the recorded calls.
#[derive(Clone, Default)]
pub struct MockDispatcher {
    calls: Arc<Mutex<Vec<RecordedDispatch>>>,
    responses: Arc<Mutex<VecDeque<Response>>>,
    delay: Option<Duration>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every dispatch, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the response for a future dispatch.
    pub fn push_response(&self, response: Response) {
        self.responses
            .lock()
            .expect("MockDispatcher mutex poisoned")
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<RecordedDispatch> {
        self.calls
            .lock()
            .expect("MockDispatcher mutex poisoned")
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("MockDispatcher mutex poisoned").len()
    }
}

impl fmt::Debug for MockDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDispatcher")
            .field("calls", &self.call_count())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageDispatcher for MockDispatcher {
    async fn dispatch(&self, request: DispatchRequest<'_>) -> Result<DispatchReceipt, ProviderFault> {
        self.calls
            .lock()
            .expect("MockDispatcher mutex poisoned")
            .push(RecordedDispatch {
                request_id: request.request_id,
                provider: request.provider,
                sign_identity: request.sign_identity.to_string(),
                template_identity: request.template_identity.to_string(),
                address: request.address.to_string(),
                params: request.params.clone(),
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .responses
            .lock()
            .expect("MockDispatcher mutex poisoned")
            .pop_front();
        scripted.unwrap_or_else(|| Ok(DispatchReceipt::accepted(request.request_id.to_string())))
    }
}
