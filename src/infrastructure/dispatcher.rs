//! Dispatcher adapters.

use crate::application::ports::{DispatchReceipt, DispatchRequest, MessageDispatcher};
use crate::domain::provider_error::ProviderFault;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Dispatcher that accepts every message without contacting a provider.
///
/// Used when provider credentials are incomplete and in local setups. Logs the
/// template and parameter keys at debug level.
#[derive(Debug, Default)]
pub struct DryRunDispatcher {
    sent: AtomicU64,
}

impl DryRunDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages accepted so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageDispatcher for DryRunDispatcher {
    async fn dispatch(
        &self,
        request: DispatchRequest<'_>,
    ) -> Result<DispatchReceipt, ProviderFault> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        debug!(
            provider = ?request.provider,
            template = request.template_identity,
            param_keys = %request.params,
            request_id = %request.request_id,
            "dry-run dispatch"
        );
        Ok(DispatchReceipt::accepted(format!("dry-run-{}", request.request_id)))
    }
}
