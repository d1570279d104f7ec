//! Trait for the downstream processing call

use crate::types::ProcessingPayload;
use async_trait::async_trait;

/// Performs one downstream processing call
///
/// Implementations only report success or failure; timeouts, cancellation and
/// recording failures on the task are handled by
/// [`call_external_service`](super::call_external_service).
#[async_trait]
pub trait ExternalProcessor: Send + Sync {
    /// Send the payload and return the service's response data
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success response.
    async fn process(&self, payload: &ProcessingPayload) -> crate::Result<serde_json::Value>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
