//! Stubbed external processor

use super::traits::ExternalProcessor;
use crate::types::ProcessingPayload;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Always succeeds after a fixed delay with canned data
pub struct SimulatedProcessor {
    delay: Duration,
}

impl SimulatedProcessor {
    /// Create a stub that answers after `delay`
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ExternalProcessor for SimulatedProcessor {
    async fn process(&self, payload: &ProcessingPayload) -> crate::Result<serde_json::Value> {
        tracing::debug!(
            task_id = %payload.task_id_for_reference,
            file = %payload.file_key,
            "Simulating external service call"
        );
        tokio::time::sleep(self.delay).await;

        Ok(json!({
            "message": "Processing simulated successfully by external service.",
            "received_payload": payload,
            "processed_rows": 150
        }))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
