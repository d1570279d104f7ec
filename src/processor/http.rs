//! HTTP external processor

use super::traits::ExternalProcessor;
use crate::error::Error;
use crate::types::ProcessingPayload;
use async_trait::async_trait;

/// Posts the payload as JSON to the external service
pub struct HttpProcessor {
    client: reqwest::Client,
    url: String,
}

impl HttpProcessor {
    /// Create a processor for the given service URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ExternalProcessor for HttpProcessor {
    async fn process(&self, payload: &ProcessingPayload) -> crate::Result<serde_json::Value> {
        tracing::debug!(
            task_id = %payload.task_id_for_reference,
            url = %self.url,
            "Sending data to external service"
        );

        let response = self.client.post(&self.url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ExternalService(format!(
                "service returned status {}: {}",
                status, body
            )));
        }

        let data = response.json::<serde_json::Value>().await?;
        tracing::debug!(
            task_id = %payload.task_id_for_reference,
            "Received response from external service"
        );
        Ok(data)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
