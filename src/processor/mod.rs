//! External processing boundary
//!
//! The [`ExternalProcessor`] trait is the seam between the task lifecycle and
//! the downstream service that does the real work. Two implementations exist:
//!
//! - [`SimulatedProcessor`]: fixed short delay and canned data (default deployment)
//! - [`HttpProcessor`]: one JSON `POST` to the configured service URL
//!
//! [`call_external_service`] wraps a single call with the timeout budget,
//! cancellation, and failure bookkeeping on the task store, so swapping the
//! implementation requires no change to the runner.

mod adapter;
mod http;
mod simulated;
mod traits;

pub use adapter::{CallOutcome, call_external_service};
pub use http::HttpProcessor;
pub use simulated::SimulatedProcessor;
pub use traits::ExternalProcessor;

use crate::config::{ApplicationConfig, ExternalServiceMode};
use std::sync::Arc;

/// Build the processor selected by `external_service_mode`
pub fn build_processor(config: &ApplicationConfig) -> Arc<dyn ExternalProcessor> {
    match config.external_service_mode {
        ExternalServiceMode::Simulated => {
            tracing::info!(
                delay_ms = config.simulated_call_delay.as_millis() as u64,
                "External service calls are simulated"
            );
            Arc::new(SimulatedProcessor::new(config.simulated_call_delay))
        }
        ExternalServiceMode::Http => {
            tracing::info!(url = %config.external_service_url, "External service calls use HTTP");
            Arc::new(HttpProcessor::new(config.external_service_url.clone()))
        }
    }
}
