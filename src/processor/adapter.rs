//! Single external call with timeout, cancellation and failure bookkeeping

use super::traits::ExternalProcessor;
use crate::error::Error;
use crate::store::TaskStore;
use crate::types::{ProcessingPayload, TaskId, TaskUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of one external call
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The service answered successfully with this data
    Success(serde_json::Value),
    /// The call failed or timed out; the failure is already recorded on the task
    Failed,
    /// The call was cancelled before it finished; nothing was recorded
    Cancelled,
}

/// Perform one call to the external service on behalf of a task
///
/// `timeout` is a hard ceiling and exceeding it counts as a transport failure.
/// On failure the task is moved to `error` with a message before returning
/// [`CallOutcome::Failed`]; its progress is left at the last stored value.
/// Cancelling `cancel` abandons the in-flight call and writes nothing.
pub async fn call_external_service(
    store: Arc<dyn TaskStore>,
    processor: Arc<dyn ExternalProcessor>,
    task_id: TaskId,
    payload: ProcessingPayload,
    timeout: Duration,
    cancel: CancellationToken,
) -> CallOutcome {
    tracing::debug!(
        task_id = %task_id,
        processor = processor.name(),
        timeout_secs = timeout.as_secs(),
        "Dispatching external service call"
    );

    let call = tokio::time::timeout(timeout, processor.process(&payload));
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(task_id = %task_id, "External service call cancelled");
            return CallOutcome::Cancelled;
        }
        result = call => result,
    };

    let error = match result {
        Ok(Ok(data)) => {
            tracing::debug!(task_id = %task_id, "External service call succeeded");
            return CallOutcome::Success(data);
        }
        Ok(Err(e)) => e,
        Err(_) => Error::Timeout {
            seconds: timeout.as_secs(),
        },
    };

    let message = format!("External service call failed: {}", error);
    tracing::warn!(task_id = %task_id, error = %error, "External service call failed");

    match store
        .update(task_id, TaskUpdate::error(message, None))
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::debug!(task_id = %task_id, "Task vanished before failure could be recorded");
        }
        Err(e) => {
            tracing::warn!(
                task_id = %task_id,
                error = %e,
                "Failed to record external service failure"
            );
        }
    }

    CallOutcome::Failed
}
