//! Task lifecycle runner
//!
//! One runner drives one task: `pending → processing → {complete | error}`.
//! The external call runs on its own tokio task while the runner reports
//! simulated progress ticks, so a slow call still produces an evolving
//! progress signal. The tick loop is bounded by the step count and exits
//! early once the call resolves.
//!
//! The runner never holds task state itself. Every read and write goes back
//! through the [`TaskStore`], and a task that disappears from the store is
//! treated as cancelled: the in-flight call is cancelled and awaited, and
//! nothing further is written.

use crate::config::ApplicationConfig;
use crate::error::{Error, Result, TaskError};
use crate::processor::{CallOutcome, ExternalProcessor, call_external_service};
use crate::store::TaskStore;
use crate::types::{ProcessingPayload, TaskId, TaskUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// How long `shutdown` waits for runners to wind down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Timing parameters for the lifecycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Configured number of progress ticks (values below 1 act as 1)
    pub processing_steps: i64,
    /// Expected duration of the external call, spread evenly across the ticks
    pub estimated_duration: Duration,
    /// Hard ceiling for the external call
    pub call_timeout: Duration,
}

impl RunnerSettings {
    /// Take the runner settings from the `application` config section
    pub fn from_config(config: &ApplicationConfig) -> Self {
        Self {
            processing_steps: config.processing_steps,
            estimated_duration: config.external_processing_estimated_duration,
            call_timeout: config.external_processing_timeout,
        }
    }

    /// Number of ticks, at least one
    pub fn tick_count(&self) -> u64 {
        self.processing_steps.max(1) as u64
    }

    /// Sleep between ticks
    pub fn tick_delay(&self) -> Duration {
        let ticks = u32::try_from(self.tick_count()).unwrap_or(u32::MAX);
        self.estimated_duration / ticks
    }
}

/// Progress reported after tick `index` (0-based) of `ticks`
///
/// Capped at 99; only a confirmed successful call reaches 100.
pub fn tick_progress(index: u64, ticks: u64) -> u8 {
    let ticks = ticks.max(1);
    let index = index.min(ticks - 1);
    ((index + 1) * 99 / ticks) as u8
}

/// Spawns and drives task lifecycles
#[derive(Clone)]
pub struct TaskRunner {
    store: Arc<dyn TaskStore>,
    processor: Arc<dyn ExternalProcessor>,
    settings: RunnerSettings,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

/// How the tick loop ended
enum TickExit {
    /// All ticks done, or the call resolved early
    Resolved,
    /// The task vanished or the runner is shutting down; the call was torn down
    Abandoned,
}

impl TaskRunner {
    /// Create a runner over a store and an external processor
    pub fn new(
        store: Arc<dyn TaskStore>,
        processor: Arc<dyn ExternalProcessor>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            store,
            processor,
            settings,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been requested
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Start the lifecycle for a freshly created task in the background
    ///
    /// Exactly one runner should be spawned per task.
    pub fn spawn(&self, task_id: TaskId) -> JoinHandle<()> {
        let runner = self.clone();
        self.tracker.spawn(async move { runner.run(task_id).await })
    }

    /// Drive one task to completion
    ///
    /// Any failure not already recorded by the call adapter is written to the
    /// task as `status=error` with the last progress value reached.
    pub async fn run(&self, task_id: TaskId) {
        let mut last_progress = 0u8;
        if let Err(e) = self.drive(task_id, &mut last_progress).await {
            tracing::error!(task_id = %task_id, error = %e, "Task processing failed");
            let update = TaskUpdate::error(e.to_string(), Some(last_progress));
            match self.store.update(task_id, update).await {
                Ok(_) => {}
                Err(record_err) => {
                    tracing::warn!(
                        task_id = %task_id,
                        error = %record_err,
                        "Could not record task failure"
                    );
                }
            }
        }
    }

    /// Stop all runners
    ///
    /// In-flight calls are cancelled and tick loops stop at their next wait.
    /// Interrupted tasks keep their last recorded state.
    pub async fn shutdown(&self) {
        tracing::info!(active = self.tracker.len(), "Stopping task runners");
        self.shutdown.cancel();
        self.tracker.close();

        if tokio::time::timeout(SHUTDOWN_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.len(),
                "Timeout waiting for task runners to stop"
            );
        }
    }

    async fn drive(&self, task_id: TaskId, last_progress: &mut u8) -> Result<()> {
        let Some(task) = self.store.get(task_id).await? else {
            tracing::debug!(task_id = %task_id, "Task not found at start of processing");
            return Ok(());
        };

        if self
            .store
            .update(task_id, TaskUpdate::processing(0))
            .await?
            .is_none()
        {
            return Ok(());
        }

        tracing::info!(
            task_id = %task_id,
            file = %task.original_filename,
            processor = self.processor.name(),
            estimated_secs = self.settings.estimated_duration.as_secs(),
            "Starting processing"
        );

        let call_cancel = self.shutdown.child_token();
        // Any early return below tears the call down with it
        let _call_guard = call_cancel.clone().drop_guard();
        let mut call = tokio::spawn(call_external_service(
            self.store.clone(),
            self.processor.clone(),
            task_id,
            ProcessingPayload::for_task(&task),
            self.settings.call_timeout,
            call_cancel.clone(),
        ));

        match self
            .tick_until_resolved(task_id, &mut call, &call_cancel, last_progress)
            .await?
        {
            TickExit::Resolved => {}
            TickExit::Abandoned => return Ok(()),
        }

        let outcome = match (&mut call).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => return Ok(()),
            Err(e) => {
                return Err(Error::Other(format!(
                    "external service call panicked: {}",
                    e
                )));
            }
        };

        match outcome {
            CallOutcome::Cancelled => {
                tracing::info!(
                    task_id = %task_id,
                    "External service call was cancelled before completion"
                );
            }
            CallOutcome::Failed => {
                tracing::info!(task_id = %task_id, "External service call not successful");
            }
            CallOutcome::Success(data) => {
                tracing::debug!(
                    task_id = %task_id,
                    result = %truncate(&data.to_string(), 200),
                    "External processing successful"
                );
                if self
                    .store
                    .update(task_id, TaskUpdate::complete())
                    .await?
                    .is_some()
                {
                    tracing::info!(
                        task_id = %task_id,
                        file = %task.original_filename,
                        "Processing complete"
                    );
                }
            }
        }

        Ok(())
    }

    async fn tick_until_resolved(
        &self,
        task_id: TaskId,
        call: &mut JoinHandle<CallOutcome>,
        call_cancel: &CancellationToken,
        last_progress: &mut u8,
    ) -> Result<TickExit> {
        let ticks = self.settings.tick_count();
        let delay = self.settings.tick_delay();

        for tick in 0..ticks {
            if call.is_finished() {
                break;
            }

            if !delay.is_zero() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        tracing::info!(task_id = %task_id, "Runner stopping for shutdown");
                        tear_down_call(task_id, call, call_cancel).await;
                        return Ok(TickExit::Abandoned);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let current = match self.store.get(task_id).await? {
                Some(current) => current,
                None => {
                    self.abandon(task_id, call, call_cancel).await;
                    return Ok(TickExit::Abandoned);
                }
            };
            // The adapter already recorded a failure
            if current.status.is_terminal() {
                break;
            }

            let progress = tick_progress(tick, ticks);
            match self
                .store
                .update(task_id, TaskUpdate::progress(progress))
                .await
            {
                Ok(Some(updated)) => {
                    *last_progress = updated.progress;
                    tracing::debug!(
                        task_id = %task_id,
                        progress,
                        "Waiting for external service"
                    );
                }
                Ok(None) => {
                    self.abandon(task_id, call, call_cancel).await;
                    return Ok(TickExit::Abandoned);
                }
                // Lost a race with the adapter's failure write
                Err(Error::Task(TaskError::InvalidUpdate { .. })) => break,
                Err(e) => return Err(e),
            }
        }

        Ok(TickExit::Resolved)
    }

    async fn abandon(
        &self,
        task_id: TaskId,
        call: &mut JoinHandle<CallOutcome>,
        call_cancel: &CancellationToken,
    ) {
        tracing::info!(task_id = %task_id, "Task cancelled during external processing");
        tear_down_call(task_id, call, call_cancel).await;
    }
}

/// Cancel the in-flight call and wait for it, logging how it ended
async fn tear_down_call(
    task_id: TaskId,
    call: &mut JoinHandle<CallOutcome>,
    call_cancel: &CancellationToken,
) {
    call_cancel.cancel();
    match call.await {
        Ok(CallOutcome::Cancelled) => {
            tracing::debug!(task_id = %task_id, "External service call torn down");
        }
        Ok(_) => {
            tracing::debug!(
                task_id = %task_id,
                "External service call finished before cancellation"
            );
        }
        Err(e) => {
            tracing::warn!(
                task_id = %task_id,
                error = %e,
                "External service call ended abnormally"
            );
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
