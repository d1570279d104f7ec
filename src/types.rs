//! Core types for upload-relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::TaskError;

/// Unique identifier for a task
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a fresh random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Task status
///
/// Transitions only move forward: `pending → processing → {complete | error}`.
/// A task may also fail straight out of `pending` if its runner breaks before
/// processing starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, runner not started yet
    #[default]
    Pending,
    /// Runner is waiting on the external service
    Processing,
    /// External processing succeeded; the file can be downloaded
    Complete,
    /// Processing failed; see `error_message`
    Error,
}

impl TaskStatus {
    /// Whether no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Error)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Processing)
                | (Pending, Error)
                | (Processing, Processing)
                | (Processing, Complete)
                | (Processing, Error)
        )
    }

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upload's processing record
///
/// Records are value types: the store never hands out a mutable reference,
/// it replaces the whole record on every update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Task {
    /// Task identifier
    pub task_id: TaskId,
    /// Current status
    pub status: TaskStatus,
    /// Simulated progress, 0-100
    pub progress: u8,
    /// Where the uploaded file was stored
    pub file_location: String,
    /// Filename supplied by the uploader
    pub original_filename: String,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// Failure description, only present when status is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Task {
    /// Create a new pending task for a stored upload
    pub fn new(file_location: impl Into<String>, original_filename: impl Into<String>) -> Self {
        Self {
            task_id: TaskId::new(),
            status: TaskStatus::Pending,
            progress: 0,
            file_location: file_location.into(),
            original_filename: original_filename.into(),
            created_at: Utc::now(),
            error_message: None,
        }
    }

    /// Produce the record that results from applying `update`
    ///
    /// The receiver is left untouched; on a validation failure the caller
    /// keeps the old value.
    pub fn with_update(&self, update: &TaskUpdate) -> Result<Task, TaskError> {
        let mut next = self.clone();
        if let Some(status) = update.status {
            next.status = status;
        }
        if let Some(progress) = update.progress {
            next.progress = progress;
        }
        if let Some(message) = &update.error_message {
            next.error_message = message.clone();
        }

        self.validate_successor(&next)
            .map_err(|reason| TaskError::InvalidUpdate {
                id: self.task_id,
                reason,
            })?;

        Ok(next)
    }

    fn validate_successor(&self, next: &Task) -> Result<(), String> {
        if !self.status.can_transition_to(next.status) {
            return Err(format!(
                "illegal status transition {} -> {}",
                self.status, next.status
            ));
        }
        if next.progress > 100 {
            return Err(format!("progress {} is above 100", next.progress));
        }
        if self.status == TaskStatus::Processing
            && next.status == TaskStatus::Processing
            && next.progress < self.progress
        {
            return Err(format!(
                "progress may not decrease ({} -> {})",
                self.progress, next.progress
            ));
        }
        match next.status {
            TaskStatus::Complete if next.progress != 100 => {
                Err("complete tasks must report progress 100".to_string())
            }
            TaskStatus::Error
                if next
                    .error_message
                    .as_deref()
                    .is_none_or(|m| m.trim().is_empty()) =>
            {
                Err("error tasks must carry an error message".to_string())
            }
            TaskStatus::Pending | TaskStatus::Processing | TaskStatus::Complete
                if next.error_message.is_some() =>
            {
                Err(format!("{} tasks may not carry an error message", next.status))
            }
            _ => Ok(()),
        }
    }
}

/// Partial update applied atomically by the task store
///
/// `None` leaves a field unchanged. `error_message: Some(None)` clears the message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskUpdate {
    /// New status
    pub status: Option<TaskStatus>,
    /// New progress value
    pub progress: Option<u8>,
    /// New error message (`Some(None)` clears it)
    pub error_message: Option<Option<String>>,
}

impl TaskUpdate {
    /// Move to `processing` with the given progress
    pub fn processing(progress: u8) -> Self {
        Self {
            status: Some(TaskStatus::Processing),
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Progress tick; status unchanged
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Successful completion: progress pinned to 100, message cleared
    pub fn complete() -> Self {
        Self {
            status: Some(TaskStatus::Complete),
            progress: Some(100),
            error_message: Some(None),
        }
    }

    /// Failure with a message. `progress: None` keeps the stored value.
    pub fn error(message: impl Into<String>, progress: Option<u8>) -> Self {
        Self {
            status: Some(TaskStatus::Error),
            progress,
            error_message: Some(Some(message.into())),
        }
    }
}

/// Payload sent to the external processing service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProcessingPayload {
    /// Location of the stored upload
    pub file_key: String,
    /// Filename supplied by the uploader
    pub original_filename: String,
    /// Task reference for correlation on the remote side
    pub task_id_for_reference: TaskId,
}

impl ProcessingPayload {
    /// Build the payload for a task
    pub fn for_task(task: &Task) -> Self {
        Self {
            file_key: task.file_location.clone(),
            original_filename: task.original_filename.clone(),
            task_id_for_reference: task.task_id,
        }
    }
}

/// Response body for `POST /upload/`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Identifier to poll with
    pub task_id: TaskId,
    /// Human-readable acknowledgement
    pub message: String,
    /// Filename as uploaded
    pub filename: String,
}

/// Response body for `GET /health`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `initializing` or `running`
    pub status: String,
    /// Human-readable state
    pub message: String,
    /// Storage backend name, once ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
}
