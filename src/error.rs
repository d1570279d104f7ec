//! Error types for upload-relay
//!
//! This module provides error handling for the service, including:
//! - Domain-specific error types (task lifecycle, configuration, external service)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{TaskId, TaskStatus};

/// Result type alias for upload-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for upload-relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "APP_SERVER_PORT")
        key: Option<String>,
    },

    /// Task-related error
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// The uploaded request body was not usable
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// The task store has not been initialized (or was closed)
    #[error("task store is not ready")]
    StoreUnavailable,

    /// The external processing service answered with a failure
    #[error("external service error: {0}")]
    ExternalService(String),

    /// The external processing call exceeded its time budget
    #[error("external service call timed out after {seconds}s")]
    Timeout {
        /// The budget that was exceeded, in seconds
        seconds: u64,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new uploads
    #[error("shutdown in progress: not accepting new uploads")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Task lifecycle errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// No task with this identifier is known
    #[error("task {id} not found")]
    NotFound {
        /// The identifier that was looked up, as supplied
        id: String,
    },

    /// Download requested before processing finished
    #[error("task {id} not complete. Status: {status}")]
    NotComplete {
        /// The task that is not complete
        id: TaskId,
        /// Its current status
        status: TaskStatus,
    },

    /// The stored file for a task is gone from disk
    #[error("processed file for task {id} not found at {path}")]
    FileMissing {
        /// The task whose file is missing
        id: TaskId,
        /// Where the file was expected
        path: PathBuf,
    },

    /// A store update was rejected; the previous record is kept
    #[error("invalid update for task {id}: {reason}")]
    InvalidUpdate {
        /// The task the update was aimed at
        id: TaskId,
        /// Why the merged record failed validation
        reason: String,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "task_not_found",
///     "message": "task error: task 3f2c… not found",
///     "details": { "task_id": "3f2c…" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "task_not_found")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::Yaml(_) => 400,
            Error::InvalidUpload(_) => 400,
            Error::Task(TaskError::NotComplete { .. }) => 400,

            // 404 Not Found
            Error::Task(TaskError::NotFound { .. }) => 404,
            Error::Task(TaskError::FileMissing { .. }) => 404,

            // 409 Conflict - update does not fit the current record
            Error::Task(TaskError::InvalidUpdate { .. }) => 409,

            // 500 Internal Server Error - Server-side issues
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::ExternalService(_) => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::StoreUnavailable => 503,
            Error::ShuttingDown => 503,

            // 504 Gateway Timeout
            Error::Timeout { .. } => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Task(e) => match e {
                TaskError::NotFound { .. } => "task_not_found",
                TaskError::NotComplete { .. } => "task_not_complete",
                TaskError::FileMissing { .. } => "file_not_found",
                TaskError::InvalidUpdate { .. } => "invalid_update",
            },
            Error::InvalidUpload(_) => "invalid_upload",
            Error::StoreUnavailable => "store_unavailable",
            Error::ExternalService(_) => "external_service_error",
            Error::Timeout { .. } => "external_service_timeout",
            Error::Network(_) => "network_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Yaml(_) => "yaml_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Task(TaskError::NotFound { id }) => Some(serde_json::json!({
                "task_id": id,
            })),
            Error::Task(TaskError::NotComplete { id, status }) => Some(serde_json::json!({
                "task_id": id,
                "status": status,
            })),
            Error::Task(TaskError::FileMissing { id, path }) => Some(serde_json::json!({
                "task_id": id,
                "path": path,
            })),
            Error::Task(TaskError::InvalidUpdate { id, reason }) => Some(serde_json::json!({
                "task_id": id,
                "reason": reason,
            })),
            Error::Timeout { seconds } => Some(serde_json::json!({
                "timeout_seconds": seconds,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
