//! Storage interface for task records

use crate::error::Result;
use crate::types::{Task, TaskId, TaskUpdate};
use async_trait::async_trait;

/// Authoritative keeper of task records
///
/// Implementations must apply [`update`](TaskStore::update) atomically with
/// respect to concurrent readers: a `get` observes either the record before the
/// update or the record after it, never a mix.
///
/// A record that disappears (via [`remove`](TaskStore::remove) or expiry) is the
/// signal that nobody cares about the task any more; runners stop when they see it.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Prepare the backend for use. Called once at startup.
    async fn initialize(&self) -> Result<()>;

    /// Release backend resources. Called once at shutdown.
    async fn close(&self) -> Result<()>;

    /// Whether `initialize` has completed and `close` has not been called
    fn is_ready(&self) -> bool;

    /// Backend name reported by the health endpoint
    fn kind(&self) -> &'static str;

    /// Create a pending task for a stored upload
    async fn create(&self, file_location: &str, original_filename: &str) -> Result<Task>;

    /// Snapshot of a task, or `None` if unknown
    async fn get(&self, id: TaskId) -> Result<Option<Task>>;

    /// Apply a partial update and return the resulting record
    ///
    /// Returns `Ok(None)` for an unknown id without creating anything. A merged
    /// record that fails validation yields `TaskError::InvalidUpdate` and the
    /// stored record stays as it was.
    async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<Option<Task>>;

    /// Delete a task, returning the removed record
    async fn remove(&self, id: TaskId) -> Result<Option<Task>>;
}
