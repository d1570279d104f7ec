//! In-memory task store

use super::traits::TaskStore;
use crate::error::Result;
use crate::types::{Task, TaskId, TaskUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Task store backed by a process-local map
///
/// Nothing survives a restart. Records are replaced wholesale under the write
/// lock, so readers always see a complete record.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
    ready: AtomicBool,
}

impl InMemoryTaskStore {
    /// Create an empty, not yet initialized store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn initialize(&self) -> Result<()> {
        tracing::info!("Initializing in-memory task store");
        self.tasks.write().await.clear();
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        tracing::info!("Closed in-memory task store");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn kind(&self) -> &'static str {
        "in_memory"
    }

    async fn create(&self, file_location: &str, original_filename: &str) -> Result<Task> {
        let task = Task::new(file_location, original_filename);
        self.tasks.write().await.insert(task.task_id, task.clone());
        tracing::debug!(task_id = %task.task_id, file = %file_location, "Task created");
        Ok(task)
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        let Some(current) = tasks.get(&id) else {
            return Ok(None);
        };

        let next = match current.with_update(&update) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "Rejected task update");
                return Err(e.into());
            }
        };

        tasks.insert(id, next.clone());
        Ok(Some(next))
    }

    async fn remove(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.tasks.write().await.remove(&id))
    }
}
