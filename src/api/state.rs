//! Application state for the API server

use crate::config::Config;
use crate::error::{Error, Result};
use crate::runner::TaskRunner;
use crate::store::TaskStore;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the task store, the runner that drives uploads, and configuration.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative task records
    pub store: Arc<dyn TaskStore>,

    /// Spawns one lifecycle runner per accepted upload
    pub runner: TaskRunner,

    /// Resolved configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(store: Arc<dyn TaskStore>, runner: TaskRunner, config: Arc<Config>) -> Self {
        Self {
            store,
            runner,
            config,
        }
    }

    /// Fail with `StoreUnavailable` until the store has been initialized
    pub fn ensure_ready(&self) -> Result<()> {
        if self.store.is_ready() {
            Ok(())
        } else {
            Err(Error::StoreUnavailable)
        }
    }
}
