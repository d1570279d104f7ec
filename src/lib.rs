//! # upload-relay
//!
//! File upload service that delegates processing to an external service and
//! tracks each upload as a task clients can poll.
//!
//! ## Flow
//!
//! 1. `POST /upload/` stores the file under a collision-free timestamped name,
//!    creates a `pending` task and returns `202` with its id.
//! 2. A background runner moves the task to `processing`, calls the external
//!    service, and reports simulated progress while it waits.
//! 3. `GET /status/:task_id` returns the current record; once it is
//!    `complete`, `GET /download/:task_id` returns the file.
//!
//! ## Quick Start
//!
//! ```no_run
//! use upload_relay::Config;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("config.yaml"))?;
//!
//!     // Serves until SIGINT/SIGTERM
//!     upload_relay::serve(config).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// External processing calls
pub mod processor;
/// Task lifecycle runner
pub mod runner;
/// Task record storage
pub mod store;
/// Core types
pub mod types;
/// Upload path and header helpers
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use runner::{RunnerSettings, TaskRunner};
pub use store::{InMemoryTaskStore, TaskStore};
pub use types::{Task, TaskId, TaskStatus, TaskUpdate};

use std::future::Future;
use std::sync::Arc;

/// Run the service until SIGINT or SIGTERM
///
/// See [`serve_until`] for the startup and shutdown sequence.
pub async fn serve(config: Config) -> Result<()> {
    serve_until(config, wait_for_signal()).await
}

/// Run the service until `shutdown` resolves
///
/// Startup creates the upload directory, initializes the task store and binds
/// the API server. On shutdown the server stops accepting connections, running
/// tasks are cancelled, and the store is closed.
///
/// # Errors
///
/// Returns an error if the upload directory cannot be created, the store fails
/// to initialize, or the server cannot bind.
pub async fn serve_until<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = Arc::new(config);

    tokio::fs::create_dir_all(&config.application.upload_directory).await?;
    tracing::info!(
        directory = %config.application.upload_directory.display(),
        "Upload directory ready"
    );

    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    store.initialize().await?;

    let runner = TaskRunner::new(
        store.clone(),
        processor::build_processor(&config.application),
        RunnerSettings::from_config(&config.application),
    );

    let state = api::AppState::new(store.clone(), runner.clone(), config.clone());
    let served = api::start_api_server(state, shutdown).await;

    runner.shutdown().await;
    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "Failed to close task store");
    }

    tracing::info!("Shutdown complete");
    served
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
