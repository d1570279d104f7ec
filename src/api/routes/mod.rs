//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] - Upload, status polling, and download of processed files
//! - [`system`] - Health and OpenAPI

mod system;
mod tasks;

// Re-export all handlers so `routes::function_name` works
pub use system::*;
pub use tasks::*;
