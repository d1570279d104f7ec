//! Task record storage
//!
//! The [`TaskStore`] trait is the single owner of task state. Callers only ever
//! receive snapshots; every mutation goes through [`TaskStore::update`], which
//! replaces the stored record atomically.
//!
//! - [`InMemoryTaskStore`]: process-local map, lost on restart

mod memory;
mod traits;

pub use memory::InMemoryTaskStore;
pub use traits::TaskStore;
