//! To-do propagation engine
//!
//! Decides who gets a to-do when issues, merge requests, commits and comments change,
//! and keeps the to-do ledger and per-user counters in SQLite.

pub mod config;
pub mod metrics;
pub mod project;
pub mod references;
pub mod sqlite_persistence;
pub mod store;
pub mod targets;
pub mod todos;
pub mod user;
pub mod visibility;

use std::sync::Arc;

pub use config::{AppConfig, TodoSettings};
pub use store::SqliteStore;
pub use todos::{EventOutcome, TodoError, TodoEvent, TodoService};

/// A service wired to the SQLite store and the built-in mention and visibility rules.
pub fn sqlite_service(store: Arc<SqliteStore>, settings: TodoSettings) -> TodoService {
    let references = Arc::new(references::HandleReferenceResolver::new(
        store.clone(),
        settings.ignore_code_blocks,
    ));
    let visibility = Arc::new(visibility::ProjectAccessOracle::new(
        store.clone(),
        store.clone(),
    ));
    TodoService::new(store, references, visibility, settings)
}
