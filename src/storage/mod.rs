//! Storage layer for Trellis data.
//!
//! The engine talks to storage only through the [`Persistence`] trait.
//!
//! ## Backends
//!
//! - **SQLite** ([`SqliteStore`], default): a single database file at
//!   `<data-dir>/trellis.db` with integer surrogate keys
//! - **Memory** ([`MemoryStore`]): an in-process store used by tests and
//!   dry runs, with a switch that simulates I/O failure
//!
//! ## Data directory
//!
//! `TL_DATA_DIR` if set, otherwise `<platform data dir>/trellis`.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::models::{NewPhase, NewProject, NewTask, Phase, Project, Task};
use crate::{Error, Result};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TL_DATA_DIR";

/// Database file name inside the data directory.
pub const DB_FILE: &str = "trellis.db";

/// Source and sink of hierarchy and task records.
///
/// Loads always return complete snapshots. Creation is append-only.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Every project with phases (in display order) and their tasks.
    async fn load_full_hierarchy(&self) -> Result<Vec<Project>>;

    /// Every task in creation order, orphans included.
    async fn load_all_tasks(&self) -> Result<Vec<Task>>;

    /// Fails with `Validation` on an empty name.
    async fn create_project(&self, project: NewProject) -> Result<Project>;

    /// Fails with `NotFound` when the project does not exist.
    async fn create_phase(&self, phase: NewPhase) -> Result<Phase>;

    /// Never fails on an unknown phase id; the task becomes an orphan.
    async fn create_task(&self, task: NewTask) -> Result<Task>;
}

/// Resolve the data directory (`TL_DATA_DIR` > platform data dir).
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(data_dir.join("trellis"))
}

/// Default database path inside the data directory.
pub fn default_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

/// Map collaborator failures to `PersistenceUnavailable`, leaving
/// validation and lookup errors untouched.
pub fn as_unavailable(err: Error) -> Error {
    match err {
        Error::Io(e) => Error::PersistenceUnavailable(e.to_string()),
        Error::Database(e) => Error::PersistenceUnavailable(e.to_string()),
        Error::Json(e) => Error::PersistenceUnavailable(e.to_string()),
        other => other,
    }
}
