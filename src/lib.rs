//! Trellis - a project/phase/task tracker.
//!
//! This library provides the core of the `tl` CLI: the project hierarchy,
//! derived metrics, the filter composer, and the table/card projections
//! that front ends render.

pub mod cli;
pub mod commands;
pub mod config;
pub mod display;
pub mod engine;
pub mod filter;
pub mod hierarchy;
pub mod models;
pub mod storage;
#[cfg(feature = "tui")]
pub mod tui;
pub mod views;

/// Test utilities shared by unit tests.
#[cfg(test)]
pub(crate) mod test_utils {
    use chrono::{Days, NaiveDate};

    use crate::models::{NewPhase, NewProject, NewTask};
    use crate::storage::{MemoryStore, Persistence};

    /// Fixed "today" used throughout the unit tests.
    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    /// `today()` shifted by `days` (negative for the past).
    pub fn day(days: i64) -> NaiveDate {
        let base = today();
        if days >= 0 {
            base.checked_add_days(Days::new(days as u64)).unwrap()
        } else {
            base.checked_sub_days(Days::new(days.unsigned_abs())).unwrap()
        }
    }

    /// Populate a store with the "Website Redesign" sample hierarchy.
    ///
    /// Returns the ids of the Planning, Development and Testing phases.
    pub async fn seed_website(store: &MemoryStore) -> (i64, i64, i64) {
        let project = store
            .create_project(NewProject::new("Website Redesign"))
            .await
            .unwrap();
        let planning = store
            .create_phase(NewPhase::new(project.id, "Planning").with_order(1))
            .await
            .unwrap();
        let development = store
            .create_phase(NewPhase::new(project.id, "Development").with_order(2))
            .await
            .unwrap();
        let testing = store
            .create_phase(NewPhase::new(project.id, "Testing").with_order(3))
            .await
            .unwrap();

        let tasks = [
            ("Draft task card UI", 5, 1, planning.id, "Needs sign-off"),
            ("Ship MVP login flow", 4, 2, development.id, "Started"),
            ("Set up Pi-hosted instance", 3, 5, development.id, "Assigned"),
            ("Connect AI key store", 2, 8, development.id, "Not assigned"),
        ];
        for (title, priority, due, phase_id, status) in tasks {
            let mut task = NewTask::new(title, today());
            task.priority = priority;
            task.due_date = day(due);
            task.phase_id = Some(phase_id);
            task.status = status.to_string();
            store.create_task(task).await.unwrap();
        }

        (planning.id, development.id, testing.id)
    }
}

/// Library-level error type for Trellis operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A required field was empty or out of range; nothing was attempted.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A referenced project or phase does not exist.
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// The persistence collaborator failed; in-memory state is unchanged.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether retrying the triggering action might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::PersistenceUnavailable(_) | Error::Io(_) | Error::Database(_)
        )
    }
}

/// Result type alias for Trellis operations.
pub type Result<T> = std::result::Result<T, Error>;
