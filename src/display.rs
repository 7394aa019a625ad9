//! Join of flat task records with the project hierarchy.
//!
//! Every hierarchy or task change produces a fresh `Vec<TaskDisplay>`;
//! records are never mutated after construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Project, Task};

/// Project name shown for tasks whose phase does not resolve.
pub const UNKNOWN_PROJECT: &str = "Unknown Project";

/// Phase name shown for tasks whose phase does not resolve.
pub const UNASSIGNED_PHASE: &str = "Unassigned";

/// A task with its owning project and phase resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDisplay {
    pub task: Task,
    /// `None` for orphan tasks
    pub project_id: Option<i64>,
    pub project_name: String,
    pub phase_name: String,
}

/// Build display rows for `tasks`, in input order.
///
/// The hierarchy is walked once to index phases; each task is then resolved
/// with a single lookup.
pub fn build_display_rows(hierarchy: &[Project], tasks: &[Task]) -> Vec<TaskDisplay> {
    let lookup: HashMap<i64, (i64, &str, &str)> = hierarchy
        .iter()
        .flat_map(|project| {
            project.phases.iter().map(move |phase| {
                (phase.id, (project.id, project.name.as_str(), phase.name.as_str()))
            })
        })
        .collect();

    tasks
        .iter()
        .map(|task| {
            match task.phase_id.and_then(|id| lookup.get(&id)) {
                Some(&(project_id, project_name, phase_name)) => TaskDisplay {
                    task: task.clone(),
                    project_id: Some(project_id),
                    project_name: project_name.to_string(),
                    phase_name: phase_name.to_string(),
                },
                None => TaskDisplay {
                    task: task.clone(),
                    project_id: None,
                    project_name: UNKNOWN_PROJECT.to_string(),
                    phase_name: UNASSIGNED_PHASE.to_string(),
                },
            }
        })
        .collect()
}
