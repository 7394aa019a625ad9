//! Data models for Trellis entities.
//!
//! This module defines the core data structures:
//! - `Project` - Top-level container with a location and timezone
//! - `Phase` - Ordered stage of a project that owns tasks
//! - `Task` - Work item with status, priority, dates, tags and links
//! - `NewProject` / `NewPhase` / `NewTask` - Creation requests
//!
//! Derived values (progress, velocity, due windows) live in [`metrics`].

pub mod metrics;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use metrics::{DueWindow, Insights};

/// Default assignee for tasks nobody has picked up.
pub const DEFAULT_ASSIGNEE: &str = "Unassigned";

/// Default status for newly created tasks.
pub const DEFAULT_STATUS: &str = "Assigned";

/// Default task priority (1-5).
pub const DEFAULT_PRIORITY: u8 = 3;

/// Where a project's data lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectLocation {
    #[default]
    Local,
    Network,
}

impl ProjectLocation {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Some(ProjectLocation::Local),
            "network" => Some(ProjectLocation::Network),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectLocation::Local => "local",
            ProjectLocation::Network => "network",
        }
    }
}

impl fmt::Display for ProjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A top-level project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Surrogate key assigned by the store
    pub id: i64,

    /// Project name (never empty)
    pub name: String,

    /// Where the project lives
    #[serde(default)]
    pub location: ProjectLocation,

    /// IANA timezone name
    pub timezone: String,

    #[serde(default)]
    pub description: String,

    /// Phases in display order (`order` ascending, then creation)
    #[serde(default)]
    pub phases: Vec<Phase>,
}

impl Project {
    /// Iterate over every task in every phase of this project.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.phases.iter().flat_map(|phase| phase.tasks.iter())
    }

    /// Completion percentage across all phases (0-100).
    pub fn progress(&self) -> u8 {
        metrics::progress(self.tasks())
    }

    /// Restore display order after phases were appended.
    ///
    /// The sort is stable and ids grow with creation, so ties on `order`
    /// keep creation order.
    pub fn sort_phases(&mut self) {
        self.phases.sort_by_key(|phase| (phase.order, phase.id));
    }
}

/// A stage within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: i64,

    /// Owning project
    pub project_id: i64,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Secondary display key; need not be unique or contiguous
    #[serde(default)]
    pub order: i64,

    /// Tasks in creation order
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Phase {
    /// Completion percentage of this phase's tasks (0-100).
    pub fn progress(&self) -> u8 {
        metrics::progress(self.tasks.iter())
    }
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,

    /// Task title (never empty)
    pub title: String,

    /// Free-form status, interpreted case-insensitively
    pub status: String,

    pub assignee: String,

    /// Priority level (1-5, higher is more important)
    pub priority: u8,

    pub start_date: NaiveDate,

    pub due_date: NaiveDate,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Ids of related tasks (informational, never validated)
    #[serde(default)]
    pub links: Vec<i64>,

    #[serde(default)]
    pub requires_signoff: bool,

    /// Owning phase; `None` or an unknown id makes the task an orphan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<i64>,
}

impl Task {
    /// Whether the status is exactly "completed" (case-insensitive).
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("completed")
    }
}

/// Request to create a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub location: ProjectLocation,
    pub timezone: String,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            location: ProjectLocation::Local,
            timezone: "UTC".to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Request to create a phase under an existing project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhase {
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub order: i64,
}

impl NewPhase {
    pub fn new(project_id: i64, name: impl Into<String>) -> Self {
        Self {
            project_id,
            name: name.into(),
            description: String::new(),
            order: 0,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }
}

/// Request to create a task. Every field except the title has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub status: String,
    pub assignee: String,
    pub priority: u8,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tags: Vec<String>,
    pub links: Vec<i64>,
    pub requires_signoff: bool,
    pub phase_id: Option<i64>,
}

impl NewTask {
    /// A task starting and due on `today` with default status and priority.
    pub fn new(title: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            title: title.into(),
            status: DEFAULT_STATUS.to_string(),
            assignee: DEFAULT_ASSIGNEE.to_string(),
            priority: DEFAULT_PRIORITY,
            start_date: today,
            due_date: today,
            tags: Vec::new(),
            links: Vec::new(),
            requires_signoff: false,
            phase_id: None,
        }
    }

    /// Materialize the request with a store-assigned id.
    pub fn into_task(self, id: i64) -> Task {
        Task {
            id,
            title: self.title,
            status: self.status,
            assignee: self.assignee,
            priority: self.priority,
            start_date: self.start_date,
            due_date: self.due_date,
            tags: self.tags,
            links: self.links,
            requires_signoff: self.requires_signoff,
            phase_id: self.phase_id,
        }
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
