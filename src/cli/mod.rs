//! CLI argument definitions for Trellis.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::views::ViewMode;

fn parse_view(s: &str) -> Result<ViewMode, String> {
    ViewMode::parse(s).ok_or_else(|| format!("invalid view '{}', expected table or cards", s))
}

/// Trellis - projects, phases and tasks with filterable table and card views.
///
/// Start with `tl seed` for sample data, then `tl tasks` to query it.
#[derive(Parser, Debug)]
#[command(name = "tl")]
#[command(author, version, about = "Track projects, phases and tasks from the terminal", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Database file (defaults to <data-dir>/trellis.db).
    /// Can also be set via TL_DB environment variable.
    #[arg(long = "db", global = true, env = "TL_DB")]
    pub db_path: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project management commands
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Phase management commands
    Phase {
        #[command(subcommand)]
        command: PhaseCommands,
    },

    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Query tasks through the selection and filter pipeline
    Tasks(TasksArgs),

    /// Totals, overdue count and velocity for a set of tasks
    Insights {
        /// Only count tasks of this project
        #[arg(long)]
        project: Option<i64>,

        /// Reference date (YYYY-MM-DD, defaults to the local date)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Create the sample "Website Redesign" project when the store is empty
    Seed,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Interactive terminal interface
    #[cfg(feature = "tui")]
    Tui,
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a new project
    Create {
        /// Project name
        name: String,

        /// Project description
        #[arg(short, long)]
        description: Option<String>,

        /// Where the project lives (local, network)
        #[arg(long)]
        location: Option<String>,

        /// IANA timezone name
        #[arg(long)]
        timezone: Option<String>,
    },

    /// List projects with their phases and progress
    List,
}

/// Phase subcommands
#[derive(Subcommand, Debug)]
pub enum PhaseCommands {
    /// Create a new phase under a project
    Create {
        /// Owning project ID
        project_id: i64,

        /// Phase name
        name: String,

        /// Display order within the project (ascending)
        #[arg(short, long, default_value_t = 0)]
        order: i64,

        /// Phase description
        #[arg(short, long)]
        description: Option<String>,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task
    Create {
        /// Task title
        title: String,

        /// Owning phase ID (an unknown ID leaves the task unassigned)
        #[arg(long)]
        phase: Option<i64>,

        /// Free-form status (e.g. "Started", "Needs sign-off", "Completed")
        #[arg(short, long)]
        status: Option<String>,

        /// Assignee
        #[arg(short, long)]
        assignee: Option<String>,

        /// Priority (1-5, higher is more important)
        #[arg(short, long)]
        priority: Option<u8>,

        /// Start date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Due date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        due: Option<NaiveDate>,

        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,

        /// Comma-separated IDs of related tasks
        #[arg(long, value_delimiter = ',')]
        links: Vec<i64>,

        /// Task requires sign-off before it can close
        #[arg(long)]
        signoff: bool,
    },
}

/// Arguments of `tl tasks`.
#[derive(Args, Debug, Default, Clone)]
pub struct TasksArgs {
    /// Only tasks of this project
    #[arg(long)]
    pub project: Option<i64>,

    /// Only tasks of this phase
    #[arg(long)]
    pub phase: Option<i64>,

    /// Filter panel: status contains
    #[arg(long)]
    pub status: Option<String>,

    /// Filter panel: assignee contains
    #[arg(long)]
    pub assignee: Option<String>,

    /// Filter panel: some tag contains
    #[arg(long)]
    pub tag: Option<String>,

    /// Filter panel: due window (overdue, next_7, next_30)
    #[arg(long)]
    pub due: Option<String>,

    /// Column filter: status contains (overrides --status, even when empty)
    #[arg(long)]
    pub col_status: Option<String>,

    /// Column filter: exact priority
    #[arg(long)]
    pub col_priority: Option<String>,

    /// Column filter: title contains
    #[arg(long)]
    pub col_title: Option<String>,

    /// Column filter: assignee contains (overrides --assignee, even when empty)
    #[arg(long)]
    pub col_assignee: Option<String>,

    /// Column filter: some tag contains (overrides --tag, even when empty)
    #[arg(long)]
    pub col_tags: Option<String>,

    /// Projection to show (table, cards); overrides `default-view`
    #[arg(long, value_parser = parse_view)]
    pub view: Option<ViewMode>,

    /// Terminal width used to lay out cards
    #[arg(long)]
    pub width: Option<u16>,

    /// Minimum width for two card columns; overrides `card-width-threshold`
    #[arg(long)]
    pub card_threshold: Option<u16>,

    /// Reference date (YYYY-MM-DD, defaults to the local date)
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration and where each value came from
    Show,

    /// Write a value to the data-dir config.kdl
    Set {
        /// Config key (output-format, default-view, card-width-threshold, default-priority)
        key: String,

        /// New value
        value: String,
    },
}
