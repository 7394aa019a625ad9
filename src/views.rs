//! Table and card projections of the filtered task set.
//!
//! Both projections are rebuilt from the same filtered rows. Only one is
//! visible at a time; switching modes re-formats the rows already held
//! without filtering again.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::display::TaskDisplay;

/// Text of the single row shown when nothing matches.
pub const NO_RESULTS: &str = "No tasks match the filters.";

/// Badge appended to the tag list of tasks that need sign-off.
pub const SIGNOFF_BADGE: &str = "SIGNOFF";

/// Default minimum width for a two-column card grid.
pub const DEFAULT_CARD_WIDTH_THRESHOLD: u16 = 140;

/// Which projection is visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Table,
    Cards,
}

impl ViewMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "table" => Some(ViewMode::Table),
            "cards" => Some(ViewMode::Cards),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Table => "table",
            ViewMode::Cards => "cards",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Table => ViewMode::Cards,
            ViewMode::Cards => ViewMode::Table,
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Color bucket for a table row's status dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Blue,
    Red,
    Magenta,
    Green,
}

impl StatusColor {
    pub fn for_status(status: &str) -> Self {
        let status = status.to_lowercase();
        if status.contains("start") {
            StatusColor::Blue
        } else if status.contains("blocked") || status.contains("overdue") {
            StatusColor::Red
        } else if status.contains("need") {
            StatusColor::Magenta
        } else {
            StatusColor::Green
        }
    }
}

/// Style class for a card's status dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Started,
    Done,
    Blocked,
    Signoff,
    Open,
}

impl CardStatus {
    pub fn for_status(status: &str) -> Self {
        let status = status.to_lowercase();
        if status.contains("start") {
            CardStatus::Started
        } else if status.contains("done") || status.contains("complete") {
            CardStatus::Done
        } else if status.contains("block") {
            CardStatus::Blocked
        } else if status.contains("need") {
            CardStatus::Signoff
        } else {
            CardStatus::Open
        }
    }
}

/// A formatted task row of the table projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    pub task_id: i64,
    pub due_date: NaiveDate,
    /// Due date is before today
    pub overdue: bool,
    pub priority: u8,
    /// Priority 4 or 5
    pub high_priority: bool,
    pub title: String,
    pub status: String,
    pub status_color: StatusColor,
    pub assignee: String,
    /// Task tags, with the sign-off badge appended when required
    pub tags: Vec<String>,
    pub phase_name: String,
}

/// One row of the table projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableRow {
    /// Starts a run of rows sharing a phase name
    GroupHeader { phase_name: String },
    Task(TaskRow),
    /// The only row when the filtered set is empty
    Placeholder { message: String },
}

/// One card of the card projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub task_id: i64,
    pub title: String,
    /// e.g. `P4`
    pub priority_label: String,
    /// `<project> → <phase>`
    pub breadcrumb: String,
    /// Tags plus the sign-off badge when required
    pub chips: Vec<String>,
    pub assignee: String,
    /// e.g. `Due 2026-03-12`
    pub due_label: String,
    pub overdue: bool,
    pub status: String,
    pub status_class: CardStatus,
}

fn decorated_tags(row: &TaskDisplay) -> Vec<String> {
    let mut tags: Vec<String> = row
        .task
        .tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect();
    if row.task.requires_signoff {
        tags.push(SIGNOFF_BADGE.to_string());
    }
    tags
}

fn task_row(row: &TaskDisplay, today: NaiveDate) -> TaskRow {
    let task = &row.task;
    TaskRow {
        task_id: task.id,
        due_date: task.due_date,
        overdue: task.due_date < today,
        priority: task.priority,
        high_priority: task.priority >= 4,
        title: task.title.clone(),
        status: task.status.clone(),
        status_color: StatusColor::for_status(&task.status),
        assignee: task.assignee.clone(),
        tags: decorated_tags(row),
        phase_name: row.phase_name.clone(),
    }
}

fn table_order(a: &TaskDisplay, b: &TaskDisplay) -> Ordering {
    a.phase_name
        .cmp(&b.phase_name)
        .then_with(|| a.task.due_date.cmp(&b.task.due_date))
}

/// Build the table projection: stable sort by (phase name, due date) with a
/// header row before each phase group, or a single placeholder row.
pub fn build_table(rows: &[TaskDisplay], today: NaiveDate) -> Vec<TableRow> {
    if rows.is_empty() {
        return vec![TableRow::Placeholder {
            message: NO_RESULTS.to_string(),
        }];
    }

    let mut sorted: Vec<&TaskDisplay> = rows.iter().collect();
    sorted.sort_by(|a, b| table_order(a, b));

    let mut table = Vec::with_capacity(sorted.len() * 2);
    let mut current_group: Option<&str> = None;
    for row in sorted {
        if current_group != Some(row.phase_name.as_str()) {
            current_group = Some(row.phase_name.as_str());
            table.push(TableRow::GroupHeader {
                phase_name: row.phase_name.clone(),
            });
        }
        table.push(TableRow::Task(task_row(row, today)));
    }
    table
}

/// Build the card projection: one card per row, in filter order.
pub fn build_cards(rows: &[TaskDisplay], today: NaiveDate) -> Vec<Card> {
    rows.iter()
        .map(|row| {
            let task = &row.task;
            Card {
                task_id: task.id,
                title: task.title.clone(),
                priority_label: format!("P{}", task.priority),
                breadcrumb: format!("{} → {}", row.project_name, row.phase_name),
                chips: decorated_tags(row),
                assignee: task.assignee.clone(),
                due_label: format!("Due {}", task.due_date.format("%Y-%m-%d")),
                overdue: task.due_date < today,
                status: task.status.clone(),
                status_class: CardStatus::for_status(&task.status),
            }
        })
        .collect()
}

/// Number of card columns that fit in `width`.
pub fn card_columns(width: u16, threshold: u16) -> usize {
    if width >= threshold { 2 } else { 1 }
}

/// Receiver of display-ready rows. Implementations render without applying
/// any business logic of their own.
pub trait Renderer {
    fn set_table_rows(&mut self, rows: &[TableRow]);
    fn set_cards(&mut self, cards: &[Card]);
    /// Make the projection for `mode` visible and hide the other.
    fn show(&mut self, mode: ViewMode);
}

/// Keeps both projections in step with one filtered set and one view mode.
#[derive(Debug, Clone)]
pub struct ViewSynchronizer {
    mode: ViewMode,
    filtered: Vec<TaskDisplay>,
    today: NaiveDate,
    table: Vec<TableRow>,
    cards: Vec<Card>,
}

impl ViewSynchronizer {
    pub fn new(mode: ViewMode, today: NaiveDate) -> Self {
        Self {
            mode,
            filtered: Vec::new(),
            today,
            table: build_table(&[], today),
            cards: Vec::new(),
        }
    }

    /// Replace the filtered set and rebuild both projections.
    pub fn sync(&mut self, filtered: Vec<TaskDisplay>, today: NaiveDate) {
        self.filtered = filtered;
        self.today = today;
        self.reformat();
    }

    fn reformat(&mut self) {
        self.table = build_table(&self.filtered, self.today);
        self.cards = build_cards(&self.filtered, self.today);
    }

    /// Flip between table and cards, re-formatting the held rows.
    pub fn toggle(&mut self) -> ViewMode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
        self.reformat();
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn filtered(&self) -> &[TaskDisplay] {
        &self.filtered
    }

    pub fn table(&self) -> &[TableRow] {
        &self.table
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }


    /// Hand both projections to a renderer, then reveal the active one.
    pub fn present<R: Renderer + ?Sized>(&self, renderer: &mut R) {
        renderer.set_table_rows(&self.table);
        renderer.set_cards(&self.cards);
        renderer.show(self.mode);
    }
}
