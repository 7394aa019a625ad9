//! Filter composition.
//!
//! Two independently edited facets feed the task list: the broad filter
//! panel (status, assignee, tags, due window) and the per-column table
//! filters (status, priority, title, assignee, tags). They are merged with
//! the table facet on top, combined with the project/phase selection, and
//! evaluated as a single AND predicate.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::display::TaskDisplay;
use crate::models::DueWindow;
use crate::models::metrics::days_until_due;

/// A recognized filter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    Status,
    Priority,
    Title,
    Assignee,
    Tags,
    DueWindow,
}

impl FilterKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Status => "status",
            FilterKey::Priority => "priority",
            FilterKey::Title => "title",
            FilterKey::Assignee => "assignee",
            FilterKey::Tags => "tags",
            FilterKey::DueWindow => "due_window",
        }
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source of a filter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    /// The filter panel beside the phase list
    Panel,
    /// The input row above the task table
    Table,
}

impl Facet {
    /// Keys this facet is allowed to set.
    pub fn keys(self) -> &'static [FilterKey] {
        match self {
            Facet::Panel => &[
                FilterKey::Status,
                FilterKey::Assignee,
                FilterKey::Tags,
                FilterKey::DueWindow,
            ],
            Facet::Table => &[
                FilterKey::Status,
                FilterKey::Priority,
                FilterKey::Title,
                FilterKey::Assignee,
                FilterKey::Tags,
            ],
        }
    }

    pub fn accepts(self, key: FilterKey) -> bool {
        self.keys().contains(&key)
    }
}

/// Key → value mapping. A key that is present with an empty value still
/// counts as present when sets are overlaid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet(BTreeMap<FilterKey, String>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: FilterKey, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: FilterKey, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    pub fn get(&self, key: FilterKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: FilterKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterKey, &str)> {
        self.0.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// `self` with every entry of `top` written over it.
    pub fn overlay(&self, top: &FilterSet) -> FilterSet {
        let mut merged = self.clone();
        for (key, value) in top.iter() {
            merged.insert(key, value);
        }
        merged
    }

    /// Drop keys the facet does not recognize.
    pub fn restricted_to(self, facet: Facet) -> FilterSet {
        FilterSet(
            self.0
                .into_iter()
                .filter(|(key, _)| {
                    let accepted = facet.accepts(*key);
                    if !accepted {
                        tracing::debug!(key = %key, ?facet, "dropping unrecognized filter key");
                    }
                    accepted
                })
                .collect(),
        )
    }
}

impl<K: Into<String>> FromIterator<(FilterKey, K)> for FilterSet {
    fn from_iter<I: IntoIterator<Item = (FilterKey, K)>>(iter: I) -> Self {
        FilterSet(iter.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Fully merged, normalized predicate ready for evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveFilter {
    pub project_id: Option<i64>,
    pub phase_id: Option<i64>,
    /// Lowercased; empty means "no constraint"
    pub status: String,
    /// Compared verbatim against the priority's string form
    pub priority: String,
    pub title: String,
    pub assignee: String,
    pub tags: String,
    pub due_window: Option<DueWindow>,
}

impl EffectiveFilter {
    /// Normalize a merged filter set together with the current selection.
    pub fn new(set: &FilterSet, project_id: Option<i64>, phase_id: Option<i64>) -> Self {
        let lowered = |key| set.get(key).unwrap_or("").trim().to_lowercase();
        Self {
            project_id,
            phase_id,
            status: lowered(FilterKey::Status),
            priority: set.get(FilterKey::Priority).unwrap_or("").trim().to_string(),
            title: lowered(FilterKey::Title),
            assignee: lowered(FilterKey::Assignee),
            tags: lowered(FilterKey::Tags),
            due_window: set.get(FilterKey::DueWindow).and_then(DueWindow::parse),
        }
    }

    /// Evaluate the predicate against one row. Clauses short-circuit in order.
    pub fn matches(&self, row: &TaskDisplay, today: NaiveDate) -> bool {
        let task = &row.task;

        if let Some(project_id) = self.project_id {
            if row.project_id != Some(project_id) {
                return false;
            }
        }
        if let Some(phase_id) = self.phase_id {
            if task.phase_id != Some(phase_id) {
                return false;
            }
        }
        if !self.status.is_empty() && !task.status.to_lowercase().contains(&self.status) {
            return false;
        }
        if !self.priority.is_empty() && task.priority.to_string() != self.priority {
            return false;
        }
        if !self.title.is_empty() && !task.title.to_lowercase().contains(&self.title) {
            return false;
        }
        if !self.assignee.is_empty() && !task.assignee.to_lowercase().contains(&self.assignee) {
            return false;
        }
        if !self.tags.is_empty()
            && !task
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&self.tags))
        {
            return false;
        }
        if let Some(window) = self.due_window {
            if !window.contains(days_until_due(task, today)) {
                return false;
            }
        }
        true
    }
}

/// Selection state plus both filter facets.
#[derive(Debug, Clone, Default)]
pub struct FilterComposer {
    selected_project_id: Option<i64>,
    selected_phase_id: Option<i64>,
    panel_filters: FilterSet,
    table_filters: FilterSet,
}

impl FilterComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select (or clear) the active project. Always clears the phase selection.
    pub fn select_project(&mut self, project_id: Option<i64>) {
        self.selected_project_id = project_id;
        self.selected_phase_id = None;
    }

    pub fn select_phase(&mut self, phase_id: Option<i64>) {
        self.selected_phase_id = phase_id;
    }

    pub fn selected_project(&self) -> Option<i64> {
        self.selected_project_id
    }

    pub fn selected_phase(&self) -> Option<i64> {
        self.selected_phase_id
    }

    /// Replace the panel facet. Keys the panel does not own are dropped.
    pub fn set_panel_filters(&mut self, filters: FilterSet) {
        self.panel_filters = filters.restricted_to(Facet::Panel);
    }

    /// Replace the table facet. Keys the table does not own are dropped.
    pub fn set_table_filters(&mut self, filters: FilterSet) {
        self.table_filters = filters.restricted_to(Facet::Table);
    }

    pub fn panel_filters(&self) -> &FilterSet {
        &self.panel_filters
    }

    pub fn table_filters(&self) -> &FilterSet {
        &self.table_filters
    }

    /// Panel filters overlaid with table filters; the table wins on shared keys.
    pub fn merged(&self) -> FilterSet {
        self.panel_filters.overlay(&self.table_filters)
    }

    pub fn effective(&self) -> EffectiveFilter {
        EffectiveFilter::new(
            &self.merged(),
            self.selected_project_id,
            self.selected_phase_id,
        )
    }

    /// Order-preserving subsequence of `rows` matching the effective filter.
    pub fn apply(&self, rows: &[TaskDisplay], today: NaiveDate) -> Vec<TaskDisplay> {
        let filter = self.effective();
        rows.iter()
            .filter(|row| filter.matches(row, today))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::build_display_rows;
    use crate::hierarchy::Hierarchy;
    use crate::models::{NewPhase, NewProject, NewTask};
    use crate::test_utils::{day, today};

    fn rows() -> Vec<TaskDisplay> {
        let mut hierarchy = Hierarchy::new();
        let web = hierarchy.create_project(NewProject::new("Web")).unwrap();
        let ops = hierarchy.create_project(NewProject::new("Ops")).unwrap();
        let design = hierarchy.create_phase(NewPhase::new(web.id, "Design")).unwrap();
        let build = hierarchy.create_phase(NewPhase::new(web.id, "Build")).unwrap();
        let deploy = hierarchy.create_phase(NewPhase::new(ops.id, "Deploy")).unwrap();

        let fixtures = [
            ("Sketch login", "Started", "Ada", 4, vec!["ui", "Auth"], -2, Some(design.id)),
            ("Build API", "Blocked", "Sam", 3, vec!["backend"], 3, Some(build.id)),
            ("Ship release", "Completed", "Riley", 5, vec!["release"], 20, Some(deploy.id)),
            ("Stray note", "Assigned", "Unassigned", 1, vec![], 0, Some(999)),
        ];
        for (title, status, assignee, priority, tags, due, phase_id) in fixtures {
            let mut new = NewTask::new(title, today());
            new.status = status.to_string();
            new.assignee = assignee.to_string();
            new.priority = priority;
            new.tags = tags.into_iter().map(String::from).collect();
            new.due_date = day(due);
            new.phase_id = phase_id;
            hierarchy.create_task(new).unwrap();
        }
        build_display_rows(&hierarchy.load_hierarchy(), &hierarchy.all_tasks())
    }

    fn titles(rows: &[TaskDisplay]) -> Vec<&str> {
        rows.iter().map(|r| r.task.title.as_str()).collect()
    }

    #[test]
    fn test_no_filters_keeps_everything_in_order() {
        let composer = FilterComposer::new();
        let rows = rows();
        assert_eq!(composer.apply(&rows, today()), rows);
    }

    #[test]
    fn test_select_project_clears_phase() {
        let mut composer = FilterComposer::new();
        composer.select_project(Some(1));
        composer.select_phase(Some(2));
        composer.select_project(Some(2));
        assert_eq!(composer.selected_phase(), None);

        composer.select_phase(Some(3));
        composer.select_project(None);
        assert_eq!(composer.selected_phase(), None);
    }

    #[test]
    fn test_project_and_phase_selection() {
        let rows = rows();
        let mut composer = FilterComposer::new();
        composer.select_project(Some(1));
        assert_eq!(titles(&composer.apply(&rows, today())), vec!["Sketch login", "Build API"]);

        composer.select_phase(Some(2));
        assert_eq!(titles(&composer.apply(&rows, today())), vec!["Build API"]);
    }

    #[test]
    fn test_orphan_excluded_only_when_project_selected() {
        let rows = rows();
        let mut composer = FilterComposer::new();
        assert!(titles(&composer.apply(&rows, today())).contains(&"Stray note"));

        composer.select_project(Some(2));
        assert!(!titles(&composer.apply(&rows, today())).contains(&"Stray note"));
    }

    #[test]
    fn test_table_overrides_panel_on_shared_key() {
        let rows = rows();
        let mut composer = FilterComposer::new();
        composer.set_panel_filters(FilterSet::new().with(FilterKey::Status, "blocked"));
        composer.set_table_filters(FilterSet::new().with(FilterKey::Status, "start"));

        assert_eq!(composer.merged().get(FilterKey::Status), Some("start"));
        assert_eq!(titles(&composer.apply(&rows, today())), vec!["Sketch login"]);
    }

    #[test]
    fn test_present_but_empty_table_key_clears_panel_value() {
        let rows = rows();
        let mut composer = FilterComposer::new();
        composer.set_panel_filters(FilterSet::new().with(FilterKey::Assignee, "ada"));
        assert_eq!(composer.apply(&rows, today()).len(), 1);

        composer.set_table_filters(FilterSet::new().with(FilterKey::Assignee, ""));
        assert_eq!(composer.apply(&rows, today()).len(), rows.len());
    }

    #[test]
    fn test_facets_drop_unrecognized_keys() {
        let mut composer = FilterComposer::new();
        composer.set_panel_filters(
            FilterSet::new()
                .with(FilterKey::Priority, "5")
                .with(FilterKey::Tags, "ui"),
        );
        composer.set_table_filters(FilterSet::new().with(FilterKey::DueWindow, "overdue"));

        assert!(!composer.panel_filters().contains(FilterKey::Priority));
        assert!(composer.panel_filters().contains(FilterKey::Tags));
        assert!(composer.table_filters().is_empty());
    }

    #[test]
    fn test_text_clauses_are_case_insensitive_substrings() {
        let rows = rows();
        let mut composer = FilterComposer::new();

        composer.set_table_filters(FilterSet::new().with(FilterKey::Title, "  LOGIN "));
        assert_eq!(titles(&composer.apply(&rows, today())), vec!["Sketch login"]);

        composer.set_table_filters(FilterSet::new().with(FilterKey::Assignee, "RIL"));
        assert_eq!(titles(&composer.apply(&rows, today())), vec!["Ship release"]);

        composer.set_table_filters(FilterSet::new().with(FilterKey::Tags, "auth"));
        assert_eq!(titles(&composer.apply(&rows, today())), vec!["Sketch login"]);

        composer.set_table_filters(FilterSet::new().with(FilterKey::Tags, "end"));
        assert_eq!(titles(&composer.apply(&rows, today())), vec!["Build API"]);
    }

    #[test]
    fn test_priority_is_string_equality() {
        let rows = rows();
        let mut composer = FilterComposer::new();
        composer.set_table_filters(FilterSet::new().with(FilterKey::Priority, "3"));
        assert_eq!(titles(&composer.apply(&rows, today())), vec!["Build API"]);

        composer.set_table_filters(FilterSet::new().with(FilterKey::Priority, "03"));
        assert!(composer.apply(&rows, today()).is_empty());
    }

    #[test]
    fn test_due_windows() {
        let rows = rows();
        let mut composer = FilterComposer::new();

        composer.set_panel_filters(FilterSet::new().with(FilterKey::DueWindow, "overdue"));
        assert_eq!(titles(&composer.apply(&rows, today())), vec!["Sketch login"]);

        composer.set_panel_filters(FilterSet::new().with(FilterKey::DueWindow, "next_7"));
        assert_eq!(titles(&composer.apply(&rows, today())), vec!["Build API", "Stray note"]);

        composer.set_panel_filters(FilterSet::new().with(FilterKey::DueWindow, "next_30"));
        assert_eq!(
            titles(&composer.apply(&rows, today())),
            vec!["Build API", "Ship release", "Stray note"]
        );

        composer.set_panel_filters(FilterSet::new().with(FilterKey::DueWindow, "someday"));
        assert_eq!(composer.apply(&rows, today()).len(), rows.len());
    }

    #[test]
    fn test_clauses_combine_with_and() {
        let rows = rows();
        let mut composer = FilterComposer::new();
        composer.set_panel_filters(
            FilterSet::new()
                .with(FilterKey::Tags, "ui")
                .with(FilterKey::DueWindow, "next_7"),
        );
        assert!(composer.apply(&rows, today()).is_empty());
    }
}
