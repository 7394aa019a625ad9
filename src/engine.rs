//! The query pipeline tying the hierarchy, filters and views together.
//!
//! A [`Workbench`] holds the latest hierarchy and task snapshots. Any change
//! runs the same pipeline: rebuild the display join, re-apply the composed
//! filter, then re-format both projections. Only the active projection is
//! shown by a [`Renderer`].
//!
//! Loads are split in two halves so callers can run them concurrently:
//! [`Workbench::begin_load`] issues a ticket, and applying a result whose
//! ticket has been superseded by a newer load of the same kind is a no-op.

use chrono::NaiveDate;

use crate::display::{TaskDisplay, build_display_rows};
use crate::filter::{FilterComposer, FilterSet};
use crate::models::{Insights, NewPhase, NewProject, NewTask, Phase, Project, Task};
use crate::storage::Persistence;
use crate::views::{Renderer, ViewMode, ViewSynchronizer};
use crate::{Error, Result};

/// Which snapshot a load refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Hierarchy,
    Tasks,
}

/// Proof of a started load. Only the newest ticket per kind is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    kind: LoadKind,
    generation: u64,
}

impl LoadTicket {
    pub fn kind(&self) -> LoadKind {
        self.kind
    }
}

/// A record the user asked to create. The engine never persists on its own;
/// the caller forwards it to [`Workbench::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateRequest {
    Project(NewProject),
    Phase(NewPhase),
    Task(NewTask),
}

/// Events raised by a presentation front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    ProjectSelected(Option<i64>),
    PhaseSelected(Option<i64>),
    PanelFiltersChanged(FilterSet),
    TableFiltersChanged(FilterSet),
    ToggleView,
    CreateRequested(CreateRequest),
}

/// What a successful [`Workbench::submit`] created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Created {
    Project(Project),
    Phase(Phase),
    Task(Task),
}

/// Outcome of [`Workbench::submit`] once the store accepted the record.
#[derive(Debug)]
pub struct Submitted {
    pub created: Created,
    /// Set when the record was saved but the follow-up reload failed.
    /// Retrying the create would duplicate it; retry the reload instead.
    pub reload_error: Option<Error>,
}

/// In-memory state of the task query engine.
#[derive(Debug, Clone)]
pub struct Workbench {
    hierarchy: Vec<Project>,
    tasks: Vec<Task>,
    rows: Vec<TaskDisplay>,
    composer: FilterComposer,
    views: ViewSynchronizer,
    today: NaiveDate,
    hierarchy_generation: u64,
    tasks_generation: u64,
}

impl Workbench {
    pub fn new(today: NaiveDate) -> Self {
        Self::with_mode(ViewMode::default(), today)
    }

    pub fn with_mode(mode: ViewMode, today: NaiveDate) -> Self {
        Self {
            hierarchy: Vec::new(),
            tasks: Vec::new(),
            rows: Vec::new(),
            composer: FilterComposer::new(),
            views: ViewSynchronizer::new(mode, today),
            today,
            hierarchy_generation: 0,
            tasks_generation: 0,
        }
    }

    // === Loading ===

    /// Start a load of `kind`, superseding any load of that kind in flight.
    pub fn begin_load(&mut self, kind: LoadKind) -> LoadTicket {
        let generation = match kind {
            LoadKind::Hierarchy => {
                self.hierarchy_generation += 1;
                self.hierarchy_generation
            }
            LoadKind::Tasks => {
                self.tasks_generation += 1;
                self.tasks_generation
            }
        };
        LoadTicket { kind, generation }
    }

    fn is_current(&self, ticket: LoadTicket) -> bool {
        let latest = match ticket.kind {
            LoadKind::Hierarchy => self.hierarchy_generation,
            LoadKind::Tasks => self.tasks_generation,
        };
        ticket.generation == latest
    }

    /// Apply a hierarchy load.
    ///
    /// Returns `Ok(false)` when the ticket is stale. On error the previous
    /// snapshot is kept and the error is returned.
    pub fn apply_hierarchy(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Project>>,
    ) -> Result<bool> {
        if ticket.kind != LoadKind::Hierarchy || !self.is_current(ticket) {
            tracing::debug!(generation = ticket.generation, "discarding stale hierarchy load");
            return Ok(false);
        }
        match result {
            Ok(mut hierarchy) => {
                for project in &mut hierarchy {
                    project.sort_phases();
                }
                tracing::debug!(projects = hierarchy.len(), "applied hierarchy load");
                self.hierarchy = hierarchy;
                self.rebuild();
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "hierarchy load failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Apply a task load. Same contract as [`Workbench::apply_hierarchy`].
    pub fn apply_tasks(&mut self, ticket: LoadTicket, result: Result<Vec<Task>>) -> Result<bool> {
        if ticket.kind != LoadKind::Tasks || !self.is_current(ticket) {
            tracing::debug!(generation = ticket.generation, "discarding stale task load");
            return Ok(false);
        }
        match result {
            Ok(tasks) => {
                tracing::debug!(tasks = tasks.len(), "applied task load");
                self.tasks = tasks;
                self.rebuild();
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "task load failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Reload both snapshots concurrently.
    ///
    /// Each half is applied independently; the first failure is returned
    /// after both have been handled.
    pub async fn refresh(&mut self, store: &dyn Persistence) -> Result<()> {
        let hierarchy_ticket = self.begin_load(LoadKind::Hierarchy);
        let tasks_ticket = self.begin_load(LoadKind::Tasks);

        let (hierarchy, tasks) =
            tokio::join!(store.load_full_hierarchy(), store.load_all_tasks());

        let hierarchy = self.apply_hierarchy(hierarchy_ticket, hierarchy);
        let tasks = self.apply_tasks(tasks_ticket, tasks);
        hierarchy?;
        tasks?;
        Ok(())
    }

    // === Creation ===

    /// Persist a creation request, then reload.
    ///
    /// Nothing in memory changes when the store rejects the request. Once
    /// the store accepts it the call succeeds, even if the reload fails.
    pub async fn submit(
        &mut self,
        store: &dyn Persistence,
        request: CreateRequest,
    ) -> Result<Submitted> {
        let created = match request {
            CreateRequest::Project(new) => Created::Project(store.create_project(new).await?),
            CreateRequest::Phase(new) => Created::Phase(store.create_phase(new).await?),
            CreateRequest::Task(new) => Created::Task(store.create_task(new).await?),
        };
        let reload_error = match self.refresh(store).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, "record saved but reload failed");
                Some(e)
            }
        };
        Ok(Submitted {
            created,
            reload_error,
        })
    }

    // === Events ===

    /// Apply a front-end event.
    ///
    /// Selection and filter changes re-run the pipeline; a view toggle only
    /// re-formats. Creation requests are handed back to the caller.
    pub fn handle(&mut self, event: UiEvent) -> Option<CreateRequest> {
        match event {
            UiEvent::ProjectSelected(project_id) => {
                self.composer.select_project(project_id);
                self.recompute();
            }
            UiEvent::PhaseSelected(phase_id) => {
                self.composer.select_phase(phase_id);
                self.recompute();
            }
            UiEvent::PanelFiltersChanged(filters) => {
                self.composer.set_panel_filters(filters);
                self.recompute();
            }
            UiEvent::TableFiltersChanged(filters) => {
                self.composer.set_table_filters(filters);
                self.recompute();
            }
            UiEvent::ToggleView => {
                self.views.toggle();
            }
            UiEvent::CreateRequested(request) => return Some(request),
        }
        None
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.views.set_mode(mode);
    }

    /// Move the reference date and re-run the pipeline.
    pub fn set_today(&mut self, today: NaiveDate) {
        self.today = today;
        self.recompute();
    }

    // === Pipeline ===

    fn rebuild(&mut self) {
        self.rows = build_display_rows(&self.hierarchy, &self.tasks);
        self.recompute();
    }

    /// Re-apply the composed filter to the joined rows and re-format both
    /// projections.
    pub fn recompute(&mut self) {
        let filtered = self.composer.apply(&self.rows, self.today);
        self.views.sync(filtered, self.today);
    }

    /// Hand the current projections to a renderer.
    pub fn present<R: Renderer + ?Sized>(&self, renderer: &mut R) {
        self.views.present(renderer);
    }

    // === Accessors ===

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn projects(&self) -> &[Project] {
        &self.hierarchy
    }

    pub fn project(&self, id: i64) -> Option<&Project> {
        self.hierarchy.iter().find(|p| p.id == id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Every task joined with its project and phase, in load order.
    pub fn rows(&self) -> &[TaskDisplay] {
        &self.rows
    }

    /// Rows passing the current selection and filters.
    pub fn filtered(&self) -> &[TaskDisplay] {
        self.views.filtered()
    }

    pub fn composer(&self) -> &FilterComposer {
        &self.composer
    }

    pub fn views(&self) -> &ViewSynchronizer {
        &self.views
    }

    pub fn mode(&self) -> ViewMode {
        self.views.mode()
    }

    /// Phases selectable under the current project selection.
    pub fn phases_in_scope(&self) -> Vec<&Phase> {
        let selected = self.composer.selected_project();
        self.hierarchy
            .iter()
            .filter(|p| selected.is_none_or(|id| p.id == id))
            .flat_map(|p| p.phases.iter())
            .collect()
    }

    /// Summary figures over the filtered set.
    pub fn insights(&self) -> Insights {
        Insights::compute(self.filtered().iter().map(|row| &row.task), self.today)
    }
}
