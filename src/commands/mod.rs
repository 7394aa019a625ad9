//! Command implementations for the Trellis CLI.
//!
//! Each command talks to storage through [`Persistence`] and returns a
//! result type implementing [`Output`], which `main` prints as JSON or as
//! human-readable text.

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::cli::TasksArgs;
use crate::config::{
    ResolvedConfig, TrellisConfig, ValueSource, data_config_path, system_config_path,
};
use crate::engine::{CreateRequest, Created, UiEvent, Workbench};
use crate::filter::{FilterKey, FilterSet};
use crate::models::{
    Insights, NewPhase, NewProject, NewTask, Project, ProjectLocation, split_list,
};
use crate::storage::Persistence;
use crate::views::{Card, Renderer, StatusColor, TableRow, ViewMode, card_columns};
use crate::{Error, Result};

/// Width assumed for card layout when `--width` is not given.
pub const DEFAULT_WIDTH: u16 = 80;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    fn to_json(&self) -> String;
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

/// The local calendar date.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Persist a creation request through the engine.
///
/// Once the store accepts the record this succeeds even if the follow-up
/// reload fails; the engine logs that failure.
async fn submit(store: &dyn Persistence, request: CreateRequest) -> Result<Created> {
    let mut bench = Workbench::new(local_today());
    let submitted = bench.submit(store, request).await?;
    Ok(submitted.created)
}

/// Result of any `create` subcommand.
#[derive(Serialize)]
#[serde(untagged)]
pub enum CreateResult {
    Project(ProjectCreated),
    Phase(PhaseCreated),
    Task(TaskCreated),
}

impl CreateResult {
    pub fn id(&self) -> i64 {
        match self {
            CreateResult::Project(project) => project.id,
            CreateResult::Phase(phase) => phase.id,
            CreateResult::Task(task) => task.id,
        }
    }
}

impl From<Created> for CreateResult {
    fn from(created: Created) -> Self {
        match created {
            Created::Project(project) => CreateResult::Project(ProjectCreated {
                id: project.id,
                name: project.name,
            }),
            Created::Phase(phase) => CreateResult::Phase(PhaseCreated {
                id: phase.id,
                project_id: phase.project_id,
                name: phase.name,
            }),
            Created::Task(task) => CreateResult::Task(TaskCreated {
                id: task.id,
                title: task.title,
                phase_id: task.phase_id,
            }),
        }
    }
}

impl Output for CreateResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match self {
            CreateResult::Project(project) => project.to_human(),
            CreateResult::Phase(phase) => phase.to_human(),
            CreateResult::Task(task) => task.to_human(),
        }
    }
}

// === Projects ===

#[derive(Serialize)]
pub struct ProjectCreated {
    pub id: i64,
    pub name: String,
}

impl Output for ProjectCreated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Created project {} \"{}\"", self.id, self.name)
    }
}

/// Create a new project.
pub async fn project_create(
    store: &dyn Persistence,
    name: String,
    description: Option<String>,
    location: Option<String>,
    timezone: Option<String>,
) -> Result<CreateResult> {
    let mut new = NewProject::new(name);
    if let Some(description) = description {
        new = new.with_description(description);
    }
    if let Some(location) = location {
        new.location = ProjectLocation::parse(&location).ok_or_else(|| {
            Error::Validation(format!(
                "invalid location '{}', expected local or network",
                location
            ))
        })?;
    }
    if let Some(timezone) = timezone {
        new.timezone = timezone;
    }

    Ok(submit(store, CreateRequest::Project(new)).await?.into())
}

#[derive(Serialize)]
pub struct PhaseSummary {
    pub id: i64,
    pub name: String,
    pub order: i64,
    pub tasks: usize,
    pub progress: u8,
}

#[derive(Serialize)]
pub struct ProjectSummary {
    pub id: i64,
    pub name: String,
    pub location: ProjectLocation,
    pub timezone: String,
    pub description: String,
    pub progress: u8,
    pub phases: Vec<PhaseSummary>,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            location: project.location,
            timezone: project.timezone.clone(),
            description: project.description.clone(),
            progress: project.progress(),
            phases: project
                .phases
                .iter()
                .map(|phase| PhaseSummary {
                    id: phase.id,
                    name: phase.name.clone(),
                    order: phase.order,
                    tasks: phase.tasks.len(),
                    progress: phase.progress(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ProjectList {
    pub projects: Vec<ProjectSummary>,
    pub count: usize,
}

impl Output for ProjectList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.projects.is_empty() {
            return "No projects.".to_string();
        }
        let mut lines = Vec::new();
        for project in &self.projects {
            lines.push(format!(
                "[{}] {} ({}%) {} {}",
                project.id, project.name, project.progress, project.location, project.timezone
            ));
            if !project.description.is_empty() {
                lines.push(format!("    {}", project.description));
            }
            for phase in &project.phases {
                lines.push(format!(
                    "  [{}] {} - {} task(s), {}%",
                    phase.id, phase.name, phase.tasks, phase.progress
                ));
            }
        }
        lines.join("\n")
    }
}

/// List every project with its phases and progress.
pub async fn project_list(store: &dyn Persistence) -> Result<ProjectList> {
    let mut projects = store.load_full_hierarchy().await?;
    for project in &mut projects {
        project.sort_phases();
    }
    let projects: Vec<ProjectSummary> = projects.iter().map(ProjectSummary::from).collect();
    Ok(ProjectList {
        count: projects.len(),
        projects,
    })
}

// === Phases ===

#[derive(Serialize)]
pub struct PhaseCreated {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
}

impl Output for PhaseCreated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Created phase {} \"{}\" in project {}",
            self.id, self.name, self.project_id
        )
    }
}

/// Create a new phase under an existing project.
pub async fn phase_create(
    store: &dyn Persistence,
    project_id: i64,
    name: String,
    order: i64,
    description: Option<String>,
) -> Result<CreateResult> {
    let mut new = NewPhase::new(project_id, name).with_order(order);
    if let Some(description) = description {
        new.description = description;
    }
    Ok(submit(store, CreateRequest::Phase(new)).await?.into())
}

// === Tasks ===

#[derive(Serialize)]
pub struct TaskCreated {
    pub id: i64,
    pub title: String,
    pub phase_id: Option<i64>,
}

impl Output for TaskCreated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match self.phase_id {
            Some(phase_id) => format!(
                "Created task {} \"{}\" in phase {}",
                self.id, self.title, phase_id
            ),
            None => format!("Created task {} \"{}\"", self.id, self.title),
        }
    }
}

/// Fields of `tl task create` beyond the title.
#[derive(Debug, Clone, Default)]
pub struct TaskFields {
    pub phase_id: Option<i64>,
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<u8>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tags: Option<String>,
    pub links: Vec<i64>,
    pub requires_signoff: bool,
}

/// Create a new task. Omitted fields take their defaults; the priority
/// default comes from configuration.
pub async fn task_create(
    store: &dyn Persistence,
    config: &ResolvedConfig,
    title: String,
    fields: TaskFields,
    today: NaiveDate,
) -> Result<CreateResult> {
    let mut new = NewTask::new(title, today);
    new.priority = fields.priority.unwrap_or(config.default_priority());
    new.phase_id = fields.phase_id;
    if let Some(status) = fields.status {
        new.status = status;
    }
    if let Some(assignee) = fields.assignee {
        new.assignee = assignee;
    }
    if let Some(start) = fields.start_date {
        new.start_date = start;
    }
    if let Some(due) = fields.due_date {
        new.due_date = due;
    }
    if let Some(tags) = fields.tags {
        new.tags = split_list(&tags);
    }
    new.links = fields.links;
    new.requires_signoff = fields.requires_signoff;

    Ok(submit(store, CreateRequest::Task(new)).await?.into())
}

/// Result of `tl tasks`: the visible projection of the filtered set.
///
/// Filled through the [`Renderer`] interface, so it receives exactly what
/// any other front end would.
#[derive(Debug, Serialize)]
pub struct TaskQuery {
    pub view: ViewMode,
    pub today: NaiveDate,
    pub count: usize,
    /// Card grid columns for the requested width
    pub columns: usize,
    #[serde(skip)]
    pub width: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<TableRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cards: Vec<Card>,
    #[serde(skip)]
    table_rows: Vec<TableRow>,
    #[serde(skip)]
    all_cards: Vec<Card>,
}

impl TaskQuery {
    fn new(today: NaiveDate, width: u16, columns: usize) -> Self {
        Self {
            view: ViewMode::default(),
            today,
            count: 0,
            columns,
            width,
            rows: Vec::new(),
            cards: Vec::new(),
            table_rows: Vec::new(),
            all_cards: Vec::new(),
        }
    }
}

impl Renderer for TaskQuery {
    fn set_table_rows(&mut self, rows: &[TableRow]) {
        self.table_rows = rows.to_vec();
    }

    fn set_cards(&mut self, cards: &[Card]) {
        self.all_cards = cards.to_vec();
    }

    fn show(&mut self, mode: ViewMode) {
        self.view = mode;
        self.count = self.all_cards.len();
        match mode {
            ViewMode::Table => {
                self.rows = self.table_rows.clone();
                self.cards.clear();
            }
            ViewMode::Cards => {
                self.cards = self.all_cards.clone();
                self.rows.clear();
            }
        }
    }
}

fn status_marker(color: StatusColor) -> &'static str {
    match color {
        StatusColor::Blue => "~",
        StatusColor::Red => "!",
        StatusColor::Magenta => "?",
        StatusColor::Green => "-",
    }
}

fn table_lines(rows: &[TableRow]) -> Vec<String> {
    rows.iter()
        .map(|row| match row {
            TableRow::GroupHeader { phase_name } => format!("// {}", phase_name),
            TableRow::Placeholder { message } => message.clone(),
            TableRow::Task(task) => {
                let due = if task.overdue {
                    format!("{}!", task.due_date)
                } else {
                    format!("{} ", task.due_date)
                };
                let priority = if task.high_priority {
                    format!("P{}*", task.priority)
                } else {
                    format!("P{} ", task.priority)
                };
                let mut line = format!(
                    "  [{}] {} {} {} {} {} @{}",
                    task.task_id,
                    due,
                    priority,
                    status_marker(task.status_color),
                    task.title,
                    task.status,
                    task.assignee
                );
                if !task.tags.is_empty() {
                    line.push_str(&format!(" [{}]", task.tags.join(", ")));
                }
                line
            }
        })
        .collect()
}

fn card_lines(card: &Card) -> Vec<String> {
    let due = if card.overdue {
        format!("{} (overdue)", card.due_label)
    } else {
        card.due_label.clone()
    };
    vec![
        format!("[{}] {} #{}", card.priority_label, card.title, card.task_id),
        card.breadcrumb.clone(),
        if card.chips.is_empty() {
            "-".to_string()
        } else {
            card.chips.join(" ")
        },
        format!("{} | {}", card.assignee, due),
        format!("{} ({:?})", card.status, card.status_class).to_lowercase(),
    ]
}

fn card_grid(cards: &[Card], columns: usize, width: u16) -> Vec<String> {
    let columns = columns.max(1);
    let cell = (width as usize / columns).saturating_sub(2).max(20);
    let mut lines = Vec::new();
    for chunk in cards.chunks(columns) {
        let blocks: Vec<Vec<String>> = chunk.iter().map(card_lines).collect();
        let height = blocks.iter().map(Vec::len).max().unwrap_or(0);
        for i in 0..height {
            let parts: Vec<String> = blocks
                .iter()
                .map(|block| {
                    let text = block.get(i).map(String::as_str).unwrap_or("");
                    format!("{:<cell$}", text, cell = cell)
                })
                .collect();
            lines.push(parts.join("  ").trim_end().to_string());
        }
        lines.push(String::new());
    }
    if lines.is_empty() {
        lines.push(crate::views::NO_RESULTS.to_string());
    }
    lines
}

impl Output for TaskQuery {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let lines = match self.view {
            ViewMode::Table => table_lines(&self.rows),
            ViewMode::Cards => card_grid(&self.cards, self.columns, self.width),
        };
        lines.join("\n").trim_end().to_string()
    }
}

fn panel_filters(args: &TasksArgs) -> FilterSet {
    [
        (FilterKey::Status, &args.status),
        (FilterKey::Assignee, &args.assignee),
        (FilterKey::Tags, &args.tag),
        (FilterKey::DueWindow, &args.due),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_ref().map(|v| (key, v.clone())))
    .collect()
}

fn table_filters(args: &TasksArgs) -> FilterSet {
    [
        (FilterKey::Status, &args.col_status),
        (FilterKey::Priority, &args.col_priority),
        (FilterKey::Title, &args.col_title),
        (FilterKey::Assignee, &args.col_assignee),
        (FilterKey::Tags, &args.col_tags),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_ref().map(|v| (key, v.clone())))
    .collect()
}

/// Load a workbench and apply the selection given on the command line.
async fn load_workbench(
    store: &dyn Persistence,
    mode: ViewMode,
    today: NaiveDate,
    project: Option<i64>,
    phase: Option<i64>,
) -> Result<Workbench> {
    let mut bench = Workbench::with_mode(mode, today);
    bench.refresh(store).await?;
    if project.is_some() {
        bench.handle(UiEvent::ProjectSelected(project));
    }
    if phase.is_some() {
        bench.handle(UiEvent::PhaseSelected(phase));
    }
    Ok(bench)
}

/// Run the selection and filter pipeline and return the visible projection.
///
/// `--view` and `--card-threshold` reach this through `config` as CLI
/// overrides.
pub async fn tasks(
    store: &dyn Persistence,
    config: &ResolvedConfig,
    args: &TasksArgs,
) -> Result<TaskQuery> {
    let mode = config.default_view();
    let today = args.today.unwrap_or_else(local_today);

    let mut bench = load_workbench(store, mode, today, args.project, args.phase).await?;
    bench.handle(UiEvent::PanelFiltersChanged(panel_filters(args)));
    bench.handle(UiEvent::TableFiltersChanged(table_filters(args)));

    let width = args.width.unwrap_or(DEFAULT_WIDTH);
    let mut query = TaskQuery::new(
        today,
        width,
        card_columns(width, config.card_width_threshold()),
    );
    bench.present(&mut query);
    Ok(query)
}

// === Insights ===

#[derive(Serialize)]
pub struct InsightsResult {
    pub project_id: Option<i64>,
    pub today: NaiveDate,
    #[serde(flatten)]
    pub insights: Insights,
    /// Completion percentage
    pub completion: u8,
}

impl Output for InsightsResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let i = &self.insights;
        [
            format!("Total:     {}", i.total),
            format!("Completed: {} ({}%)", i.completed, self.completion),
            format!("Open:      {}", i.open),
            format!("Overdue:   {}", i.overdue),
            format!(
                "Velocity:  {} pts ({:.1} avg)",
                i.velocity, i.average_velocity
            ),
        ]
        .join("\n")
    }
}

/// Summary figures over every task, or over one project's tasks.
pub async fn insights(
    store: &dyn Persistence,
    project: Option<i64>,
    today: Option<NaiveDate>,
) -> Result<InsightsResult> {
    let today = today.unwrap_or_else(local_today);
    let bench = load_workbench(store, ViewMode::Table, today, project, None).await?;
    let insights = bench.insights();
    Ok(InsightsResult {
        project_id: project,
        today,
        completion: insights.completion(),
        insights,
    })
}

// === Seed ===

#[derive(Serialize)]
pub struct SeedResult {
    pub seeded: bool,
    pub project_id: Option<i64>,
    pub phases: usize,
    pub tasks: usize,
}

impl Output for SeedResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match self.project_id {
            Some(id) if self.seeded => format!(
                "Seeded project {} with {} phases and {} tasks",
                id, self.phases, self.tasks
            ),
            _ => "Store already has data; nothing seeded".to_string(),
        }
    }
}

struct SampleTask {
    title: &'static str,
    status: &'static str,
    assignee: &'static str,
    priority: u8,
    tags: &'static str,
    requires_signoff: bool,
    due_in: u64,
    phase: usize,
}

const SAMPLE_TASKS: [SampleTask; 4] = [
    SampleTask {
        title: "Ship MVP login flow",
        status: "Started",
        assignee: "Ada",
        priority: 4,
        tags: "auth,ui",
        requires_signoff: true,
        due_in: 2,
        phase: 1,
    },
    SampleTask {
        title: "Set up Pi-hosted instance",
        status: "Assigned",
        assignee: "Sam",
        priority: 3,
        tags: "hosting,infra",
        requires_signoff: false,
        due_in: 5,
        phase: 1,
    },
    SampleTask {
        title: "Draft task card UI",
        status: "Needs sign-off",
        assignee: "Riley",
        priority: 5,
        tags: "design,ui",
        requires_signoff: true,
        due_in: 1,
        phase: 0,
    },
    SampleTask {
        title: "Connect AI key store",
        status: "Not assigned",
        assignee: "Unassigned",
        priority: 2,
        tags: "ai,keys",
        requires_signoff: false,
        due_in: 8,
        phase: 1,
    },
];

/// Create the sample "Website Redesign" hierarchy, unless the store already
/// holds projects or tasks.
pub async fn seed(store: &dyn Persistence, today: NaiveDate) -> Result<SeedResult> {
    let (projects, tasks) = tokio::join!(store.load_full_hierarchy(), store.load_all_tasks());
    if !projects?.is_empty() || !tasks?.is_empty() {
        return Ok(SeedResult {
            seeded: false,
            project_id: None,
            phases: 0,
            tasks: 0,
        });
    }

    let project = store
        .create_project(
            NewProject::new("Website Redesign")
                .with_description("Overhaul of the main corporate website."),
        )
        .await?;

    let mut phase_ids = Vec::new();
    for (order, (name, description)) in [
        ("Planning", "Requirements gathering"),
        ("Development", "Coding and implementation"),
        ("Testing", "QA and UAT"),
    ]
    .into_iter()
    .enumerate()
    {
        let mut new = NewPhase::new(project.id, name).with_order(order as i64 + 1);
        new.description = description.to_string();
        phase_ids.push(store.create_phase(new).await?.id);
    }

    for sample in &SAMPLE_TASKS {
        let mut new = NewTask::new(sample.title, today);
        new.status = sample.status.to_string();
        new.assignee = sample.assignee.to_string();
        new.priority = sample.priority;
        new.tags = split_list(sample.tags);
        new.requires_signoff = sample.requires_signoff;
        new.due_date = today
            .checked_add_days(chrono::Days::new(sample.due_in))
            .unwrap_or(today);
        new.phase_id = phase_ids.get(sample.phase).copied();
        store.create_task(new).await?;
    }

    tracing::debug!(project_id = project.id, "seeded sample project");
    Ok(SeedResult {
        seeded: true,
        project_id: Some(project.id),
        phases: phase_ids.len(),
        tasks: SAMPLE_TASKS.len(),
    })
}

// === Config ===

#[derive(Serialize)]
pub struct ConfigEntry {
    pub value: String,
    pub source: String,
}

impl ConfigEntry {
    fn new(value: impl ToString, source: ValueSource) -> Self {
        Self {
            value: value.to_string(),
            source: source.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ConfigShow {
    pub system_path: Option<String>,
    pub data_path: String,
    pub output_format: ConfigEntry,
    pub default_view: ConfigEntry,
    pub card_width_threshold: ConfigEntry,
    pub default_priority: ConfigEntry,
}

impl Output for ConfigShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let entry = |key: &str, e: &ConfigEntry| format!("{:<22} {} ({})", key, e.value, e.source);
        [
            entry("output-format", &self.output_format),
            entry("default-view", &self.default_view),
            entry("card-width-threshold", &self.card_width_threshold),
            entry("default-priority", &self.default_priority),
            String::new(),
            format!(
                "system config:   {}",
                self.system_path.as_deref().unwrap_or("(none)")
            ),
            format!("data-dir config: {}", self.data_path),
        ]
        .join("\n")
    }
}

#[derive(Serialize)]
pub struct ConfigSet {
    pub key: String,
    pub value: String,
    pub path: String,
}

impl Output for ConfigSet {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Set {} = {} in {}", self.key, self.value, self.path)
    }
}

/// Write one key to the data-dir config, keeping the other keys.
pub fn config_set(key: &str, value: &str) -> Result<ConfigSet> {
    let path = data_config_path()?;
    let mut config = TrellisConfig::read(&path)?;
    config.set(key, value)?;
    config.write(&path)?;
    tracing::debug!(key, value, path = %path.display(), "wrote config value");
    Ok(ConfigSet {
        key: key.to_string(),
        value: value.trim().to_string(),
        path: path.display().to_string(),
    })
}

/// Describe the resolved configuration and the files it was read from.
pub fn config_show(config: &ResolvedConfig) -> Result<ConfigShow> {
    Ok(ConfigShow {
        system_path: system_config_path().map(|p| p.display().to_string()),
        data_path: data_config_path()?.display().to_string(),
        output_format: ConfigEntry::new(config.output_format(), config.output_format.source),
        default_view: ConfigEntry::new(config.default_view(), config.default_view.source),
        card_width_threshold: ConfigEntry::new(
            config.card_width_threshold(),
            config.card_width_threshold.source,
        ),
        default_priority: ConfigEntry::new(
            config.default_priority(),
            config.default_priority.source,
        ),
    })
}
