//! TUI Application - main event loop and terminal management

use std::io::{self, stdout};
use std::time::Duration;

use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use super::views::Screen;
use crate::commands::local_today;
use crate::config::ResolvedConfig;
use crate::engine::{CreateRequest, UiEvent, Workbench};
use crate::filter::{FilterKey, FilterSet};
use crate::models::{DueWindow, NewTask};
use crate::{Error, Result};
use crate::storage::Persistence;
use crate::views::ViewMode;

/// Due windows cycled by `d`, starting with "no window".
const DUE_CYCLE: [Option<DueWindow>; 4] = [
    None,
    Some(DueWindow::Overdue),
    Some(DueWindow::Next7),
    Some(DueWindow::Next30),
];

struct TuiApp {
    bench: Workbench,
    screen: Screen,
    card_threshold: u16,
    default_priority: u8,
    due_index: usize,
    /// Title being typed after `a`; `None` when not adding a task
    input: Option<String>,
    /// Create request waiting for the event loop to submit it
    pending: Option<CreateRequest>,
    /// Last load or persistence failure, shown until the next success
    error: Option<Error>,
    needs_refresh: bool,
    should_quit: bool,
}

impl TuiApp {
    fn new(config: &ResolvedConfig) -> Self {
        Self {
            bench: Workbench::with_mode(config.default_view(), local_today()),
            screen: Screen::default(),
            card_threshold: config.card_width_threshold(),
            default_priority: config.default_priority(),
            due_index: 0,
            input: None,
            pending: None,
            error: None,
            needs_refresh: true,
            should_quit: false,
        }
    }

    async fn reload(&mut self, store: &dyn Persistence) {
        self.needs_refresh = false;
        match self.bench.refresh(store).await {
            Ok(()) => self.error = None,
            Err(e) => self.error = Some(e),
        }
        self.sync_screen();
    }

    /// Persist a pending request. A failed create leaves the snapshot as it
    /// was; a failed reload after a successful create only asks for a retry
    /// of the reload.
    async fn create(&mut self, store: &dyn Persistence, request: CreateRequest) {
        match self.bench.submit(store, request).await {
            Ok(submitted) => {
                self.needs_refresh = submitted.reload_error.is_some();
                self.error = submitted.reload_error;
            }
            Err(e) => self.error = Some(e),
        }
        self.sync_screen();
    }

    fn sync_screen(&mut self) {
        self.bench.present(&mut self.screen);
    }

    /// Select the next project, wrapping through "all projects".
    fn cycle_project(&mut self) {
        let ids: Vec<i64> = self.bench.projects().iter().map(|p| p.id).collect();
        let next = next_in_cycle(&ids, self.bench.composer().selected_project());
        self.bench.handle(UiEvent::ProjectSelected(next));
    }

    /// Select the next phase of the current scope, wrapping through "all phases".
    fn cycle_phase(&mut self) {
        let ids: Vec<i64> = self.bench.phases_in_scope().iter().map(|p| p.id).collect();
        let next = next_in_cycle(&ids, self.bench.composer().selected_phase());
        self.bench.handle(UiEvent::PhaseSelected(next));
    }

    fn cycle_due_window(&mut self) {
        self.due_index = (self.due_index + 1) % DUE_CYCLE.len();
        let mut panel = FilterSet::new();
        if let Some(window) = DUE_CYCLE[self.due_index] {
            panel.insert(FilterKey::DueWindow, window.as_str());
        }
        self.bench.handle(UiEvent::PanelFiltersChanged(panel));
    }

    /// Turn the typed title into a task in the selected phase.
    fn finish_input(&mut self) {
        let Some(title) = self.input.take() else {
            return;
        };
        if title.trim().is_empty() {
            return;
        }
        let mut new = NewTask::new(title.trim(), self.bench.today());
        new.priority = self.default_priority;
        new.phase_id = self.bench.composer().selected_phase();
        self.pending = self
            .bench
            .handle(UiEvent::CreateRequested(CreateRequest::Task(new)));
    }

    fn handle_input_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Enter => self.finish_input(),
            KeyCode::Esc => self.input = None,
            KeyCode::Backspace => {
                if let Some(text) = self.input.as_mut() {
                    text.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(text) = self.input.as_mut() {
                    text.push(c);
                }
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        if self.input.is_some() {
            self.handle_input_key(key);
            return;
        }
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('t') | KeyCode::Tab => {
                self.bench.handle(UiEvent::ToggleView);
            }
            KeyCode::Char('p') => self.cycle_project(),
            KeyCode::Char('f') => self.cycle_phase(),
            KeyCode::Char('d') => self.cycle_due_window(),
            KeyCode::Char('r') => self.needs_refresh = true,
            KeyCode::Char('a') => self.input = Some(String::new()),
            _ => {}
        }
        self.sync_screen();
    }

    fn scope_label(&self) -> String {
        let project = self
            .bench
            .composer()
            .selected_project()
            .and_then(|id| self.bench.project(id))
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "All projects".to_string());
        let phase = self
            .bench
            .composer()
            .selected_phase()
            .and_then(|id| {
                self.bench
                    .phases_in_scope()
                    .into_iter()
                    .find(|p| p.id == id)
                    .map(|p| p.name.clone())
            })
            .unwrap_or_else(|| "all phases".to_string());
        let due = DUE_CYCLE[self.due_index]
            .map(|w| w.as_str())
            .unwrap_or("any due date");
        format!("{} / {} / {}", project, phase, due)
    }

    fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title bar
                Constraint::Min(5),    // Main content
                Constraint::Length(3), // Status bar
            ])
            .split(frame.area());

        self.render_title_bar(frame, chunks[0]);
        self.screen.render(frame, chunks[1], self.card_threshold);
        self.render_status_bar(frame, chunks[2]);
    }

    fn render_title_bar(&self, frame: &mut Frame, area: Rect) {
        let insights = self.bench.insights();
        let view_name = match self.screen.mode {
            ViewMode::Table => "Table",
            ViewMode::Cards => "Cards",
        };
        let title = Paragraph::new(Line::from(vec![
            Span::styled(format!(" {} ", view_name), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("| {} ", self.scope_label())),
            Span::styled(
                format!(
                    "| {} tasks, {} overdue, {} pts",
                    insights.total, insights.overdue, insights.velocity
                ),
                Style::default().fg(Color::DarkGray),
            ),
        ]))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let status = match (&self.input, &self.error) {
            (Some(text), _) => Paragraph::new(format!(
                " New task: {}_  (Enter to add, Esc to cancel)",
                text
            ))
            .style(Style::default().fg(Color::Yellow)),
            (None, Some(error)) if error.is_transient() => {
                Paragraph::new(format!(" {}  (r to retry)", error))
                    .style(Style::default().fg(Color::Red))
            }
            (None, Some(error)) => {
                Paragraph::new(format!(" {}", error)).style(Style::default().fg(Color::Red))
            }
            (None, None) => Paragraph::new(
                " t:Toggle View  p:Project  f:Phase  d:Due Window  a:Add Task  r:Reload  q:Quit",
            )
            .style(Style::default().fg(Color::DarkGray)),
        };
        frame.render_widget(status.block(Block::default().borders(Borders::ALL)), area);
    }
}

/// Step through `ids` after `current`, with `None` before the first and
/// after the last.
fn next_in_cycle(ids: &[i64], current: Option<i64>) -> Option<i64> {
    match current.and_then(|id| ids.iter().position(|&x| x == id)) {
        None => ids.first().copied(),
        Some(i) => ids.get(i + 1).copied(),
    }
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    Terminal::new(backend)
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

/// Run the TUI until the user quits.
pub async fn run(store: &dyn Persistence, config: &ResolvedConfig) -> Result<()> {
    let mut app = TuiApp::new(config);
    let mut terminal = setup_terminal()?;

    let result = event_loop(&mut app, &mut terminal, store).await;
    restore_terminal()?;
    result
}

async fn event_loop(
    app: &mut TuiApp,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    store: &dyn Persistence,
) -> Result<()> {
    loop {
        if let Some(request) = app.pending.take() {
            app.create(store, request).await;
        } else if app.needs_refresh {
            app.reload(store).await;
        }

        terminal.draw(|f| app.render(f))?;

        tokio::time::sleep(Duration::from_millis(50)).await;
        if event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::test_utils::{seed_website, today};

    async fn app() -> (MemoryStore, TuiApp) {
        let store = MemoryStore::new();
        seed_website(&store).await;
        let mut app = TuiApp::new(&ResolvedConfig::default());
        app.bench.set_today(today());
        app.reload(&store).await;
        (store, app)
    }

    #[test]
    fn test_next_in_cycle() {
        assert_eq!(next_in_cycle(&[4, 7], None), Some(4));
        assert_eq!(next_in_cycle(&[4, 7], Some(4)), Some(7));
        assert_eq!(next_in_cycle(&[4, 7], Some(7)), None);
        assert_eq!(next_in_cycle(&[], None), None);
        assert_eq!(next_in_cycle(&[4], Some(99)), Some(4));
    }

    #[tokio::test]
    async fn test_toggle_key_switches_screen_mode() {
        let (_store, mut app) = app().await;
        assert_eq!(app.screen.mode, ViewMode::Table);
        app.handle_key(KeyCode::Char('t'));
        assert_eq!(app.screen.mode, ViewMode::Cards);
        assert_eq!(app.screen.cards.len(), 4);
    }

    #[tokio::test]
    async fn test_due_key_cycles_windows() {
        let (_store, mut app) = app().await;
        app.handle_key(KeyCode::Char('d'));
        assert!(app.bench.filtered().is_empty());
        app.handle_key(KeyCode::Char('d'));
        assert_eq!(app.bench.filtered().len(), 3);
        app.handle_key(KeyCode::Char('d'));
        app.handle_key(KeyCode::Char('d'));
        assert_eq!(app.bench.filtered().len(), 4);
    }

    #[tokio::test]
    async fn test_project_then_phase_keys() {
        let (_store, mut app) = app().await;
        app.handle_key(KeyCode::Char('p'));
        assert!(app.bench.composer().selected_project().is_some());
        app.handle_key(KeyCode::Char('f'));
        assert_eq!(app.bench.filtered().len(), 1);
        assert!(app.scope_label().starts_with("Website Redesign / Planning"));
    }

    fn type_title(app: &mut TuiApp, title: &str) {
        app.handle_key(KeyCode::Char('a'));
        for c in title.chars() {
            app.handle_key(KeyCode::Char(c));
        }
        app.handle_key(KeyCode::Enter);
    }

    #[tokio::test]
    async fn test_add_key_creates_task_in_selected_phase() {
        let (store, mut app) = app().await;
        app.handle_key(KeyCode::Char('p'));
        app.handle_key(KeyCode::Char('f'));
        let phase = app.bench.composer().selected_phase();

        // 'q' is typed into the title, not treated as quit
        type_title(&mut app, "Fix quirks");
        assert!(!app.should_quit);
        let request = app.pending.take().unwrap();
        app.create(&store, request).await;

        assert!(app.error.is_none());
        let created = app
            .bench
            .rows()
            .iter()
            .find(|row| row.task.title == "Fix quirks")
            .unwrap();
        assert_eq!(created.task.phase_id, phase);
        assert_eq!(created.task.priority, 3);
        assert_eq!(app.bench.filtered().len(), 2);
    }

    #[tokio::test]
    async fn test_add_key_escape_and_blank_title_create_nothing() {
        let (_store, mut app) = app().await;
        app.handle_key(KeyCode::Char('a'));
        app.handle_key(KeyCode::Char('x'));
        app.handle_key(KeyCode::Esc);
        assert!(app.input.is_none());
        assert!(app.pending.is_none());

        type_title(&mut app, "   ");
        assert!(app.pending.is_none());
    }

    #[tokio::test]
    async fn test_failed_create_is_not_transient() {
        let (store, mut app) = app().await;
        let mut new = NewTask::new("Too urgent", today());
        new.priority = 9;
        app.create(&store, CreateRequest::Task(new)).await;
        assert!(matches!(app.error, Some(Error::Validation(_))));
        assert!(!app.error.as_ref().unwrap().is_transient());
        assert!(!app.needs_refresh);
        assert_eq!(app.bench.rows().len(), 4);
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_rows() {
        let (store, mut app) = app().await;
        store.set_offline(true);
        app.handle_key(KeyCode::Char('r'));
        assert!(app.needs_refresh);
        app.reload(&store).await;
        assert!(app.error.as_ref().unwrap().is_transient());
        assert_eq!(app.bench.rows().len(), 4);
    }
}
