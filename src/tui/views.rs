//! Table and card widgets.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
};

use crate::views::{Card, CardStatus, Renderer, StatusColor, TableRow, ViewMode, card_columns};

/// Height of one card, borders included.
const CARD_HEIGHT: u16 = 7;

/// Display-ready rows as last handed over by the engine.
#[derive(Debug, Clone, Default)]
pub struct Screen {
    pub table: Vec<TableRow>,
    pub cards: Vec<Card>,
    pub mode: ViewMode,
}

impl Renderer for Screen {
    fn set_table_rows(&mut self, rows: &[TableRow]) {
        self.table = rows.to_vec();
    }

    fn set_cards(&mut self, cards: &[Card]) {
        self.cards = cards.to_vec();
    }

    fn show(&mut self, mode: ViewMode) {
        self.mode = mode;
    }
}

fn status_color(color: StatusColor) -> Color {
    match color {
        StatusColor::Blue => Color::Blue,
        StatusColor::Red => Color::Red,
        StatusColor::Magenta => Color::Magenta,
        StatusColor::Green => Color::Green,
    }
}

fn card_color(status: CardStatus) -> Color {
    match status {
        CardStatus::Started => Color::Blue,
        CardStatus::Done => Color::Green,
        CardStatus::Blocked => Color::Red,
        CardStatus::Signoff => Color::Magenta,
        CardStatus::Open => Color::Gray,
    }
}

impl Screen {
    pub fn render(&self, frame: &mut Frame, area: Rect, card_threshold: u16) {
        match self.mode {
            ViewMode::Table => self.render_table(frame, area),
            ViewMode::Cards => self.render_cards(frame, area, card_threshold),
        }
    }

    fn render_table(&self, frame: &mut Frame, area: Rect) {
        let rows: Vec<Row> = self
            .table
            .iter()
            .map(|row| match row {
                TableRow::GroupHeader { phase_name } => Row::new(vec![Cell::from(Span::styled(
                    format!("// {}", phase_name),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))]),
                TableRow::Placeholder { message } => Row::new(vec![Cell::from(Span::styled(
                    message.clone(),
                    Style::default().fg(Color::DarkGray),
                ))]),
                TableRow::Task(task) => {
                    let due_style = if task.overdue {
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default()
                    };
                    let priority_style = if task.high_priority {
                        Style::default().add_modifier(Modifier::BOLD)
                    } else {
                        Style::default()
                    };
                    Row::new(vec![
                        Cell::from(task.due_date.format("%Y-%m-%d").to_string()).style(due_style),
                        Cell::from(format!("P{}", task.priority)).style(priority_style),
                        Cell::from(task.title.clone()),
                        Cell::from(Line::from(vec![
                            Span::styled("● ", Style::default().fg(status_color(task.status_color))),
                            Span::raw(task.status.clone()),
                        ])),
                        Cell::from(task.assignee.clone()),
                        Cell::from(task.tags.join(", ")),
                        Cell::from(task.phase_name.clone()),
                    ])
                }
            })
            .collect();

        let widths = [
            Constraint::Length(11),
            Constraint::Length(3),
            Constraint::Min(20),
            Constraint::Length(18),
            Constraint::Length(14),
            Constraint::Length(24),
            Constraint::Length(16),
        ];
        let header = Row::new(vec!["Due", "Pri", "Title", "Status", "Assignee", "Tags", "Phase"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(" Tasks "));
        frame.render_widget(table, area);
    }

    fn render_cards(&self, frame: &mut Frame, area: Rect, card_threshold: u16) {
        let outer = Block::default().borders(Borders::ALL).title(" Cards ");
        let inner = outer.inner(area);
        frame.render_widget(outer, area);

        if self.cards.is_empty() {
            let empty = Paragraph::new(crate::views::NO_RESULTS)
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(empty, inner);
            return;
        }

        let columns = card_columns(area.width, card_threshold);
        let visible_rows = (inner.height / CARD_HEIGHT).max(1) as usize;
        let row_areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(CARD_HEIGHT); visible_rows])
            .split(inner);

        for (chunk, row_area) in self.cards.chunks(columns).zip(row_areas.iter()) {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, columns as u32); columns])
                .split(*row_area);
            for (card, cell) in chunk.iter().zip(cells.iter()) {
                render_card(frame, *cell, card);
            }
        }
    }
}

fn render_card(frame: &mut Frame, area: Rect, card: &Card) {
    let due_style = if card.overdue {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let lines = vec![
        Line::from(Span::styled(
            card.breadcrumb.clone(),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(card.chips.join("  ")),
        Line::from(vec![
            Span::raw(format!("@{}  ", card.assignee)),
            Span::styled(card.due_label.clone(), due_style),
        ]),
        Line::from(vec![
            Span::styled("● ", Style::default().fg(card_color(card.status_class))),
            Span::raw(card.status.clone()),
        ]),
    ];
    let title = format!(" [{}] {} ", card.priority_label, card.title);
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);
}
