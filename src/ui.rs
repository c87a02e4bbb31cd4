// 🖥️ Alerts Dashboard - Terminal UI
// Flagged transactions, live counters and a detail panel

use anyhow::Result;
use compliance_sentinel::db::HIGH_RISK_SCORE;
use compliance_sentinel::{AlertStats, StoredAlert};
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertFilter {
    All,
    HighRisk,
}

impl AlertFilter {
    fn label(&self) -> &str {
        match self {
            AlertFilter::All => "All alerts",
            AlertFilter::HighRisk => "High risk",
        }
    }
}

pub struct App {
    pub alerts: Vec<StoredAlert>,
    pub visible: Vec<StoredAlert>,
    pub stats: AlertStats,
    pub state: TableState,
    pub show_detail: bool,
    pub filter: AlertFilter,
    pub status: Option<String>,
}

impl App {
    pub fn new(alerts: Vec<StoredAlert>, stats: AlertStats) -> Self {
        let mut app = Self {
            alerts,
            visible: Vec::new(),
            stats,
            state: TableState::default(),
            show_detail: false,
            filter: AlertFilter::All,
            status: None,
        };
        app.apply_filter(AlertFilter::All);
        app
    }

    /// Swap in a fresh snapshot, keeping the active filter
    pub fn reload(&mut self, alerts: Vec<StoredAlert>, stats: AlertStats) {
        self.alerts = alerts;
        self.stats = stats;
        self.apply_filter(self.filter);
    }

    pub fn apply_filter(&mut self, filter: AlertFilter) {
        self.filter = filter;
        self.visible = match filter {
            AlertFilter::All => self.alerts.clone(),
            AlertFilter::HighRisk => self
                .alerts
                .iter()
                .filter(|alert| alert.anomaly_score >= HIGH_RISK_SCORE)
                .cloned()
                .collect(),
        };

        if self.visible.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_alert(&self) -> Option<&StoredAlert> {
        self.state.selected().and_then(|i| self.visible.get(i))
    }

    pub fn next(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }
}

/// Run the dashboard until the user quits. `refresh` is called on `r` and
/// should ingest a new batch and return the current snapshot.
pub fn run_ui<F>(app: &mut App, refresh: F) -> Result<()>
where
    F: FnMut() -> Result<(Vec<StoredAlert>, AlertStats)>,
{
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, refresh);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B, F>(terminal: &mut Terminal<B>, app: &mut App, mut refresh: F) -> Result<()>
where
    B: ratatui::backend::Backend,
    F: FnMut() -> Result<(Vec<StoredAlert>, AlertStats)>,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Char('r') => match refresh() {
                    Ok((alerts, stats)) => {
                        app.reload(alerts, stats);
                        app.status = None;
                    }
                    Err(e) => {
                        tracing::error!(error = %format!("{:#}", e), "dashboard refresh failed");
                        app.status = Some(format!("Refresh failed: {}", e));
                    }
                },
                KeyCode::Char('1') => app.apply_filter(AlertFilter::All),
                KeyCode::Char('2') => app.apply_filter(AlertFilter::HighRisk),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home if !app.visible.is_empty() => app.state.select(Some(0)),
                KeyCode::End if !app.visible.is_empty() => {
                    app.state.select(Some(app.visible.len() - 1))
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Counters
            Constraint::Min(0),    // Alerts
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn score_color(score: u64) -> Color {
    if score >= HIGH_RISK_SCORE {
        Color::Red
    } else if score >= 50 {
        Color::Yellow
    } else {
        Color::White
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let spans = vec![
        Span::styled(
            " 🚨 Compliance Sentinel ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Total alerts: {}", app.stats.total_alerts),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("High risk: {}", app.stats.high_risk_count),
            Style::default().fg(Color::Red),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Updated {}", app.stats.last_updated),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Time", "User", "Amount", "Location", "Score", "Reasons"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.visible.iter().map(|alert| {
        let color = score_color(alert.anomaly_score);
        Row::new(vec![
            Cell::from(alert.timestamp.clone()),
            Cell::from(alert.user_id.clone()),
            Cell::from(format!("{:.2} {}", alert.amount, alert.currency)),
            Cell::from(truncate(&alert.transaction_location, 16)),
            Cell::from(alert.anomaly_score.to_string()).style(Style::default().fg(color)),
            Cell::from(alert.flag_reason.clone().unwrap_or_default()).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(18),
            Constraint::Length(6),
            Constraint::Min(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" {} ", app.filter.label())),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Alert Details ");

    let Some(alert) = app.selected_alert() else {
        f.render_widget(Paragraph::new("No alert selected").block(block), area);
        return;
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(format!("  {}: ", name), label), Span::raw(value)])
    };

    let mut content = vec![
        Line::from(""),
        field("Transaction", alert.transaction_id.clone()),
        field("Time", alert.timestamp.clone()),
        field("User", alert.user_id.clone()),
        field("Amount", format!("{:.2} {}", alert.amount, alert.currency)),
        field("Home", alert.user_location.clone()),
        field("Occurred in", alert.transaction_location.clone()),
        Line::from(vec![
            Span::styled("  Score: ", label),
            Span::styled(
                alert.anomaly_score.to_string(),
                Style::default().fg(score_color(alert.anomaly_score)).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  REASONS",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
    ];

    for reason in alert.flag_reason.as_deref().unwrap_or_default().split(", ") {
        content.push(Line::from(format!("  • {}", reason)));
    }

    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  DESCRIPTION",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    )));
    content.push(Line::from(Span::styled(
        format!("  {}", alert.description),
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let key = Style::default().fg(Color::Yellow);

    let mut spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.visible.len()),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(status) = &app.status {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Red)));
    }

    spans.extend([
        Span::raw(" | "),
        Span::styled("r", key),
        Span::raw(" Poll feed | "),
        Span::styled("1/2", key),
        Span::raw(" All/High risk | "),
        Span::styled("Enter", key),
        Span::raw(" Details | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ]);

    let status_bar = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
