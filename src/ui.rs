use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use locality_recon::ReconciliationReport;
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
pub enum Page {
    Unresolved,
    NearDuplicates,
    Overrides,
    Matched,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Unresolved => Page::NearDuplicates,
            Page::NearDuplicates => Page::Overrides,
            Page::Overrides => Page::Matched,
            Page::Matched => Page::Unresolved,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Unresolved => Page::Matched,
            Page::NearDuplicates => Page::Unresolved,
            Page::Overrides => Page::NearDuplicates,
            Page::Matched => Page::Overrides,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Unresolved => "Unresolved",
            Page::NearDuplicates => "Near Duplicates",
            Page::Overrides => "Overrides",
            Page::Matched => "Matched",
        }
    }
}

pub struct App {
    pub report: ReconciliationReport,
    pub unresolved: Vec<String>,
    pub matched: Vec<String>,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
}

impl App {
    pub fn new(report: ReconciliationReport) -> Self {
        let unresolved: Vec<String> = report.unresolved().iter().cloned().collect();
        let matched: Vec<String> = report.matched().iter().cloned().collect();

        let current_page = if unresolved.is_empty() {
            Page::NearDuplicates
        } else {
            Page::Unresolved
        };

        let mut app = Self {
            report,
            unresolved,
            matched,
            state: TableState::default(),
            current_page,
            show_detail: true,
        };
        app.reset_selection();
        app
    }

    fn row_count(&self) -> usize {
        match self.current_page {
            Page::Unresolved => self.unresolved.len(),
            Page::NearDuplicates => self.report.near_duplicates.len(),
            Page::Overrides => self.report.overrides.len(),
            Page::Matched => self.matched.len(),
        }
    }

    fn reset_selection(&mut self) {
        if self.row_count() > 0 {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_unresolved(&self) -> Option<&String> {
        if self.current_page != Page::Unresolved {
            return None;
        }
        self.state.selected().and_then(|i| self.unresolved.get(i))
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.reset_selection();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.reset_selection();
    }

    pub fn next(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map(|i| (i + 20).min(len - 1)).unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map(|i| i.saturating_sub(20)).unwrap_or(0);
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.reset_selection(),
                KeyCode::End => {
                    let len = app.row_count();
                    if len > 0 {
                        app.state.select(Some(len - 1));
                    }
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
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Unresolved {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        render_page(f, content_chunks[0], app);
        render_hints(f, content_chunks[1], app);
    } else {
        render_page(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Unresolved, Page::NearDuplicates, Page::Overrides, Page::Matched];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("✓ {}", app.matched.len()),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("✗ {}", app.unresolved.len()),
        Style::default().fg(Color::Red),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_page(f: &mut Frame, area: Rect, app: &mut App) {
    let (header, rows, widths): (Row, Vec<Row>, Vec<Constraint>) = match app.current_page {
        Page::Unresolved => (
            header_row(&["Locality", "Candidates"]),
            app.unresolved
                .iter()
                .map(|name| {
                    Row::new(vec![
                        Cell::from(name.clone()).style(Style::default().fg(Color::Red)),
                        Cell::from(app.report.hints_for(name).len().to_string()),
                    ])
                })
                .collect(),
            vec![Constraint::Min(30), Constraint::Length(12)],
        ),
        Page::NearDuplicates => (
            header_row(&["Distance", "First", "Second"]),
            app.report
                .near_duplicates
                .iter()
                .map(|pair| {
                    let unresolved = app.report.unresolved().contains(&pair.first)
                        || app.report.unresolved().contains(&pair.second);
                    let color = if unresolved { Color::Red } else { Color::White };
                    Row::new(vec![
                        Cell::from(pair.distance.to_string()),
                        Cell::from(pair.first.clone()).style(Style::default().fg(color)),
                        Cell::from(pair.second.clone()).style(Style::default().fg(color)),
                    ])
                })
                .collect(),
            vec![Constraint::Length(10), Constraint::Min(25), Constraint::Min(25)],
        ),
        Page::Overrides => (
            header_row(&["Rule", "Raw", "Corrected", "Rows"]),
            app.report
                .overrides
                .iter()
                .map(|o| {
                    Row::new(vec![
                        Cell::from(o.rule_id.clone()),
                        Cell::from(o.raw.clone()),
                        Cell::from(o.corrected.clone()).style(Style::default().fg(Color::Green)),
                        Cell::from(o.rows.to_string()),
                    ])
                })
                .collect(),
            vec![
                Constraint::Length(20),
                Constraint::Min(25),
                Constraint::Min(25),
                Constraint::Length(8),
            ],
        ),
        Page::Matched => (
            header_row(&["Locality", "Provenance"]),
            app.matched
                .iter()
                .map(|name| {
                    let former = app.report.former_matches.iter().find(|m| &m.name == name);
                    let provenance = match former {
                        Some(m) => format!("former (dissolved {})", m.dissolved_in),
                        None => "current".to_string(),
                    };
                    Row::new(vec![Cell::from(name.clone()), Cell::from(provenance)])
                })
                .collect(),
            vec![Constraint::Min(30), Constraint::Length(28)],
        ),
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", app.current_page.title())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_hints(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();

    match app.selected_unresolved() {
        Some(name) => {
            lines.push(Line::from(vec![
                Span::styled("Name: ", Style::default().fg(Color::Yellow)),
                Span::raw(name.clone()),
            ]));
            lines.push(Line::from(""));

            let hints = app.report.hint_candidates(name);
            if hints.is_empty() {
                lines.push(Line::from(Span::styled(
                    "No similar names in the data. Check the reference lists.",
                    Style::default().fg(Color::DarkGray),
                )));
            } else {
                lines.push(Line::from(Span::styled(
                    "Similar names:",
                    Style::default().fg(Color::Yellow),
                )));
                for (other, distance) in hints {
                    let status = if app.report.matched().contains(other) {
                        Span::styled(" canonical", Style::default().fg(Color::Green))
                    } else {
                        Span::styled(" unresolved", Style::default().fg(Color::Red))
                    };
                    lines.push(Line::from(vec![
                        Span::raw(format!("  {} (d={})", other, distance)),
                        status,
                    ]));
                }
            }
        }
        None => lines.push(Line::from("Nothing selected")),
    }

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Hints "),
    );

    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, app.row_count()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Hints | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
        Span::raw(" Fast | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}
