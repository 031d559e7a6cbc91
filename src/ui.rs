use anyhow::Result;
use chrono::NaiveDateTime;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use farm_report::report::{format_calf_tags, format_sire_usage};
use farm_report::{assemble_report, FarmReport, FarmStats, MetricWarning, StatusFilter, Store, NO_DATA};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Reproduction,
    Charts,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Overview, Page::Reproduction, Page::Charts];

    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Reproduction,
            Page::Reproduction => Page::Charts,
            Page::Charts => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::Charts,
            Page::Reproduction => Page::Overview,
            Page::Charts => Page::Reproduction,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Reproduction => "Usage & Reproduction",
            Page::Charts => "Graphs",
        }
    }
}

pub struct App {
    store: Store,
    as_of: NaiveDateTime,
    pub farms: Vec<String>,
    pub farm_state: ListState,
    pub status: StatusFilter,
    pub current_page: Page,
    pub report: Option<FarmReport>,
    pub farm_warnings: Vec<MetricWarning>,
}

impl App {
    pub fn new(store: Store, as_of: NaiveDateTime) -> Self {
        let mut stats = FarmStats::new(&store, as_of);
        let farms = stats.farms();
        let farm_warnings = stats.into_warnings();

        let mut farm_state = ListState::default();
        if !farms.is_empty() {
            farm_state.select(Some(0));
        }

        let mut app = Self {
            store,
            as_of,
            farms,
            farm_state,
            status: StatusFilter::default(),
            current_page: Page::Overview,
            report: None,
            farm_warnings,
        };
        app.reload();
        app
    }

    pub fn selected_farm(&self) -> Option<&str> {
        self.farm_state
            .selected()
            .and_then(|i| self.farms.get(i))
            .map(String::as_str)
    }

    /// Recompute the whole report for the current selection.
    pub fn reload(&mut self) {
        self.report = self
            .selected_farm()
            .map(|farm| assemble_report(&self.store, farm, self.status, self.as_of));
    }

    pub fn next_farm(&mut self) {
        if self.farms.is_empty() {
            return;
        }
        let i = match self.farm_state.selected() {
            Some(i) if i + 1 < self.farms.len() => i + 1,
            _ => 0,
        };
        self.farm_state.select(Some(i));
        self.reload();
    }

    pub fn previous_farm(&mut self) {
        if self.farms.is_empty() {
            return;
        }
        let i = match self.farm_state.selected() {
            Some(0) | None => self.farms.len() - 1,
            Some(i) => i - 1,
        };
        self.farm_state.select(Some(i));
        self.reload();
    }

    pub fn cycle_status(&mut self) {
        self.status = self.status.next();
        self.reload();
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn warning_count(&self) -> usize {
        self.farm_warnings.len() + self.report.as_ref().map_or(0, |r| r.warnings.len())
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

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
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('s') => app.cycle_status(),
                KeyCode::Char('r') => app.reload(),
                KeyCode::Down | KeyCode::Char('j') => app.next_farm(),
                KeyCode::Up | KeyCode::Char('k') => app.previous_farm(),
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

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(24), // Farm list
            Constraint::Min(0),     // Report page
        ])
        .split(chunks[1]);

    render_farm_list(f, content_chunks[0], app);

    match &app.report {
        None => {
            let empty = Paragraph::new("Please select a farm.")
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(empty, content_chunks[1]);
        }
        Some(report) => match app.current_page {
            Page::Overview => render_overview(f, content_chunks[1], report),
            Page::Reproduction => render_reproduction(f, content_chunks[1], report, &app.farm_warnings),
            Page::Charts => render_charts(f, content_chunks[1], report),
        },
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
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
        format!("Farm: {}", app.selected_farm().unwrap_or(NO_DATA)),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Status: {}", app.status),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_farm_list(f: &mut Frame, area: Rect, app: &mut App) {
    let items: Vec<ListItem> = app
        .farms
        .iter()
        .map(|farm| ListItem::new(farm.as_str()))
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Farms"))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    f.render_stateful_widget(list, area, &mut app.farm_state);
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))
}

fn field(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {label:<24}"), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(Color::White)),
    ])
}

fn render_overview(f: &mut Frame, area: Rect, report: &FarmReport) {
    let general = &report.general;
    let management = &report.management;

    let lines = vec![
        section("General Info"),
        field("Total Animals", general.total_animals.to_string()),
        field("Heifer Count", general.heifer_count.to_string()),
        field("Bull Count", general.bull_count.to_string()),
        field("Total Milk Yield", format!("{:.1}", general.total_milk_yield)),
        field("Total Lactation Days", general.total_lactation_days.to_string()),
        field("Abortions", general.abortion_count.to_string()),
        Line::from(""),
        section("Management (Last 3 Months, all farms)"),
        field("Births", format!("{} times", management.births)),
        field("Calf Tags", format_calf_tags(&management.calf_tags)),
        field("Cull Count", management.cull_count.to_string()),
        field("Sales", management.sales.to_string()),
        field("Deaths", management.deaths.to_string()),
    ];

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(Page::Overview.title()))
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);
}

fn render_reproduction(f: &mut Frame, area: Rect, report: &FarmReport, farm_warnings: &[MetricWarning]) {
    let repro = &report.reproduction;

    let mut lines = vec![
        section("Usage & Reproduction"),
        field("Top Sire (3 Years)", repro.top_sire.clone()),
    ];
    let usage = format_sire_usage(&repro.sire_usage);
    if repro.sire_usage.is_empty() {
        lines.push(field("Sire Usage (Top 3)", usage));
    } else {
        lines.push(field("Sire Usage (Top 3)", String::new()));
        for line in usage.lines() {
            lines.push(field("", line.to_string()));
        }
    }
    lines.push(field("Average Parity", repro.average_parity.clone()));
    lines.push(field("Highest Parity Cow", repro.highest_parity_cow.clone()));
    lines.push(field("Frequent Abortion Cow", repro.frequent_abortion_cow.clone()));

    let warnings: Vec<&MetricWarning> = farm_warnings.iter().chain(&report.warnings).collect();
    if !warnings.is_empty() {
        lines.push(Line::from(""));
        lines.push(section("Warnings"));
        for warning in warnings {
            lines.push(Line::from(Span::styled(
                format!("  {warning}"),
                Style::default().fg(Color::Red),
            )));
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(Page::Reproduction.title()))
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);
}

fn render_counts(f: &mut Frame, area: Rect, title: &str, counts: &[(String, u64)], color: Color) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    if counts.is_empty() {
        f.render_widget(Paragraph::new(format!("No {title} Data")).block(block), area);
        return;
    }

    let data: Vec<(&str, u64)> = counts.iter().map(|(label, n)| (label.as_str(), *n)).collect();
    let chart = BarChart::default()
        .block(block)
        .data(data.as_slice())
        .bar_width(9)
        .bar_gap(2)
        .bar_style(Style::default().fg(color))
        .value_style(Style::default().fg(Color::Black).bg(color));

    f.render_widget(chart, area);
}

fn render_charts(f: &mut Frame, area: Rect, report: &FarmReport) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    render_counts(f, top[0], "Breeding Diagnosis", &report.charts.breeding_diagnosis, Color::LightBlue);
    render_counts(f, top[1], "Animal Category", &report.charts.animal_category, Color::LightGreen);

    // First bar carries the year, the rest only the month number.
    let labels: Vec<String> = report
        .charts
        .monthly_yield
        .iter()
        .enumerate()
        .map(|(i, (month, _))| {
            if i == 0 {
                month.clone()
            } else {
                month.rsplit('-').next().unwrap_or(month.as_str()).to_string()
            }
        })
        .collect();
    let data: Vec<(&str, u64)> = labels
        .iter()
        .zip(&report.charts.monthly_yield)
        .map(|(label, (_, total))| (label.as_str(), total.max(0.0).round() as u64))
        .collect();

    let trend = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Monthly Cumulative Yield (Past 12 Months)"),
        )
        .data(data.as_slice())
        .bar_width(7)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Blue))
        .value_style(Style::default().fg(Color::White).bg(Color::Blue));

    f.render_widget(trend, rows[1]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![Span::styled(
        format!(" Farms: {} ", app.farms.len()),
        Style::default().fg(Color::Cyan),
    )];

    let warnings = app.warning_count();
    if warnings > 0 {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("⚠ {warnings} warning(s)"),
            Style::default().fg(Color::Red),
        ));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Farm | "));
    status_spans.push(Span::styled("s", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Status | "));
    status_spans.push(Span::styled("r", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Refresh | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}
