mod tui_app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
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
use tui_app::{
    format_discount, format_price, format_score, format_time_secs, truncate, AppState,
    ConnectionStatus,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build HTTP client");

    let mut app = AppState::new(base_url);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut deal_table_state = TableState::default();
    deal_table_state.select(None);

    let result = run_loop(&mut terminal, &mut app, &client, &mut deal_table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    deal_state: &mut TableState,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(2);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, deal_state))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.deals.len().saturating_sub(1);
                            let next = deal_state.selected().map_or(0, |i| (i + 1).min(max));
                            deal_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let prev = deal_state
                                .selected()
                                .map_or(0, |i| i.saturating_sub(1));
                            deal_state.select(Some(prev));
                        }
                        KeyCode::Enter => {
                            if let Some(i) = deal_state.selected() {
                                if let Some(deal) = app.deals.get(i) {
                                    let id = deal.id;
                                    app.fetch_deal_history(client, id).await;
                                }
                            }
                        }
                        KeyCode::Esc => app.clear_deal_history(),
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, deal_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, deal_state, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let avg_disc = app
        .summary
        .avg_discount
        .map_or("—".to_string(), |v| format!("{v:.0}% avg discount"));

    let last_scrape = app
        .health
        .last_scrape_at
        .filter(|&t| t > 0)
        .map_or("no scrape yet".to_string(), |t| {
            format!("last scrape {}", format_time_secs(t as i64))
        });

    let title_spans = vec![
        Span::styled(
            " Deal Radar  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} deals tracked", app.summary.total_deals),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("{} today", app.summary.deals_today),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(avg_disc, Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(last_scrape, Style::default().fg(Color::DarkGray)),
    ];

    let header_line = Line::from(title_spans);
    let paragraph = Paragraph::new(header_line)
        .block(Block::default().borders(Borders::ALL).border_style(
            Style::default().fg(Color::DarkGray),
        ));

    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, deal_state: &mut TableState, area: Rect) {
    // Horizontal split: all deals (60%) | top deals or price history (40%)
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    render_deals_table(f, app, deal_state, halves[0]);
    if app.showing_history() {
        render_history_table(f, app, halves[1]);
    } else {
        render_top_deals_table(f, app, halves[1]);
    }
}

fn score_color(score: Option<f64>) -> Color {
    score.map_or(Color::DarkGray, |s| {
        if s >= 70.0 {
            Color::Green
        } else if s >= 40.0 {
            Color::Yellow
        } else {
            Color::Red
        }
    })
}

fn recommendation_color(rec: Option<&str>) -> Color {
    match rec {
        Some("buy_now") => Color::Green,
        Some("wait") => Color::Yellow,
        Some("skip") => Color::DarkGray,
        _ => Color::White,
    }
}

fn render_deals_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["#", "Deal", "Price", "Disc", "Score", "Rec", "Src"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .deals
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let rec = d.recommendation.as_deref().unwrap_or("—");
            Row::new(vec![
                Cell::from(format!("{}", i + 1)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&d.title, 36)),
                Cell::from(format_price(d.price_numeric)),
                Cell::from(format_discount(d.discount_percent))
                    .style(Style::default().fg(Color::Cyan)),
                Cell::from(format_score(d.quality_score))
                    .style(Style::default().fg(score_color(d.quality_score))),
                Cell::from(rec.to_string())
                    .style(Style::default().fg(recommendation_color(d.recommendation.as_deref()))),
                Cell::from(d.website.clone()).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(9),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(8),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " DEALS ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_top_deals_table(f: &mut Frame, app: &AppState, area: Rect) {
    let header_cells = ["Deal", "Score", "Band", "Rec"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .summary
        .top_deals
        .iter()
        .map(|d| {
            let band = d.quality_band.as_deref().unwrap_or("—");
            let rec = d.recommendation.as_deref().unwrap_or("—");
            Row::new(vec![
                Cell::from(truncate(&d.title, 22)),
                Cell::from(format_score(d.quality_score))
                    .style(Style::default().fg(score_color(d.quality_score))),
                Cell::from(band.to_string()),
                Cell::from(rec.to_string())
                    .style(Style::default().fg(recommendation_color(d.recommendation.as_deref()))),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(10),
            Constraint::Length(5),
            Constraint::Length(9),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " TOP DEALS ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );

    f.render_widget(table, area);
}

fn render_history_table(f: &mut Frame, app: &AppState, area: Rect) {
    let header_cells = ["Time", "Price"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    // Color each point against the previous one: green = drop, red = rise
    let mut prev: Option<f64> = None;
    let rows: Vec<Row> = app
        .history
        .points
        .iter()
        .map(|p| {
            let color = match prev {
                Some(last) if p.price_numeric < last => Color::Green,
                Some(last) if p.price_numeric > last => Color::Red,
                _ => Color::White,
            };
            prev = Some(p.price_numeric);
            Row::new(vec![
                Cell::from(format_time_secs(p.recorded_at))
                    .style(Style::default().fg(Color::DarkGray)),
                Cell::from(format_price(Some(p.price_numeric)))
                    .style(Style::default().fg(color)),
            ])
        })
        .collect();

    let title = app
        .history
        .deal_title
        .as_deref()
        .map(|t| format!(" PRICE HISTORY — {} ", truncate(t, 24)))
        .unwrap_or_else(|| " PRICE HISTORY ".to_string());

    let table = Table::new(rows, [Constraint::Length(10), Constraint::Min(8)])
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(Span::styled(
                    title,
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
        );

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("scroll  "),
        Span::styled("[enter] ", Style::default().fg(Color::Yellow)),
        Span::raw("price history  "),
        Span::styled("[esc] ", Style::default().fg(Color::Yellow)),
        Span::raw("back  "),
        Span::styled("auto-refresh: 2s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
