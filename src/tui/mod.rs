pub mod app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::commands::dispatch;
use crate::formatter::{format_line, DisplayCard, LinePrice, PriceCell};
use crate::orchestrator::Session;
use app::{truncate, AppState, Entry, EntryKind};

/// Narrower transcripts show game cards as plain markup.
const CARD_MIN_WIDTH: u16 = 48;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Take over the terminal until the user quits. The terminal is restored on every exit path.
pub async fn run(session: &mut Session) -> io::Result<()> {
    let mut app = AppState::new();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, session).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    session: &mut Session,
) -> io::Result<()> {
    let poll_interval = Duration::from_millis(250);

    loop {
        terminal.draw(|f| render(f, app, session))?;

        if !event::poll(poll_interval)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Esc => return Ok(()),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
            KeyCode::Enter => {
                let Some(line) = app.submit() else { continue };
                app.busy = true;
                terminal.draw(|f| render(f, app, session))?;
                let outputs = dispatch(session, &line).await;
                app.push_outputs(outputs);
                app.busy = false;
            }
            KeyCode::Char(c) => app.insert_char(c),
            KeyCode::Backspace => app.backspace(),
            KeyCode::Up => app.scroll_up(1),
            KeyCode::Down => app.scroll_down(1),
            KeyCode::PageUp => app.scroll_up(10),
            KeyCode::PageDown => app.scroll_down(10),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, session: &Session) {
    let area = f.area();

    // header | transcript | input | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, session, chunks[0]);
    render_transcript(f, app, chunks[1]);
    render_input(f, app, chunks[2]);
    render_footer(f, app, chunks[3]);
}

fn render_header(f: &mut Frame, session: &Session, area: Rect) {
    let (key_text, key_color) = if session.has_api_key() {
        ("● api key set", Color::Green)
    } else {
        ("✗ no api key", Color::Red)
    };
    let debug_text = if session.debug { "debug on" } else { "debug off" };

    let spans = vec![
        Span::styled(
            " Overtime Markets  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(key_text, Style::default().fg(key_color)),
        Span::raw("  │  "),
        Span::styled(format!("network {}", session.network_id), Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(format!("{} leagues", session.leagues.len()), Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(format!("{} msgs", session.history().len()), Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(debug_text, Style::default().fg(Color::DarkGray)),
    ];

    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(paragraph, area);
}

fn render_transcript(f: &mut Frame, app: &AppState, area: Rect) {
    let inner_width = area.width.saturating_sub(2);
    let mut lines: Vec<Line> = Vec::new();
    for entry in &app.transcript {
        match entry {
            Entry::Text { kind, text } => push_text(&mut lines, *kind, text),
            Entry::Card(card) if inner_width < CARD_MIN_WIDTH => {
                push_text(&mut lines, EntryKind::System, &card.to_markup());
            }
            Entry::Card(card) => push_card(&mut lines, card),
        }
        lines.push(Line::raw(""));
    }
    if app.busy {
        lines.push(Line::styled("…", Style::default().fg(Color::DarkGray)));
    }

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });

    // Offsets are in wrapped rows, so count them at the inner width.
    let visible = area.height.saturating_sub(2);
    let total = u16::try_from(paragraph.line_count(inner_width)).unwrap_or(u16::MAX);
    let bottom = total.saturating_sub(visible);
    let offset = bottom.saturating_sub(app.scroll);

    let paragraph = paragraph.scroll((offset, 0)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " TERMINAL ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(paragraph, area);
}

fn push_text(lines: &mut Vec<Line<'static>>, kind: EntryKind, text: &str) {
    let (prefix, style) = match kind {
        EntryKind::User => ("> ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        EntryKind::System => ("", Style::default().fg(Color::Gray)),
        EntryKind::Assistant => ("", Style::default().fg(Color::White)),
        EntryKind::Error => ("", Style::default().fg(Color::Red)),
    };
    for (i, l) in text.lines().enumerate() {
        let p = if i == 0 { prefix } else { "" };
        lines.push(Line::styled(format!("{p}{l}"), style));
    }
}

fn price_style(american: Option<f64>) -> Style {
    match american {
        Some(a) if a > 0.0 => Style::default().fg(Color::Green),
        Some(_) => Style::default().fg(Color::Red),
        None => Style::default().fg(Color::DarkGray),
    }
}

fn price_span(american: Option<f64>) -> Span<'static> {
    let cell = PriceCell { label: String::new(), american };
    Span::styled(cell.price(), price_style(american))
}

fn section(title: &'static str) -> Line<'static> {
    Line::styled(title, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
}

fn line_cell(side: &Option<LinePrice>) -> Vec<Span<'static>> {
    match side {
        Some(lp) => vec![
            Span::styled(format!("{:>7} ", format_line(lp.line)), Style::default().fg(Color::White)),
            price_span(lp.american),
        ],
        None => vec![Span::styled(format!("{:>7} ", "-"), Style::default().fg(Color::DarkGray))],
    }
}

fn push_card(lines: &mut Vec<Line<'static>>, card: &DisplayCard) {
    if let Some(league) = &card.league {
        lines.push(Line::styled(league.clone(), Style::default().fg(Color::DarkGray)));
    }
    lines.push(Line::styled(card.title(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)));
    if let Some(k) = &card.kickoff {
        lines.push(Line::styled(k.clone(), Style::default().fg(Color::DarkGray)));
    }

    if !card.moneyline.is_empty() {
        lines.push(section("WINNER"));
        let mut spans = vec![Span::raw("  ")];
        for cell in &card.moneyline {
            spans.push(Span::raw(format!("{} ", truncate(&cell.label, 24))));
            spans.push(Span::styled(cell.price(), price_style(cell.american)));
            spans.push(Span::raw("   "));
        }
        lines.push(Line::from(spans));
    }

    if !card.spreads.is_empty() {
        lines.push(section("HANDICAP"));
        lines.push(Line::styled(
            format!("  {} | {}", truncate(&card.home_team, 24), truncate(&card.away_team, 24)),
            Style::default().fg(Color::DarkGray),
        ));
        for row in &card.spreads {
            let mut spans = vec![Span::raw("  ")];
            spans.extend(line_cell(&row.home));
            spans.push(Span::raw("  |  "));
            spans.extend(line_cell(&row.away));
            lines.push(Line::from(spans));
        }
    }

    if !card.totals.is_empty() {
        lines.push(section("TOTAL"));
        lines.push(Line::styled("  Over | Under", Style::default().fg(Color::DarkGray)));
        for row in &card.totals {
            lines.push(Line::from(vec![
                Span::raw(format!("  {:>7} ", row.line)),
                price_span(row.over),
                Span::raw(format!("  |  {:>7} ", row.line)),
                price_span(row.under),
            ]));
        }
    }

    lines.push(Line::styled(
        format!("{} markets available", card.market_count),
        Style::default().fg(Color::DarkGray),
    ));
}

fn render_input(f: &mut Frame, app: &AppState, area: Rect) {
    let paragraph = Paragraph::new(Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Cyan)),
        Span::raw(app.input.as_str()),
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(paragraph, area);

    let typed = u16::try_from(app.input.chars().count()).unwrap_or(u16::MAX);
    let x = area.x.saturating_add(3).saturating_add(typed).min(area.right().saturating_sub(2));
    f.set_cursor_position((x, area.y + 1));
}

fn render_footer(f: &mut Frame, app: &AppState, area: Rect) {
    let status = if app.busy { "working…" } else { "ready" };
    let line = Line::from(vec![
        Span::styled(" [Enter] ", Style::default().fg(Color::Yellow)),
        Span::raw("send  "),
        Span::styled("[↑↓ / PgUp PgDn] ", Style::default().fg(Color::Yellow)),
        Span::raw("scroll  "),
        Span::styled("[Esc] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled(status, Style::default().fg(Color::DarkGray)),
    ]);
    f.render_widget(Paragraph::new(line).style(Style::default().fg(Color::White)), area);
}
