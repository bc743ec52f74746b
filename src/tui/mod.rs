mod help;
mod input;
mod state;

use crate::api::ApiClient;
use crate::cli::{build_config, Cli};
use crate::model::{LogLevel, DEFAULT_PROFILE};
use crate::orchestrator::{self, UiCommand};
use crate::panel::{ChannelState, Notice, Panel, PanelEvent, Severity};
use crate::push;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use help::draw_help;
use input::{handle_key, KeyOutcome};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{Focus, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const SPINNER: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let api = Arc::new(ApiClient::new(&cfg)?);

    // Unbounded channels: the UI thread never blocks on the runtime.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<PanelEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let push_handle = tokio::spawn(push::run_push_channel(cfg, event_tx.clone()));

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, event_rx, cmd_tx));

    let res = orchestrator::run_controller(api, event_tx, cmd_rx).await;
    push_handle.abort();

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    args: Cli,
    mut event_rx: UnboundedReceiver<PanelEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::new(Panel::new(args.run_form()));
    if args.profile != DEFAULT_PROFILE {
        state.preferred_profile = Some(args.profile.clone());
    }
    for cmd in state.panel.startup_commands() {
        let _ = cmd_tx.send(cmd);
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            state.apply(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Short poll keeps the render loop responsive.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                match handle_key(&mut state, k) {
                    KeyOutcome::Continue => {}
                    KeyOutcome::Command(cmd) => {
                        if cmd_tx.send(cmd).is_err() {
                            break Err(anyhow::anyhow!("controller stopped"));
                        }
                    }
                    KeyOutcome::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Control"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("bot-panel"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_control(chunks[1], f, state),
        _ => draw_help(chunks[1], f),
    }
    draw_status_bar(chunks[2], f, &state.panel);

    if let Some(alert) = &state.panel.alert {
        let title = match alert.severity {
            Severity::Error => "Error",
            _ => "Notice",
        };
        draw_modal(area, f, title, &alert.message, "[Enter] OK");
    } else if let Some(confirm) = &state.panel.confirm {
        draw_modal(area, f, "Confirm", &confirm.prompt(), "[y] Yes   [n] No");
    }
}

fn draw_control(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(area);

    let form_height = if state.panel.draft.visible { 5 } else { 0 };
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(form_height),
                Constraint::Length(6),
                Constraint::Length(3),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(cols[0]);

    draw_profile_selector(left[0], f, state);
    if state.panel.draft.visible {
        draw_profile_form(left[1], f, state);
    }
    draw_run_form(left[2], f, state);
    draw_start_button(left[3], f, state);
    draw_logs(cols[1], f, state);
}

fn focus_style(state: &UiState, field: Focus) -> Style {
    if state.focus == field {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn field_line(state: &UiState, field: Focus, label: &str, value: String) -> Line<'static> {
    let caret = if state.focus == field { "▏" } else { "" };
    Line::from(vec![
        Span::styled(format!("{label:<10}"), Style::default().fg(Color::Gray)),
        Span::styled(format!("{value}{caret}"), focus_style(state, field)),
    ])
}

fn draw_profile_selector(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let selector = &state.panel.profiles;
    let label = selector
        .options()
        .get(selector.selected_index())
        .map(|o| o.label.clone())
        .unwrap_or_default();
    let count = selector.options().len();
    let p = Paragraph::new(Line::from(vec![
        Span::raw("‹ "),
        Span::styled(label, focus_style(state, Focus::Profile)),
        Span::raw(" ›"),
        Span::styled(
            format!("  {}/{}", selector.selected_index() + 1, count),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(state, Focus::Profile))
            .title("Profile (Ctrl-N add, Ctrl-D delete)"),
    );
    f.render_widget(p, area);
}

fn draw_profile_form(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let draft = &state.panel.draft;
    let toggle = if draft.password_visible { "hide" } else { "show" };
    let mut password = field_line(state, Focus::NewPassword, "Password", draft.password_display());
    password.spans.push(Span::styled(
        format!("  [Ctrl-P {toggle}]"),
        Style::default().fg(Color::DarkGray),
    ));
    let lines = vec![
        field_line(state, Focus::NewName, "Name", draft.name.clone()),
        field_line(state, Focus::NewUsername, "Username", draft.username.clone()),
        password,
    ];
    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("New profile (Enter to save, Esc to close)"),
    );
    f.render_widget(p, area);
}

fn draw_run_form(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let form = &state.panel.run_form;
    let headless = if form.headless { "[x]" } else { "[ ]" };
    let lines = vec![
        field_line(state, Focus::PostUrl, "Post URL", form.post_url.clone()),
        field_line(state, Focus::Comment, "Comment", form.comment.clone()),
        field_line(state, Focus::Count, "Count", form.count.clone()),
        field_line(state, Focus::Headless, "Headless", headless.to_string()),
    ];
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Run"));
    f.render_widget(p, area);
}

fn draw_start_button(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let panel = &state.panel;
    let (text, style) = if panel.is_running() {
        (
            format!("{} {}", SPINNER[state.tick % SPINNER.len()], panel.start_label()),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (
            format!("▶ {}  (Ctrl-S)", panel.start_label()),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )
    };
    let p = Paragraph::new(Line::from(Span::styled(text, style)))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn level_color(level: &LogLevel) -> Color {
    match level {
        LogLevel::Info => Color::White,
        LogLevel::Warning => Color::Yellow,
        LogLevel::Error => Color::Red,
        LogLevel::System => Color::Cyan,
        LogLevel::Other(_) => Color::Gray,
    }
}

fn draw_logs(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let logs = state.panel.logs();
    let height = area.height.saturating_sub(2) as usize;
    let end = logs.len() - state.log_scroll.min(logs.len());
    let start = end.saturating_sub(height);

    let lines: Vec<Line> = logs
        .range(start..end)
        .map(|entry| {
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", entry.timestamp),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    entry.message.clone(),
                    Style::default().fg(level_color(&entry.level)),
                ),
            ])
        })
        .collect();

    let title = if state.log_scroll > 0 {
        format!("Logs (↑{} lines, End to follow)", state.log_scroll)
    } else {
        "Logs (Ctrl-L clear)".to_string()
    };
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_status_bar(area: Rect, f: &mut ratatui::Frame, panel: &Panel) {
    let badge = if panel.is_running() {
        Span::styled(
            format!("● {}", panel.status_text()),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(
            format!("● {}", panel.status_text()),
            Style::default().fg(Color::Gray),
        )
    };
    let channel = match &panel.channel {
        ChannelState::Connecting => {
            Span::styled("events: connecting", Style::default().fg(Color::Yellow))
        }
        ChannelState::Connected => Span::styled("events: live", Style::default().fg(Color::Green)),
        ChannelState::Down(_) => Span::styled("events: down", Style::default().fg(Color::Red)),
    };

    let mut spans = vec![badge, Span::raw("  │  "), channel];
    if let Some(notice) = &panel.status_line {
        spans.push(Span::raw("  │  "));
        spans.push(notice_span(notice));
    }
    spans.push(Span::styled("  │  F1 help", Style::default().fg(Color::DarkGray)));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn notice_span(notice: &Notice) -> Span<'static> {
    let color = match notice.severity {
        Severity::Info => Color::Gray,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    };
    Span::styled(notice.message.clone(), Style::default().fg(color))
}

fn draw_modal(area: Rect, f: &mut ratatui::Frame, title: &str, message: &str, hint: &str) {
    let rect = centered_rect(area, 60, 7);
    let p = Paragraph::new(vec![
        Line::from(message.to_string()),
        Line::from(""),
        Line::from(Span::styled(hint.to_string(), Style::default().fg(Color::Magenta))),
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(title.to_string()),
    );
    f.render_widget(Clear, rect);
    f.render_widget(p, rect);
}

/// A box `percent_x` wide and `height` rows tall, centred in `area`.
fn centered_rect(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = (area.width as u32 * percent_x as u32 / 100) as u16;
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}
