use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const KEYBINDS: &[(&str, &str)] = &[
    ("Ctrl-Q / Ctrl-C", "Quit"),
    ("Tab / Shift-Tab", "Move between fields"),
    ("Ctrl-S / Enter", "Start automation (run form)"),
    ("↑/↓", "Choose profile (profile field)"),
    ("Ctrl-N", "Show/hide the add-profile form"),
    ("Enter / Ctrl-W", "Save the new profile"),
    ("Ctrl-P", "Show/hide the password"),
    ("Ctrl-D", "Delete the selected profile"),
    ("Ctrl-R", "Reload profiles"),
    ("Space", "Toggle headless (headless field)"),
    ("PgUp/PgDn/End", "Scroll the log console"),
    ("Ctrl-L", "Clear the log console"),
    ("F1", "Show this help"),
];

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![Line::from("Keybinds:")];
    for (keys, what) in KEYBINDS {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{keys:<17}"), Style::default().fg(Color::Magenta)),
            Span::raw(*what),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(
        "Dialogs: y/Enter confirms, n/Esc cancels; Enter or Esc dismisses an alert.",
    ));
    lines.push(Line::from(
        "Profiles are stored by the backend. Passwords never appear in this log.",
    ));

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
