use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style, Modifier},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use autohunt_core::types::{HuntStatus, RunState};
use crate::App;

fn key(k: &'static str) -> Span<'static> {
    Span::styled(k, Style::default().fg(Color::Yellow))
}

fn stat_line(label: &'static str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<12}", label), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn status_lines(app: &App, s: &HuntStatus, accent: Color) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(vec![
        Span::raw(" "),
        key("j"),
        Span::raw("/"),
        key("k"),
        Span::raw(" move, "),
        key("space"),
        Span::raw(" select, "),
        key("r"),
        Span::raw(" rescan, "),
        key("l"),
        Span::raw(" logs, "),
        key("q"),
        Span::raw(" quit"),
    ]));
    lines.push(Line::from(""));

    if s.windows.is_empty() {
        lines.push(Line::from(Span::styled(
            "  no matching windows",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (i, w) in s.windows.iter().enumerate() {
        let prefix = if i == app.cursor { "> " } else { "  " };
        let checkbox = if s.selected == Some(i) { "[●]" } else { "[ ]" };
        lines.push(Line::from(vec![
            Span::raw(prefix),
            Span::styled(checkbox, Style::default().fg(accent)),
            Span::raw(" "),
            Span::styled(w.title.clone(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
            Span::styled(format!("  #{:x}", w.id), Style::default().fg(Color::DarkGray)),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(stat_line("phase", s.phase.label().to_string(), Color::Cyan));
    let target = match s.target {
        Some(p) => format!("({}, {})", p.x, p.y),
        None => "-".to_string(),
    };
    lines.push(stat_line("target", target, Color::Cyan));
    lines.push(stat_line("kills", s.stats.kills.to_string(), Color::Green));
    lines.push(stat_line("abandoned", s.stats.abandoned.to_string(), Color::Yellow));
    lines.push(stat_line("engagements", s.stats.engagements.to_string(), Color::White));
    lines.push(stat_line("checks", s.stats.checks.to_string(), Color::White));
    lines.push(stat_line("capture err", s.stats.capture_failures.to_string(), Color::White));

    if let Some(e) = &s.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!("  err: {}", e), Style::default().fg(Color::Red))));
    }
    lines
}

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    // -- Left panel: windows and hunt status --
    let (banner_label, banner_bg, lines) = match app.status.lock() {
        Ok(s) => {
            let (label, bg) = match s.run_state {
                RunState::Running => ("RUNNING (Press S to stop)", Color::Green),
                RunState::Stopping => ("STOPPING...", Color::Yellow),
                RunState::Stopped => ("STOPPED (Press S to start)", Color::Red),
            };
            (label, bg, status_lines(app, &s, bg))
        }
        Err(_) => ("STATUS UNAVAILABLE", Color::Red, Vec::new()),
    };

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(chunks[0]);

    // Full-width centered banner
    let banner_width = left_chunks[0].width as usize;
    let pad_total = banner_width.saturating_sub(banner_label.len());
    let pad_left = pad_total / 2;
    let pad_right = pad_total - pad_left;
    let centered_banner = format!("{}{}{}", " ".repeat(pad_left), banner_label, " ".repeat(pad_right));
    let banner = Paragraph::new(Line::from(Span::styled(
        centered_banner,
        Style::default().fg(Color::Black).bg(banner_bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, left_chunks[0]);

    let status_panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(status_panel, left_chunks[1]);

    // -- Right panel: logs --
    if app.log_visible && chunks.len() > 1 {
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_messages.len();
        let max_scroll = total.saturating_sub(visible_height);
        let scroll = app.log_scroll.min(max_scroll);
        let start = total.saturating_sub(visible_height + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app.log_messages[start..end]
            .iter()
            .map(|m| parse_log_line(m))
            .collect();

        let log_panel = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Logs ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(log_panel, chunks[1]);
    }

    if let Some(dialog) = &app.confirm {
        dialog.render(f);
    }
}

/// Parse a structured log line (level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage)
/// into a colored Line.
fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(5, '\x1f').collect();
    if parts.len() < 5 {
        return Line::from(raw);
    }

    let (level, prefix, timestamp, message) = (parts[0], parts[1], parts[3], parts[4]);
    let color = match parts[2].parse::<u8>().unwrap_or(0) {
        1 => Color::DarkGray,  // COLOR_GRAY
        2 => Color::LightBlue, // COLOR_BLUE
        3 => Color::LightGreen, // COLOR_GREEN
        _ => Color::White,
    };

    let mut spans = vec![
        Span::styled(timestamp, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
    ];

    // Level tag only for warn/error
    match level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        _ => {}
    }

    if !prefix.is_empty() {
        spans.push(Span::styled(prefix, Style::default().fg(color).add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(message, Style::default().fg(color)));

    Line::from(spans)
}
