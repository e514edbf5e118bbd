use apilog_core::LogRecord;
use chrono::{DateTime, Local, Utc};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};
use serde_json::Value;

use crate::app::{App, Pane};

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Status bar
            Constraint::Min(0),    // Main area
            Constraint::Length(1), // Help bar
        ])
        .split(frame.area());

    render_status_bar(frame, app, chunks[0]);
    render_main(frame, app, chunks[1]);
    render_help_bar(frame, app, chunks[2]);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " apilog",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(
            calls_label(app),
            Style::default().fg(Color::Green),
        ),
        Span::raw(" | Store: "),
        Span::styled(&app.backend_name, Style::default().fg(Color::Yellow)),
    ];
    if let Some(reason) = &app.degraded {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("degraded: {}", truncate_str(reason, 60)),
            Style::default().fg(Color::Red),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray)),
        area,
    );
}

/// A relay client does not know the server's bound, so none is shown.
fn calls_label(app: &App) -> String {
    if app.backend_name == "relay" {
        format!("Calls: {} (bound kept by relay server)", app.records.len())
    } else {
        format!("Calls: {}/{}", app.records.len(), app.capacity)
    }
}

fn render_main(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    render_record_list(frame, app, chunks[0]);
    render_record_detail(frame, app, chunks[1]);
}

fn status_color(status: u16) -> Color {
    match status {
        200..=299 => Color::Green,
        300..=399 => Color::Yellow,
        400..=499 => Color::Red,
        500..=599 => Color::Magenta,
        _ => Color::White,
    }
}

fn pane_style(app: &App, pane: Pane) -> Style {
    if app.active_pane == pane {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn render_record_list(frame: &mut Frame, app: &App, area: Rect) {
    let list_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let filter_style = if app.filter_active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    let filter_text = if app.filter.is_empty() && !app.filter_active {
        "Press / to filter by URL or method".to_string()
    } else {
        app.filter.clone()
    };
    let filter = Paragraph::new(filter_text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(filter_style)
            .title(" Filter "),
    );
    frame.render_widget(filter, list_chunks[0]);

    let filtered = app.filtered_records();

    let header = Row::new(vec![
        Cell::from("Time"),
        Cell::from("Method"),
        Cell::from("URL"),
        Cell::from("Status"),
    ])
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = filtered
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let style = if i == app.selected_index {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(format_time(&record.timestamp)),
                Cell::from(record.method.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(truncate_url(&record.url, 40)),
                Cell::from(record.status.to_string())
                    .style(Style::default().fg(status_color(record.status))),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Min(10),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(pane_style(app, Pane::RecordList))
            .title(format!(" API calls ({}) ", filtered.len())),
    );

    let mut state = TableState::default();
    state.select(Some(app.selected_index));
    frame.render_stateful_widget(table, list_chunks[1], &mut state);
}

fn render_record_detail(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(pane_style(app, Pane::RecordDetail))
        .title(" Detail ");

    let Some(record) = app.selected_record() else {
        let empty = Paragraph::new("No API calls logged")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    };

    frame.render_widget(
        Paragraph::new(Text::from(detail_lines(record)))
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn detail_lines(record: &LogRecord) -> Vec<Line<'_>> {
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        "Request",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(vec![
        Span::styled(
            record.method.clone(),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::raw(record.url.as_str()),
    ]));
    lines.push(Line::from(Span::styled(
        format!("{}  id {}", record.timestamp.to_rfc3339(), record.id),
        Style::default().fg(Color::DarkGray),
    )));

    if let Some(body) = &record.request_body {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Body:",
            Style::default().fg(Color::DarkGray),
        )));
        append_payload_lines(&mut lines, body);
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "━".repeat(40),
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(""));

    lines.push(Line::from(vec![
        Span::styled(
            "Response",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ("),
        Span::styled(
            record.status.to_string(),
            Style::default()
                .fg(status_color(record.status))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(")"),
    ]));
    lines.push(Line::from(""));
    append_payload_lines(&mut lines, &record.response);

    lines
}

fn render_help_bar(frame: &mut Frame, app: &App, area: Rect) {
    let help = if app.filter_active {
        Line::from(vec![
            Span::styled(" [Esc]", Style::default().fg(Color::Yellow)),
            Span::raw("cancel  "),
            Span::styled("[Enter]", Style::default().fg(Color::Yellow)),
            Span::raw("apply  "),
            Span::styled("[Backspace]", Style::default().fg(Color::Yellow)),
            Span::raw("delete"),
        ])
    } else {
        Line::from(vec![
            Span::styled(" [q]", Style::default().fg(Color::Yellow)),
            Span::raw("uit  "),
            Span::styled("[/]", Style::default().fg(Color::Yellow)),
            Span::raw("filter  "),
            Span::styled("[j/k]", Style::default().fg(Color::Yellow)),
            Span::raw("navigate  "),
            Span::styled("[Tab]", Style::default().fg(Color::Yellow)),
            Span::raw("switch  "),
            Span::styled("[r]", Style::default().fg(Color::Yellow)),
            Span::raw("efresh  "),
            Span::styled("[c]", Style::default().fg(Color::Yellow)),
            Span::raw("lear log"),
        ])
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().bg(Color::DarkGray)),
        area,
    );
}

fn format_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

fn truncate_url(url: &str, max_len: usize) -> String {
    let display = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    truncate_str(display, max_len)
}

/// Truncate on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{head}…")
    } else {
        s.to_string()
    }
}

fn append_payload_lines(lines: &mut Vec<Line>, payload: &Value) {
    let text = match payload {
        // Non-JSON bodies are stored as strings; show them raw.
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    for line in text.lines().take(40) {
        lines.push(Line::from(Span::styled(
            line.to_string(),
            Style::default().fg(Color::White),
        )));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_calls_label_defers_to_relay_server_bound() {
        let local = App::new("sqlite", 100);
        assert_eq!(calls_label(&local), "Calls: 0/100");

        let relay = App::new("relay", 100);
        assert_eq!(calls_label(&relay), "Calls: 0 (bound kept by relay server)");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_str("ünïcödé-path", 5), "ünïc…");
        assert_eq!(truncate_str("short", 10), "short");
    }

    #[test]
    fn test_truncate_url_strips_scheme() {
        assert_eq!(
            truncate_url("https://api.test/v2/billing/customers", 100),
            "api.test/v2/billing/customers"
        );
    }

    #[test]
    fn test_detail_shows_text_response_raw() {
        let record = LogRecord::new(
            "DELETE",
            "https://api.test/pm",
            json!("Not Found"),
            404,
            None,
        );
        let lines = detail_lines(&record);
        let rendered: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert!(rendered.iter().any(|l| l == "Not Found"));
        assert!(rendered.iter().any(|l| l.starts_with("DELETE https://api.test/pm")));
    }
}
