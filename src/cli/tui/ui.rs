//! UI rendering for the TUI.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs},
};

use crate::client::HistoryAction;
use crate::core::{Job, JobStatus};

use super::app::{AddField, TuiApp, View};

/// Main render function - dispatches to view-specific renderers.
pub fn render(frame: &mut Frame, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer/help
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match app.view {
        View::Queue => render_queue(frame, app, chunks[1]),
        View::History => render_history(frame, app, chunks[1]),
        View::Add => render_add_form(frame, app, chunks[1]),
    }

    render_footer(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let selected = match app.view {
        View::Queue => 0,
        View::History => 1,
        View::Add => 2,
    };
    let tabs = Tabs::new(vec![
        format!("Queue ({})", app.queue.jobs().len()),
        format!("History ({})", app.history.records().len()),
        "Add".to_string(),
    ])
    .select(selected)
    .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    .block(
        Block::default()
            .title("dlq")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(tabs, area);
}

fn render_queue(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .title("Download Queue")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if app.queue.jobs().is_empty() {
        let text = Paragraph::new("  Queue is empty. Press [a] to add a download.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    }

    let items: Vec<ListItem> = app
        .queue
        .jobs()
        .iter()
        .enumerate()
        .map(|(i, job)| {
            let is_selected = i == app.queue_selected;
            let mut lines = vec![job_line(job, is_selected)];

            if let Some(log) = job.status.failure_log() {
                if app.expand.is_expanded(&job.id) {
                    lines.extend(log.lines().map(|l| {
                        Line::from(Span::styled(
                            format!("      {}", l),
                            Style::default().fg(Color::Red),
                        ))
                    }));
                }
            }

            ListItem::new(lines).style(row_style(is_selected))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn job_line(job: &Job, is_selected: bool) -> Line<'static> {
    let (icon, color) = match &job.status {
        JobStatus::Pending => ("•", Color::Gray),
        JobStatus::Downloading { .. } => ("▶", Color::Yellow),
        JobStatus::Completed => ("✓", Color::Green),
        JobStatus::Failed(_) => ("✗", Color::Red),
        JobStatus::Unrecognized(_) => ("?", Color::DarkGray),
    };

    let mut spans = vec![
        Span::raw(if is_selected { "> " } else { "  " }),
        Span::styled(icon, Style::default().fg(color)),
        Span::raw(format!("  {}  ", job.display_name)),
        Span::styled(
            format!("({})  ", job.content_id),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    match &job.status {
        JobStatus::Downloading {
            progress: Some(p),
        } => spans.push(Span::styled(
            format!("{} {:>3.0}%", progress_bar(*p, 20), p),
            Style::default().fg(color),
        )),
        status => spans.push(Span::styled(
            status.label().into_owned(),
            Style::default().fg(color),
        )),
    }

    if let Some(path) = &job.install_path {
        spans.push(Span::styled(
            format!("  {}", path),
            Style::default().fg(Color::DarkGray),
        ));
    }

    Line::from(spans)
}

fn render_history(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .title("History")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if app.history.records().is_empty() {
        let text = Paragraph::new("  No finished downloads")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    }

    let items: Vec<ListItem> = app
        .history
        .records()
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let is_selected = i == app.history_selected;
            let action = match app.existence.action_for(record) {
                HistoryAction::Open => Span::styled("[Open]", Style::default().fg(Color::Green)),
                HistoryAction::Retry => {
                    Span::styled("[Retry]", Style::default().fg(Color::Yellow))
                }
            };

            let line = Line::from(vec![
                Span::raw(if is_selected { "> " } else { "  " }),
                Span::raw(record.timestamp.format("%Y-%m-%d %H:%M").to_string()),
                Span::raw(format!("  {}  ", record.display_name)),
                Span::styled(
                    format!("({})  ", record.content_id),
                    Style::default().fg(Color::DarkGray),
                ),
                action,
            ]);

            ListItem::new(line).style(row_style(is_selected))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_add_form(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .title("Add Download")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let field = |label: &'static str, value: &str, active: bool| {
        let cursor = if active { "█" } else { "" };
        let label_style = if active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        Line::from(vec![
            Span::styled(label, label_style),
            Span::raw(format!("{}{}", value, cursor)),
        ])
    };

    let placeholder = if app.form.content_id.trim().is_empty() {
        "App <id>".to_string()
    } else {
        crate::core::default_display_name(app.form.content_id.trim())
    };

    let lines = vec![
        Line::from(""),
        field(
            "  Content ID or Workshop URL: ",
            &app.form.content_id,
            app.form.field == AddField::ContentId,
        ),
        Line::from(""),
        field(
            "  Display name:               ",
            &app.form.display_name,
            app.form.field == AddField::DisplayName,
        ),
        Line::from(Span::styled(
            format!("                              (blank: {})", placeholder),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_footer(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let help_text = match app.view {
        View::Queue => "[↑↓] Navigate  [Enter] Log  [o] Open  [a] Add  [Tab] History  [r] Refresh  [q] Quit",
        View::History => {
            "[↑↓] Navigate  [Enter] Open/Retry  [d] Delete  [C] Clear  [Tab] Queue  [q] Quit"
        }
        View::Add => "[Tab] Next field  [Enter] Submit  [Esc] Cancel",
    };

    let mut spans = vec![Span::raw(format!("  {}", help_text))];

    if let Some(error) = &app.error {
        spans.push(Span::styled(
            format!("  Error: {}", error),
            Style::default().fg(Color::Red),
        ));
    } else if let Some(notice) = &app.notice {
        spans.push(Span::styled(
            format!("  {}", notice),
            Style::default().fg(Color::Green),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn row_style(is_selected: bool) -> Style {
    if is_selected {
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn progress_bar(percentage: f32, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f32) as usize;
    let empty = width - filled.min(width);
    format!("[{}{}]", "█".repeat(filled.min(width)), "░".repeat(empty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_bounds() {
        assert_eq!(progress_bar(0.0, 4), "[░░░░]");
        assert_eq!(progress_bar(50.0, 4), "[██░░]");
        assert_eq!(progress_bar(100.0, 4), "[████]");
    }
}
