//! UI rendering module.
//!
//! Lays out the dispatch board: technician roster, availability dates and the
//! job queue on the left; map over day timeline on the right; log and status
//! bar at the bottom.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Focus, InputMode, LoadState, LogLevel};
use crate::markers::{MapWidget, MarkerColor};
use crate::queue::QueueBucket;
use crate::schedule::long_date;
use crate::theme::{colors, marker_color, styles};
use crate::timeline::TimelineWidget;

/// Render the entire UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Fill background with theme color
    let bg_block = Block::default().style(Style::default().bg(colors::BG_DARK));
    frame.render_widget(bg_block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(12),   // Board
            Constraint::Length(5), // Log area
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_header(frame, app, chunks[0]);
    render_board(frame, app, chunks[1]);
    render_logs(frame, app, chunks[2]);
    render_status(frame, app, chunks[3]);

    if app.error_popup.is_some() {
        render_error_popup(frame, app, area);
    }

    if app.show_help {
        render_help_overlay(frame, area);
    }
}

/// Selected date, fetch span and active filters
fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let view = app.view();

    let mut spans = vec![
        Span::styled(long_date(view.selected_date), styles::title_accent()),
        Span::styled("  │  ", styles::border_dim()),
        Span::styled(format!("by {}", view.span.name()), styles::text_dim()),
    ];

    if let Some(range) = app.fetched_range {
        spans.push(Span::styled(format!(" ({})", range), styles::text_hint()));
    }

    if let Some(id) = view.technician_filter {
        spans.push(Span::styled("  │  ", styles::border_dim()));
        spans.push(Span::styled(app.technician_name(id), styles::warning()));
    }

    let flag = |on: bool, label: &'static str| {
        let style = if on { styles::info() } else { styles::text_hint() };
        Span::styled(format!("  [{}] {}", if on { "x" } else { " " }, label), style)
    };
    spans.push(Span::styled("  │", styles::border_dim()));
    spans.push(flag(view.show_unassigned, "unassigned"));
    spans.push(flag(view.show_completed, "completed"));

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .title(" Dispatch Board ")
            .title_style(styles::title())
            .borders(Borders::ALL)
            .border_style(styles::border())
            .style(Style::default().bg(colors::BG_MEDIUM)),
    );

    frame.render_widget(header, area);
}

fn render_board(frame: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(40)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(25),
            Constraint::Percentage(35),
        ])
        .split(columns[0]);

    render_technicians(frame, app, left[0]);
    render_dates(frame, app, left[1]);
    render_queue(frame, app, left[2]);

    // Timeline needs a row per lane plus axis and borders
    let timeline_height = (app.day_layout.lanes.len() as u16 + 4)
        .max(6)
        .min(columns[1].height / 2);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(timeline_height)])
        .split(columns[1]);

    let map = MapWidget::new(&app.markers, &app.viewport)
        .selected(app.map_selected)
        .pending(app.pending_geocode);
    frame.render_widget(map, right[0]);
    if app.focus == Focus::Map {
        frame.render_widget(
            Block::default()
                .borders(Borders::ALL)
                .border_style(styles::border_focused()),
            right[0],
        );
    }

    let timeline = TimelineWidget::new(&app.day_layout, &app.timeline_state)
        .focused(app.focus == Focus::Timeline);
    frame.render_widget(timeline, right[1]);

    if let Some(message) = timeline_notice(app) {
        if app.day_layout.lanes.is_empty() {
            render_empty_state(frame, right[1], message);
        } else {
            // Lane rows stay readable; the notice sits in the bottom border
            render_border_notice(frame, right[1], message);
        }
    }
}

/// Why the timeline has no bars, if it has none
fn timeline_notice(app: &App) -> Option<&'static str> {
    if app.day_layout.total_bars() > 0 {
        return None;
    }
    Some(match app.load_state {
        LoadState::Loading => "Loading...",
        LoadState::Failed(_) => "Jobs could not be loaded",
        _ => "No jobs on this day",
    })
}

fn render_border_notice(frame: &mut Frame, area: Rect, message: &str) {
    if area.height < 2 || area.width < 6 {
        return;
    }
    let footer = Rect::new(area.x + 2, area.bottom() - 1, area.width - 4, 1);
    let notice = Paragraph::new(format!(" {} ", message))
        .style(styles::text_dim())
        .alignment(Alignment::Right);
    frame.render_widget(notice, footer);
}

fn panel_block(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .title(title)
        .title_style(if focused {
            styles::title_accent()
        } else {
            styles::title()
        })
        .borders(Borders::ALL)
        .border_style(if focused {
            styles::border_focused()
        } else {
            styles::border()
        })
        .style(Style::default().bg(colors::BG_DARK))
}

/// Row style: cursor wins over the active filter
fn row_style(is_cursor: bool, is_active: bool, focused: bool) -> Style {
    if is_cursor && focused {
        styles::selected()
    } else if is_active {
        styles::active()
    } else {
        styles::text()
    }
}

fn render_technicians(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Technicians;
    let view = app.view();
    let visible = app.visible_technicians();

    let mut items = vec![ListItem::new(Line::from(Span::styled(
        "All technicians",
        row_style(
            app.technician_selected == 0,
            view.technician_filter.is_none(),
            focused,
        ),
    )))];

    items.extend(visible.iter().enumerate().map(|(i, tech)| {
        let style = row_style(
            app.technician_selected == i + 1,
            view.technician_filter == Some(tech.id),
            focused,
        );
        let today = app.availability.has_work_on(tech.id, view.selected_date);
        ListItem::new(Line::from(vec![
            Span::styled(
                if today { "● " } else { "  " },
                Style::default().fg(colors::GREEN),
            ),
            Span::styled(tech.display_name(), style),
        ]))
    }));

    let title = if app.input_mode == InputMode::Searching || !view.technician_search.is_empty() {
        format!(" Technicians /{} ", view.technician_search)
    } else {
        format!(" Technicians ({}) ", visible.len())
    };

    let mut block = panel_block(title, focused);
    if app.input_mode == InputMode::Searching {
        block = block.title_style(styles::input_focused());
    }

    frame.render_widget(List::new(items).block(block), area);
}

fn render_dates(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Dates;
    let dates = app.active_dates();
    let selected_date = app.view().selected_date;

    let title = match app.dates_technician() {
        Some(id) => format!(" Working days · {} ", app.technician_name(id)),
        None => " Working days ".to_string(),
    };

    let items: Vec<ListItem> = dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let count = app.job_counts.get(date).copied().unwrap_or(0);
            let style = row_style(i == app.date_selected, *date == selected_date, focused);
            ListItem::new(Line::from(vec![
                Span::styled(date.format("%a %b %-d").to_string(), style),
                Span::styled(format!("  {} jobs", count), styles::text_hint()),
            ]))
        })
        .collect();

    frame.render_widget(List::new(items).block(panel_block(title, focused)), area);

    if dates.is_empty() {
        let message = if app.dates_technician().is_some() {
            "No work in range"
        } else {
            "Pick a technician"
        };
        render_empty_state(frame, area, message);
    }
}

fn render_queue(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Queue;
    let block = panel_block(" Queue ".to_string(), focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(QueueBucket::ALL.len() as u16), Constraint::Min(0)])
        .split(inner);

    let counts: Vec<ListItem> = QueueBucket::ALL
        .iter()
        .map(|bucket| {
            let count = app.queue.bucket(*bucket).len();
            let style = if *bucket == app.queue_bucket {
                styles::title_accent()
            } else if count == 0 {
                styles::text_hint()
            } else {
                styles::text_dim()
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<18}", bucket.name()), style),
                Span::styled(format!("{:>4}", count), style),
            ]))
        })
        .collect();
    frame.render_widget(List::new(counts), rows[0]);

    let jobs: Vec<ListItem> = app
        .queue
        .bucket(app.queue_bucket)
        .iter()
        .enumerate()
        .map(|(i, job)| {
            let style = if focused && i == app.queue_selected {
                styles::selected()
            } else {
                styles::text()
            };
            let dot = Span::styled(
                "■ ",
                Style::default().fg(marker_color(MarkerColor::for_status(&job.status))),
            );
            let number = job
                .number
                .as_deref()
                .map(|n| format!("#{} ", n))
                .unwrap_or_default();
            ListItem::new(Line::from(vec![
                dot,
                Span::styled(number, styles::text_hint()),
                Span::styled(job.display_name().to_string(), style),
            ]))
        })
        .collect();

    let list = List::new(jobs).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(styles::border_dim()),
    );
    frame.render_widget(list, rows[1]);
}

/// Render the log area
fn render_logs(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .logs
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .map(|entry| {
            let (prefix, color) = match entry.level {
                LogLevel::Info => ("i", colors::BLUE),
                LogLevel::Success => ("+", colors::GREEN),
                LogLevel::Warning => ("!", colors::YELLOW),
                LogLevel::Error => ("x", colors::RED),
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("[{}] ", prefix), Style::default().fg(color)),
                Span::styled(&entry.message, styles::text_dim()),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Log ")
            .title_style(Style::default().fg(colors::FG_DIM))
            .borders(Borders::ALL)
            .border_style(styles::border_dim())
            .style(Style::default().bg(colors::BG_DARK)),
    );

    frame.render_widget(list, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let dot_color = match (&app.load_state, app.api_connected) {
        (LoadState::Loading, _) => colors::STATUS_PENDING,
        (_, true) => colors::STATUS_CONNECTED,
        (_, false) => colors::STATUS_DISCONNECTED,
    };

    let status = Paragraph::new(Line::from(vec![
        Span::styled(" ● ", Style::default().fg(dot_color)),
        Span::styled(app.status_text(), styles::text_dim()),
    ]))
    .style(Style::default().bg(colors::BG_MEDIUM));

    frame.render_widget(status, area);
}

/// Render empty state message
fn render_empty_state(frame: &mut Frame, area: Rect, message: &str) {
    let paragraph = Paragraph::new(message)
        .style(styles::text_dim())
        .alignment(Alignment::Center);

    // Center the message
    let inner = Block::default().borders(Borders::ALL).inner(area);
    let y = inner.y + inner.height / 2;
    let centered = Rect::new(inner.x, y, inner.width, 1);

    frame.render_widget(paragraph, centered);
}

/// Render error popup
fn render_error_popup(frame: &mut Frame, app: &App, area: Rect) {
    let Some(popup) = app.error_popup.as_ref() else {
        return;
    };

    let popup_width = (u32::from(area.width) * 60 / 100).clamp(30, 60) as u16;
    let popup_height = 7;

    let popup_area = centered_rect(popup_width, popup_height, area);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(format!(" {} ", popup.title))
        .title_style(
            Style::default()
                .fg(Color::White)
                .bg(colors::RED)
                .add_modifier(Modifier::BOLD),
        )
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::RED))
        .style(Style::default().bg(Color::Rgb(0x2A, 0x18, 0x18)));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let text = Paragraph::new(popup.message.as_str())
        .style(styles::text())
        .wrap(Wrap { trim: true });

    frame.render_widget(text, inner);

    let hint = Paragraph::new("Press ESC or ENTER to dismiss")
        .style(styles::text_hint())
        .alignment(Alignment::Center);

    let hint_area = Rect::new(
        popup_area.x,
        popup_area.y + popup_area.height - 1,
        popup_area.width,
        1,
    );
    frame.render_widget(hint, hint_area);
}

fn help_line(keys: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<16}", keys), Style::default().fg(colors::BLUE)),
        Span::raw(action),
    ])
}

fn help_section(name: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        name,
        Style::default()
            .fg(colors::PURPLE)
            .add_modifier(Modifier::BOLD),
    ))
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let help_text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default()
                .fg(colors::BLUE)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        help_section("Dates"),
        help_line("h/l  ←/→", "Previous / next day"),
        help_line("H/L", "Back / forward a week"),
        help_line("t", "Jump to today"),
        help_line("v", "Fetch by day, week or month"),
        Line::from(""),
        help_section("Panels"),
        help_line("Tab/Shift+Tab", "Move between panels"),
        help_line("j/k  ↑/↓", "Move within a panel"),
        help_line("Enter", "Filter by technician / open date"),
        help_line("[ ]", "Queue: switch bucket"),
        Line::from(""),
        help_section("Filters"),
        help_line("/", "Search technicians"),
        help_line("u", "Show unassigned lane"),
        help_line("c", "Show completed on map"),
        help_line("Esc", "Clear filters"),
        Line::from(""),
        help_section("General"),
        help_line("r / R", "Reload jobs / technicians"),
        help_line("q/Ctrl+C", "Quit"),
    ];

    let popup_area = centered_rect(56, help_text.len() as u16 + 2, area);
    frame.render_widget(Clear, popup_area);

    let paragraph = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(" Help ")
                .title_style(styles::title())
                .borders(Borders::ALL)
                .border_style(styles::border())
                .style(styles::modal_content_bg()),
        )
        .style(styles::text());

    frame.render_widget(paragraph, popup_area);
}

/// Helper to create a centered rectangle
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppSettings;
    use chrono::NaiveDate;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn test_centered_rect_fits_area() {
        let area = Rect::new(0, 0, 40, 10);
        let rect = centered_rect(60, 20, area);
        assert_eq!(rect, Rect::new(0, 0, 40, 10));

        let rect = centered_rect(20, 4, area);
        assert_eq!(rect, Rect::new(10, 3, 20, 4));
    }

    #[test]
    fn test_renders_empty_board() {
        let app = App::new(
            AppSettings::default(),
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        );
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Monday, June 10, 2024"));
        assert!(text.contains("All technicians"));
    }

    fn buffer_rows(terminal: &Terminal<TestBackend>) -> Vec<String> {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|c| c.symbol()).collect())
            .collect()
    }

    #[test]
    fn test_empty_day_notice_leaves_lanes_visible() {
        let mut app = App::new(
            AppSettings::default(),
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        );
        let seq = app
            .startup_commands()
            .into_iter()
            .find_map(|cmd| match cmd {
                crate::api::ApiCommand::FetchJobs { seq, .. } => Some(seq),
                _ => None,
            })
            .unwrap();
        let roster = serde_json::from_str(
            r#"[{"id": "0b9e7c1a-2d3f-4e5a-8b6c-7d8e9f0a1b2c", "first_name": "Jane", "last_name": "Tech"}]"#,
        )
        .unwrap();
        app.handle_api_message(crate::api::ApiMessage::TechniciansLoaded(roster));
        app.handle_api_message(crate::api::ApiMessage::JobsLoaded {
            seq,
            range: app.view().fetch_range(),
            jobs: Vec::new(),
        });
        assert!(!app.day_layout.lanes.is_empty());

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();
        let rows = buffer_rows(&terminal);

        // Notice sits on the timeline's bottom border, not over a lane
        let notice = rows
            .iter()
            .find(|row| row.contains("No jobs on this day"))
            .unwrap();
        assert_eq!(notice.chars().nth(32), Some('└'));
        assert!(rows.iter().any(|row| row.contains("Unassigned")));
        let jane = rows.iter().map(|row| row.matches("Jane Tech").count()).sum::<usize>();
        assert!(jane >= 2);
    }

    #[test]
    fn test_error_popup_on_very_wide_terminal() {
        let mut app = App::new(
            AppSettings::default(),
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        );
        app.show_error("API Error", "backend unreachable");

        let mut terminal = Terminal::new(TestBackend::new(1200, 30)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        let rows = buffer_rows(&terminal);
        assert!(rows.iter().any(|row| row.contains("backend unreachable")));
    }
}
