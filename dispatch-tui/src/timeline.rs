//! Day timeline for dispatching.
//!
//! The layout half is pure: given jobs, the technician roster and a
//! [`DispatchView`], [`layout_day`] produces one lane per technician with
//! percentage-positioned bars. [`TimelineWidget`] then draws a [`DayLayout`]
//! into a ratatui buffer.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    widgets::{Block, Borders, Widget},
};

use crate::app::DispatchView;
use crate::markers::MarkerColor;
use crate::models::{Job, Technician, TechnicianId};
use crate::schedule::{self, hour_label, parse_duration_hours};
use crate::theme::{colors, marker_color, styles};

const BAR_PRIMARY: char = '█';
const BAR_SECONDARY: char = '▒';
const AXIS_LINE: char = '─';
const AXIS_TICK: char = '┬';

/// Width of the lane label column
const LABEL_WIDTH: u16 = 18;

// ============================================
// Layout engine
// ============================================

/// Visible slice of the day, in hours
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineWindow {
    start_hour: f64,
    end_hour: f64,
}

impl TimelineWindow {
    pub const FULL_DAY: TimelineWindow = TimelineWindow {
        start_hour: 0.0,
        end_hour: 24.0,
    };

    /// `None` unless `0 <= start < end <= 24`
    pub fn new(start_hour: f64, end_hour: f64) -> Option<Self> {
        let valid = start_hour.is_finite()
            && end_hour.is_finite()
            && (0.0..24.0).contains(&start_hour)
            && end_hour > start_hour
            && end_hour <= 24.0;
        valid.then_some(Self {
            start_hour,
            end_hour,
        })
    }

    pub fn start_hour(&self) -> f64 {
        self.start_hour
    }

    pub fn end_hour(&self) -> f64 {
        self.end_hour
    }

    pub fn span(&self) -> f64 {
        self.end_hour - self.start_hour
    }
}

impl Default for TimelineWindow {
    fn default() -> Self {
        Self::FULL_DAY
    }
}

/// Horizontal placement of a bar, as percentages of the window width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelinePosition {
    pub left: f64,
    pub width: f64,
}

/// Place a job inside the window.
///
/// Jobs without a start time have no position. `left` is clamped to
/// `[0, 100]`; `width` is then clamped so the bar never runs past the right
/// edge. Overlapping jobs are not rearranged.
pub fn compute_position(job: &Job, window: &TimelineWindow) -> Option<TimelinePosition> {
    let start = job.schedule_start?;
    let span = window.span();

    let start_hour = schedule::start_hour(start);
    let duration = parse_duration_hours(job.schedule_duration.as_deref());

    let left = ((start_hour - window.start_hour) / span * 100.0).clamp(0.0, 100.0);
    let width = (duration / span * 100.0).clamp(0.0, 100.0 - left);

    Some(TimelinePosition { left, width })
}

/// Job starts on the given calendar day
pub fn job_on_day(job: &Job, day: NaiveDate) -> bool {
    job.schedule_start
        .map(|start| schedule::calendar_date(start) == day)
        .unwrap_or(false)
}

/// No filter passes everything; otherwise the technician must be assigned
pub fn matches_technician(job: &Job, filter: Option<TechnicianId>) -> bool {
    match filter {
        Some(tech) => job.is_assigned_to(tech),
        None => true,
    }
}

/// Jobs on the selected day that pass the technician filter
pub fn visible_jobs<'a>(jobs: &'a [Job], view: &DispatchView) -> Vec<&'a Job> {
    jobs.iter()
        .filter(|job| job_on_day(job, view.selected_date))
        .filter(|job| matches_technician(job, view.technician_filter))
        .collect()
}

/// Which row a lane represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneKind {
    Technician(TechnicianId),
    Unassigned,
}

/// A positioned job inside a lane
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineBar {
    pub job: Job,
    pub position: TimelinePosition,
    /// The lane's technician is the primary on this job
    pub is_primary: bool,
}

/// One row of the timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicianLane {
    pub kind: LaneKind,
    pub label: String,
    /// Ordered by start time
    pub bars: Vec<TimelineBar>,
}

/// Everything the timeline needs to draw one day
#[derive(Debug, Clone, PartialEq)]
pub struct DayLayout {
    pub date: NaiveDate,
    pub window: TimelineWindow,
    pub lanes: Vec<TechnicianLane>,
}

impl DayLayout {
    pub fn empty(date: NaiveDate, window: TimelineWindow) -> Self {
        Self {
            date,
            window,
            lanes: Vec::new(),
        }
    }

    pub fn total_bars(&self) -> usize {
        self.lanes.iter().map(|l| l.bars.len()).sum()
    }

    pub fn lane(&self, kind: LaneKind) -> Option<&TechnicianLane> {
        self.lanes.iter().find(|l| l.kind == kind)
    }
}

/// Lay out the selected day, one lane per technician.
///
/// A job with several technicians shows up in each of their lanes. A
/// technician filter yields exactly that technician's lane, even when it has
/// no bars.
pub fn layout_day(
    jobs: &[Job],
    technicians: &[Technician],
    view: &DispatchView,
    window: TimelineWindow,
) -> DayLayout {
    let day_jobs = visible_jobs(jobs, view);
    let mut lanes = Vec::new();

    if let Some(filter) = view.technician_filter {
        let label = technician_label(filter, technicians, &day_jobs);
        lanes.push(technician_lane(filter, label, &day_jobs, &window));
        return DayLayout {
            date: view.selected_date,
            window,
            lanes,
        };
    }

    let search = view.technician_search.as_str();
    for tech in technicians.iter().filter(|t| t.matches_search(search)) {
        lanes.push(technician_lane(tech.id, tech.display_name(), &day_jobs, &window));
    }

    // Assigned technicians the roster doesn't know about (inactive, renamed role)
    let known: BTreeSet<TechnicianId> = technicians.iter().map(|t| t.id).collect();
    let mut extra: BTreeMap<TechnicianId, String> = BTreeMap::new();
    for job in &day_jobs {
        for assignment in &job.technician_assignments {
            if known.contains(&assignment.technician_id) {
                continue;
            }
            extra
                .entry(assignment.technician_id)
                .or_insert_with(|| fallback_label(assignment.technician_id, assignment.display_name.as_deref()));
        }
    }
    let search_lower = search.trim().to_lowercase();
    for (id, label) in extra {
        if search_lower.is_empty() || label.to_lowercase().contains(&search_lower) {
            lanes.push(technician_lane(id, label, &day_jobs, &window));
        }
    }

    if view.show_unassigned {
        let mut bars: Vec<TimelineBar> = day_jobs
            .iter()
            .filter(|job| job.is_unassigned())
            .filter_map(|job| {
                compute_position(job, &window).map(|position| TimelineBar {
                    job: (*job).clone(),
                    position,
                    is_primary: false,
                })
            })
            .collect();
        sort_bars(&mut bars);
        lanes.push(TechnicianLane {
            kind: LaneKind::Unassigned,
            label: "Unassigned".to_string(),
            bars,
        });
    }

    DayLayout {
        date: view.selected_date,
        window,
        lanes,
    }
}

fn technician_lane(
    tech: TechnicianId,
    label: String,
    day_jobs: &[&Job],
    window: &TimelineWindow,
) -> TechnicianLane {
    let mut bars: Vec<TimelineBar> = day_jobs
        .iter()
        .filter_map(|job| {
            let assignment = job
                .technician_assignments
                .iter()
                .find(|a| a.technician_id == tech)?;
            let position = compute_position(job, window)?;
            Some(TimelineBar {
                job: (*job).clone(),
                position,
                is_primary: assignment.is_primary,
            })
        })
        .collect();
    sort_bars(&mut bars);

    TechnicianLane {
        kind: LaneKind::Technician(tech),
        label,
        bars,
    }
}

fn sort_bars(bars: &mut [TimelineBar]) {
    bars.sort_by(|a, b| a.job.schedule_start.cmp(&b.job.schedule_start));
}

fn technician_label(id: TechnicianId, technicians: &[Technician], day_jobs: &[&Job]) -> String {
    if let Some(tech) = technicians.iter().find(|t| t.id == id) {
        return tech.display_name();
    }
    let embedded = day_jobs
        .iter()
        .flat_map(|job| job.technician_assignments.iter())
        .find(|a| a.technician_id == id)
        .and_then(|a| a.display_name.as_deref());
    fallback_label(id, embedded)
}

fn fallback_label(id: TechnicianId, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => format!("Tech {}", id.short()),
    }
}

// ============================================
// Widget
// ============================================

/// Timeline selection state
#[derive(Debug, Clone, Default)]
pub struct TimelineState {
    /// Selected lane index
    pub selected_lane: Option<usize>,
}

impl TimelineState {
    /// Move selection up
    pub fn select_previous(&mut self, total: usize) {
        if total == 0 {
            self.selected_lane = None;
            return;
        }
        self.selected_lane = Some(match self.selected_lane {
            Some(i) if i > 0 && i < total => i - 1,
            _ => total - 1,
        });
    }

    /// Move selection down
    pub fn select_next(&mut self, total: usize) {
        if total == 0 {
            self.selected_lane = None;
            return;
        }
        self.selected_lane = Some(match self.selected_lane {
            Some(i) if i + 1 < total => i + 1,
            _ => 0,
        });
    }

    /// Keep the selection inside a (possibly shrunk) lane list
    pub fn clamp(&mut self, total: usize) {
        self.selected_lane = match self.selected_lane {
            _ if total == 0 => None,
            Some(i) if i >= total => Some(total - 1),
            other => other,
        };
    }
}

/// Renders a [`DayLayout`] as a per-technician Gantt row set
pub struct TimelineWidget<'a> {
    layout: &'a DayLayout,
    state: &'a TimelineState,
    focused: bool,
}

impl<'a> TimelineWidget<'a> {
    pub fn new(layout: &'a DayLayout, state: &'a TimelineState) -> Self {
        Self {
            layout,
            state,
            focused: false,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    /// Column offset for an hour inside a track of `width` cells
    fn hour_to_column(&self, hour: f64, width: u16) -> u16 {
        let window = &self.layout.window;
        let ratio = (hour - window.start_hour()) / window.span();
        ((ratio * width as f64).floor() as i64).clamp(0, width.saturating_sub(1) as i64) as u16
    }

    fn render_axis(&self, area: Rect, buf: &mut Buffer) {
        let window = &self.layout.window;
        let first = window.start_hour().ceil() as u32;
        let last = window.end_hour().floor() as u32;

        // Thin labels out until they fit ("12AM " is the widest)
        let per_hour = area.width as f64 / window.span();
        let step = ((5.0 / per_hour).ceil() as u32).max(1);

        for col in 0..area.width {
            let pos = (area.x + col, area.y + 1);
            buf[pos].set_char(AXIS_LINE);
            buf[pos].set_style(Style::default().fg(colors::BORDER_DIM));
        }

        for hour in (first..=last).filter(|h| h % step == 0) {
            let col = self.hour_to_column(hour as f64, area.width);
            let label = hour_label(hour);
            if col + label.len() as u16 <= area.width {
                buf.set_string(area.x + col, area.y, &label, styles::text_dim());
            }
            let pos = (area.x + col, area.y + 1);
            buf[pos].set_char(AXIS_TICK);
            buf[pos].set_style(Style::default().fg(colors::BORDER));
        }
    }

    fn render_lane(&self, area: Rect, buf: &mut Buffer, lane: &TechnicianLane, row: u16, selected: bool) {
        let y = area.y + row;

        let label_style = if selected {
            styles::selected()
        } else if lane.kind == LaneKind::Unassigned {
            styles::warning()
        } else {
            styles::text()
        };
        let label = truncate(&lane.label, LABEL_WIDTH as usize - 2);
        buf.set_string(
            area.x,
            y,
            format!("{:width$}", label, width = LABEL_WIDTH as usize - 1),
            label_style,
        );

        let track_x = area.x + LABEL_WIDTH;
        let track_width = area.width.saturating_sub(LABEL_WIDTH);
        if track_width == 0 {
            return;
        }

        for col in 0..track_width {
            let pos = (track_x + col, y);
            buf[pos].set_char('·');
            buf[pos].set_style(Style::default().fg(colors::BORDER_DIM));
        }

        for bar in lane.bars.iter().filter(|b| b.position.width > 0.0) {
            let start = (bar.position.left / 100.0 * track_width as f64).floor() as u16;
            let end = ((bar.position.left + bar.position.width) / 100.0 * track_width as f64).ceil() as u16;
            let start = start.min(track_width - 1);
            let end = end.clamp(start + 1, track_width);

            let color = marker_color(MarkerColor::for_status(&bar.job.status));
            let (fill, style) = if bar.is_primary || lane.kind == LaneKind::Unassigned {
                (BAR_PRIMARY, Style::default().fg(color))
            } else {
                (BAR_SECONDARY, Style::default().fg(color))
            };

            for col in start..end {
                let pos = (track_x + col, y);
                buf[pos].set_char(fill);
                buf[pos].set_style(style);
            }

            // Job name on top of the bar when there is room
            let room = (end - start) as usize;
            if room >= 4 {
                let text = truncate(bar.job.display_name(), room);
                let text_style = Style::default()
                    .fg(colors::BG_DARK)
                    .bg(color)
                    .add_modifier(Modifier::BOLD);
                buf.set_string(track_x + start, y, text, text_style);
            }
        }
    }
}

impl Widget for TimelineWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = format!(" Timeline · {} ", schedule::long_date(self.layout.date));
        let block = Block::default()
            .title(title)
            .title_style(styles::title_accent())
            .borders(Borders::ALL)
            .border_style(if self.focused {
                styles::border_focused()
            } else {
                styles::border()
            })
            .style(Style::default().bg(colors::BG_DARK));

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width <= LABEL_WIDTH + 4 || inner.height < 3 {
            return;
        }

        self.render_axis(
            Rect::new(
                inner.x + LABEL_WIDTH,
                inner.y,
                inner.width - LABEL_WIDTH,
                2,
            ),
            buf,
        );

        let rows = Rect::new(inner.x, inner.y + 2, inner.width, inner.height - 2);
        if self.layout.lanes.is_empty() {
            buf.set_string(rows.x + 1, rows.y, "No technicians to show", styles::text_hint());
            return;
        }

        // Scroll so the selected lane stays visible
        let visible = rows.height as usize;
        let selected = self.state.selected_lane.unwrap_or(0);
        let offset = if selected >= visible { selected + 1 - visible } else { 0 };

        for (row, (index, lane)) in self
            .layout
            .lanes
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible)
            .enumerate()
        {
            let is_selected = self.state.selected_lane == Some(index);
            self.render_lane(rows, buf, lane, row as u16, is_selected);
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else if max <= 1 {
        text.chars().take(max).collect()
    } else {
        let mut out: String = text.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}
