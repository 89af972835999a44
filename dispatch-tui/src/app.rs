//! Application state and event handling.
//!
//! This module implements the Elm Architecture pattern for state management,
//! with a centralized App struct holding all application state. What the user
//! is looking at lives in one [`DispatchView`] value; every change to it
//! replaces the value and recomputes the timeline, availability index, map
//! markers and job queue from scratch.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::api::{ApiCommand, ApiMessage, RequestSequencer};
use crate::availability::{active_jobs, build_availability_index, job_counts_by_date, AvailabilityIndex};
use crate::config::DispatchConfig;
use crate::geocode::job_addresses;
use crate::markers::{
    build_markers, map_jobs, viewport_for, LatLng, MarkerSet, Viewport, DEFAULT_MAX_ZOOM,
};
use crate::models::{Job, Technician, TechnicianId};
use crate::queue::{categorize_jobs, JobQueue, QueueBucket};
use crate::schedule::{shift_day, DateRange, ViewSpan};
use crate::timeline::{layout_day, DayLayout, LaneKind, TimelineState, TimelineWindow};

// ============================================
// View state
// ============================================

/// Everything that decides what the board shows.
///
/// Treated as a value: handlers build a new one and hand it to
/// [`App::set_view`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchView {
    pub selected_date: NaiveDate,
    pub technician_filter: Option<TechnicianId>,
    pub span: ViewSpan,
    pub show_unassigned: bool,
    pub show_completed: bool,
    /// Case-insensitive technician name filter
    pub technician_search: String,
}

impl DispatchView {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            selected_date: date,
            technician_filter: None,
            span: ViewSpan::default(),
            show_unassigned: true,
            show_completed: false,
            technician_search: String::new(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.selected_date = date;
        self
    }

    pub fn with_technician(mut self, technician: Option<TechnicianId>) -> Self {
        self.technician_filter = technician;
        self
    }

    pub fn with_span(mut self, span: ViewSpan) -> Self {
        self.span = span;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.technician_search = search.into();
        self
    }

    pub fn toggle_unassigned(mut self) -> Self {
        self.show_unassigned = !self.show_unassigned;
        self
    }

    pub fn toggle_completed(mut self) -> Self {
        self.show_completed = !self.show_completed;
        self
    }

    /// Dates a job fetch must cover for this view
    pub fn fetch_range(&self) -> DateRange {
        DateRange::around(self.selected_date, self.span)
    }
}

// ============================================
// UI state
// ============================================

/// Panel that receives navigation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Technicians,
    Dates,
    Timeline,
    Map,
    Queue,
}

impl Focus {
    pub fn next(&self) -> Self {
        match self {
            Focus::Technicians => Focus::Dates,
            Focus::Dates => Focus::Timeline,
            Focus::Timeline => Focus::Map,
            Focus::Map => Focus::Queue,
            Focus::Queue => Focus::Technicians,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Focus::Technicians => Focus::Queue,
            Focus::Dates => Focus::Technicians,
            Focus::Timeline => Focus::Dates,
            Focus::Map => Focus::Timeline,
            Focus::Queue => Focus::Map,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Focus::Technicians => "Technicians",
            Focus::Dates => "Dates",
            Focus::Timeline => "Timeline",
            Focus::Map => "Map",
            Focus::Queue => "Queue",
        }
    }
}

/// Input mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Normal navigation mode
    #[default]
    Normal,
    /// Typing a technician name filter
    Searching,
}

/// Where the current job data came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    /// Last fetch failed; derived state was cleared
    Failed(String),
}

/// Error popup state
#[derive(Debug, Clone)]
pub struct ErrorPopup {
    /// Error title
    pub title: String,
    /// Error message
    pub message: String,
    /// When the error was shown
    pub shown_at: Instant,
    /// Auto-dismiss duration (None for manual dismiss)
    pub auto_dismiss: Option<Duration>,
}

impl ErrorPopup {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            shown_at: Instant::now(),
            auto_dismiss: Some(Duration::from_secs(5)),
        }
    }

    pub fn should_dismiss(&self) -> bool {
        self.auto_dismiss
            .map(|d| self.shown_at.elapsed() > d)
            .unwrap_or(false)
    }
}

/// Log entry for the message area
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: Instant,
    pub message: String,
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogEntry {
    fn with_level(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Instant::now(),
            message: message.into(),
            level,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_level(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_level(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_level(LogLevel::Error, message)
    }
}

/// Fixed settings taken from configuration at startup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppSettings {
    pub window: TimelineWindow,
    /// Map view when there is nothing to fit
    pub home: Viewport,
    pub max_zoom: u8,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            window: TimelineWindow::FULL_DAY,
            home: Viewport::new(LatLng::new(33.749, -84.388), 12),
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }
}

impl From<&DispatchConfig> for AppSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            window: config.timeline_window(),
            home: config.home_viewport(),
            max_zoom: config.map.max_zoom,
        }
    }
}

// ============================================
// App
// ============================================

/// Main application state
#[derive(Debug)]
pub struct App {
    /// Whether the application should quit
    pub should_quit: bool,

    /// Panel receiving navigation keys
    pub focus: Focus,

    /// Current input mode
    pub input_mode: InputMode,

    pub settings: AppSettings,

    /// Current view; replaced, never edited in place
    view: DispatchView,

    /// Local date, refreshed on tick
    pub today: NaiveDate,

    // --- Fetched data ---
    /// Jobs from the last applied fetch
    pub jobs: Vec<Job>,
    /// Technician roster
    pub technicians: Vec<Technician>,
    /// Resolved coordinates by address
    pub coordinates: HashMap<String, LatLng>,
    /// Addresses sent to the geocoder and not yet answered, or answered with
    /// coordinates
    geocode_requested: HashSet<String>,
    /// Outstanding geocode batches by fetch sequence
    geocode_batches: HashMap<u64, Vec<String>>,
    /// Range covered by `jobs`
    pub fetched_range: Option<DateRange>,
    /// Range of the newest fetch issued
    requested_range: Option<DateRange>,
    sequencer: RequestSequencer,
    pub load_state: LoadState,
    /// Addresses waiting on the geocoder across all outstanding batches
    pub pending_geocode: usize,

    // --- Derived state ---
    pub day_layout: DayLayout,
    pub availability: AvailabilityIndex,
    pub job_counts: BTreeMap<NaiveDate, usize>,
    pub markers: MarkerSet,
    pub viewport: Viewport,
    pub queue: JobQueue,

    // --- Selection ---
    pub timeline_state: TimelineState,
    /// Row in the technician list (0 is "All technicians")
    pub technician_selected: usize,
    /// Row in the dates list
    pub date_selected: usize,
    pub map_selected: Option<usize>,
    pub queue_bucket: QueueBucket,
    pub queue_selected: usize,

    /// Current error popup (if any)
    pub error_popup: Option<ErrorPopup>,

    /// Log messages
    pub logs: Vec<LogEntry>,
    /// Maximum number of log entries to keep
    max_logs: usize,

    /// API connection status
    pub api_connected: bool,

    /// Last data refresh time
    pub last_refresh: Option<Instant>,

    /// Frame counter
    pub frame_count: u64,

    /// Show help overlay
    pub show_help: bool,
}

impl App {
    /// Create a new application instance looking at `today`
    pub fn new(settings: AppSettings, today: NaiveDate) -> Self {
        let view = DispatchView::for_date(today);
        let mut app = Self {
            should_quit: false,
            focus: Focus::default(),
            input_mode: InputMode::Normal,
            settings,
            day_layout: DayLayout::empty(view.selected_date, settings.window),
            view,
            today,
            jobs: Vec::new(),
            technicians: Vec::new(),
            coordinates: HashMap::new(),
            geocode_requested: HashSet::new(),
            geocode_batches: HashMap::new(),
            fetched_range: None,
            requested_range: None,
            sequencer: RequestSequencer::default(),
            load_state: LoadState::Idle,
            pending_geocode: 0,
            availability: AvailabilityIndex::default(),
            job_counts: BTreeMap::new(),
            markers: MarkerSet::default(),
            viewport: settings.home,
            queue: JobQueue::default(),
            timeline_state: TimelineState::default(),
            technician_selected: 0,
            date_selected: 0,
            map_selected: None,
            queue_bucket: QueueBucket::Unassigned,
            queue_selected: 0,
            error_popup: None,
            logs: Vec::new(),
            max_logs: 100,
            api_connected: false,
            last_refresh: None,
            frame_count: 0,
            show_help: false,
        };

        app.rebuild();
        app.log(LogEntry::info("Dispatch board initialized"));
        app
    }

    pub fn view(&self) -> &DispatchView {
        &self.view
    }

    /// Commands to send once the worker is running
    pub fn startup_commands(&mut self) -> Vec<ApiCommand> {
        self.log(LogEntry::info("Connecting to backend..."));
        vec![
            ApiCommand::CheckConnection,
            ApiCommand::FetchTechnicians,
            self.request_jobs(self.view.fetch_range()),
        ]
    }

    /// Issue a new sequenced job fetch; earlier in-flight fetches become stale
    pub fn request_jobs(&mut self, range: DateRange) -> ApiCommand {
        let seq = self.sequencer.issue();
        self.requested_range = Some(range);
        self.load_state = LoadState::Loading;
        tracing::debug!(seq, %range, "Requesting jobs");
        ApiCommand::FetchJobs { seq, range }
    }

    /// Replace the view and recompute everything derived from it.
    ///
    /// Returns a fetch when the new view needs dates the current data doesn't
    /// cover.
    pub fn set_view(&mut self, view: DispatchView) -> Option<ApiCommand> {
        if view == self.view {
            return None;
        }
        self.view = view;
        self.rebuild();

        let needed = self.view.fetch_range();
        if self.requested_range != Some(needed) {
            Some(self.request_jobs(needed))
        } else {
            None
        }
    }

    /// Recompute all derived structures from fetched data and the view
    pub fn rebuild(&mut self) {
        self.day_layout = layout_day(&self.jobs, &self.technicians, &self.view, self.settings.window);

        let active = active_jobs(&self.jobs);
        self.availability = build_availability_index(&active);
        self.job_counts = job_counts_by_date(&active);

        let range = self.fetched_range.unwrap_or_else(|| self.view.fetch_range());
        let mappable = map_jobs(&self.jobs, &self.view, range);
        let coordinates = &self.coordinates;
        self.markers = build_markers(&mappable, |job| {
            job.address().and_then(|address| coordinates.get(&address).copied())
        });
        self.viewport = viewport_for(&self.markers, self.settings.home, self.settings.max_zoom);

        self.queue = categorize_jobs(&self.jobs, self.today);

        self.timeline_state.clamp(self.day_layout.lanes.len());
        self.map_selected = match self.map_selected {
            Some(_) if self.markers.is_empty() => None,
            Some(i) => Some(i.min(self.markers.len() - 1)),
            None => None,
        };
        self.technician_selected = self
            .technician_selected
            .min(self.visible_technicians().len());
        self.date_selected = self
            .date_selected
            .min(self.active_dates().len().saturating_sub(1));
        self.queue_selected = self
            .queue_selected
            .min(self.queue.bucket(self.queue_bucket).len().saturating_sub(1));
    }

    /// Drop fetched jobs and everything computed from them
    fn clear_jobs(&mut self) {
        self.jobs.clear();
        self.fetched_range = None;
        self.rebuild();
    }

    /// Add a log entry
    pub fn log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
        if self.logs.len() > self.max_logs {
            self.logs.remove(0);
        }
    }

    /// Show an error popup
    pub fn show_error(&mut self, title: impl Into<String>, message: impl Into<String>) {
        let title = title.into();
        let message = message.into();
        self.log(LogEntry::error(format!("{}: {}", title, message)));
        self.error_popup = Some(ErrorPopup::new(title, message));
    }

    /// Dismiss the current error popup
    pub fn dismiss_error(&mut self) {
        self.error_popup = None;
    }

    // ============================================
    // Lists shown in the side panel
    // ============================================

    /// Roster entries passing the name search
    pub fn visible_technicians(&self) -> Vec<&Technician> {
        self.technicians
            .iter()
            .filter(|t| t.matches_search(&self.view.technician_search))
            .collect()
    }

    /// Technician whose dates the side panel lists: the filter, otherwise
    /// the highlighted row
    pub fn dates_technician(&self) -> Option<TechnicianId> {
        self.view.technician_filter.or_else(|| {
            self.technician_selected
                .checked_sub(1)
                .and_then(|i| self.visible_technicians().get(i).map(|t| t.id))
        })
    }

    pub fn active_dates(&self) -> Vec<NaiveDate> {
        self.dates_technician()
            .map(|id| self.availability.dates_for(id))
            .unwrap_or_default()
    }

    pub fn technician_name(&self, id: TechnicianId) -> String {
        self.technicians
            .iter()
            .find(|t| t.id == id)
            .map(Technician::display_name)
            .unwrap_or_else(|| format!("Tech {}", id.short()))
    }

    // ============================================
    // API messages
    // ============================================

    /// Handle API messages; may answer with a follow-up command
    pub fn handle_api_message(&mut self, message: ApiMessage) -> Option<ApiCommand> {
        match message {
            ApiMessage::JobsLoaded { seq, range, jobs } => {
                if !self.sequencer.is_current(seq) {
                    tracing::debug!(seq, latest = self.sequencer.latest(), "Dropping stale job response");
                    return None;
                }
                let count = jobs.len();
                self.jobs = jobs;
                self.fetched_range = Some(range);
                self.load_state = LoadState::Loaded;
                self.last_refresh = Some(Instant::now());
                self.rebuild();
                self.log(LogEntry::success(format!("Loaded {} jobs for {}", count, range)));
                self.geocode_missing(seq)
            }
            ApiMessage::JobsFailed { seq, error } => {
                if !self.sequencer.is_current(seq) {
                    tracing::debug!(seq, "Dropping stale job failure");
                    return None;
                }
                self.clear_jobs();
                self.load_state = LoadState::Failed(error.clone());
                self.show_error("Failed to load jobs", error);
                None
            }
            ApiMessage::TechniciansLoaded(technicians) => {
                let count = technicians.len();
                self.technicians = technicians;
                self.rebuild();
                self.log(LogEntry::success(format!("Loaded {} technicians", count)));
                None
            }
            ApiMessage::Geocoded { seq, coordinates } => {
                let resolved = coordinates.len();
                self.coordinates.extend(coordinates);

                // Unresolved addresses may be retried by the next fetch
                if let Some(batch) = self.geocode_batches.remove(&seq) {
                    for address in batch {
                        if !self.coordinates.contains_key(&address) {
                            self.geocode_requested.remove(&address);
                        }
                    }
                }
                self.update_pending_geocode();
                self.rebuild();
                self.log(LogEntry::info(format!("Located {} addresses", resolved)));
                None
            }
            ApiMessage::Error(error) => {
                self.show_error("API Error", error);
                None
            }
            ApiMessage::ConnectionStatus(connected) => {
                let was_connected = self.api_connected;
                self.api_connected = connected;

                if connected && !was_connected {
                    self.log(LogEntry::success("Connected to backend"));
                } else if !connected && was_connected {
                    self.log(LogEntry::warning("Disconnected from backend"));
                } else if !connected {
                    self.log(LogEntry::warning("Backend not reachable"));
                }
                None
            }
        }
    }

    /// Geocode request for addresses not yet sent
    fn geocode_missing(&mut self, seq: u64) -> Option<ApiCommand> {
        let addresses: Vec<String> = job_addresses(&self.jobs)
            .into_iter()
            .filter(|a| !self.coordinates.contains_key(a) && !self.geocode_requested.contains(a))
            .collect();

        if addresses.is_empty() {
            return None;
        }
        self.geocode_requested.extend(addresses.iter().cloned());
        self.geocode_batches.insert(seq, addresses.clone());
        self.update_pending_geocode();
        Some(ApiCommand::Geocode { seq, addresses })
    }

    fn update_pending_geocode(&mut self) {
        self.pending_geocode = self.geocode_batches.values().map(Vec::len).sum();
    }

    // ============================================
    // Keys
    // ============================================

    /// Handle key events and return optional API command
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        // Handle error popup dismissal
        if self.error_popup.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ')) {
                self.dismiss_error();
            }
            return None;
        }

        // Handle help overlay
        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter) {
                self.show_help = false;
            }
            return None;
        }

        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Searching => self.handle_search_key(key),
        }
    }

    /// Handle keys in normal mode
    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        let view = self.view.clone();

        // Global shortcuts
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
                return Some(ApiCommand::Shutdown);
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                return Some(ApiCommand::Shutdown);
            }
            KeyCode::Char('?') => {
                self.show_help = true;
                return None;
            }
            KeyCode::Char('r') => {
                self.log(LogEntry::info("Refreshing jobs..."));
                return Some(self.request_jobs(self.view.fetch_range()));
            }
            KeyCode::Char('R') => {
                self.log(LogEntry::info("Refreshing technicians..."));
                return Some(ApiCommand::FetchTechnicians);
            }
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return None;
            }
            KeyCode::BackTab => {
                self.focus = self.focus.previous();
                return None;
            }
            KeyCode::Left | KeyCode::Char('h') => {
                return self.set_view(view.with_date(shift_day(self.view.selected_date, -1)));
            }
            KeyCode::Right | KeyCode::Char('l') => {
                return self.set_view(view.with_date(shift_day(self.view.selected_date, 1)));
            }
            KeyCode::Char('H') => {
                return self.set_view(view.with_date(shift_day(self.view.selected_date, -7)));
            }
            KeyCode::Char('L') => {
                return self.set_view(view.with_date(shift_day(self.view.selected_date, 7)));
            }
            KeyCode::Char('t') => {
                return self.set_view(view.with_date(self.today));
            }
            KeyCode::Char('v') => {
                let span = self.view.span.next();
                self.log(LogEntry::info(format!("Fetching by {}", span.name())));
                return self.set_view(view.with_span(span));
            }
            KeyCode::Char('u') => {
                return self.set_view(view.toggle_unassigned());
            }
            KeyCode::Char('c') => {
                return self.set_view(view.toggle_completed());
            }
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Searching;
                return None;
            }
            KeyCode::Esc => {
                return self.set_view(view.with_technician(None).with_search(""));
            }
            _ => {}
        }

        match self.focus {
            Focus::Technicians => self.handle_technicians_key(key),
            Focus::Dates => self.handle_dates_key(key),
            Focus::Timeline => self.handle_timeline_key(key),
            Focus::Map => {
                self.handle_map_key(key);
                None
            }
            Focus::Queue => self.handle_queue_key(key),
        }
    }

    /// Typing into the technician search
    fn handle_search_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        let view = self.view.clone();
        match key.code {
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                None
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.set_view(view.with_search(""))
            }
            KeyCode::Backspace => {
                let mut search = view.technician_search.clone();
                search.pop();
                self.set_view(view.with_search(search))
            }
            KeyCode::Char(c) => {
                let search = format!("{}{}", view.technician_search, c);
                self.technician_selected = 0;
                self.set_view(view.with_search(search))
            }
            _ => None,
        }
    }

    fn handle_technicians_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        // Row 0 is "All technicians"
        let total = self.visible_technicians().len() + 1;
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.technician_selected = (self.technician_selected + 1) % total;
                self.date_selected = 0;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.technician_selected = (self.technician_selected + total - 1) % total;
                self.date_selected = 0;
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let chosen = self
                    .technician_selected
                    .checked_sub(1)
                    .and_then(|i| self.visible_technicians().get(i).map(|t| t.id));
                // Choosing the active filter again clears it
                let filter = if chosen == self.view.technician_filter {
                    None
                } else {
                    chosen
                };
                match filter {
                    Some(id) => self.log(LogEntry::info(format!("Showing {}", self.technician_name(id)))),
                    None => self.log(LogEntry::info("Showing all technicians")),
                }
                self.date_selected = 0;
                self.set_view(self.view.clone().with_technician(filter))
            }
            _ => None,
        }
    }

    fn handle_dates_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        let dates = self.active_dates();
        if dates.is_empty() {
            return None;
        }
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.date_selected = (self.date_selected + 1) % dates.len();
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.date_selected = (self.date_selected + dates.len() - 1) % dates.len();
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let date = dates[self.date_selected.min(dates.len() - 1)];
                self.set_view(self.view.clone().with_date(date))
            }
            _ => None,
        }
    }

    fn handle_timeline_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        let total = self.day_layout.lanes.len();
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.timeline_state.select_next(total);
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.timeline_state.select_previous(total);
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let lane = self
                    .timeline_state
                    .selected_lane
                    .and_then(|i| self.day_layout.lanes.get(i))?;
                let LaneKind::Technician(id) = lane.kind else {
                    return None;
                };
                let filter = if self.view.technician_filter == Some(id) {
                    None
                } else {
                    Some(id)
                };
                self.timeline_state.selected_lane = Some(0);
                self.set_view(self.view.clone().with_technician(filter))
            }
            _ => None,
        }
    }

    fn handle_map_key(&mut self, key: KeyEvent) {
        let total = self.markers.len();
        if total == 0 {
            self.map_selected = None;
            return;
        }
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.map_selected = Some(self.map_selected.map_or(0, |i| (i + 1) % total));
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.map_selected = Some(self.map_selected.map_or(total - 1, |i| (i + total - 1) % total));
            }
            _ => {}
        }
    }

    fn handle_queue_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        let len = self.queue.bucket(self.queue_bucket).len();
        match key.code {
            KeyCode::Char(']') => {
                self.queue_bucket = next_bucket(self.queue_bucket, 1);
                self.queue_selected = 0;
                None
            }
            KeyCode::Char('[') => {
                self.queue_bucket = next_bucket(self.queue_bucket, QueueBucket::ALL.len() - 1);
                self.queue_selected = 0;
                None
            }
            KeyCode::Down | KeyCode::Char('j') if len > 0 => {
                self.queue_selected = (self.queue_selected + 1) % len;
                None
            }
            KeyCode::Up | KeyCode::Char('k') if len > 0 => {
                self.queue_selected = (self.queue_selected + len - 1) % len;
                None
            }
            KeyCode::Enter => {
                // Jump the timeline to the selected job's day
                let start = self
                    .queue
                    .bucket(self.queue_bucket)
                    .get(self.queue_selected)?
                    .schedule_start?;
                self.set_view(self.view.clone().with_date(start.date()))
            }
            _ => None,
        }
    }

    /// Per-frame housekeeping
    pub fn tick(&mut self) {
        self.frame_count = self.frame_count.wrapping_add(1);

        // Auto-dismiss error popup
        if self.error_popup.as_ref().is_some_and(ErrorPopup::should_dismiss) {
            self.error_popup = None;
        }

        // Midnight rollover moves the past-due boundary
        let today = Local::now().date_naive();
        if today != self.today {
            self.today = today;
            self.rebuild();
        }
    }

    /// Get the status bar text
    pub fn status_text(&self) -> String {
        let connection = if self.api_connected {
            "Connected"
        } else {
            "Disconnected"
        };

        let loading = match &self.load_state {
            LoadState::Loading => " [Loading...]",
            LoadState::Failed(_) => " [Load failed]",
            _ => "",
        };

        let last_refresh = self
            .last_refresh
            .map(|t| {
                let secs = t.elapsed().as_secs();
                if secs < 60 {
                    format!(" ({}s ago)", secs)
                } else {
                    format!(" ({}m ago)", secs / 60)
                }
            })
            .unwrap_or_default();

        format!(
            "{}{}{} | {} | ?: Help | ←/→: Day | v: Span | /: Search | q: Quit",
            connection,
            loading,
            last_refresh,
            self.focus.name()
        )
    }
}

fn next_bucket(current: QueueBucket, step: usize) -> QueueBucket {
    let all = QueueBucket::ALL;
    let index = all.iter().position(|b| *b == current).unwrap_or(0);
    all[(index + step) % all.len()]
}
