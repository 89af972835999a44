//! Map markers for scheduled jobs.
//!
//! Turns geocoded jobs into coloured markers, computes their bounding box and
//! fits a zoom-levelled viewport around them. [`MapWidget`] draws the result
//! on a world-map canvas.

use std::collections::BTreeMap;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    symbols::Marker as CanvasMarker,
    text::Span,
    widgets::{
        canvas::{Canvas, Context, Line, Map, MapResolution, Points},
        Block, Borders, Widget,
    },
};
use uuid::Uuid;

use crate::app::DispatchView;
use crate::models::{Job, JobStatus};
use crate::schedule::{calendar_date, DateRange};
use crate::timeline::matches_technician;
use crate::theme::{colors, marker_color, styles};

/// Zoom used when fitting never goes past this by default
pub const DEFAULT_MAX_ZOOM: u8 = 15;

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Marker colour, a pure function of job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerColor {
    Blue,
    Amber,
    Green,
    Red,
    Gray,
}

impl MarkerColor {
    pub fn for_status(status: &JobStatus) -> Self {
        match status {
            JobStatus::Scheduled => MarkerColor::Blue,
            JobStatus::Unscheduled => MarkerColor::Amber,
            JobStatus::Completed => MarkerColor::Green,
            JobStatus::Cancelled => MarkerColor::Red,
            JobStatus::Other(_) => MarkerColor::Gray,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobMarker {
    pub job_id: Uuid,
    pub label: String,
    pub position: LatLng,
    pub color: MarkerColor,
}

/// Smallest lat/lng rectangle around a set of points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn around(point: LatLng) -> Self {
        Self {
            min_lat: point.lat,
            max_lat: point.lat,
            min_lng: point.lng,
            max_lng: point.lng,
        }
    }

    pub fn extend(&mut self, point: LatLng) {
        self.min_lat = self.min_lat.min(point.lat);
        self.max_lat = self.max_lat.max(point.lat);
        self.min_lng = self.min_lng.min(point.lng);
        self.max_lng = self.max_lng.max(point.lng);
    }

    pub fn from_points(points: impl IntoIterator<Item = LatLng>) -> Option<Self> {
        let mut points = points.into_iter();
        let mut bounds = Self::around(points.next()?);
        for point in points {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn contains(&self, point: LatLng) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lng_span(&self) -> f64 {
        self.max_lng - self.min_lng
    }
}

/// Markers plus their bounds, replaced wholesale on every rebuild
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerSet {
    pub markers: Vec<JobMarker>,
    pub bounds: Option<BoundingBox>,
}

impl MarkerSet {
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// One marker per scheduled job that `geocode` can place.
///
/// Jobs without a start time, a location or coordinates are skipped.
pub fn build_markers<F>(jobs: &[Job], geocode: F) -> MarkerSet
where
    F: Fn(&Job) -> Option<LatLng>,
{
    let markers: Vec<JobMarker> = jobs
        .iter()
        .filter(|job| job.schedule_start.is_some())
        .filter_map(|job| {
            let position = geocode(job).filter(LatLng::is_valid)?;
            Some(JobMarker {
                job_id: job.id,
                label: job.display_name().to_string(),
                position,
                color: MarkerColor::for_status(&job.status),
            })
        })
        .collect();

    let bounds = BoundingBox::from_points(markers.iter().map(|m| m.position));
    MarkerSet { markers, bounds }
}

/// Jobs the map shows for the current view: technician filter, fetched
/// range, and completed jobs only when asked for.
pub fn map_jobs(jobs: &[Job], view: &DispatchView, range: DateRange) -> Vec<Job> {
    jobs.iter()
        .filter(|job| matches_technician(job, view.technician_filter))
        .filter(|job| {
            job.schedule_start
                .map(|start| range.contains(calendar_date(start)))
                .unwrap_or(false)
        })
        .filter(|job| view.show_completed || !job.status.is_completed())
        .cloned()
        .collect()
}

/// Visible map area: a centre and a Web-Mercator-style zoom level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
}

impl Viewport {
    pub fn new(center: LatLng, zoom: u8) -> Self {
        Self { center, zoom }
    }

    /// Degrees of longitude visible at this zoom
    pub fn lng_span(&self) -> f64 {
        360.0 / 2f64.powi(self.zoom as i32)
    }

    /// Degrees of latitude visible at this zoom
    pub fn lat_span(&self) -> f64 {
        180.0 / 2f64.powi(self.zoom as i32)
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        let half = self.lng_span() / 2.0;
        [self.center.lng - half, self.center.lng + half]
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        let half = self.lat_span() / 2.0;
        [self.center.lat - half, self.center.lat + half]
    }

    pub fn contains(&self, point: LatLng) -> bool {
        let [x0, x1] = self.x_bounds();
        let [y0, y1] = self.y_bounds();
        (x0..=x1).contains(&point.lng) && (y0..=y1).contains(&point.lat)
    }
}

/// Centre on the bounds and pick the closest zoom that still shows all of
/// them, never closer than `max_zoom`.
pub fn fit_viewport(bounds: &BoundingBox, max_zoom: u8) -> Viewport {
    let zoom = (0..=max_zoom)
        .rev()
        .find(|&z| {
            let candidate = Viewport::new(bounds.center(), z);
            bounds.lng_span() <= candidate.lng_span() && bounds.lat_span() <= candidate.lat_span()
        })
        .unwrap_or(0);

    Viewport::new(bounds.center(), zoom)
}

/// Fitted viewport for a marker set, or the home view when it is empty
pub fn viewport_for(markers: &MarkerSet, home: Viewport, max_zoom: u8) -> Viewport {
    match &markers.bounds {
        Some(bounds) => fit_viewport(bounds, max_zoom),
        None => home,
    }
}

// ============================================
// Widget
// ============================================

/// World map with job markers, cropped to a [`Viewport`]
pub struct MapWidget<'a> {
    markers: &'a MarkerSet,
    viewport: &'a Viewport,
    selected: Option<usize>,
    pending: usize,
}

impl<'a> MapWidget<'a> {
    pub fn new(markers: &'a MarkerSet, viewport: &'a Viewport) -> Self {
        Self {
            markers,
            viewport,
            selected: None,
            pending: 0,
        }
    }

    pub fn selected(mut self, selected: Option<usize>) -> Self {
        self.selected = selected;
        self
    }

    /// Addresses still waiting on the geocoder
    pub fn pending(mut self, pending: usize) -> Self {
        self.pending = pending;
        self
    }

    fn draw(&self, ctx: &mut Context) {
        ctx.draw(&Map {
            resolution: MapResolution::High,
            color: colors::MAP_LAND,
        });
        ctx.layer();

        let mut by_color: BTreeMap<MarkerColor, Vec<(f64, f64)>> = BTreeMap::new();
        for marker in &self.markers.markers {
            by_color
                .entry(marker.color)
                .or_default()
                .push((marker.position.lng, marker.position.lat));
        }
        for (color, coords) in &by_color {
            ctx.draw(&Points {
                coords,
                color: marker_color(*color),
            });
        }

        if let Some(marker) = self.selected.and_then(|i| self.markers.markers.get(i)) {
            let x = marker.position.lng;
            let y = marker.position.lat;
            let dx = self.viewport.lng_span() / 60.0;
            let dy = self.viewport.lat_span() / 30.0;
            ctx.draw(&Line {
                x1: x - dx,
                y1: y,
                x2: x + dx,
                y2: y,
                color: colors::YELLOW,
            });
            ctx.draw(&Line {
                x1: x,
                y1: y - dy,
                x2: x,
                y2: y + dy,
                color: colors::YELLOW,
            });
            ctx.print(
                x + dx,
                y,
                Span::styled(
                    marker.label.clone(),
                    Style::default()
                        .fg(colors::YELLOW)
                        .add_modifier(Modifier::BOLD),
                ),
            );
        }
    }
}

impl Widget for MapWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = format!(" Map · {} jobs · z{} ", self.markers.len(), self.viewport.zoom);
        Canvas::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(styles::border())
                    .title(title)
                    .title_style(styles::title_accent())
                    .style(Style::default().bg(colors::BG_DARK)),
            )
            .x_bounds(self.viewport.x_bounds())
            .y_bounds(self.viewport.y_bounds())
            .marker(CanvasMarker::Braille)
            .paint(|ctx| self.draw(ctx))
            .render(area, buf);

        if area.height < 3 || area.width < 20 {
            return;
        }
        let footer = if self.pending > 0 {
            format!("geocoding {}…", self.pending)
        } else if self.markers.is_empty() {
            "no mappable jobs".to_string()
        } else {
            format!(
                "{:.3}, {:.3}",
                self.viewport.center.lat, self.viewport.center.lng
            )
        };
        let width = footer.chars().count() as u16;
        if width + 4 <= area.width {
            buf.set_string(
                area.x + area.width - width - 2,
                area.y + area.height - 1,
                footer,
                styles::text_hint(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, TechnicianId};
    use chrono::NaiveDate;

    fn start() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn located(name: &str, address: &str) -> Job {
        Job::new(name).scheduled_at(start()).at_location(Location {
            address: Some(address.to_string()),
            ..Default::default()
        })
    }

    fn lookup(job: &Job) -> Option<LatLng> {
        match job.address()?.as_str() {
            "1 Main St" => Some(LatLng::new(33.749, -84.388)),
            "2 Oak Ave" => Some(LatLng::new(33.80, -84.30)),
            _ => None,
        }
    }

    #[test]
    fn test_marker_colors() {
        assert_eq!(MarkerColor::for_status(&JobStatus::Scheduled), MarkerColor::Blue);
        assert_eq!(MarkerColor::for_status(&JobStatus::Unscheduled), MarkerColor::Amber);
        assert_eq!(MarkerColor::for_status(&JobStatus::Completed), MarkerColor::Green);
        assert_eq!(MarkerColor::for_status(&JobStatus::Cancelled), MarkerColor::Red);
        assert_eq!(
            MarkerColor::for_status(&JobStatus::Other("on_hold".into())),
            MarkerColor::Gray
        );
    }

    #[test]
    fn test_one_marker_per_geocoded_job() {
        let jobs = vec![
            located("a", "1 Main St"),
            located("b", "2 Oak Ave"),
            located("c", "Nowhere"),
            Job::new("no location").scheduled_at(start()),
            Job::new("unscheduled").at_location(Location {
                address: Some("1 Main St".into()),
                ..Default::default()
            }),
        ];

        let set = build_markers(&jobs, lookup);
        assert_eq!(set.len(), 2);

        let bounds = set.bounds.unwrap();
        assert_eq!(bounds.min_lat, 33.749);
        assert_eq!(bounds.max_lat, 33.80);
        assert_eq!(bounds.min_lng, -84.388);
        assert_eq!(bounds.max_lng, -84.30);
        assert!(set.markers.iter().all(|m| bounds.contains(m.position)));
    }

    #[test]
    fn test_empty_marker_set_has_no_bounds() {
        let set = build_markers(&[], lookup);
        assert!(set.is_empty());
        assert!(set.bounds.is_none());

        let home = Viewport::new(LatLng::new(33.749, -84.388), 12);
        assert_eq!(viewport_for(&set, home, DEFAULT_MAX_ZOOM), home);
    }

    #[test]
    fn test_invalid_coordinates_dropped() {
        let jobs = vec![located("a", "1 Main St")];
        let set = build_markers(&jobs, |_| Some(LatLng::new(f64::NAN, 0.0)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_single_marker_clamped_to_max_zoom() {
        let bounds = BoundingBox::around(LatLng::new(33.749, -84.388));
        let viewport = fit_viewport(&bounds, DEFAULT_MAX_ZOOM);
        assert_eq!(viewport.zoom, 15);
        assert_eq!(viewport.center, LatLng::new(33.749, -84.388));
    }

    #[test]
    fn test_fit_contains_bounds() {
        let bounds = BoundingBox::from_points([
            LatLng::new(33.60, -84.55),
            LatLng::new(34.05, -84.10),
        ])
        .unwrap();
        let viewport = fit_viewport(&bounds, DEFAULT_MAX_ZOOM);

        assert!(viewport.contains(LatLng::new(33.60, -84.55)));
        assert!(viewport.contains(LatLng::new(34.05, -84.10)));

        // One level closer would no longer fit
        let closer = Viewport::new(viewport.center, viewport.zoom + 1);
        assert!(bounds.lng_span() > closer.lng_span() || bounds.lat_span() > closer.lat_span());
    }

    #[test]
    fn test_fit_whole_world() {
        let bounds = BoundingBox::from_points([
            LatLng::new(-80.0, -170.0),
            LatLng::new(80.0, 170.0),
        ])
        .unwrap();
        assert_eq!(fit_viewport(&bounds, DEFAULT_MAX_ZOOM).zoom, 0);
    }

    #[test]
    fn test_map_jobs_subset() {
        let tech = TechnicianId(Uuid::new_v4());
        let day = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let range = DateRange::new(day, day);
        let jobs = vec![
            located("mine", "1 Main St").assigned_to(tech, true),
            located("done", "1 Main St")
                .with_status(JobStatus::Completed)
                .assigned_to(tech, true),
            located("other", "1 Main St"),
            Job::new("next week")
                .scheduled_at(day.and_hms_opt(9, 0, 0).unwrap() + chrono::Duration::days(7))
                .assigned_to(tech, true),
        ];

        let view = DispatchView::for_date(day).with_technician(Some(tech));
        let names: Vec<String> = map_jobs(&jobs, &view, range)
            .iter()
            .map(|j| j.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["mine"]);

        let mut everyone = DispatchView::for_date(day);
        everyone.show_completed = true;
        assert_eq!(map_jobs(&jobs, &everyone, range).len(), 3);
    }

    #[test]
    fn test_widget_renders_without_panic() {
        let jobs = vec![located("a", "1 Main St"), located("b", "2 Oak Ave")];
        let set = build_markers(&jobs, lookup);
        let viewport = viewport_for(&set, Viewport::new(LatLng::new(0.0, 0.0), 1), DEFAULT_MAX_ZOOM);

        let area = Rect::new(0, 0, 60, 20);
        let mut buf = Buffer::empty(area);
        MapWidget::new(&set, &viewport)
            .selected(Some(0))
            .render(area, &mut buf);
    }
}
