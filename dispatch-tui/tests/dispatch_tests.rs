//! End-to-end checks: backend rows in, dispatch board state out.

use std::collections::HashMap;

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use uuid::Uuid;

use dispatch_tui::api::{ApiCommand, ApiMessage};
use dispatch_tui::app::{App, AppSettings, DispatchView};
use dispatch_tui::availability::{active_jobs, build_availability_index};
use dispatch_tui::markers::{build_markers, LatLng, MarkerColor};
use dispatch_tui::models::{Job, Technician, TechnicianId};
use dispatch_tui::schedule::{DateRange, ViewSpan};
use dispatch_tui::timeline::{layout_day, LaneKind, TimelineWindow};

const TECH_ID: &str = "0b9e7c1a-2d3f-4e5a-8b6c-7d8e9f0a1b2c";

fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

fn tech_id() -> TechnicianId {
    TechnicianId(Uuid::parse_str(TECH_ID).unwrap())
}

fn roster() -> Vec<Technician> {
    serde_json::from_str(&format!(
        r#"[
            {{"id": "{TECH_ID}", "first_name": "Jane", "last_name": "Tech", "job_title": "HVAC"}},
            {{"id": "7d6c5b4a-3e2f-4a1b-9c8d-7e6f5a4b3c2d", "first_name": "Bob", "last_name": "Smith", "job_title": null}}
        ]"#
    ))
    .unwrap()
}

/// Rows as PostgREST returns them for the June fetch
fn job_rows() -> Vec<Job> {
    let row = |id: &str, start: &str, duration: &str, status: &str, address: &str| {
        format!(
            r#"{{
                "id": "{id}",
                "number": "10{}",
                "name": "Job {id}",
                "type": "service",
                "status": "{status}",
                "schedule_start": "{start}",
                "schedule_duration": "{duration}",
                "time_period_due": null,
                "locations": {{"name": "Site", "address": "{address}", "city": "Atlanta", "state": "GA", "zip": "30303"}},
                "job_technicians": [
                    {{"technician_id": "{TECH_ID}", "is_primary": true,
                      "users": {{"first_name": "Jane", "last_name": "Tech"}}}}
                ]
            }}"#,
            &id[..1]
        )
    };

    let json = format!(
        "[{},{},{}]",
        row(
            "11111111-1111-4111-8111-111111111111",
            "2024-06-10T14:30:00",
            "1:30",
            "scheduled",
            "1 Main St"
        ),
        row(
            "22222222-2222-4222-8222-222222222222",
            "2024-06-10T08:00:00",
            "2:00",
            "scheduled",
            "9 Peach Ave"
        ),
        row(
            "33333333-3333-4333-8333-333333333333",
            "2024-06-11T09:00:00",
            "1:00",
            "completed",
            "1 Main St"
        ),
    );
    serde_json::from_str(&json).unwrap()
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

#[test]
fn afternoon_job_lands_at_expected_offset() {
    let view = DispatchView::for_date(june(10));
    let layout = layout_day(&job_rows(), &roster(), &view, TimelineWindow::FULL_DAY);

    let lane = layout.lane(LaneKind::Technician(tech_id())).unwrap();
    assert_eq!(lane.bars.len(), 2);

    // Bars are ordered by start, so the 14:30 job is second
    let afternoon = &lane.bars[1];
    assert!((afternoon.position.left - 60.4167).abs() < 0.01);
    assert!((afternoon.position.width - 6.25).abs() < 1e-9);
    assert!(afternoon.position.left + afternoon.position.width <= 100.0);
}

#[test]
fn availability_counts_days_not_jobs() {
    let mut jobs = job_rows();
    // Reopen the June 11 job so it counts as active work
    jobs[2].status = "scheduled".into();

    let index = build_availability_index(&active_jobs(&jobs));
    assert_eq!(index.dates_for(tech_id()), vec![june(10), june(11)]);
}

#[test]
fn technician_without_work_gets_empty_lane() {
    let bob = roster()[1].id;
    let view = DispatchView::for_date(june(10)).with_technician(Some(bob));
    let layout = layout_day(&job_rows(), &roster(), &view, TimelineWindow::FULL_DAY);

    assert_eq!(layout.lanes.len(), 1);
    assert_eq!(layout.lanes[0].kind, LaneKind::Technician(bob));
    assert!(layout.lanes[0].bars.is_empty());
}

#[test]
fn markers_follow_status_colors() {
    let mut coordinates = HashMap::new();
    coordinates.insert("1 Main St, Atlanta, GA 30303".to_string(), LatLng::new(33.75, -84.39));
    coordinates.insert("9 Peach Ave, Atlanta, GA 30303".to_string(), LatLng::new(33.78, -84.40));

    let set = build_markers(&job_rows(), |job| {
        job.address().and_then(|a| coordinates.get(&a).copied())
    });

    assert_eq!(set.len(), 3);
    let colors: Vec<MarkerColor> = set.markers.iter().map(|m| m.color).collect();
    assert_eq!(colors.iter().filter(|c| **c == MarkerColor::Blue).count(), 2);
    assert!(colors.contains(&MarkerColor::Green));
    let bounds = set.bounds.unwrap();
    assert!(bounds.contains(LatLng::new(33.76, -84.395)));
}

#[test]
fn board_session_from_startup_to_map() {
    let mut app = App::new(AppSettings::default(), june(10));

    let seq = app
        .startup_commands()
        .into_iter()
        .find_map(|cmd| match cmd {
            ApiCommand::FetchJobs { seq, .. } => Some(seq),
            _ => None,
        })
        .unwrap();

    app.handle_api_message(ApiMessage::ConnectionStatus(true));
    app.handle_api_message(ApiMessage::TechniciansLoaded(roster()));
    let geocode = app.handle_api_message(ApiMessage::JobsLoaded {
        seq,
        range: app.view().fetch_range(),
        jobs: job_rows(),
    });

    let addresses = match geocode {
        Some(ApiCommand::Geocode { addresses, .. }) => addresses,
        other => panic!("expected geocode request, got {:?}", other),
    };
    assert_eq!(addresses.len(), 2);

    let coordinates = addresses
        .iter()
        .enumerate()
        .map(|(i, a)| (a.clone(), LatLng::new(33.75 + i as f64 * 0.01, -84.39)))
        .collect();
    app.handle_api_message(ApiMessage::Geocoded { seq, coordinates });

    // Completed job stays off the map until asked for
    assert_eq!(app.markers.len(), 2);
    app.handle_key(key(KeyCode::Char('c')));
    assert_eq!(app.markers.len(), 3);

    // Re-fetching the same addresses asks the geocoder for nothing
    let refresh = match app.handle_key(key(KeyCode::Char('r'))) {
        Some(ApiCommand::FetchJobs { seq, .. }) => seq,
        other => panic!("expected refresh, got {:?}", other),
    };
    let follow_up = app.handle_api_message(ApiMessage::JobsLoaded {
        seq: refresh,
        range: app.view().fetch_range(),
        jobs: job_rows(),
    });
    assert!(follow_up.is_none());
    assert_eq!(app.markers.len(), 3);
}

#[test]
fn late_answer_for_old_filter_is_dropped() {
    let mut app = App::new(AppSettings::default(), june(10));
    let first = match app.startup_commands().pop() {
        Some(ApiCommand::FetchJobs { seq, .. }) => seq,
        other => panic!("unexpected {:?}", other),
    };

    // Day span narrows the range and issues a second fetch
    let second = match app.handle_key(key(KeyCode::Char('v'))) {
        Some(ApiCommand::FetchJobs { seq, range }) => {
            assert_eq!(range, DateRange::new(june(10), june(10)));
            seq
        }
        other => panic!("unexpected {:?}", other),
    };

    app.handle_api_message(ApiMessage::JobsLoaded {
        seq: second,
        range: app.view().fetch_range(),
        jobs: Vec::new(),
    });
    app.handle_api_message(ApiMessage::JobsLoaded {
        seq: first,
        range: DateRange::around(june(10), ViewSpan::Month),
        jobs: job_rows(),
    });

    assert!(app.jobs.is_empty());
}
