//! Date and time helpers shared by the timeline, availability and map views.
//!
//! Everything here works on local wall-clock values (`NaiveDateTime` /
//! `NaiveDate`); conversion from offset timestamps happens once in
//! [`parse_timestamp`].

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, Timelike};

/// Duration assumed when a job has no (or an unreadable) `schedule_duration`
pub const DEFAULT_DURATION_HOURS: f64 = 1.0;

/// Parse a schedule duration written as `H:MM` (or interval text `HH:MM:SS`)
/// into fractional hours. Anything unreadable falls back to one hour.
pub fn parse_duration_hours(raw: Option<&str>) -> f64 {
    raw.and_then(parse_clock_duration)
        .unwrap_or(DEFAULT_DURATION_HOURS)
}

fn parse_clock_duration(raw: &str) -> Option<f64> {
    let mut parts = raw.trim().split(':');

    let hours: u32 = parts.next()?.trim().parse().ok()?;
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    if minutes >= 60 {
        return None;
    }

    let seconds: u32 = match parts.next() {
        Some(s) => s.trim().parse().ok().filter(|s| *s < 60)?,
        None => 0,
    };

    if parts.next().is_some() {
        return None;
    }

    Some(hours as f64 + minutes as f64 / 60.0 + seconds as f64 / 3600.0)
}

/// Hour of day as a fraction, e.g. 14:30 -> 14.5
pub fn start_hour(start: NaiveDateTime) -> f64 {
    start.hour() as f64 + start.minute() as f64 / 60.0
}

/// Calendar date (year, month, day) of a timestamp
pub fn calendar_date(start: NaiveDateTime) -> NaiveDate {
    start.date()
}

/// Parse a backend timestamp into local wall-clock time.
///
/// Offset-carrying values (RFC 3339 or Postgres text output) are converted
/// into the local zone; naive values are taken as already local. A bare date
/// means midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Local).naive_local());
        }
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Time-slot label for the timeline header (`12AM`, `8AM`, `12PM`, `3PM`)
pub fn hour_label(hour: u32) -> String {
    match hour % 24 {
        0 => "12AM".to_string(),
        h if h < 12 => format!("{}AM", h),
        12 => "12PM".to_string(),
        h => format!("{}PM", h - 12),
    }
}

/// Move a date by whole days (saturating at chrono's range limits)
pub fn shift_day(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(date)
}

/// Header format, e.g. "Monday, June 10, 2024"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// How much of the calendar one fetch covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewSpan {
    Day,
    Week,
    #[default]
    Month,
}

impl ViewSpan {
    /// Cycle to the next span
    pub fn next(&self) -> Self {
        match self {
            ViewSpan::Day => ViewSpan::Week,
            ViewSpan::Week => ViewSpan::Month,
            ViewSpan::Month => ViewSpan::Day,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewSpan::Day => "Day",
            ViewSpan::Week => "Week",
            ViewSpan::Month => "Month",
        }
    }
}

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    /// The day, Monday-based week or calendar month containing `date`
    pub fn around(date: NaiveDate, span: ViewSpan) -> Self {
        match span {
            ViewSpan::Day => Self::new(date, date),
            ViewSpan::Week => {
                let offset = date.weekday().num_days_from_monday() as i64;
                let monday = shift_day(date, -offset);
                Self::new(monday, shift_day(monday, 6))
            }
            ViewSpan::Month => {
                let first = date.with_day(1).unwrap_or(date);
                let next_month = if first.month() == 12 {
                    NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
                };
                let last = next_month.map(|d| shift_day(d, -1)).unwrap_or(first);
                Self::new(first, last)
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from.format("%b %-d"))
        } else {
            write!(f, "{} – {}", self.from.format("%b %-d"), self.to.format("%b %-d"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_hours(Some("1:30")), 1.5);
        assert_eq!(parse_duration_hours(Some("2:00")), 2.0);
        assert_eq!(parse_duration_hours(Some("01:30:00")), 1.5);
        assert_eq!(parse_duration_hours(Some(" 0:45 ")), 0.75);
    }

    #[test]
    fn test_parse_duration_falls_back_to_one_hour() {
        assert_eq!(parse_duration_hours(None), 1.0);
        assert_eq!(parse_duration_hours(Some("")), 1.0);
        assert_eq!(parse_duration_hours(Some("2 hours")), 1.0);
        assert_eq!(parse_duration_hours(Some("1:75")), 1.0);
        assert_eq!(parse_duration_hours(Some("abc:10")), 1.0);
        assert_eq!(parse_duration_hours(Some("1:30:00:00")), 1.0);
        assert_eq!(parse_duration_hours(Some("-1:30")), 1.0);
    }

    #[test]
    fn test_start_hour() {
        let start = date(2024, 6, 10).and_hms_opt(14, 30, 0).unwrap();
        assert_eq!(start_hour(start), 14.5);
        assert_eq!(calendar_date(start), date(2024, 6, 10));
    }

    #[test]
    fn test_parse_naive_timestamps() {
        let expected = date(2024, 6, 10).and_hms_opt(14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-06-10T14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-10 14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-10T14:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-10T14:30:00.000"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-06-10"),
            Some(date(2024, 6, 10).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_parse_offset_timestamps_convert_to_local() {
        let utc = "2024-06-10T14:30:00+00:00";
        let expected = DateTime::parse_from_rfc3339(utc)
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(parse_timestamp(utc), Some(expected));
        assert_eq!(parse_timestamp("2024-06-10 14:30:00+00"), Some(expected));
    }

    #[test]
    fn test_hour_labels() {
        assert_eq!(hour_label(0), "12AM");
        assert_eq!(hour_label(8), "8AM");
        assert_eq!(hour_label(12), "12PM");
        assert_eq!(hour_label(20), "8PM");
        assert_eq!(hour_label(24), "12AM");
    }

    #[test]
    fn test_ranges() {
        let d = date(2024, 6, 12); // Wednesday
        assert_eq!(DateRange::around(d, ViewSpan::Day), DateRange::new(d, d));
        assert_eq!(
            DateRange::around(d, ViewSpan::Week),
            DateRange::new(date(2024, 6, 10), date(2024, 6, 16))
        );
        assert_eq!(
            DateRange::around(d, ViewSpan::Month),
            DateRange::new(date(2024, 6, 1), date(2024, 6, 30))
        );
        assert_eq!(
            DateRange::around(date(2024, 12, 31), ViewSpan::Month),
            DateRange::new(date(2024, 12, 1), date(2024, 12, 31))
        );
        assert_eq!(DateRange::around(date(2024, 2, 10), ViewSpan::Month).days(), 29);
    }

    #[test]
    fn test_range_contains_and_ordering() {
        let range = DateRange::new(date(2024, 6, 30), date(2024, 6, 1));
        assert_eq!(range.from, date(2024, 6, 1));
        assert!(range.contains(date(2024, 6, 15)));
        assert!(!range.contains(date(2024, 7, 1)));
    }

    #[test]
    fn test_shift_and_format() {
        assert_eq!(shift_day(date(2024, 6, 30), 1), date(2024, 7, 1));
        assert_eq!(shift_day(date(2024, 3, 1), -1), date(2024, 2, 29));
        assert_eq!(long_date(date(2024, 6, 10)), "Monday, June 10, 2024");
    }
}
