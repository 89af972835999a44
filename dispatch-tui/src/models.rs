//! Domain models for the dispatch backend.
//!
//! These structs match the PostgREST row shapes (snake_case columns with
//! embedded `locations` and `job_technicians` relations) and use serde for
//! JSON deserialization. Timestamps are normalised to local wall-clock time
//! here, once, so nothing downstream has to think about offsets.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::schedule;

// ============================================
// Identifiers
// ============================================

/// Canonical technician identifier (the `users.id` of the technician).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechnicianId(pub Uuid);

impl TechnicianId {
    /// Short form used in compact labels
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl From<Uuid> for TechnicianId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TechnicianId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================
// Job status
// ============================================

/// Job lifecycle status as stored in `jobs.status`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Scheduled,
    #[default]
    Unscheduled,
    Completed,
    Cancelled,
    /// Any status this board does not know about (kept verbatim)
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Scheduled => "scheduled",
            JobStatus::Unscheduled => "unscheduled",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Other(s) => s.as_str(),
        }
    }

    pub fn is_completed(&self) -> bool {
        *self == JobStatus::Completed
    }

    /// Completed or cancelled: nothing left to dispatch
    pub fn is_closed(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" => JobStatus::Scheduled,
            "unscheduled" => JobStatus::Unscheduled,
            "completed" => JobStatus::Completed,
            "cancelled" | "canceled" => JobStatus::Cancelled,
            _ => JobStatus::Other(value),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(value: &str) -> Self {
        JobStatus::from(value.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Scheduled => write!(f, "Scheduled"),
            JobStatus::Unscheduled => write!(f, "Unscheduled"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Cancelled => write!(f, "Cancelled"),
            JobStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

// ============================================
// Location
// ============================================

/// Service location embedded in a job row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
}

impl Location {
    /// Free-text address handed to the geocoder, `"address, city, state zip"`.
    ///
    /// Returns `None` when there is no street address line to resolve.
    pub fn full_address(&self) -> Option<String> {
        let street = non_blank(&self.address)?;

        let mut out = street.to_string();
        if let Some(city) = non_blank(&self.city) {
            out.push_str(", ");
            out.push_str(city);
        }
        if let Some(state) = non_blank(&self.state) {
            out.push_str(", ");
            out.push_str(state);
        }
        if let Some(zip) = non_blank(&self.zip) {
            out.push(' ');
            out.push_str(zip);
        }
        Some(out)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ============================================
// Technician assignment
// ============================================

/// Link between a job and a technician
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AssignmentRow")]
pub struct TechnicianAssignment {
    pub technician_id: TechnicianId,
    pub is_primary: bool,
    /// Name from the embedded `users` relation, when the query joined it
    pub display_name: Option<String>,
}

impl TechnicianAssignment {
    pub fn new(technician_id: TechnicianId, is_primary: bool) -> Self {
        Self {
            technician_id,
            is_primary,
            display_name: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssignmentRow {
    technician_id: TechnicianId,
    #[serde(default)]
    is_primary: bool,
    #[serde(default)]
    users: Option<PersonName>,
}

#[derive(Debug, Deserialize)]
struct PersonName {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl From<AssignmentRow> for TechnicianAssignment {
    fn from(row: AssignmentRow) -> Self {
        let display_name = row.users.and_then(|u| {
            let name = format!(
                "{} {}",
                u.first_name.unwrap_or_default(),
                u.last_name.unwrap_or_default()
            );
            let name = name.trim().to_string();
            (!name.is_empty()).then_some(name)
        });
        Self {
            technician_id: row.technician_id,
            is_primary: row.is_primary,
            display_name,
        }
    }
}

// ============================================
// Job
// ============================================

/// Job row with its location and technician assignments (read-only here)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    /// Local wall-clock start; `None` means unscheduled
    #[serde(default, deserialize_with = "deserialize_local_timestamp")]
    pub schedule_start: Option<NaiveDateTime>,
    /// Raw `"H:MM"` text, parsed on use
    #[serde(default)]
    pub schedule_duration: Option<String>,
    #[serde(rename = "time_period_due", default, deserialize_with = "deserialize_local_timestamp")]
    pub due: Option<NaiveDateTime>,
    #[serde(rename = "locations", default)]
    pub location: Option<Location>,
    #[serde(rename = "job_technicians", default, deserialize_with = "deserialize_null_as_empty")]
    pub technician_assignments: Vec<TechnicianAssignment>,
}

impl Job {
    /// Create an unscheduled, unassigned job
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: None,
            name: Some(name.into()),
            job_type: None,
            status: JobStatus::Unscheduled,
            schedule_start: None,
            schedule_duration: None,
            due: None,
            location: None,
            technician_assignments: Vec::new(),
        }
    }

    pub fn scheduled_at(mut self, start: NaiveDateTime) -> Self {
        self.schedule_start = Some(start);
        if self.status == JobStatus::Unscheduled {
            self.status = JobStatus::Scheduled;
        }
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.schedule_duration = Some(duration.into());
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    pub fn due_at(mut self, due: NaiveDateTime) -> Self {
        self.due = Some(due);
        self
    }

    pub fn at_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn assigned_to(mut self, technician: TechnicianId, is_primary: bool) -> Self {
        self.technician_assignments
            .push(TechnicianAssignment::new(technician, is_primary));
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed Job")
    }

    pub fn is_unassigned(&self) -> bool {
        self.technician_assignments.is_empty()
    }

    pub fn is_assigned_to(&self, technician: TechnicianId) -> bool {
        self.technician_assignments
            .iter()
            .any(|a| a.technician_id == technician)
    }

    /// Geocodable address of the job's location, if any
    pub fn address(&self) -> Option<String> {
        self.location.as_ref().and_then(Location::full_address)
    }
}

fn deserialize_local_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(|s| {
        let parsed = schedule::parse_timestamp(s);
        if parsed.is_none() {
            tracing::warn!(value = s, "Ignoring unparseable timestamp");
        }
        parsed
    }))
}

fn deserialize_null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================
// Technician
// ============================================

/// Technician roster entry (`users` with role `technician`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technician {
    pub id: TechnicianId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
}

impl Technician {
    pub fn new(id: TechnicianId, first_name: &str, last_name: &str) -> Self {
        Self {
            id,
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            job_title: None,
        }
    }

    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let name = name.trim();
        if name.is_empty() {
            format!("Tech {}", self.id.short())
        } else {
            name.to_string()
        }
    }

    pub fn initials(&self) -> String {
        let first = self.first_name.as_deref().and_then(|s| s.chars().next());
        let last = self.last_name.as_deref().and_then(|s| s.chars().next());
        first.into_iter().chain(last).collect::<String>().to_uppercase()
    }

    /// Case-insensitive substring match on the full name
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim();
        term.is_empty()
            || self
                .display_name()
                .to_lowercase()
                .contains(&term.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_status_from_text() {
        assert_eq!(JobStatus::from("scheduled"), JobStatus::Scheduled);
        assert_eq!(JobStatus::from("Completed"), JobStatus::Completed);
        assert_eq!(JobStatus::from("canceled"), JobStatus::Cancelled);
        assert_eq!(
            JobStatus::from("tech_completed"),
            JobStatus::Other("tech_completed".to_string())
        );
        assert_eq!(String::from(JobStatus::Unscheduled), "unscheduled");
    }

    #[test]
    fn test_full_address() {
        let location = Location {
            name: Some("Main Plant".to_string()),
            address: Some("100 Peachtree St".to_string()),
            city: Some("Atlanta".to_string()),
            state: Some("GA".to_string()),
            zip: Some("30303".to_string()),
        };
        assert_eq!(
            location.full_address().as_deref(),
            Some("100 Peachtree St, Atlanta, GA 30303")
        );

        let no_street = Location {
            city: Some("Atlanta".to_string()),
            ..Default::default()
        };
        assert_eq!(no_street.full_address(), None);
    }

    #[test]
    fn test_job_row_deserialization() {
        let json = r#"{
            "id": "5f0c6f2e-8d5b-4a53-9a7b-1f1d2e3c4b5a",
            "number": "1042",
            "name": "RTU inspection",
            "type": "maintenance",
            "status": "scheduled",
            "schedule_start": "2024-06-10T14:30:00",
            "schedule_duration": "1:30",
            "time_period_due": null,
            "locations": {"name": "HQ", "address": "1 Main St", "city": "Atlanta", "state": "GA", "zip": "30303"},
            "job_technicians": [
                {"technician_id": "0b9e7c1a-2d3f-4e5a-8b6c-7d8e9f0a1b2c", "is_primary": true,
                 "users": {"first_name": "Jane", "last_name": "Tech"}}
            ]
        }"#;

        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.job_type.as_deref(), Some("maintenance"));
        assert_eq!(
            job.schedule_start,
            Some(
                NaiveDate::from_ymd_opt(2024, 6, 10)
                    .unwrap()
                    .and_hms_opt(14, 30, 0)
                    .unwrap()
            )
        );
        assert_eq!(job.technician_assignments.len(), 1);
        assert!(job.technician_assignments[0].is_primary);
        assert_eq!(
            job.technician_assignments[0].display_name.as_deref(),
            Some("Jane Tech")
        );
        assert_eq!(job.address().as_deref(), Some("1 Main St, Atlanta, GA 30303"));
    }

    #[test]
    fn test_job_row_with_missing_relations() {
        let json = r#"{
            "id": "5f0c6f2e-8d5b-4a53-9a7b-1f1d2e3c4b5a",
            "status": "unscheduled",
            "schedule_start": null,
            "locations": null,
            "job_technicians": null
        }"#;

        let job: Job = serde_json::from_str(json).unwrap();
        assert!(job.schedule_start.is_none());
        assert!(job.location.is_none());
        assert!(job.is_unassigned());
    }

    #[test]
    fn test_technician_names() {
        let tech = Technician::new(TechnicianId(Uuid::new_v4()), "jane", "doe");
        assert_eq!(tech.display_name(), "jane doe");
        assert_eq!(tech.initials(), "JD");
        assert!(tech.matches_search("DOE"));
        assert!(tech.matches_search(""));
        assert!(!tech.matches_search("smith"));
    }
}
