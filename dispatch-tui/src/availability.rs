//! Technician availability index.
//!
//! Maps each technician to the set of calendar dates on which they have at
//! least one scheduled job. The side panel lists these dates; picking one
//! moves the timeline to that day.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::models::{Job, TechnicianId};
use crate::schedule::calendar_date;

/// Jobs that still count towards availability (anything not completed)
pub fn active_jobs(jobs: &[Job]) -> Vec<Job> {
    jobs.iter()
        .filter(|job| !job.status.is_completed())
        .cloned()
        .collect()
}

/// Technician -> dates with work, both sides ordered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityIndex {
    dates: BTreeMap<TechnicianId, BTreeSet<NaiveDate>>,
}

impl AvailabilityIndex {
    /// Dates for one technician (empty if they have none)
    pub fn dates_for(&self, tech: TechnicianId) -> Vec<NaiveDate> {
        self.dates
            .get(&tech)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_work_on(&self, tech: TechnicianId, date: NaiveDate) -> bool {
        self.dates
            .get(&tech)
            .map(|set| set.contains(&date))
            .unwrap_or(false)
    }

    pub fn technicians(&self) -> impl Iterator<Item = TechnicianId> + '_ {
        self.dates.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }
}

/// Build the index from already-filtered jobs.
///
/// Unscheduled and unassigned jobs contribute nothing. Every assigned
/// technician gets the job's date, primary or not.
pub fn build_availability_index(jobs: &[Job]) -> AvailabilityIndex {
    let mut dates: BTreeMap<TechnicianId, BTreeSet<NaiveDate>> = BTreeMap::new();

    for job in jobs {
        let Some(start) = job.schedule_start else {
            continue;
        };
        let date = calendar_date(start);
        for assignment in &job.technician_assignments {
            dates.entry(assignment.technician_id).or_default().insert(date);
        }
    }

    AvailabilityIndex { dates }
}

/// Number of scheduled jobs per calendar date
pub fn job_counts_by_date(jobs: &[Job]) -> BTreeMap<NaiveDate, usize> {
    let mut counts = BTreeMap::new();
    for start in jobs.iter().filter_map(|job| job.schedule_start) {
        *counts.entry(calendar_date(start)).or_insert(0) += 1;
    }
    counts
}
