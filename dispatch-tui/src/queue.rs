//! Job queue: work that still needs a dispatcher's attention.

use chrono::NaiveDate;

use crate::models::{Job, JobStatus};

/// Job type that marks preventive maintenance
pub const MAINTENANCE_TYPE: &str = "maintenance";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobQueue {
    /// Unscheduled with nobody assigned, or anything past due
    pub unassigned: Vec<Job>,
    /// Preventive maintenance waiting for a slot
    pub pms_to_schedule: Vec<Job>,
    /// Other work waiting for a slot
    pub other_to_schedule: Vec<Job>,
    /// Scheduled and assigned
    pub scheduled: Vec<Job>,
}

/// Queue buckets in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBucket {
    Unassigned,
    PmsToSchedule,
    OtherToSchedule,
    Scheduled,
}

impl QueueBucket {
    pub const ALL: [QueueBucket; 4] = [
        QueueBucket::Unassigned,
        QueueBucket::PmsToSchedule,
        QueueBucket::OtherToSchedule,
        QueueBucket::Scheduled,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            QueueBucket::Unassigned => "Unassigned",
            QueueBucket::PmsToSchedule => "PMs to schedule",
            QueueBucket::OtherToSchedule => "Other to schedule",
            QueueBucket::Scheduled => "Scheduled",
        }
    }
}

impl JobQueue {
    pub fn bucket(&self, bucket: QueueBucket) -> &[Job] {
        match bucket {
            QueueBucket::Unassigned => &self.unassigned,
            QueueBucket::PmsToSchedule => &self.pms_to_schedule,
            QueueBucket::OtherToSchedule => &self.other_to_schedule,
            QueueBucket::Scheduled => &self.scheduled,
        }
    }
}

/// Due before today and not closed out
pub fn is_past_due(job: &Job, today: NaiveDate) -> bool {
    match job.due {
        Some(due) => due.date() < today && !job.status.is_closed(),
        None => false,
    }
}

fn is_maintenance(job: &Job) -> bool {
    job.job_type
        .as_deref()
        .map(|t| t.eq_ignore_ascii_case(MAINTENANCE_TYPE))
        .unwrap_or(false)
}

/// Sort jobs into queue buckets. A job lands in at most one bucket; closed
/// jobs that are not past due land in none.
pub fn categorize_jobs(jobs: &[Job], today: NaiveDate) -> JobQueue {
    let mut queue = JobQueue::default();

    for job in jobs {
        let past_due = is_past_due(job, today);
        let unscheduled = job.status == JobStatus::Unscheduled;

        if past_due || (unscheduled && job.is_unassigned()) {
            queue.unassigned.push(job.clone());
        } else if unscheduled && is_maintenance(job) {
            queue.pms_to_schedule.push(job.clone());
        } else if unscheduled {
            queue.other_to_schedule.push(job.clone());
        } else if job.status == JobStatus::Scheduled && !job.is_unassigned() {
            queue.scheduled.push(job.clone());
        }
    }

    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TechnicianId;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn tech() -> TechnicianId {
        TechnicianId(Uuid::new_v4())
    }

    #[test]
    fn test_categories() {
        let t = tech();
        let yesterday = today().pred_opt().unwrap().and_hms_opt(12, 0, 0).unwrap();
        let tomorrow = today().succ_opt().unwrap().and_hms_opt(12, 0, 0).unwrap();

        let jobs = vec![
            Job::new("fresh"),
            Job::new("pm").with_type("maintenance").assigned_to(t, true),
            Job::new("repair").with_type("repair").assigned_to(t, true),
            Job::new("booked").scheduled_at(tomorrow).assigned_to(t, true),
            Job::new("late")
                .scheduled_at(tomorrow)
                .due_at(yesterday)
                .assigned_to(t, true),
            Job::new("closed late")
                .with_status(JobStatus::Completed)
                .due_at(yesterday),
        ];

        let queue = categorize_jobs(&jobs, today());
        let names = |bucket: QueueBucket| -> Vec<&str> {
            queue.bucket(bucket).iter().map(|j| j.display_name()).collect()
        };

        assert_eq!(names(QueueBucket::Unassigned), vec!["fresh", "late"]);
        assert_eq!(names(QueueBucket::PmsToSchedule), vec!["pm"]);
        assert_eq!(names(QueueBucket::OtherToSchedule), vec!["repair"]);
        assert_eq!(names(QueueBucket::Scheduled), vec!["booked"]);
    }

    #[test]
    fn test_due_today_is_not_past_due() {
        let job = Job::new("x").due_at(today().and_hms_opt(0, 0, 0).unwrap());
        assert!(!is_past_due(&job, today()));
    }

    #[test]
    fn test_cancelled_is_never_past_due() {
        let job = Job::new("x")
            .with_status(JobStatus::Cancelled)
            .due_at(today().pred_opt().unwrap().and_hms_opt(0, 0, 0).unwrap());
        assert!(!is_past_due(&job, today()));
    }
}
