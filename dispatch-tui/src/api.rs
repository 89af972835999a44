//! API client for the dispatch backend (Supabase / PostgREST).
//!
//! This module provides an async HTTP client for reading jobs and the
//! technician roster. All methods are non-blocking and designed to run in a
//! separate Tokio task; results travel back to the UI as [`ApiMessage`]s.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, NaiveTime, TimeZone};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::markers::LatLng;
use crate::models::{Job, Technician};
use crate::schedule::DateRange;

/// Columns and embedded relations requested for every job row
const JOB_SELECT: &str = "id,number,name,type,status,schedule_start,schedule_duration,time_period_due,\
locations(name,address,city,state,zip),\
job_technicians(technician_id,is_primary,users(first_name,last_name))";

const TECHNICIAN_SELECT: &str = "id,first_name,last_name,job_title";

/// API client for the PostgREST endpoint of a Supabase project
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` (the project URL, without `/rest/v1`)
    pub fn new(base_url: &str, anon_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = anon_key.map(str::trim).filter(|k| !k.is_empty()) {
            headers.insert(
                "apikey",
                HeaderValue::from_str(key).context("Anon key is not a valid header value")?,
            );
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key))
                    .context("Anon key is not a valid header value")?,
            );
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = self.rest_url(table);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {} endpoint", table))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "API error: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", table))
    }

    // ============================================
    // Jobs
    // ============================================

    /// Jobs scheduled or due inside `range`, with location and assignments
    pub async fn fetch_jobs(&self, range: DateRange) -> Result<Vec<Job>> {
        let jobs: Vec<Job> = self.get_rows("jobs", &jobs_query(range)).await?;
        tracing::debug!(count = jobs.len(), from = %range.from, to = %range.to, "Fetched jobs");
        Ok(jobs)
    }

    // ============================================
    // Technicians
    // ============================================

    /// Active users with the technician role
    pub async fn fetch_technicians(&self) -> Result<Vec<Technician>> {
        let query = [
            ("select", TECHNICIAN_SELECT.to_string()),
            ("role", "eq.technician".to_string()),
            ("status", "eq.active".to_string()),
            ("order", "first_name.asc".to_string()),
        ];
        self.get_rows("users", &query).await
    }

    // ============================================
    // Utility
    // ============================================

    /// Health check - attempts a one-row read of the roster table
    pub async fn health_check(&self) -> Result<bool> {
        let query = [("select", "id".to_string()), ("limit", "1".to_string())];
        match self.get_rows::<serde_json::Value>("users", &query).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::debug!(error = %e, "Health check failed");
                Ok(false)
            }
        }
    }
}

/// Query pairs for a job fetch over an inclusive date range.
///
/// A job matches when either its start or its due time falls in the range.
pub fn jobs_query(range: DateRange) -> Vec<(&'static str, String)> {
    let from = local_boundary(range.from.and_time(NaiveTime::MIN));
    let to = local_boundary(range.to.and_hms_opt(23, 59, 59).unwrap_or(range.to.and_time(NaiveTime::MIN)));

    let filter = format!(
        "(and(schedule_start.gte.{from},schedule_start.lte.{to}),and(time_period_due.gte.{from},time_period_due.lte.{to}))"
    );

    vec![
        ("select", JOB_SELECT.to_string()),
        ("or", filter),
        ("order", "schedule_start.asc.nullslast".to_string()),
    ]
}

/// Local wall-clock time as an RFC 3339 timestamp, so the server compares in
/// the dispatcher's zone
fn local_boundary(naive: NaiveDateTime) -> String {
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.to_rfc3339(),
        None => naive.format("%Y-%m-%dT%H:%M:%S").to_string(),
    }
}

/// Monotonic token per job fetch.
///
/// Only the response carrying the latest token may replace fetched state; an
/// older filter's late answer is dropped.
#[derive(Debug, Default, Clone)]
pub struct RequestSequencer {
    latest: u64,
}

impl RequestSequencer {
    /// Issue the token for a new request
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.latest
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }
}

/// Messages sent from API worker to the main TUI thread
#[derive(Debug, Clone)]
pub enum ApiMessage {
    /// Jobs for a sequenced fetch have been loaded
    JobsLoaded {
        seq: u64,
        range: DateRange,
        jobs: Vec<Job>,
    },
    /// A sequenced job fetch failed
    JobsFailed { seq: u64, error: String },
    /// Technician roster has been loaded
    TechniciansLoaded(Vec<Technician>),
    /// Coordinates resolved for the addresses of a job fetch
    Geocoded {
        seq: u64,
        coordinates: HashMap<String, LatLng>,
    },
    /// An error occurred outside a sequenced fetch
    Error(String),
    /// API connection status changed
    ConnectionStatus(bool),
}

/// Commands sent from TUI to the API worker
#[derive(Debug, Clone)]
pub enum ApiCommand {
    /// Fetch jobs for a date range, tagged with a sequence token
    FetchJobs { seq: u64, range: DateRange },
    /// Refresh the technician roster
    FetchTechnicians,
    /// Resolve addresses for the fetch tagged `seq`
    Geocode { seq: u64, addresses: Vec<String> },
    /// Check API connection status
    CheckConnection,
    /// Shutdown the API worker
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_sequencer_only_latest_is_current() {
        let mut seq = RequestSequencer::default();
        let first = seq.issue();
        let second = seq.issue();
        assert!(second > first);
        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));
        assert_eq!(seq.latest(), second);
    }

    #[test]
    fn test_jobs_query_shape() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let query = jobs_query(DateRange::new(day, day));

        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };

        assert!(get("select").contains("job_technicians(technician_id,is_primary,users("));
        assert!(get("select").contains("locations("));

        let filter = get("or");
        assert!(filter.starts_with("(and(schedule_start.gte.2024-06-10T00:00:00"));
        assert!(filter.contains("schedule_start.lte.2024-06-10T23:59:59"));
        assert!(filter.contains("time_period_due.gte."));
    }

    #[test]
    fn test_client_rejects_bad_key() {
        let result = ApiClient::new("https://demo.supabase.co", Some("bad\nkey"), Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_rest_url() {
        let client = ApiClient::new("https://demo.supabase.co/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.rest_url("jobs"), "https://demo.supabase.co/rest/v1/jobs");
    }
}
