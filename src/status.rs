//! Job status classification over the external registry.
//!
//! A poll resolves a job id to a registry snapshot, renders how long
//! ago the job was created, and — for failed jobs — normalizes the
//! registry's exit message back into structure. Every failure mode of
//! the lookup itself collapses to "unknown job": polling answers, it
//! never raises.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::registry::{JobRecord, JobRegistry, JobState, ListJobsQuery, RegistryError};

/// How far back the list-scan fallback looks.
pub const SCAN_WINDOW_MINUTES: i64 = 30;

/// Page size for the list-scan fallback.
pub const JOB_LIMIT: u32 = 100;

/// Body key carrying the job's lifecycle state.
pub const JOB_STATUS_KEY: &str = "JOB_STATUS";

/// Body key carrying the human-readable status message.
pub const JOB_MESSAGE_KEY: &str = "JOB_MESSAGE";

/// `now - creation_time`, decomposed for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElapsedTime {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: f64,
}

impl ElapsedTime {
    /// Decompose a delta into days, hours (0..24), minutes (0..60) and
    /// fractional seconds rounded to two decimals.
    pub fn from_delta(delta: Duration) -> Self {
        let days = delta.num_days();
        let in_day = delta.num_seconds() - days * 86_400;
        let hours = in_day / 3_600;
        let minutes = (in_day % 3_600) / 60;

        let micros = delta
            .num_microseconds()
            .unwrap_or_else(|| delta.num_seconds().saturating_mul(1_000_000));
        let frac = (micros - delta.num_seconds() * 1_000_000) as f64 / 1e6;
        let seconds = (((in_day % 60) as f64 + frac) * 100.0).round() / 100.0;

        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }
}

impl std::fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            days,
            hours,
            minutes,
            seconds,
        } = *self;
        // Whole seconds keep one decimal place ("0.0 secs"), fractional
        // ones print as-is ("5.25 secs").
        if seconds == seconds.trunc() {
            write!(f, "{days} days, {hours} hours, {minutes} min, {seconds:.1} secs")
        } else {
            write!(f, "{days} days, {hours} hours, {minutes} min, {seconds} secs")
        }
    }
}

/// Classifier output, merged into the poll response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusMessage {
    pub status: JobState,
    pub message: String,
    pub failure_detail: Option<Value>,
}

impl JobStatusMessage {
    /// The body fields this message contributes to a poll response.
    /// `failure_detail` rides alongside the elapsed-time message, never
    /// in place of it.
    pub fn body_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            JOB_STATUS_KEY.to_string(),
            Value::String(self.status.to_string()),
        );
        let message = match &self.failure_detail {
            None => Value::String(self.message.clone()),
            Some(detail) => serde_json::json!({
                "message": self.message,
                "failure_detail": detail,
            }),
        };
        fields.insert(JOB_MESSAGE_KEY.to_string(), message);
        fields
    }
}

/// Classify a registry snapshot at a given instant.
pub fn classify_record(record: &JobRecord, now: DateTime<Utc>) -> (JobState, JobStatusMessage) {
    let elapsed = ElapsedTime::from_delta(now - record.creation_time);
    let message = format!("Job {} {} ago.", record.status, elapsed);

    let failure_detail = if record.status == JobState::Failed {
        record.exit_message.as_ref().map(|raw| {
            // The exit message comes from the failing job's artifact;
            // JSON when it parses, opaque text when it does not.
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        })
    } else {
        None
    };

    (
        record.status,
        JobStatusMessage {
            status: record.status,
            message,
            failure_detail,
        },
    )
}

/// Direct-lookup mode: exact query by job name. An absent record or any
/// registry error yields `None`.
pub async fn check_job_status(
    registry: &impl JobRegistry,
    job_id: &str,
) -> Option<(JobState, JobStatusMessage)> {
    match registry.describe_job(job_id).await {
        Ok(record) => Some(classify_record(&record, Utc::now())),
        Err(RegistryError::NotFound(_)) => None,
        Err(registry_error) => {
            warn!(%job_id, %registry_error, "registry query failed; treating job as unknown");
            None
        }
    }
}

/// List-scan mode, for registries without an exact-match query API:
/// list jobs created inside the recent window whose name contains the
/// id, then scan for an exact match.
///
/// Jobs older than the window are invisible here and come back as
/// unknown, exactly like jobs that never existed.
pub async fn check_job_status_scan(
    registry: &impl JobRegistry,
    job_id: &str,
    window_minutes: i64,
) -> Option<(JobState, JobStatusMessage)> {
    let query = ListJobsQuery {
        name_contains: Some(job_id.to_string()),
        created_after: Some(Utc::now() - Duration::minutes(window_minutes)),
        max_results: Some(JOB_LIMIT),
    };
    match registry.list_jobs(&query).await {
        Ok(jobs) => jobs
            .iter()
            .find(|job| job.name == job_id)
            .map(|record| classify_record(record, Utc::now())),
        Err(registry_error) => {
            warn!(%job_id, %registry_error, "registry list failed; treating job as unknown");
            None
        }
    }
}
