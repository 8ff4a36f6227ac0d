//! Data types for the job registry's query API.
//!
//! All structs derive `Serialize` and `Deserialize` matching the JSON
//! the registry's describe/list endpoints speak. Records are read-only
//! snapshots: the registry owns and mutates them, this crate only
//! observes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state the registry reports for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    InProgress,
    Completed,
    Stopped,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::InProgress => write!(f, "InProgress"),
            JobState::Completed => write!(f, "Completed"),
            JobState::Stopped => write!(f, "Stopped"),
            JobState::Failed => write!(f, "Failed"),
        }
    }
}

/// Snapshot of the registry's record for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job name, as submitted.
    pub name: String,
    /// Current lifecycle state.
    pub status: JobState,
    /// When the registry accepted the job.
    pub creation_time: DateTime<Utc>,
    /// Failure text surfaced from the job's failure artifact. Only
    /// populated on failed jobs, and not guaranteed to be JSON.
    #[serde(default)]
    pub exit_message: Option<String>,
}

/// Filters for the list endpoint, used by the scan fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListJobsQuery {
    pub name_contains: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub max_results: Option<u32>,
}

/// Response envelope of the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobRecord>,
}
