use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::State;

/// Distinguishes failures of the executed workload from failures of the
/// surrounding plumbing. Both are terminal for a run, but they are
/// reported differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureClass {
    /// The workload itself raised.
    Workload(String),
    /// Resolution or another collaborator failed before or around the
    /// workload (fetch error, bad parameter document).
    Infrastructure(String),
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::Workload(msg) => write!(f, "Workload failure: {msg}"),
            FailureClass::Infrastructure(msg) => write!(f, "Infrastructure failure: {msg}"),
        }
    }
}

/// The result of executing a run phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Success,
    Failure(FailureClass),
}

/// Terminal-or-pending status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

/// Tracks one workload run through the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub id: String,
    pub workflow: Option<String>,
    pub state: State,
    pub status: RunStatus,
    pub state_history: Vec<State>,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(workflow: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow,
            state: State::Init,
            status: RunStatus::Pending,
            state_history: Vec::new(),
            started_at: Utc::now(),
        }
    }
}
