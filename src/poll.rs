//! Poll-response assembly.
//!
//! Merges the classifier's output with the original request body into a
//! transport-agnostic `{statusCode, body}` envelope. The caller (HTTP
//! handler, CLI) only serializes the envelope; nothing here raises.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::redact;
use crate::registry::{JobRegistry, JobState};
use crate::status::{self, JobStatusMessage};

/// Body key naming the job to look up.
pub const JOB_ID_KEY: &str = "job_id";

/// Transport-agnostic response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: Value,
}

/// How a job id is resolved against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Exact query by job name.
    Direct,
    /// Recent-window list plus linear scan, for registries without an
    /// exact-match query API.
    Scan { window_minutes: i64 },
}

/// Poll the registry for the job named in `body` and merge the outcome
/// into a response envelope. Always returns a response.
pub async fn handle_poll(
    registry: &impl JobRegistry,
    body: Map<String, Value>,
    mode: LookupMode,
) -> PollResponse {
    let job_id = body
        .get(JOB_ID_KEY)
        .and_then(Value::as_str)
        .map(str::to_string);

    let outcome = match (&job_id, mode) {
        (Some(id), LookupMode::Direct) => status::check_job_status(registry, id).await,
        (Some(id), LookupMode::Scan { window_minutes }) => {
            status::check_job_status_scan(registry, id, window_minutes).await
        }
        (None, _) => None,
    };

    let response = build_response(job_id.as_deref(), body, outcome);
    info!(
        response = %serde_json::to_string_pretty(&response).unwrap_or_default(),
        "poll response"
    );
    response
}

/// Merge classifier output into the request body: 500 for unknown or
/// failed jobs, 200 otherwise. Job-status fields take precedence over
/// identically named request fields, and the body is redacted before it
/// leaves this function.
pub fn build_response(
    job_id: Option<&str>,
    body: Map<String, Value>,
    outcome: Option<(JobState, JobStatusMessage)>,
) -> PollResponse {
    let mut merged = body;

    let (status_code, overlay) = match outcome {
        None => {
            let id = job_id.unwrap_or("<missing>");
            let mut fields = Map::new();
            fields.insert(
                "message".to_string(),
                Value::String(format!("Job Id {id} does not exist in the job registry.")),
            );
            (500, fields)
        }
        Some((state, message)) => {
            let code = if state == JobState::Failed { 500 } else { 200 };
            (code, message.body_fields())
        }
    };

    for (key, value) in overlay {
        merged.insert(key, value);
    }

    let mut body = Value::Object(merged);
    redact::redact_value(&mut body);

    PollResponse { status_code, body }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::registry::{JobRecord, ListJobsQuery, RegistryError};
    use crate::status::classify_record;

    fn body_with(job_id: &str) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert(JOB_ID_KEY.to_string(), json!(job_id));
        body.insert("workflow_name".to_string(), json!("core-cluster"));
        body.insert(
            "params".to_string(),
            json!({"dataset_id": "the-office-series", "authorizationToken": "abcd1234"}),
        );
        body
    }

    fn outcome_for(status: JobState, exit_message: Option<&str>) -> (JobState, JobStatusMessage) {
        let record = JobRecord {
            name: "workflow-dev-abc-123".into(),
            status,
            creation_time: Utc.with_ymd_and_hms(2026, 8, 5, 9, 0, 0).unwrap(),
            exit_message: exit_message.map(str::to_string),
        };
        classify_record(&record, Utc.with_ymd_and_hms(2026, 8, 5, 10, 0, 0).unwrap())
    }

    #[test]
    fn unknown_job_is_a_500_with_explanation() {
        let response = build_response(
            Some("workflow-dev-abc-123"),
            body_with("workflow-dev-abc-123"),
            None,
        );
        assert_eq!(response.status_code, 500);
        let message = response.body["message"].as_str().unwrap();
        assert!(message.contains("does not exist"));
        assert!(message.contains("workflow-dev-abc-123"));
    }

    #[test]
    fn completed_job_is_a_200_with_status_fields() {
        let response = build_response(
            Some("workflow-dev-abc-123"),
            body_with("workflow-dev-abc-123"),
            Some(outcome_for(JobState::Completed, None)),
        );
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["JOB_STATUS"], "Completed");
        assert!(response.body["JOB_MESSAGE"].as_str().unwrap().contains("ago."));
        // Original request fields survive the merge.
        assert_eq!(response.body["workflow_name"], "core-cluster");
    }

    #[test]
    fn failed_job_is_a_500_with_failure_detail() {
        let raw = r#"{"error":"ValueError","message":"bad input"}"#;
        let response = build_response(
            Some("workflow-dev-abc-123"),
            body_with("workflow-dev-abc-123"),
            Some(outcome_for(JobState::Failed, Some(raw))),
        );
        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.body["JOB_MESSAGE"]["failure_detail"]["error"],
            "ValueError"
        );
    }

    #[test]
    fn stopped_and_in_progress_jobs_are_200() {
        for state in [JobState::Stopped, JobState::InProgress] {
            let response = build_response(
                Some("workflow-dev-abc-123"),
                body_with("workflow-dev-abc-123"),
                Some(outcome_for(state, None)),
            );
            assert_eq!(response.status_code, 200);
        }
    }

    #[test]
    fn job_status_fields_override_request_fields() {
        let mut body = body_with("workflow-dev-abc-123");
        body.insert("JOB_STATUS".to_string(), json!("stale-client-value"));

        let response = build_response(
            Some("workflow-dev-abc-123"),
            body,
            Some(outcome_for(JobState::Completed, None)),
        );
        assert_eq!(response.body["JOB_STATUS"], "Completed");
    }

    #[test]
    fn response_body_is_redacted() {
        let response = build_response(
            Some("workflow-dev-abc-123"),
            body_with("workflow-dev-abc-123"),
            Some(outcome_for(JobState::Completed, None)),
        );
        assert_eq!(response.body["params"]["authorizationToken"], "********");
    }

    #[test]
    fn missing_job_id_is_a_500() {
        let response = build_response(None, Map::new(), None);
        assert_eq!(response.status_code, 500);
        assert!(response.body["message"]
            .as_str()
            .unwrap()
            .contains("does not exist"));
    }

    #[test]
    fn envelope_serializes_with_status_code_key() {
        let response = build_response(None, Map::new(), None);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""statusCode":500"#));
    }

    // --- handle_poll against a canned registry ---

    struct MissingRegistry;

    impl JobRegistry for MissingRegistry {
        async fn describe_job(&self, name: &str) -> Result<JobRecord, RegistryError> {
            Err(RegistryError::NotFound(name.to_string()))
        }

        async fn list_jobs(&self, _query: &ListJobsQuery) -> Result<Vec<JobRecord>, RegistryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn handle_poll_unknown_job_end_to_end() {
        let response = handle_poll(
            &MissingRegistry,
            body_with("workflow-dev-abc-123"),
            LookupMode::Direct,
        )
        .await;
        assert_eq!(response.status_code, 500);
        assert!(response.body["message"]
            .as_str()
            .unwrap()
            .contains("does not exist"));
        // The token was redacted even on the unknown-job path.
        assert_eq!(response.body["params"]["authorizationToken"], "********");
    }

    #[tokio::test]
    async fn handle_poll_scan_mode_unknown_job() {
        let response = handle_poll(
            &MissingRegistry,
            body_with("workflow-dev-abc-123"),
            LookupMode::Scan { window_minutes: 30 },
        )
        .await;
        assert_eq!(response.status_code, 500);
    }
}
