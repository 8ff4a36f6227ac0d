//! Failure artifact construction and persistence.
//!
//! On failure the runner writes a single JSON object
//! `{"error": <kind>, "message": <string|object>}` to a well-known
//! path. The orchestrator surfaces the file's content as the job's
//! exit message, and the polling side parses it back out of the
//! registry record.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::RunbookError;
use crate::redact;
use crate::trace::{Trace, safe_str};

/// Fixed artifact location inside the managed container.
pub const CONTAINER_ARTIFACT_PATH: &str = "/opt/runbook/output/message";

/// Error kind used when a failure text cannot be split into a
/// `<Type>: <detail>` pair.
const FALLBACK_ERROR_KIND: &str = "WorkloadError";

/// The persisted failure description. Construction never fails;
/// serialization problems degrade to an opaque string message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    #[serde(rename = "error")]
    pub error_kind: String,
    pub message: Value,
}

impl FailureReport {
    pub fn from_parts(kind: impl Into<String>, message: impl Into<Value>) -> Self {
        Self {
            error_kind: kind.into(),
            message: message.into(),
        }
    }

    /// Report for an extracted exception chain. The innermost stack
    /// names the error kind; the full chain is the message.
    pub fn from_trace(trace: &Trace) -> Self {
        let error_kind = trace
            .head()
            .map(|stack| stack.exception_type.clone())
            .unwrap_or_else(|| FALLBACK_ERROR_KIND.to_string());
        let message = match serde_json::to_value(&trace.stacks) {
            Ok(value) => value,
            Err(serde_error) => Value::String(format!("<unserializable trace: {serde_error}>")),
        };
        Self {
            error_kind,
            message,
        }
    }

    /// Best-effort recovery of a structured error from raw traceback
    /// text.
    ///
    /// The last-but-one line of a formatted traceback reads
    /// `<Type>: <detail>`; when the detail parses as a JSON object it
    /// becomes the structured message. Anything else degrades to an
    /// opaque string — no guarantee stronger than a two-part split on
    /// the first colon-space.
    pub fn from_text(raw: &str) -> Self {
        let lines: Vec<&str> = raw.lines().collect();
        let line = match lines.len() {
            0 => raw.trim(),
            1 => lines[0],
            n => lines[n - 2],
        };

        if let Some((kind, detail)) = line.split_once(": ") {
            let message = match serde_json::from_str::<Value>(detail) {
                Ok(Value::Object(fields)) => Value::Object(fields),
                _ => Value::String(detail.to_string()),
            };
            return Self {
                error_kind: kind.to_string(),
                message,
            };
        }

        Self {
            error_kind: FALLBACK_ERROR_KIND.to_string(),
            message: Value::String(line.to_string()),
        }
    }

    /// Report for a failure that happened before the workload engine
    /// ran (input or parameter resolution). The error's source chain is
    /// kept alongside the primary message.
    pub fn from_error(error: &RunbookError) -> Self {
        let mut chain = Vec::new();
        let mut source = std::error::Error::source(error);
        while let Some(err) = source {
            chain.push(Value::String(err.to_string()));
            source = std::error::Error::source(err);
        }

        let message = if chain.is_empty() {
            Value::String(safe_str(error))
        } else {
            serde_json::json!({
                "message": safe_str(error),
                "caused_by": chain,
            })
        };
        Self::from_parts(error.kind(), message)
    }

    /// Redacted copy safe for logs, responses and the artifact file.
    pub fn redacted(&self) -> Self {
        let mut message = self.message.clone();
        redact::redact_value(&mut message);
        Self {
            error_kind: self.error_kind.clone(),
            message,
        }
    }
}

/// Writes failure reports to the artifact path and verifies they read
/// back as JSON.
#[derive(Debug, Clone)]
pub struct FailureArtifactWriter {
    path: PathBuf,
}

impl FailureArtifactWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Redact, serialize and persist the report, then re-read the file
    /// and log the parsed content. The self-check surfaces write or
    /// serialization defects immediately; it does not roll back.
    ///
    /// An open/write failure is reported as [`RunbookError::ArtifactWrite`]
    /// so operators can tell "the job failed" apart from "the job
    /// failed and we couldn't say why".
    pub fn write(&self, report: &FailureReport) -> Result<(), RunbookError> {
        let redacted = report.redacted();
        let payload = match serde_json::to_string(&redacted) {
            Ok(json) => json,
            Err(serde_error) => {
                error!(%serde_error, "failure report did not serialize; writing fallback");
                serde_json::json!({
                    "error": redacted.error_kind,
                    "message": "<unserializable failure report>",
                })
                .to_string()
            }
        };

        info!(path = %self.path.display(), "writing failure artifact");
        fs::write(&self.path, &payload).map_err(|source| RunbookError::ArtifactWrite {
            path: self.path.clone(),
            source,
        })?;

        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(parsed) => info!(artifact = %parsed, "failure artifact verified"),
                Err(parse_error) => warn!(%parse_error, "failure artifact is not valid JSON"),
            },
            Err(read_error) => warn!(%read_error, "failure artifact could not be read back"),
        }

        Ok(())
    }
}
