//! Workload-engine seam.
//!
//! The engine executes the resolved workload and either succeeds or
//! reports a failure: structured (an exception chain it can describe)
//! or opaque text (whatever its stderr said). The runner never inspects
//! workload semantics beyond this contract.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::{debug, info};

use crate::trace::CaughtException;

/// A failure reported by the workload engine.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadFailure {
    /// The engine described the failure as an exception chain.
    Structured(CaughtException),
    /// Raw failure text, typically a formatted traceback.
    Text(String),
}

/// Executes a resolved workload against an input and output location.
pub trait WorkloadEngine {
    async fn execute(
        &self,
        input: &Path,
        output: &Path,
        params: &Map<String, Value>,
    ) -> Result<(), WorkloadFailure>;
}

/// Runs the configured engine command as a subprocess.
///
/// Contract: the command receives the input and output paths as
/// arguments and the parameter mapping as JSON in `RUNBOOK_PARAMS`, and
/// runs in the input's directory. On failure it may leave a structured
/// exception chain at `<output>.failure.json`; otherwise its stderr is
/// taken as the failure text.
pub struct CommandEngine {
    program: String,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn failure_sidecar(output: &Path) -> PathBuf {
        let mut sidecar = output.as_os_str().to_owned();
        sidecar.push(".failure.json");
        PathBuf::from(sidecar)
    }
}

impl WorkloadEngine for CommandEngine {
    async fn execute(
        &self,
        input: &Path,
        output: &Path,
        params: &Map<String, Value>,
    ) -> Result<(), WorkloadFailure> {
        let params_json = Value::Object(params.clone()).to_string();
        let workdir = input.parent().filter(|dir| !dir.as_os_str().is_empty());

        let mut command = Command::new(&self.program);
        command
            .arg(input)
            .arg(output)
            .env("RUNBOOK_PARAMS", params_json);
        if let Some(dir) = workdir {
            command.current_dir(dir);
        }

        info!(
            program = %self.program,
            input = %input.display(),
            output = %output.display(),
            "executing workload"
        );
        let finished = match command.output().await {
            Ok(finished) => finished,
            Err(spawn_error) => {
                return Err(WorkloadFailure::Text(format!(
                    "failed to start workload engine {}: {spawn_error}",
                    self.program
                )));
            }
        };

        if finished.status.success() {
            debug!("workload engine exited cleanly");
            return Ok(());
        }

        let sidecar = Self::failure_sidecar(output);
        if let Ok(raw) = std::fs::read_to_string(&sidecar)
            && let Ok(caught) = serde_json::from_str::<CaughtException>(&raw)
        {
            return Err(WorkloadFailure::Structured(caught));
        }

        Err(WorkloadFailure::Text(
            String::from_utf8_lossy(&finished.stderr).into_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params() -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("dataset_id".to_string(), json!("the-office-series"));
        params
    }

    #[tokio::test]
    async fn clean_exit_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CommandEngine::new("true");
        let result = engine
            .execute(
                &dir.path().join("input.ipynb"),
                &dir.path().join("output.ipynb"),
                &params(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn nonzero_exit_without_sidecar_yields_text_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CommandEngine::new("false");
        let failure = engine
            .execute(
                &dir.path().join("input.ipynb"),
                &dir.path().join("output.ipynb"),
                &params(),
            )
            .await
            .unwrap_err();
        assert!(matches!(failure, WorkloadFailure::Text(_)));
    }

    #[tokio::test]
    async fn nonzero_exit_with_sidecar_yields_structured_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output.ipynb");
        std::fs::write(
            CommandEngine::failure_sidecar(&output),
            r#"{"exception_type": "ValueError", "message": "bad input"}"#,
        )
        .unwrap();

        let engine = CommandEngine::new("false");
        let failure = engine
            .execute(&dir.path().join("input.ipynb"), &output, &params())
            .await
            .unwrap_err();
        match failure {
            WorkloadFailure::Structured(caught) => {
                assert_eq!(caught.exception_type, "ValueError");
            }
            other => panic!("expected structured failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unlaunchable_engine_reports_text_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CommandEngine::new("definitely-not-an-engine-binary");
        let failure = engine
            .execute(
                &dir.path().join("input.ipynb"),
                &dir.path().join("output.ipynb"),
                &params(),
            )
            .await
            .unwrap_err();
        match failure {
            WorkloadFailure::Text(text) => assert!(text.contains("failed to start")),
            other => panic!("expected text failure, got {other:?}"),
        }
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        let sidecar = CommandEngine::failure_sidecar(Path::new("/out/result.ipynb"));
        assert_eq!(sidecar, Path::new("/out/result.ipynb.failure.json"));
    }
}
