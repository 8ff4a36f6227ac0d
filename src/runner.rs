//! Drives a workload run end to end: resolve the input, resolve the
//! parameter mapping, execute the engine, and on failure persist a
//! structured artifact before the process exits non-zero.

use std::path::PathBuf;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::artifact::{FailureArtifactWriter, FailureReport};
use crate::engine::{WorkloadEngine, WorkloadFailure};
use crate::error::RunbookError;
use crate::redact;
use crate::state_machine::{FailureClass, RunContext, RunOutcome, StateMachine};
use crate::storage::{self, ObjectFetcher};
use crate::trace::TraceExtractor;

/// Parameter-mapping key naming a remote parameter document. When
/// present, the fetched document replaces the mapping wholesale.
pub const PARAMS_URI_FIELD: &str = "paramsUri";

/// One run's resolved inputs.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Local path or remote object URI of the workload.
    pub input: String,
    /// Where the workload must leave its output artifact.
    pub output: PathBuf,
    /// Parameter mapping handed to the engine.
    pub params: Map<String, Value>,
}

/// Executes runs and reports their failures.
pub struct JobRunner<E, F> {
    engine: E,
    fetcher: F,
    extractor: TraceExtractor,
    writer: FailureArtifactWriter,
}

impl<E: WorkloadEngine, F: ObjectFetcher> JobRunner<E, F> {
    pub fn new(
        engine: E,
        fetcher: F,
        extractor: TraceExtractor,
        writer: FailureArtifactWriter,
    ) -> Self {
        Self {
            engine,
            fetcher,
            extractor,
            writer,
        }
    }

    /// Run the workload. On failure the artifact is written before the
    /// error is returned; the caller turns the error into a non-zero
    /// process exit, which is the only failure signal the orchestrator
    /// reads.
    pub async fn run(
        &self,
        ctx: &mut RunContext,
        request: RunRequest,
    ) -> Result<PathBuf, RunbookError> {
        info!(run_id = %ctx.id, workflow = ?ctx.workflow, input = %request.input, "starting run");

        StateMachine::next(ctx, RunOutcome::Success); // Init → ResolvingInput
        let input = match self.resolve_input(&request.input).await {
            Ok(path) => path,
            Err(resolve_error) => return self.fail_with_error(ctx, resolve_error),
        };

        StateMachine::next(ctx, RunOutcome::Success); // → ResolvingParams
        let params = match self.resolve_params(request.params).await {
            Ok(params) => params,
            Err(resolve_error) => return self.fail_with_error(ctx, resolve_error),
        };
        let redacted_params = redact::redacted(&Value::Object(params.clone()));
        info!(
            params = %serde_json::to_string_pretty(&redacted_params).unwrap_or_default(),
            "workload parameters"
        );

        StateMachine::next(ctx, RunOutcome::Success); // → Executing
        match self.engine.execute(&input, &request.output, &params).await {
            Ok(()) => {
                StateMachine::next(ctx, RunOutcome::Success); // → Done
                if request.output.exists() {
                    info!(output = %request.output.display(), "output was written");
                } else {
                    warn!("no output artifact was produced");
                }
                let duration = Utc::now() - ctx.started_at;
                info!(
                    run_id = %ctx.id,
                    duration_ms = duration.num_milliseconds(),
                    "run succeeded"
                );
                Ok(request.output)
            }
            Err(failure) => self.fail_with_workload(ctx, failure),
        }
    }

    async fn resolve_input(&self, location: &str) -> Result<PathBuf, RunbookError> {
        if !storage::is_remote(location) {
            return Ok(PathBuf::from(location));
        }
        let staged = storage::staging_path(location);
        info!(%location, "downloading input");
        self.fetcher.fetch(location, &staged).await?;
        Ok(staged)
    }

    /// When the mapping names a remote parameter document, fetch it and
    /// replace the mapping with the document's contents.
    async fn resolve_params(
        &self,
        params: Map<String, Value>,
    ) -> Result<Map<String, Value>, RunbookError> {
        let Some(location) = params.get(PARAMS_URI_FIELD).and_then(Value::as_str) else {
            return Ok(params);
        };
        let location = location.to_string();

        let staged = storage::staging_path(&location);
        info!(%location, "downloading parameter document");
        self.fetcher.fetch(&location, &staged).await?;

        let raw = std::fs::read_to_string(&staged)?;
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(fetched) => Ok(fetched),
            _ => Err(RunbookError::Config(
                "parameter document must be a JSON object".to_string(),
            )),
        }
    }

    fn fail_with_error(
        &self,
        ctx: &mut RunContext,
        error: RunbookError,
    ) -> Result<PathBuf, RunbookError> {
        error!(%error, "run failed before execution");
        self.write_artifact(&FailureReport::from_error(&error));
        StateMachine::next(
            ctx,
            RunOutcome::Failure(FailureClass::Infrastructure(error.to_string())),
        );
        Err(error)
    }

    fn fail_with_workload(
        &self,
        ctx: &mut RunContext,
        failure: WorkloadFailure,
    ) -> Result<PathBuf, RunbookError> {
        let report = match &failure {
            WorkloadFailure::Structured(caught) => {
                let trace = self.extractor.extract(caught);
                FailureReport::from_trace(&trace)
            }
            WorkloadFailure::Text(raw) => FailureReport::from_text(raw),
        };
        error!(kind = %report.error_kind, "workload failed");
        self.write_artifact(&report);

        let summary = report.error_kind.clone();
        StateMachine::next(
            ctx,
            RunOutcome::Failure(FailureClass::Workload(summary.clone())),
        );
        Err(RunbookError::Workload(summary))
    }

    /// A reporting failure is logged distinctly and must never replace
    /// the original failure's signal.
    fn write_artifact(&self, report: &FailureReport) {
        if let Err(write_error) = self.writer.write(report) {
            error!(%write_error, "could not write the failure artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::state_machine::{RunStatus, State};
    use crate::trace::CaughtException;

    struct FakeEngine {
        failure: Option<WorkloadFailure>,
        seen_params: Mutex<Option<Map<String, Value>>>,
    }

    impl FakeEngine {
        fn succeeding() -> Self {
            Self {
                failure: None,
                seen_params: Mutex::new(None),
            }
        }

        fn failing(failure: WorkloadFailure) -> Self {
            Self {
                failure: Some(failure),
                seen_params: Mutex::new(None),
            }
        }
    }

    impl WorkloadEngine for FakeEngine {
        async fn execute(
            &self,
            _input: &Path,
            _output: &Path,
            params: &Map<String, Value>,
        ) -> Result<(), WorkloadFailure> {
            *self.seen_params.lock().unwrap() = Some(params.clone());
            match &self.failure {
                None => Ok(()),
                Some(failure) => Err(failure.clone()),
            }
        }
    }

    struct FakeFetcher {
        document: Option<String>,
    }

    impl ObjectFetcher for FakeFetcher {
        async fn fetch(&self, location: &str, dest: &Path) -> Result<(), RunbookError> {
            match &self.document {
                Some(content) => {
                    std::fs::write(dest, content)?;
                    Ok(())
                }
                None => Err(RunbookError::Config(format!("no fetcher for {location}"))),
            }
        }
    }

    fn runner_in(
        dir: &Path,
        engine: FakeEngine,
        fetcher: FakeFetcher,
    ) -> JobRunner<FakeEngine, FakeFetcher> {
        JobRunner::new(
            engine,
            fetcher,
            TraceExtractor::default(),
            FailureArtifactWriter::new(dir.join("message")),
        )
    }

    fn request(dir: &Path, params: Map<String, Value>) -> RunRequest {
        RunRequest {
            input: dir.join("input.ipynb").to_string_lossy().into_owned(),
            output: dir.join("output.ipynb"),
            params,
        }
    }

    #[tokio::test]
    async fn successful_run_walks_all_states() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("output.ipynb"), "{}").unwrap();

        let runner = runner_in(
            dir.path(),
            FakeEngine::succeeding(),
            FakeFetcher { document: None },
        );
        let mut ctx = RunContext::new(None);
        let output = runner
            .run(&mut ctx, request(dir.path(), Map::new()))
            .await
            .unwrap();

        assert!(output.ends_with("output.ipynb"));
        assert_eq!(ctx.status, RunStatus::Succeeded);
        assert_eq!(
            ctx.state_history,
            vec![
                State::Init,
                State::ResolvingInput,
                State::ResolvingParams,
                State::Executing
            ]
        );
    }

    #[tokio::test]
    async fn missing_output_is_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_in(
            dir.path(),
            FakeEngine::succeeding(),
            FakeFetcher { document: None },
        );
        let mut ctx = RunContext::new(None);
        let result = runner.run(&mut ctx, request(dir.path(), Map::new())).await;
        assert!(result.is_ok());
        assert_eq!(ctx.status, RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn text_failure_writes_parsed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "Traceback (most recent call last):\nValueError: {\"error\": \"ValueError\", \"message\": \"bad input\"}\n\n";
        let runner = runner_in(
            dir.path(),
            FakeEngine::failing(WorkloadFailure::Text(raw.to_string())),
            FakeFetcher { document: None },
        );

        let mut ctx = RunContext::new(None);
        let err = runner
            .run(&mut ctx, request(dir.path(), Map::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, RunbookError::Workload(_)));
        assert_eq!(ctx.status, RunStatus::Failed);

        let artifact: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("message")).unwrap())
                .unwrap();
        assert_eq!(artifact["error"], "ValueError");
        assert_eq!(artifact["message"]["message"], "bad input");
    }

    #[tokio::test]
    async fn structured_failure_writes_trace_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let caught = CaughtException {
            exception_type: "KeyError".to_string(),
            message: "'vector_fields'".to_string(),
            ..Default::default()
        };
        let runner = runner_in(
            dir.path(),
            FakeEngine::failing(WorkloadFailure::Structured(caught)),
            FakeFetcher { document: None },
        );

        let mut ctx = RunContext::new(None);
        runner
            .run(&mut ctx, request(dir.path(), Map::new()))
            .await
            .unwrap_err();

        let artifact: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("message")).unwrap())
                .unwrap();
        assert_eq!(artifact["error"], "KeyError");
        assert_eq!(artifact["message"][0]["exception_value"], "'vector_fields'");
    }

    #[tokio::test]
    async fn remote_params_document_replaces_the_mapping() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("output.ipynb"), "{}").unwrap();

        let engine = FakeEngine::succeeding();
        let fetcher = FakeFetcher {
            document: Some(r#"{"dataset_id": "fetched", "n_clusters": 10}"#.to_string()),
        };
        let runner = runner_in(dir.path(), engine, fetcher);

        let mut params = Map::new();
        params.insert(
            PARAMS_URI_FIELD.to_string(),
            json!("https://objects.example.com/params.json"),
        );
        params.insert("ignored".to_string(), json!("stale"));

        let mut ctx = RunContext::new(None);
        runner
            .run(&mut ctx, request(dir.path(), params))
            .await
            .unwrap();

        let seen = runner.engine.seen_params.lock().unwrap().clone().unwrap();
        assert_eq!(seen["dataset_id"], "fetched");
        assert_eq!(seen["n_clusters"], 10);
        assert!(!seen.contains_key("ignored"));
    }

    #[tokio::test]
    async fn fetch_failure_writes_artifact_and_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_in(
            dir.path(),
            FakeEngine::succeeding(),
            FakeFetcher { document: None },
        );

        let mut request = request(dir.path(), Map::new());
        request.input = "https://objects.example.com/dev/cluster.ipynb".to_string();

        let mut ctx = RunContext::new(None);
        let err = runner.run(&mut ctx, request).await.unwrap_err();
        assert!(matches!(err, RunbookError::Config(_)));
        assert_eq!(ctx.status, RunStatus::Failed);

        let artifact: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("message")).unwrap())
                .unwrap();
        assert_eq!(artifact["error"], "ConfigurationError");
    }

    #[tokio::test]
    async fn unwritable_artifact_path_still_surfaces_the_workload_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::failing(WorkloadFailure::Text("boom".to_string()));
        let runner = JobRunner::new(
            engine,
            FakeFetcher { document: None },
            TraceExtractor::default(),
            FailureArtifactWriter::new("/definitely/not/a/path/message"),
        );

        let mut ctx = RunContext::new(None);
        let err = runner
            .run(&mut ctx, request(dir.path(), Map::new()))
            .await
            .unwrap_err();

        // The original workload failure wins; the reporting failure is
        // only logged.
        assert!(matches!(err, RunbookError::Workload(_)));
        assert_eq!(ctx.status, RunStatus::Failed);
    }
}
