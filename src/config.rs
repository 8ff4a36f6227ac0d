//! Configuration loaded from `runbook.toml`.
//!
//! [`RunbookConfig`] holds every tunable. Values absent from the file
//! use sensible defaults. The `RUNBOOK_REGISTRY_TOKEN` environment
//! variable takes precedence over the file for the registry token.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::RunbookError;

/// Environment variables forming the container contract: the
/// orchestrator injects the workload's input, output and parameter
/// mapping through these.
pub const INPUT_VAR: &str = "RUNBOOK_INPUT";
pub const OUTPUT_VAR: &str = "RUNBOOK_OUTPUT";
pub const PARAMS_VAR: &str = "RUNBOOK_PARAMS";

const REGISTRY_TOKEN_VAR: &str = "RUNBOOK_REGISTRY_TOKEN";

/// Top-level configuration loaded from `runbook.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunbookConfig {
    /// Base URL of the job registry's query API.
    #[serde(default = "default_registry_url")]
    pub registry_url: String,

    /// Bearer token passed through to the registry. Never validated
    /// here, always redacted before display.
    #[serde(default)]
    pub registry_token: String,

    /// Command invoked to execute the workload.
    #[serde(default = "default_engine_command")]
    pub engine_command: String,

    /// Where the failure artifact is written.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// Maximum frames kept per stack before truncation.
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    /// Maximum rendered length of a captured local value.
    #[serde(default = "default_locals_max_string")]
    pub locals_max_string: usize,

    /// Whether local variables are captured into failure traces.
    #[serde(default = "default_show_locals")]
    pub show_locals: bool,

    /// Lookback window for the poll list-scan mode, in minutes.
    #[serde(default = "default_scan_window_minutes")]
    pub scan_window_minutes: i64,

    /// Workflow name → input location. Built once at startup and
    /// immutable for the process lifetime.
    #[serde(default)]
    pub workflows: BTreeMap<String, String>,
}

// Default registry endpoint: a local development registry.
fn default_registry_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

// Default workload engine command.
fn default_engine_command() -> String {
    "notebook-exec".to_string()
}

// Under the orchestrator the params contract variable is always set and
// the artifact goes to the fixed container path; locally it lands in
// the working directory.
fn default_artifact_path() -> PathBuf {
    if std::env::var(PARAMS_VAR).is_ok() {
        PathBuf::from(crate::artifact::CONTAINER_ARTIFACT_PATH)
    } else {
        PathBuf::from("error.json")
    }
}

fn default_max_frames() -> usize {
    crate::trace::MAX_FRAMES
}

fn default_locals_max_string() -> usize {
    crate::trace::LOCALS_MAX_STRING
}

fn default_show_locals() -> bool {
    true
}

fn default_scan_window_minutes() -> i64 {
    crate::status::SCAN_WINDOW_MINUTES
}

impl Default for RunbookConfig {
    fn default() -> Self {
        Self {
            registry_url: default_registry_url(),
            registry_token: String::new(),
            engine_command: default_engine_command(),
            artifact_path: default_artifact_path(),
            max_frames: default_max_frames(),
            locals_max_string: default_locals_max_string(),
            show_locals: default_show_locals(),
            scan_window_minutes: default_scan_window_minutes(),
            workflows: BTreeMap::new(),
        }
    }
}

impl RunbookConfig {
    /// Load configuration from the given path, falling back to
    /// defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, RunbookError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<RunbookConfig>(&contents)?
        } else {
            Self::default()
        };

        // Environment takes precedence over the file for the token.
        if let Ok(token) = std::env::var(REGISTRY_TOKEN_VAR)
            && !token.is_empty()
        {
            config.registry_token = token;
        }

        Ok(config)
    }

    /// Reject values the trace extractor cannot honor.
    pub fn validate(&self) -> Result<(), RunbookError> {
        if self.max_frames < 2 {
            return Err(RunbookError::Config(format!(
                "max_frames must be >= 2: {}",
                self.max_frames
            )));
        }
        Ok(())
    }

    /// Resolve a workflow name against the immutable workflow table.
    pub fn workflow_input(&self, name: &str) -> Result<&str, RunbookError> {
        self.workflows
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| RunbookError::WorkflowNotFound(name.to_string()))
    }
}
