use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunbookError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Workflow {0} not found or is not valid.")]
    WorkflowNotFound(String),

    #[error("Workload failed: {0}")]
    Workload(String),

    #[error("Failed to write failure artifact to {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RunbookError {
    /// Stable kind name used as the `error` field of failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RunbookError::Config(_) => "ConfigurationError",
            RunbookError::WorkflowNotFound(_) => "WorkflowNotFoundError",
            RunbookError::Workload(_) => "WorkloadError",
            RunbookError::ArtifactWrite { .. } => "ArtifactWriteError",
            RunbookError::Http(_) => "HttpError",
            RunbookError::Io(_) => "IoError",
            RunbookError::Json(_) => "JsonError",
            RunbookError::Toml(_) => "TomlError",
        }
    }
}
