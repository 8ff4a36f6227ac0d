//! Object-fetch seam for inputs and parameter documents in remote
//! storage.
//!
//! The runner only needs "bring this URI to a local path". Transfers to
//! other object stores are deployment concerns: those environments
//! inject their own [`ObjectFetcher`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::error::RunbookError;

/// True when a location is a scheme-qualified URI rather than a local
/// path.
pub fn is_remote(location: &str) -> bool {
    location.contains("://")
}

/// Unique staging path for a fetched object, under the system temp
/// dir. Unique per call so concurrent jobs on a shared host never
/// collide.
pub fn staging_path(location: &str) -> PathBuf {
    let file_name = location.rsplit('/').next().unwrap_or(location);
    std::env::temp_dir().join(format!("{}-{}", Uuid::new_v4(), file_name))
}

/// Downloads remote objects to local staging paths.
pub trait ObjectFetcher {
    async fn fetch(&self, location: &str, dest: &Path) -> Result<(), RunbookError>;
}

/// Fetches objects over HTTP(S).
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectFetcher for HttpFetcher {
    async fn fetch(&self, location: &str, dest: &Path) -> Result<(), RunbookError> {
        info!(%location, dest = %dest.display(), "downloading object");
        let response = self
            .client
            .get(location)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        info!(%location, "download complete");
        Ok(())
    }
}
