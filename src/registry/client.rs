use std::time::Duration;

use reqwest::Client;

use super::error::RegistryError;
use super::types::{JobRecord, ListJobsQuery, ListJobsResponse};

/// Query seam over the registry. The polling path is written against
/// this trait so tests can substitute canned registries.
pub trait JobRegistry {
    async fn describe_job(&self, name: &str) -> Result<JobRecord, RegistryError>;
    async fn list_jobs(&self, query: &ListJobsQuery) -> Result<Vec<JobRecord>, RegistryError>;
}

/// HTTP client for the registry's job query API.
pub struct RegistryClient {
    token: String,
    client: Client,
    base_url: String,
}

impl RegistryClient {
    /// Create a client for the given registry endpoint. The bearer
    /// token is passed through as-is; this crate never validates it.
    pub fn new(base_url: String, token: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");
        Self {
            token,
            client,
            base_url,
        }
    }
}

impl JobRegistry for RegistryClient {
    async fn describe_job(&self, name: &str) -> Result<JobRecord, RegistryError> {
        let url = format!("{}/jobs/{name}", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RegistryError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let record = response.json::<JobRecord>().await?;
        Ok(record)
    }

    async fn list_jobs(&self, query: &ListJobsQuery) -> Result<Vec<JobRecord>, RegistryError> {
        let url = format!("{}/jobs", self.base_url);
        let mut request = self.client.get(&url).bearer_auth(&self.token);
        if let Some(name_contains) = &query.name_contains {
            request = request.query(&[("name_contains", name_contains.as_str())]);
        }
        if let Some(created_after) = &query.created_after {
            request = request.query(&[("created_after", created_after.to_rfc3339())]);
        }
        if let Some(max_results) = query.max_results {
            request = request.query(&[("max_results", max_results.to_string())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RegistryError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<ListJobsResponse>().await?;
        Ok(body.jobs)
    }
}
