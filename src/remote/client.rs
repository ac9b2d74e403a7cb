// ABOUTME: HTTP client for the backend-generator REST API
// ABOUTME: Handles job submission, status snapshots, preview and download lookups

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use super::models::{
    DownloadInfo, GenerationRequest, GenerationStatus, JobId, ProjectPreview, SubmitResponse,
};
use super::polling::StatusSource;
use crate::auth::AuthContext;
use crate::config::ClientConfig;
use crate::error::ClientError;

const API_PREFIX: [&str; 2] = ["api", "backend-generator"];

#[derive(Clone)]
pub struct GeneratorClient {
    client: Client,
    api_base_url: String,
    auth: AuthContext,
}

impl GeneratorClient {
    pub fn new(config: &ClientConfig, auth: AuthContext) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, config.base_url(), auth))
    }

    /// Reuses an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(
        client: Client,
        api_base_url: impl Into<String>,
        auth: AuthContext,
    ) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_base_url,
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Appends `segments` under the API prefix, percent-encoding each one so
    /// a job id can never change the route or add a query string.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|err| ClientError::Transport(format!("invalid API base URL: {}", err)))?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Transport(format!("invalid API base URL: {}", self.api_base_url))
            })?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.bearer() {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }

    /// Starts a generation job and returns its id. Not retried.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<JobId, ClientError> {
        let url = self.url(&["generate"])?;
        tracing::debug!(
            project = %request.project_name,
            framework = %request.framework,
            database = %request.database,
            "Submitting generation job"
        );

        let response = self
            .authorize(self.client.post(url).json(request))
            .send()
            .await?;
        let submitted: SubmitResponse = Self::parse_response(response).await?;

        tracing::info!(job_id = %submitted.id, "Generation job submitted");
        Ok(submitted.id)
    }

    pub async fn get_status(&self, job_id: &JobId) -> Result<GenerationStatus, ClientError> {
        let url = self.url(&["status", job_id.as_str()])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::parse_response(response).await
    }

    pub async fn fetch_preview(&self, job_id: &JobId) -> Result<ProjectPreview, ClientError> {
        let url = self.url(&["preview", job_id.as_str()])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::parse_response(response).await
    }

    /// Returns a time-limited download link for a completed job.
    pub async fn fetch_download(&self, job_id: &JobId) -> Result<DownloadInfo, ClientError> {
        let url = self.url(&["download", job_id.as_str()])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), %body, "Request rejected");
            return Err(ClientError::from_response(status.as_u16(), &body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| ClientError::Decode(err.to_string()))
    }
}

#[async_trait]
impl StatusSource for GeneratorClient {
    type Status = GenerationStatus;

    async fn fetch_status(&self, job_id: &JobId) -> Result<GenerationStatus, ClientError> {
        self.get_status(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GeneratorClient::new(&ClientConfig::default(), AuthContext::anonymous());
        assert!(client.is_ok());
    }

    #[test]
    fn test_urls_strip_trailing_slash() {
        let client = GeneratorClient::with_client(
            Client::new(),
            "https://api.example.com/",
            AuthContext::anonymous(),
        );
        assert_eq!(client.base_url(), "https://api.example.com");
        assert_eq!(
            client.url(&["status", "abc"]).unwrap().as_str(),
            "https://api.example.com/api/backend-generator/status/abc"
        );
    }

    #[test]
    fn test_job_id_is_a_single_path_segment() {
        let client = GeneratorClient::with_client(
            Client::new(),
            "https://api.example.com",
            AuthContext::anonymous(),
        );

        let url = client.url(&["status", "a/b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/backend-generator/status/a%2Fb"
        );

        let url = client.url(&["preview", "x?y#z"]).unwrap();
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/api/backend-generator/preview/x%3Fy%23z");
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let client = GeneratorClient::with_client(
            Client::new(),
            "https://gateway.example.com/orchesity/",
            AuthContext::anonymous(),
        );
        assert_eq!(
            client.url(&["download", "job-1"]).unwrap().as_str(),
            "https://gateway.example.com/orchesity/api/backend-generator/download/job-1"
        );
    }

    #[test]
    fn test_unparseable_base_url_is_an_error() {
        let client =
            GeneratorClient::with_client(Client::new(), "not a url", AuthContext::anonymous());
        assert!(matches!(client.url(&["generate"]), Err(ClientError::Transport(_))));
    }
}
