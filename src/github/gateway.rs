//! Outbound calls to GitHub's REST and raw-content hosts.
//!
//! The gateway performs exactly one request per call and reports what came
//! back. It does not interpret status codes; callers pass non-200 statuses
//! through to their own response.

use bytes::Bytes;
use reqwest::{header, StatusCode};
use std::time::Duration;

use super::source::RepoPath;
use crate::config::GithubConfig;

const GITHUB_V3_JSON: &str = "application/vnd.github.v3.json";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to reach GitHub: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Status and body of an upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }
}

#[derive(Debug, Clone)]
pub struct GitHubGateway {
    client: reqwest::Client,
    api_base_url: String,
    raw_base_url: String,
}

impl GitHubGateway {
    pub fn new(config: &GithubConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            raw_base_url: config.raw_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn raw_content_url(&self, file: &RepoPath) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_base_url, file.user, file.repo, file.branch, file.path
        )
    }

    pub fn issues_url(&self, user: &str, repo: &str, query: &str) -> String {
        format!("{}/repos/{}/{}/issues?{}", self.api_base_url, user, repo, query)
    }

    pub fn pulls_url(&self, user: &str, repo: &str, query: &str) -> String {
        format!("{}/repos/{}/{}/pulls?{}", self.api_base_url, user, repo, query)
    }

    pub fn contents_url(&self, file: &RepoPath) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            self.api_base_url, file.user, file.repo, file.path, file.branch
        )
    }

    /// GET `url`, attaching `credential` as `Authorization: token ...` when given.
    pub async fn fetch(
        &self,
        url: &str,
        credential: Option<&str>,
        accept: Option<&str>,
    ) -> Result<UpstreamResponse, GatewayError> {
        let mut request = self.client.get(url);
        if let Some(token) = credential {
            request = request.header(header::AUTHORIZATION, format!("token {}", token));
        }
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        tracing::debug!(status = %status, bytes = body.len(), "GitHub responded");

        Ok(UpstreamResponse { status, body })
    }

    /// Raw file bytes. Public repositories need no credential.
    pub async fn raw_content(
        &self,
        file: &RepoPath,
        credential: Option<&str>,
    ) -> Result<UpstreamResponse, GatewayError> {
        self.fetch(&self.raw_content_url(file), credential, None).await
    }

    pub async fn issues(
        &self,
        user: &str,
        repo: &str,
        query: &str,
        credential: &str,
    ) -> Result<UpstreamResponse, GatewayError> {
        self.fetch(&self.issues_url(user, repo, query), Some(credential), None)
            .await
    }

    pub async fn pulls(
        &self,
        user: &str,
        repo: &str,
        query: &str,
        credential: &str,
    ) -> Result<UpstreamResponse, GatewayError> {
        self.fetch(&self.pulls_url(user, repo, query), Some(credential), None)
            .await
    }

    /// File metadata with base64 `content` from the contents API.
    pub async fn contents(
        &self,
        file: &RepoPath,
        credential: &str,
    ) -> Result<UpstreamResponse, GatewayError> {
        self.fetch(&self.contents_url(file), Some(credential), Some(GITHUB_V3_JSON))
            .await
    }
}
