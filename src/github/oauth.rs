//! Exchanging an OAuth authorization code for a GitHub access token.

use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use crate::config::GithubConfig;

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("failed to reach GitHub: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GitHub returned {0} for the token exchange")]
    Upstream(StatusCode),

    #[error("GitHub rejected the authorization code: {0}")]
    Rejected(String),
}

/// GitHub answers 200 for a bad code too, with `error` set instead of a token.
#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    pub fn new(config: &GithubConfig) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            token_url: format!(
                "{}/login/oauth/access_token",
                config.oauth_base_url.trim_end_matches('/')
            ),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let response = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(OAuthError::Upstream(response.status()));
        }

        let body: TokenExchangeResponse = response.json().await?;
        match body.access_token.filter(|t| !t.is_empty()) {
            Some(token) => Ok(token),
            None => Err(OAuthError::Rejected(
                body.error_description
                    .or(body.error)
                    .unwrap_or_else(|| "no access token in response".to_string()),
            )),
        }
    }
}
