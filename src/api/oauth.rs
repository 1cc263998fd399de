//! GitHub OAuth callback: trade the code for a token and store it.

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::ClientIdentity;
use crate::db::GithubToken;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub code: Option<String>,
    #[serde(rename = "tokenName")]
    pub token_name: Option<String>,
    /// Add-on configuration page to return the browser to
    #[serde(rename = "configPageUrl")]
    pub config_page_url: Option<String>,
}

/// Exchange an authorization code and register the resulting token under
/// the caller's identity.
///
/// GET /api/oauth/authorize
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    identity: ClientIdentity,
    Query(params): Query<AuthorizeParams>,
) -> Result<Redirect, ApiError> {
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("You must specify the Github code."))?;
    let token_name = params
        .token_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("You must specify a token name."))?;
    let config_page_url = params
        .config_page_url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("You must specify the configuration page URL."))?;

    let access_token = state.oauth.exchange_code(&code).await.map_err(|e| {
        tracing::warn!(client_key = %identity, error = %e, "GitHub token exchange failed");
        ApiError::from(e)
    })?;

    let id = GithubToken::create(
        &state.db,
        state.cipher.as_ref(),
        identity.as_str(),
        &token_name,
        &access_token,
    )
    .await?;

    tracing::info!(
        client_key = %identity,
        token_id = %id,
        token_name = %token_name,
        "Stored GitHub token"
    );

    Ok(Redirect::to(&config_page_url))
}
