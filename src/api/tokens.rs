use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::ClientIdentity;
use crate::db::{GithubToken, StoreError, TokenId, TokenSummary};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DeleteTokenParams {
    pub id: Option<String>,
}

/// Tokens registered by the calling installation
///
/// GET /api/tokens
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    identity: ClientIdentity,
) -> Result<Json<Vec<TokenSummary>>, ApiError> {
    let tokens = GithubToken::list_for_client(&state.db, identity.as_str()).await?;
    Ok(Json(tokens))
}

/// Delete one of the caller's tokens
///
/// POST /api/tokens/delete
pub async fn delete_token(
    State(state): State<Arc<AppState>>,
    identity: ClientIdentity,
    Query(params): Query<DeleteTokenParams>,
) -> Result<StatusCode, ApiError> {
    let id = params
        .id
        .as_deref()
        .and_then(TokenId::decode)
        .ok_or_else(|| ApiError::not_found("Requested token was not found."))?;

    GithubToken::delete(&state.db, &id, identity.as_str())
        .await
        .map_err(|e| {
            tracing::warn!(client_key = %identity, error = %e, "Token deletion refused");
            match e {
                StoreError::NotFound => ApiError::not_found("Requested token was not found."),
                other => other.into(),
            }
        })?;

    tracing::info!(client_key = %identity, token_id = %id, "Deleted GitHub token");

    Ok(StatusCode::NO_CONTENT)
}
