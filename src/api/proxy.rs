//! Proxy endpoints: markdown (raw and rendered), issue and pull request
//! listings, and file contents.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::MaybeIdentity;
use super::error::ApiError;
use crate::auth::ClientIdentity;
use crate::db::GithubToken;
use crate::github::shape::{self, FileContent, ListingKind, ListingSummary};
use crate::github::{RepoPath, UpstreamResponse};
use crate::markdown::render_markdown;
use crate::AppState;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

#[derive(Debug, Default, Deserialize)]
pub struct MarkdownParams {
    pub url: Option<String>,
    pub user: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub path: Option<String>,
    /// Opaque reference to a stored GitHub token
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub user: Option<String>,
    pub repo: Option<String>,
    #[serde(default)]
    pub query: String,
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileParams {
    pub user: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub path: Option<String>,
    pub id: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Resolve `id` to a GitHub access token owned by `identity`.
async fn owned_credential(
    state: &AppState,
    identity: &ClientIdentity,
    id: &str,
) -> Result<String, ApiError> {
    let token = GithubToken::resolve_encoded(&state.db, id).await?;

    if let Err(e) = token.authorize(identity.as_str()) {
        tracing::warn!(
            client_key = %identity,
            token_owner = %token.client_key,
            "Token client key does not match account client key"
        );
        return Err(e.into());
    }

    Ok(token.access_token(state.cipher.as_ref())?)
}

/// The credential for a markdown fetch, if one was referenced. Referencing
/// one requires a verified caller.
async fn optional_credential(
    state: &AppState,
    identity: Option<&ClientIdentity>,
    id: Option<&str>,
) -> Result<Option<String>, ApiError> {
    match id {
        None => Ok(None),
        Some(id) => {
            let identity = identity.ok_or_else(|| {
                ApiError::unauthenticated("A signed token is required to use a stored Github token.")
            })?;
            owned_credential(state, identity, id).await.map(Some)
        }
    }
}

fn require_ok(upstream: UpstreamResponse) -> Result<UpstreamResponse, ApiError> {
    if upstream.is_ok() {
        Ok(upstream)
    } else {
        tracing::info!(status = %upstream.status, "Passing through GitHub status");
        Err(ApiError::upstream(upstream.status))
    }
}

async fn fetch_markdown(
    state: &AppState,
    identity: Option<&ClientIdentity>,
    params: &MarkdownParams,
) -> Result<(String, UpstreamResponse), ApiError> {
    let file = RepoPath::resolve(
        non_empty(&params.user),
        non_empty(&params.repo),
        non_empty(&params.branch),
        non_empty(&params.path),
        non_empty(&params.url),
    )?;
    let credential = optional_credential(state, identity, non_empty(&params.id)).await?;

    let source_url = state.gateway.raw_content_url(&file);
    let upstream = state.gateway.raw_content(&file, credential.as_deref()).await?;
    Ok((source_url, require_ok(upstream)?))
}

/// Raw markdown bytes.
///
/// GET /api/markdown
pub async fn get_markdown(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(identity): MaybeIdentity,
    Query(params): Query<MarkdownParams>,
) -> Result<Response, ApiError> {
    let (_, upstream) = fetch_markdown(&state, identity.as_ref(), &params).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_PLAIN)],
        upstream.body,
    )
        .into_response())
}

/// Markdown rendered to sanitized HTML.
///
/// GET /api/markdown/html
pub async fn get_markdown_html(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(identity): MaybeIdentity,
    Query(params): Query<MarkdownParams>,
) -> Result<Response, ApiError> {
    let (source_url, upstream) = fetch_markdown(&state, identity.as_ref(), &params).await?;
    let html = render_markdown(&upstream.body, Some(&source_url));

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, TEXT_HTML)], html).into_response())
}

async fn listing(
    state: &AppState,
    identity: &ClientIdentity,
    params: &ListingParams,
    kind: ListingKind,
) -> Result<ListingSummary, ApiError> {
    let (Some(user), Some(repo)) = (non_empty(&params.user), non_empty(&params.repo)) else {
        return Err(ApiError::bad_request("You must specify parameters user and repo"));
    };
    let id = non_empty(&params.id)
        .ok_or_else(|| ApiError::bad_request("You must specify the parameter, id."))?;

    let credential = owned_credential(state, identity, id).await?;

    let upstream = match kind {
        ListingKind::Issues => state.gateway.issues(user, repo, &params.query, &credential).await?,
        ListingKind::PullRequests => {
            state.gateway.pulls(user, repo, &params.query, &credential).await?
        }
    };
    let upstream = require_ok(upstream)?;

    Ok(shape::summarize_body(
        &upstream.body,
        user,
        repo,
        &params.query,
        kind,
    )?)
}

/// Issues matching a query, with pull requests filtered out.
///
/// GET /api/issues
pub async fn list_issues(
    State(state): State<Arc<AppState>>,
    identity: ClientIdentity,
    Query(params): Query<ListingParams>,
) -> Result<Json<ListingSummary>, ApiError> {
    listing(&state, &identity, &params, ListingKind::Issues)
        .await
        .map(Json)
}

/// Pull requests matching a query.
///
/// GET /api/pulls
pub async fn list_pulls(
    State(state): State<Arc<AppState>>,
    identity: ClientIdentity,
    Query(params): Query<ListingParams>,
) -> Result<Json<ListingSummary>, ApiError> {
    listing(&state, &identity, &params, ListingKind::PullRequests)
        .await
        .map(Json)
}

/// Decoded file contents and metadata.
///
/// GET /api/file
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    identity: ClientIdentity,
    Query(params): Query<FileParams>,
) -> Result<Json<FileContent>, ApiError> {
    let file = RepoPath::explicit(
        non_empty(&params.user),
        non_empty(&params.repo),
        non_empty(&params.branch),
        non_empty(&params.path),
    )?;
    let id = non_empty(&params.id)
        .ok_or_else(|| ApiError::bad_request("You must specify the parameter, id."))?;

    let credential = owned_credential(&state, &identity, id).await?;
    let upstream = require_ok(state.gateway.contents(&file, &credential).await?)?;

    Ok(Json(shape::decode_file(&upstream.body)?))
}
