pub mod auth;
pub mod error;
mod install;
mod oauth;
mod proxy;
mod tokens;

use axum::{
    extract::Request,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Proxy and token management routes. Each handler extracts the caller
    // identity itself, since the markdown readers also serve anonymous calls.
    let api_routes = Router::new()
        // Markdown
        .route("/markdown", get(proxy::get_markdown))
        .route("/markdown/html", get(proxy::get_markdown_html))
        // Repository data
        .route("/issues", get(proxy::list_issues))
        .route("/pulls", get(proxy::list_pulls))
        .route("/file", get(proxy::get_file))
        // Credentials
        .route("/oauth/authorize", get(oauth::authorize))
        .route("/tokens", get(tokens::list_tokens))
        .route("/tokens/delete", post(tokens::delete_token));

    Router::new()
        .route("/health", get(health_check))
        .route("/installed", post(install::installed))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Span for one request. Query strings carry signed tokens and token ids,
/// so only the path is recorded.
fn request_span(request: &Request) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

async fn health_check() -> &'static str {
    "OK"
}
