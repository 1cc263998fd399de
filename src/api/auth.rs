//! Request extractors for the caller's signed token.
//!
//! The token is taken from the `Authorization` header (`JWT <token>` or
//! `Bearer <token>`) or, for iframe loads that cannot set headers, from the
//! `jwt` query parameter.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{request::Parts, HeaderMap},
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::{AuthError, ClientIdentity};
use crate::AppState;

#[derive(Deserialize)]
struct JwtParam {
    jwt: Option<String>,
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("Authorization").and_then(|h| h.to_str().ok())?;
    let token = value
        .strip_prefix("JWT ")
        .or_else(|| value.strip_prefix("Bearer "))
        .unwrap_or(value)
        .trim();

    (!token.is_empty()).then(|| token.to_string())
}

/// Extract the raw token from request headers or the query string
pub fn extract_token(parts: &Parts) -> Option<String> {
    header_token(&parts.headers).or_else(|| {
        Query::<JwtParam>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(p)| p.jwt)
            .filter(|t| !t.is_empty())
    })
}

/// The raw, unverified token, if the request carried one.
pub struct SignedToken(pub Option<String>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for SignedToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(SignedToken(extract_token(parts)))
    }
}

/// Requires a valid signed token; rejects with 401 otherwise.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for ClientIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or(AuthError::Missing)?;
        Ok(state.verifier.verify(&state.db, &token).await?)
    }
}

/// Identity for endpoints that also serve anonymous callers. A missing
/// token yields `None`; a token that fails verification is still rejected.
pub struct MaybeIdentity(pub Option<ClientIdentity>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match extract_token(parts) {
            Some(token) => Ok(MaybeIdentity(Some(
                state.verifier.verify(&state.db, &token).await?,
            ))),
            None => Ok(MaybeIdentity(None)),
        }
    }
}
