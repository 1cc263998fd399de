//! Installation lifecycle callback posted by the host product.

use axum::{body::Bytes, extract::State, http::StatusCode};
use std::sync::Arc;

use super::auth::SignedToken;
use super::error::ApiError;
use crate::db::{Account, InstallRequest, StoreError};
use crate::AppState;

/// Record (or re-record) an add-on installation.
///
/// The first installation for a client key is accepted without a signed
/// token. Once an account exists, only a token verified as that same client
/// may overwrite it.
///
/// POST /installed
pub async fn installed(
    State(state): State<Arc<AppState>>,
    SignedToken(token): SignedToken,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: InstallRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!("Failed to parse installation payload: {}", e);
        ApiError::bad_request("Invalid installation payload")
    })?;
    let account = request
        .into_account()
        .map_err(|field| ApiError::bad_request(format!("Missing field: {}", field)))?;

    let exists = Account::get(&state.db, &account.client_key).await?.is_some();
    let caller = match token {
        Some(token) if exists => Some(state.verifier.verify(&state.db, &token).await?),
        _ => None,
    };

    Account::install(&state.db, &account, caller.as_ref().map(|c| c.as_str()))
        .await
        .map_err(|e| match e {
            StoreError::Unauthorized => {
                tracing::warn!(
                    client_key = %account.client_key,
                    "Refused to overwrite installation without matching identity"
                );
                ApiError::unauthorized("You are not authorized")
            }
            other => other.into(),
        })?;

    tracing::info!(
        client_key = %account.client_key,
        addon_key = %account.addon_key,
        reinstall = exists,
        "Recorded installation"
    );

    Ok(StatusCode::NO_CONTENT)
}
