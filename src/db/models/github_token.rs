//! GitHub OAuth tokens registered by an add-on installation.

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::TokenId;
use crate::crypto::{self, TokenCipher};
use crate::db::StoreError;

#[derive(Debug, Clone, FromRow)]
pub struct GithubToken {
    pub id: String,
    pub client_key: String,
    pub token_name: String,
    /// Access token, `ENC:`-prefixed when encryption at rest is enabled
    pub token_value: String,
    pub created_at: String,
}

/// Entry returned when listing an installation's tokens. Never carries the
/// token value.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenSummary {
    pub token_name: String,
    pub id: TokenId,
}

impl GithubToken {
    /// Store a new token and return its opaque reference.
    ///
    /// Token names are not unique; registering the same name twice creates
    /// two entries.
    pub async fn create(
        db: &SqlitePool,
        cipher: Option<&TokenCipher>,
        client_key: &str,
        token_name: &str,
        token_value: &str,
    ) -> Result<TokenId, StoreError> {
        let id = TokenId::new();
        let now = chrono::Utc::now().to_rfc3339();
        let stored = crypto::seal_if_configured(token_value, cipher)
            .map_err(|e| StoreError::Crypto(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO github_tokens (id, client_key, token_name, token_value, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.storage_key())
        .bind(client_key)
        .bind(token_name)
        .bind(&stored)
        .bind(&now)
        .execute(db)
        .await?;

        Ok(id)
    }

    /// Look up a token by its opaque reference.
    pub async fn resolve(db: &SqlitePool, id: &TokenId) -> Result<GithubToken, StoreError> {
        sqlx::query_as(
            r#"
            SELECT id, client_key, token_name, token_value, created_at
            FROM github_tokens
            WHERE id = ?
            "#,
        )
        .bind(id.storage_key())
        .fetch_optional(db)
        .await?
        .ok_or(StoreError::NotFound)
    }

    /// Look up a token by the string a client sent. Malformed references
    /// resolve to nothing.
    pub async fn resolve_encoded(db: &SqlitePool, encoded: &str) -> Result<GithubToken, StoreError> {
        let id = TokenId::decode(encoded).ok_or(StoreError::NotFound)?;
        Self::resolve(db, &id).await
    }

    /// Check that `client_key` owns this token. This is the only gate between
    /// a caller and someone else's GitHub credential.
    pub fn authorize(&self, client_key: &str) -> Result<(), StoreError> {
        if self.client_key == client_key {
            Ok(())
        } else {
            Err(StoreError::Unauthorized)
        }
    }

    pub fn token_id(&self) -> Option<TokenId> {
        Uuid::parse_str(&self.id).ok().map(TokenId::from_uuid)
    }

    /// Plaintext access token for the outbound GitHub call.
    pub fn access_token(&self, cipher: Option<&TokenCipher>) -> Result<String, StoreError> {
        crypto::open_if_encrypted(&self.token_value, cipher)
            .map_err(|e| StoreError::Crypto(e.to_string()))
    }

    pub async fn list_for_client(
        db: &SqlitePool,
        client_key: &str,
    ) -> Result<Vec<TokenSummary>, StoreError> {
        let tokens: Vec<GithubToken> = sqlx::query_as(
            r#"
            SELECT id, client_key, token_name, token_value, created_at
            FROM github_tokens
            WHERE client_key = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(client_key)
        .fetch_all(db)
        .await?;

        Ok(tokens
            .into_iter()
            .filter_map(|t| {
                let id = t.token_id()?;
                Some(TokenSummary {
                    token_name: t.token_name,
                    id,
                })
            })
            .collect())
    }

    /// Delete a token after confirming `client_key` owns it.
    pub async fn delete(db: &SqlitePool, id: &TokenId, client_key: &str) -> Result<(), StoreError> {
        let token = Self::resolve(db, id).await?;
        token.authorize(client_key)?;

        let result = sqlx::query("DELETE FROM github_tokens WHERE id = ? AND client_key = ?")
            .bind(id.storage_key())
            .bind(client_key)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
