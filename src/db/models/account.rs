//! Add-on installation records.

use serde::Deserialize;
use sqlx::{FromRow, SqlitePool};

use crate::db::StoreError;

#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub client_key: String,
    pub addon_key: String,
    /// HS256 key for tokens issued by this installation
    pub shared_secret: String,
    pub base_url: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Installation payload posted by the host product.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallRequest {
    pub key: Option<String>,
    #[serde(rename = "clientKey")]
    pub client_key: Option<String>,
    #[serde(rename = "sharedSecret")]
    pub shared_secret: Option<String>,
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
}

/// Validated installation fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub addon_key: String,
    pub client_key: String,
    pub shared_secret: String,
    pub base_url: String,
}

impl InstallRequest {
    /// Returns the name of the first missing field on failure.
    pub fn into_account(self) -> Result<NewAccount, &'static str> {
        fn required(value: Option<String>, field: &'static str) -> Result<String, &'static str> {
            value.filter(|v| !v.is_empty()).ok_or(field)
        }

        Ok(NewAccount {
            addon_key: required(self.key, "key")?,
            client_key: required(self.client_key, "clientKey")?,
            shared_secret: required(self.shared_secret, "sharedSecret")?,
            base_url: required(self.base_url, "baseUrl")?,
        })
    }
}

impl Account {
    pub async fn get(db: &SqlitePool, client_key: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as(
            r#"
            SELECT client_key, addon_key, shared_secret, base_url, created_at, updated_at
            FROM accounts
            WHERE client_key = ?
            "#,
        )
        .bind(client_key)
        .fetch_optional(db)
        .await?;
        Ok(account)
    }

    /// Record an installation.
    ///
    /// `caller` is the verified client identity of the request, if it carried
    /// a signed token. When no account exists for the client key the write
    /// always proceeds (first writer wins). When one exists, only a caller
    /// verified as that same client may replace it.
    pub async fn install(
        db: &SqlitePool,
        new: &NewAccount,
        caller: Option<&str>,
    ) -> Result<Account, StoreError> {
        if Self::get(db, &new.client_key).await?.is_some() && caller != Some(new.client_key.as_str())
        {
            return Err(StoreError::Unauthorized);
        }

        Self::upsert(db, new).await
    }

    async fn upsert(db: &SqlitePool, new: &NewAccount) -> Result<Account, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO accounts (client_key, addon_key, shared_secret, base_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(client_key) DO UPDATE SET
                addon_key = excluded.addon_key,
                shared_secret = excluded.shared_secret,
                base_url = excluded.base_url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&new.client_key)
        .bind(&new.addon_key)
        .bind(&new.shared_secret)
        .bind(&new.base_url)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get(db, &new.client_key)
            .await?
            .ok_or(StoreError::NotFound)
    }
}
