//! Signed-token verification for add-on callers.
//!
//! Callers send a compact HS256 JWT whose `iss` claim is their client key.
//! The token is verified with the shared secret stored for that client at
//! installation time, so the issuer is read (unverified) first to pick the
//! key, then the full token is checked against it.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{Account, StoreError};

/// Claims carried by an add-on token. Only `iss` and `exp` are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Query-string hash some hosts include; not checked here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qsh: Option<String>,
}

/// The `iss` claim of a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authorization token not specified")]
    Missing,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token issuer is not installed")]
    UnknownIssuer,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Deserialize)]
struct IssuerOnly {
    iss: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    leeway_secs: u64,
}

impl IdentityVerifier {
    pub fn new(leeway_secs: u64) -> Self {
        Self { leeway_secs }
    }

    /// Read `iss` without checking the signature. Only used to select the
    /// verification key.
    pub fn peek_issuer(token: &str) -> Result<String, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<IssuerOnly>(token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| AuthError::Invalid(e.to_string()))?;

        data.claims
            .iss
            .filter(|iss| !iss.is_empty())
            .ok_or_else(|| AuthError::Invalid("missing iss claim".to_string()))
    }

    /// Fully verify a token against a known secret.
    pub fn verify_with_secret(&self, token: &str, secret: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss"]);

        decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::Invalid(e.to_string()))
    }

    /// Verify a token issued by an installed client and return its identity.
    pub async fn verify(&self, db: &SqlitePool, token: &str) -> Result<ClientIdentity, AuthError> {
        let issuer = Self::peek_issuer(token)?;
        let account = Account::get(db, &issuer)
            .await?
            .ok_or(AuthError::UnknownIssuer)?;

        let claims = self.verify_with_secret(token, &account.shared_secret)?;
        if claims.iss != account.client_key {
            return Err(AuthError::Invalid("issuer changed during verification".to_string()));
        }

        Ok(ClientIdentity(claims.iss))
    }
}

/// Sign a token for `client_key`, valid for `ttl_secs`.
pub fn issue_token(client_key: &str, shared_secret: &str, ttl_secs: i64) -> Result<String, AuthError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        iss: client_key.to_string(),
        exp: now + ttl_secs,
        iat: Some(now),
        sub: None,
        qsh: None,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(shared_secret.as_bytes()),
    )
    .map_err(|e| AuthError::Invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory, NewAccount};

    async fn installed(client_key: &str, secret: &str) -> SqlitePool {
        let db = init_memory().await.unwrap();
        let account = NewAccount {
            addon_key: "addon".to_string(),
            client_key: client_key.to_string(),
            shared_secret: secret.to_string(),
            base_url: "https://example.test".to_string(),
        };
        Account::install(&db, &account, None).await.unwrap();
        db
    }

    #[test]
    fn test_peek_issuer() {
        let token = issue_token("client-a", "whatever", 60).unwrap();
        assert_eq!(IdentityVerifier::peek_issuer(&token).unwrap(), "client-a");
        assert!(IdentityVerifier::peek_issuer("not.a.jwt").is_err());
        assert!(IdentityVerifier::peek_issuer("").is_err());
    }

    #[test]
    fn test_verify_with_secret() {
        let verifier = IdentityVerifier::new(0);
        let token = issue_token("client-a", "right", 60).unwrap();

        assert_eq!(verifier.verify_with_secret(&token, "right").unwrap().iss, "client-a");
        assert!(matches!(
            verifier.verify_with_secret(&token, "wrong"),
            Err(AuthError::Invalid(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = IdentityVerifier::new(0);
        let token = issue_token("client-a", "secret", -120).unwrap();
        assert!(matches!(
            verifier.verify_with_secret(&token, "secret"),
            Err(AuthError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_against_installed_account() {
        let db = installed("client-a", "secret").await;
        let verifier = IdentityVerifier::new(0);

        let token = issue_token("client-a", "secret", 60).unwrap();
        let identity = verifier.verify(&db, &token).await.unwrap();
        assert_eq!(identity.as_str(), "client-a");

        let forged = issue_token("client-a", "guessed", 60).unwrap();
        assert!(matches!(verifier.verify(&db, &forged).await, Err(AuthError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_unknown_issuer_rejected() {
        let db = installed("client-a", "secret").await;
        let verifier = IdentityVerifier::new(0);
        let token = issue_token("client-z", "secret", 60).unwrap();
        assert!(matches!(
            verifier.verify(&db, &token).await,
            Err(AuthError::UnknownIssuer)
        ));
    }
}
