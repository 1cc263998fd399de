pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod github;
pub mod markdown;

pub use db::DbPool;

use anyhow::{Context, Result};
use config::Config;

use crate::auth::IdentityVerifier;
use crate::crypto::TokenCipher;
use crate::github::{GitHubGateway, OAuthClient};

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub verifier: IdentityVerifier,
    pub gateway: GitHubGateway,
    pub oauth: OAuthClient,
    /// Present when stored tokens are encrypted at rest
    pub cipher: Option<TokenCipher>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Result<Self> {
        let verifier = IdentityVerifier::new(config.auth.jwt_leeway_secs);
        let gateway =
            GitHubGateway::new(&config.github).context("Failed to build GitHub client")?;
        let oauth = OAuthClient::new(&config.github).context("Failed to build OAuth client")?;
        let cipher = config
            .auth
            .encryption_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(TokenCipher::from_secret);

        Ok(Self {
            config,
            db,
            verifier,
            gateway,
            oauth,
            cipher,
        })
    }
}
