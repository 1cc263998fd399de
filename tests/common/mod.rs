#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::MockServer;

use ghproxy::auth::issue_token;
use ghproxy::config::Config;
use ghproxy::db::{Account, GithubToken, NewAccount, TokenId};
use ghproxy::{AppState, DbPool};

pub const ALPHA: &str = "client-alpha";
pub const ALPHA_SECRET: &str = "alpha-shared-secret";
pub const BETA: &str = "client-beta";
pub const BETA_SECRET: &str = "beta-shared-secret";

/// A router wired to an in-memory store and a mock GitHub.
pub struct Harness {
    pub github: MockServer,
    pub state: Arc<AppState>,
    pub router: Router,
}

impl Harness {
    pub async fn new() -> Self {
        Self::configured(|_| {}).await
    }

    pub async fn configured(customize: impl FnOnce(&mut Config)) -> Self {
        let github = MockServer::start().await;

        let mut config = Config::default();
        config.github.api_base_url = github.uri();
        config.github.raw_base_url = github.uri();
        config.github.oauth_base_url = github.uri();
        config.github.client_id = "oauth-client".to_string();
        config.github.client_secret = "oauth-secret".to_string();
        config.github.timeout_secs = 5;
        customize(&mut config);

        let db = ghproxy::db::init_memory().await.unwrap();
        let state = Arc::new(AppState::new(config, db).unwrap());
        let router = ghproxy::api::create_router(state.clone());

        Self {
            github,
            state,
            router,
        }
    }

    /// Harness with both test clients installed.
    pub async fn with_accounts() -> Self {
        let harness = Self::new().await;
        install(&harness.state.db, ALPHA, ALPHA_SECRET).await;
        install(&harness.state.db, BETA, BETA_SECRET).await;
        harness
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    pub async fn store_token(&self, client_key: &str, name: &str, value: &str) -> TokenId {
        GithubToken::create(self.db(), self.state.cipher.as_ref(), client_key, name, value)
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, jwt: Option<&str>) -> Response {
        self.send(Method::GET, uri, jwt, Body::empty()).await
    }

    pub async fn post(&self, uri: &str, jwt: Option<&str>, body: Body) -> Response {
        self.send(Method::POST, uri, jwt, body).await
    }

    async fn send(&self, method: Method, uri: &str, jwt: Option<&str>, body: Body) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = jwt {
            builder = builder.header(header::AUTHORIZATION, format!("JWT {}", token));
        }
        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }
}

pub async fn install(db: &DbPool, client_key: &str, shared_secret: &str) {
    let account = NewAccount {
        addon_key: "github-proxy".to_string(),
        client_key: client_key.to_string(),
        shared_secret: shared_secret.to_string(),
        base_url: format!("https://{}.example.net", client_key),
    };
    Account::install(db, &account, None).await.unwrap();
}

pub fn jwt(client_key: &str, shared_secret: &str) -> String {
    issue_token(client_key, shared_secret, 300).unwrap()
}

pub fn alpha_jwt() -> String {
    jwt(ALPHA, ALPHA_SECRET)
}

pub fn beta_jwt() -> String {
    jwt(BETA, BETA_SECRET)
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
