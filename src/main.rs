use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ghproxy::config::Config;
use ghproxy::AppState;

#[derive(Parser, Debug)]
#[command(name = "ghproxy")]
#[command(author, version, about = "Token-scoped GitHub content proxy", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ghproxy.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// GitHub OAuth client ID (overrides the config file)
    #[arg(long, env = "GHPROXY_GITHUB_CLIENT_ID")]
    github_client_id: Option<String>,

    /// GitHub OAuth client secret (overrides the config file)
    #[arg(long, env = "GHPROXY_GITHUB_CLIENT_SECRET", hide_env_values = true)]
    github_client_secret: Option<String>,

    /// Secret for encrypting stored tokens (overrides the config file)
    #[arg(long, env = "GHPROXY_ENCRYPTION_KEY", hide_env_values = true)]
    encryption_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(id) = cli.github_client_id {
        config.github.client_id = id;
    }
    if let Some(secret) = cli.github_client_secret {
        config.github.client_secret = secret;
    }
    if let Some(key) = cli.encryption_key {
        config.auth.encryption_key = Some(key);
    }

    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ghproxy v{}", env!("CARGO_PKG_VERSION"));

    if config.github.client_id.is_empty() || config.github.client_secret.is_empty() {
        tracing::warn!("GitHub OAuth client credentials are not configured; token registration will fail");
    }
    if config.auth.encryption_key.is_none() {
        tracing::warn!("No encryption key configured; GitHub tokens are stored in plaintext");
    }

    std::fs::create_dir_all(&config.server.data_dir)?;
    let db = ghproxy::db::init(&config.server.data_dir).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, db)?);
    let app = ghproxy::api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
