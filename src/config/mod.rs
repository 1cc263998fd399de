use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Clock skew tolerated when checking `exp` on signed tokens, in seconds
    #[serde(default = "default_jwt_leeway")]
    pub jwt_leeway_secs: u64,
    /// Secret used to encrypt stored OAuth tokens. Tokens are stored in
    /// plaintext when unset.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_leeway_secs: default_jwt_leeway(),
            encryption_key: None,
        }
    }
}

fn default_jwt_leeway() -> u64 {
    30
}

/// GitHub OAuth app credentials and upstream endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    /// OAuth client ID
    #[serde(default)]
    pub client_id: String,
    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_raw_base_url")]
    pub raw_base_url: String,
    /// Host serving `/login/oauth/access_token`
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Timeout for a single upstream request in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_base_url: default_api_base_url(),
            raw_base_url: default_raw_base_url(),
            oauth_base_url: default_oauth_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_base_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_oauth_base_url() -> String {
    "https://github.com".to_string()
}

fn default_user_agent() -> String {
    format!("ghproxy/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_public_github() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.github.api_base_url, "https://api.github.com");
        assert_eq!(config.github.raw_base_url, "https://raw.githubusercontent.com");
        assert!(config.auth.encryption_key.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [github]
            client_id = "abc"
            client_secret = "def"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.github.client_id, "abc");
        assert_eq!(config.github.client_secret, "def");
        assert_eq!(config.github.timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/ghproxy.toml")).unwrap();
        assert_eq!(config.auth.jwt_leeway_secs, 30);
    }
}
