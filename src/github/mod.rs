//! GitHub integration.
//!
//! This module provides:
//! - The gateway issuing raw-content and REST calls with a stored credential
//! - The OAuth code exchange used when a client registers a token
//! - Source URL parsing and response shaping for the proxy endpoints

pub mod gateway;
pub mod oauth;
pub mod shape;
pub mod source;

pub use gateway::{GatewayError, GitHubGateway, UpstreamResponse};
pub use oauth::{OAuthClient, OAuthError};
pub use source::{RepoPath, SourceError};
