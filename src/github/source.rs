//! Locating a file in a GitHub repository from request parameters.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `github.com/{user}/{repo}/blob|raw/{branch}/{path}`
    static ref GITHUB_FILE_URL_REGEX: Regex = Regex::new(
        r"github\.com/([^/?]+)/([^/?]+)/(?:blob|raw)/([^/?]+)/([^?]+?)(?:\?|$)"
    ).unwrap();

    /// `githubusercontent.com/{user}/{repo}/{branch}/{path}`
    static ref RAW_FILE_URL_REGEX: Regex = Regex::new(
        r"githubusercontent\.com/([^/?]+)/([^/?]+)/([^/?]+)/([^?]+?)(?:\?|$)"
    ).unwrap();
}

/// A file at a branch of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPath {
    pub user: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("You must specify parameters user, repo, branch and path")]
    MissingParameters,

    #[error("Incorrect Markdown File URL provided")]
    UnrecognizedUrl,
}

/// Match a browser or raw-content URL. The `github.com` form is tried first.
pub fn parse_source_url(url: &str) -> Option<RepoPath> {
    let caps = GITHUB_FILE_URL_REGEX
        .captures(url)
        .or_else(|| RAW_FILE_URL_REGEX.captures(url))?;

    Some(RepoPath {
        user: caps[1].to_string(),
        repo: caps[2].to_string(),
        branch: caps[3].to_string(),
        path: caps[4].to_string(),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl RepoPath {
    /// Build from explicit parameters, falling back to `url` when any of
    /// them is missing.
    pub fn resolve(
        user: Option<&str>,
        repo: Option<&str>,
        branch: Option<&str>,
        path: Option<&str>,
        url: Option<&str>,
    ) -> Result<Self, SourceError> {
        if let (Some(user), Some(repo), Some(branch), Some(path)) = (
            non_empty(user),
            non_empty(repo),
            non_empty(branch),
            non_empty(path),
        ) {
            return Ok(Self {
                user: user.to_string(),
                repo: repo.to_string(),
                branch: branch.to_string(),
                path: path.to_string(),
            });
        }

        let url = non_empty(url).ok_or(SourceError::MissingParameters)?;
        parse_source_url(url).ok_or(SourceError::UnrecognizedUrl)
    }

    /// Require all four explicit parameters, with no URL fallback.
    pub fn explicit(
        user: Option<&str>,
        repo: Option<&str>,
        branch: Option<&str>,
        path: Option<&str>,
    ) -> Result<Self, SourceError> {
        Self::resolve(user, repo, branch, path, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_path(user: &str, repo: &str, branch: &str, path: &str) -> RepoPath {
        RepoPath {
            user: user.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            path: path.to_string(),
        }
    }

    #[test]
    fn test_parse_blob_url() {
        assert_eq!(
            parse_source_url("https://github.com/acme/x/blob/main/docs/readme.md"),
            Some(repo_path("acme", "x", "main", "docs/readme.md"))
        );
    }

    #[test]
    fn test_parse_raw_url_with_query() {
        assert_eq!(
            parse_source_url("https://github.com/acme/x/raw/dev/README.md?token=abc"),
            Some(repo_path("acme", "x", "dev", "README.md"))
        );
    }

    #[test]
    fn test_parse_usercontent_url() {
        assert_eq!(
            parse_source_url("https://raw.githubusercontent.com/acme/x/v1.2/a/b/c.md"),
            Some(repo_path("acme", "x", "v1.2", "a/b/c.md"))
        );
    }

    #[test]
    fn test_parse_rejects_other_urls() {
        assert_eq!(parse_source_url("https://github.com/acme/x"), None);
        assert_eq!(parse_source_url("https://github.com/acme/x/tree/main/docs"), None);
        assert_eq!(parse_source_url("https://gitlab.com/acme/x/blob/main/a.md"), None);
        assert_eq!(parse_source_url(""), None);
    }

    #[test]
    fn test_resolve_prefers_explicit_parameters() {
        let resolved = RepoPath::resolve(
            Some("acme"),
            Some("x"),
            Some("main"),
            Some("README.md"),
            Some("https://github.com/other/y/blob/dev/z.md"),
        )
        .unwrap();
        assert_eq!(resolved, repo_path("acme", "x", "main", "README.md"));
    }

    #[test]
    fn test_resolve_falls_back_to_url_when_incomplete() {
        let resolved = RepoPath::resolve(
            Some("acme"),
            None,
            Some(""),
            None,
            Some("https://github.com/other/y/blob/dev/z.md"),
        )
        .unwrap();
        assert_eq!(resolved, repo_path("other", "y", "dev", "z.md"));
    }

    #[test]
    fn test_resolve_errors() {
        assert_eq!(
            RepoPath::resolve(Some("acme"), None, None, None, None),
            Err(SourceError::MissingParameters)
        );
        assert_eq!(
            RepoPath::resolve(None, None, None, None, Some("https://example.com/a.md")),
            Err(SourceError::UnrecognizedUrl)
        );
        assert_eq!(
            RepoPath::explicit(Some("acme"), Some("x"), Some("main"), None),
            Err(SourceError::MissingParameters)
        );
    }
}
