//! Reshaping GitHub API payloads into what the add-on renders.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which listing a summary was built from; selects the search qualifier in
/// the browsable link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Issues,
    PullRequests,
}

impl ListingKind {
    fn qualifier(&self) -> &'static str {
        match self {
            ListingKind::Issues => "is%3Aissue",
            ListingKind::PullRequests => "is%3Apr",
        }
    }
}

/// Response for the issue and pull request listings. Both use the `issues`
/// key for their entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSummary {
    pub issues: Vec<Value>,
    pub open: usize,
    pub closed: usize,
    pub query: String,
    pub query_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileContent {
    pub content: String,
    pub size: u64,
    pub name: String,
    pub url: String,
    pub length: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("unexpected payload from GitHub: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file content is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Browsable GitHub search link for a listing query.
pub fn query_url(user: &str, repo: &str, query: &str, kind: ListingKind) -> String {
    format!(
        "https://github.com/{}/{}/issues?{}&q={}",
        user,
        repo,
        query,
        kind.qualifier()
    )
}

fn is_open(entry: &Value) -> bool {
    entry.get("state").and_then(Value::as_str) == Some("open")
}

/// Summarize a listing. The issues endpoint also returns pull requests,
/// marked by a `pull_request` key; those are dropped for [`ListingKind::Issues`].
pub fn summarize(
    entries: Vec<Value>,
    user: &str,
    repo: &str,
    query: &str,
    kind: ListingKind,
) -> ListingSummary {
    let issues: Vec<Value> = match kind {
        ListingKind::Issues => entries
            .into_iter()
            .filter(|entry| entry.get("pull_request").is_none())
            .collect(),
        ListingKind::PullRequests => entries,
    };

    let open = issues.iter().filter(|entry| is_open(entry)).count();

    ListingSummary {
        open,
        closed: issues.len() - open,
        issues,
        query: query.to_string(),
        query_url: query_url(user, repo, query, kind),
    }
}

/// Parse an upstream listing body and summarize it.
pub fn summarize_body(
    body: &[u8],
    user: &str,
    repo: &str,
    query: &str,
    kind: ListingKind,
) -> Result<ListingSummary, ShapeError> {
    let entries: Vec<Value> = serde_json::from_slice(body)?;
    Ok(summarize(entries, user, repo, query, kind))
}

/// Number of lines in `text`. `\n`, `\r\n` and `\r` end a line; a final
/// terminator does not start a new one.
pub fn count_lines(text: &str) -> usize {
    let mut count = 0;
    let mut unterminated = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                count += 1;
                unterminated = false;
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                count += 1;
                unterminated = false;
            }
            _ => unterminated = true,
        }
    }

    count + usize::from(unterminated)
}

#[derive(Deserialize)]
struct ContentsPayload {
    content: String,
    size: u64,
    name: String,
    html_url: String,
}

/// Decode a contents API payload. GitHub wraps the base64 at 60 columns, so
/// whitespace is stripped before decoding.
pub fn decode_file(body: &[u8]) -> Result<FileContent, ShapeError> {
    let payload: ContentsPayload = serde_json::from_slice(body)?;

    let compact: String = payload
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(compact)?;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    Ok(FileContent {
        length: count_lines(&content),
        content,
        size: payload.size,
        name: payload.name,
        url: payload.html_url,
    })
}
