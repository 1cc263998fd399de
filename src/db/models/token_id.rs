//! Opaque identifiers for stored GitHub tokens.
//!
//! Clients receive a token reference they pass back on later requests. The
//! wire form is URL-safe unpadded base64 of `GithubToken:<uuid>`; the UUID is
//! the row key. The encoding does not depend on the storage engine.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Serialize, Serializer};
use uuid::Uuid;

const KIND: &str = "GithubToken";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(Uuid);

impl TokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Key used for the `github_tokens.id` column
    pub fn storage_key(&self) -> String {
        self.0.to_string()
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", KIND, self.0))
    }

    /// Parse a client-supplied reference. Returns `None` for anything that
    /// is not a token reference produced by [`TokenId::encode`].
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim()).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        let (kind, uuid) = text.split_once(':')?;
        if kind != KIND {
            return None;
        }
        Uuid::parse_str(uuid).ok().map(Self)
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_form_is_url_safe() {
        let id = TokenId::new();
        let encoded = id.encode();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(TokenId::decode(&encoded), Some(id));
    }

    #[test]
    fn test_raw_uuid_is_not_a_reference() {
        let uuid = Uuid::new_v4();
        assert_eq!(TokenId::decode(&uuid.to_string()), None);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(TokenId::decode(""), None);
        assert_eq!(TokenId::decode("not base64!"), None);
        let other_kind = URL_SAFE_NO_PAD.encode(format!("Account:{}", Uuid::new_v4()));
        assert_eq!(TokenId::decode(&other_kind), None);
    }

    #[test]
    fn test_serializes_as_encoded_string() {
        let id = TokenId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.encode()));
    }
}
