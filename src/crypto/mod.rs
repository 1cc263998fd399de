//! Encryption at rest for stored GitHub OAuth tokens.
//!
//! Tokens are sealed with AES-256-GCM under a key derived from the configured
//! secret. The stored format is `ENC:` + base64(nonce || ciphertext || tag),
//! where nonce is 12 bytes and tag is 16 bytes.
//!
//! Values without the `ENC:` prefix are treated as plaintext, so a database
//! written before a key was configured keeps working.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::pbkdf2;
use std::num::NonZeroU32;

const KEY_LENGTH: usize = 32;

const NONCE_LENGTH: usize = 12;

const PBKDF2_ITERATIONS: u32 = 100_000;

/// Fixed salt; the secret itself is unique per deployment
const PBKDF2_SALT: &[u8] = b"ghproxy-token-encryption-v1";

pub const ENCRYPTED_PREFIX: &str = "ENC:";

/// Derive a 256-bit key from a secret string using PBKDF2-HMAC-SHA256.
fn derive_key(secret: &str) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(NonZeroU32::MIN);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        PBKDF2_SALT,
        secret.as_bytes(),
        &mut key,
    );
    key
}

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Seals and opens token values with a key derived once at startup.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_LENGTH],
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCipher(..)")
    }
}

impl TokenCipher {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            key: derive_key(secret),
        }
    }

    /// Encrypt a token value for storage.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        use rand::RngCore;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key).context("Failed to create cipher")?;
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(&combined)))
    }

    /// Decrypt a stored value. Plaintext values pass through unchanged.
    pub fn open(&self, stored: &str) -> Result<String> {
        let Some(encoded) = stored.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(stored.to_string());
        };

        let combined = BASE64.decode(encoded).context("Failed to decode base64")?;
        if combined.len() < NONCE_LENGTH + 1 {
            anyhow::bail!("Ciphertext too short");
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key).context("Failed to create cipher")?;
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

        String::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")
    }
}

/// Encrypt when a cipher is configured, otherwise store as-is.
pub fn seal_if_configured(value: &str, cipher: Option<&TokenCipher>) -> Result<String> {
    match cipher {
        Some(c) => c.seal(value),
        None => Ok(value.to_string()),
    }
}

/// Decrypt a stored value, failing if it is encrypted and no cipher is configured.
pub fn open_if_encrypted(value: &str, cipher: Option<&TokenCipher>) -> Result<String> {
    match (is_encrypted(value), cipher) {
        (true, Some(c)) => c.open(value),
        (true, None) => anyhow::bail!("Token is encrypted but no encryption key is configured"),
        (false, _) => Ok(value.to_string()),
    }
}
