//! Encryption-at-rest for OAuth tokens.
//!
//! Tokens are sealed with AES-256-GCM under a single operator-provided master key and stored as a
//! self-describing string, `enc:gcm:<iv>:<ciphertext>` with base64 components. Rows written before
//! encryption was introduced hold the bare token; [`TokenString`] models both shapes explicitly so callers
//! pattern-match instead of catching decrypt failures.

use std::{fmt, str::FromStr};

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroize;

pub const ENC_TAG: &str = "enc:gcm:";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid vault key. {0}")]
    InvalidKey(String),
    #[error("Token string carries the '{ENC_TAG}' tag but the wrong number of segments")]
    InvalidFormat,
    #[error("Invalid encoding in token string. {0}")]
    InvalidEncoding(String),
    #[error("Could not decrypt token. The key is wrong or the data was tampered with")]
    DecryptFailure,
    #[error("Could not encrypt token. {0}")]
    EncryptFailure(String),
}

/// A stored token value. Untagged strings are legacy rows that predate encryption at rest and pass through
/// decryption unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenString {
    Plaintext(String),
    Tagged { iv: Vec<u8>, ciphertext: Vec<u8> },
}

impl FromStr for TokenString {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix(ENC_TAG) else {
            return Ok(TokenString::Plaintext(s.to_string()));
        };
        let mut segments = rest.split(':');
        let (Some(iv), Some(ciphertext), None) = (segments.next(), segments.next(), segments.next()) else {
            return Err(CryptoError::InvalidFormat);
        };
        if iv.is_empty() || ciphertext.is_empty() {
            return Err(CryptoError::InvalidFormat);
        }
        let iv = BASE64.decode(iv).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        let ciphertext = BASE64.decode(ciphertext).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        if iv.len() != NONCE_LEN {
            return Err(CryptoError::InvalidFormat);
        }
        Ok(TokenString::Tagged { iv, ciphertext })
    }
}

/// The 32-byte AES-256-GCM master key. There is no rotation; one key is used for the process lifetime. The
/// key material is wiped from memory on drop.
#[derive(Clone)]
pub struct VaultKey {
    key: [u8; KEY_LEN],
}

impl Drop for VaultKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(****)")
    }
}

impl VaultKey {
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len())));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    pub fn random() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Seals a token. A fresh random nonce is drawn for every call, so encrypting the same plaintext twice
    /// yields different strings.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext =
            cipher.encrypt(nonce, plaintext.as_bytes()).map_err(|e| CryptoError::EncryptFailure(e.to_string()))?;
        Ok(format!("{ENC_TAG}{}:{}", BASE64.encode(nonce_bytes), BASE64.encode(&ciphertext)))
    }

    /// Opens a stored token value. Legacy plaintext rows are returned unchanged; tagged values are
    /// authenticated and decrypted.
    pub fn decrypt(&self, value: &str) -> Result<String, CryptoError> {
        match value.parse::<TokenString>()? {
            TokenString::Plaintext(s) => Ok(s),
            TokenString::Tagged { iv, ciphertext } => {
                let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
                let plaintext = cipher
                    .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
                    .map_err(|_| CryptoError::DecryptFailure)?;
                String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptFailure)
            },
        }
    }
}
