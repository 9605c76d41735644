//! API key sealing at rest
//!
//! Keys are XORed with a SHA-256 counter-mode keystream derived from a
//! per-install secret and a random nonce, then tagged and base64-encoded.
//! This keeps keys out of plain sight in the database file; it is
//! obfuscation, not a security boundary, since the secret sits next to it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pmide_common::{Error, Result};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

const SECRET_LEN: usize = 32;
const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

pub struct SecretBox {
    key: [u8; SECRET_LEN],
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBox(..)")
    }
}

impl SecretBox {
    /// Read the install secret, generating it on first start
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let bytes = std::fs::read(path)?;
            let key: [u8; SECRET_LEN] = bytes.as_slice().try_into().map_err(|_| {
                Error::Config(format!(
                    "{} must hold exactly {} bytes, found {}",
                    path.display(),
                    SECRET_LEN,
                    bytes.len()
                ))
            })?;
            return Ok(Self { key });
        }

        let mut key = [0u8; SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, key)?;
        info!("Generated install secret: {}", path.display());
        Ok(Self { key })
    }

    pub fn from_key(key: [u8; SECRET_LEN]) -> Self {
        Self { key }
    }

    /// Seal `plaintext` into `base64(nonce || ciphertext || tag)`
    pub fn seal(&self, plaintext: &str) -> String {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut body = plaintext.as_bytes().to_vec();
        self.apply_keystream(&nonce, &mut body);
        let tag = self.tag(&nonce, &body);

        let mut out = Vec::with_capacity(NONCE_LEN + body.len() + TAG_LEN);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&body);
        out.extend_from_slice(&tag);
        STANDARD.encode(out)
    }

    /// Reverse [`SecretBox::seal`]; fails when the tag does not match
    pub fn open(&self, sealed: &str) -> Result<String> {
        let raw = STANDARD
            .decode(sealed.trim())
            .map_err(|e| Error::Internal(format!("Sealed value is not base64: {}", e)))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::Internal("Sealed value is truncated".to_string()));
        }

        let (nonce, rest) = raw.split_at(NONCE_LEN);
        let (body, tag) = rest.split_at(rest.len() - TAG_LEN);
        if self.tag(nonce, body)[..] != *tag {
            return Err(Error::Internal(
                "Sealed value does not match this install's secret".to_string(),
            ));
        }

        let mut plain = body.to_vec();
        self.apply_keystream(nonce, &mut plain);
        String::from_utf8(plain).map_err(|_| Error::Internal("Sealed value is not UTF-8".to_string()))
    }

    fn apply_keystream(&self, nonce: &[u8], data: &mut [u8]) {
        for (counter, chunk) in data.chunks_mut(32).enumerate() {
            let mut hasher = Sha256::new();
            hasher.update(self.key);
            hasher.update(nonce);
            hasher.update((counter as u64).to_le_bytes());
            let block = hasher.finalize();
            for (byte, k) in chunk.iter_mut().zip(block.iter()) {
                *byte ^= k;
            }
        }
    }

    fn tag(&self, nonce: &[u8], body: &[u8]) -> [u8; TAG_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(b"pmide-tag");
        hasher.update(self.key);
        hasher.update(nonce);
        hasher.update(body);
        let digest = hasher.finalize();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&digest[..TAG_LEN]);
        tag
    }
}

/// Masked preview such as `sk-…abcd`
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "…".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let secrets = SecretBox::from_key([7u8; SECRET_LEN]);
        let sealed = secrets.seal("sk-ant-api03-secret-value");
        assert!(!sealed.contains("secret-value"));
        assert_eq!(secrets.open(&sealed).unwrap(), "sk-ant-api03-secret-value");
    }

    #[test]
    fn test_nonce_makes_output_differ() {
        let secrets = SecretBox::from_key([1u8; SECRET_LEN]);
        assert_ne!(secrets.seal("same"), secrets.seal("same"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let sealed = SecretBox::from_key([1u8; SECRET_LEN]).seal("sk-test-1234567890");
        let other = SecretBox::from_key([2u8; SECRET_LEN]);
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn test_tampered_value_is_rejected() {
        let secrets = SecretBox::from_key([3u8; SECRET_LEN]);
        let sealed = secrets.seal("sk-test-abcdefghijkl");
        let mut raw = STANDARD.decode(&sealed).unwrap();
        raw[NONCE_LEN] ^= 0xff;
        assert!(secrets.open(&STANDARD.encode(raw)).is_err());
        assert!(secrets.open("not base64!").is_err());
        assert!(secrets.open("AAAA").is_err());
    }

    #[test]
    fn test_long_keys_span_several_blocks() {
        let secrets = SecretBox::from_key([9u8; SECRET_LEN]);
        let key = "x".repeat(150);
        assert_eq!(secrets.open(&secrets.seal(&key)).unwrap(), key);
    }

    #[test]
    fn test_load_or_create_persists_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.key");
        let first = SecretBox::load_or_create(&path).unwrap();
        let sealed = first.seal("sk-persisted-key-0000");
        let second = SecretBox::load_or_create(&path).unwrap();
        assert_eq!(second.open(&sealed).unwrap(), "sk-persisted-key-0000");

        std::fs::write(&path, b"short").unwrap();
        assert!(SecretBox::load_or_create(&path).is_err());
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("sk-ant-api03-abcdwxyz"), "sk-…wxyz");
        assert_eq!(mask_api_key("short"), "…");
    }
}
