use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use super::{CookieCodec, CookieError};

/// Default `CookieCodec`: AES-256-GCM with a random 96-bit nonce prepended
/// to the ciphertext, the whole thing base64url-encoded so the result is a
/// legal cookie value without further escaping.
pub struct AesGcmCookieCodec {
    cipher: Aes256Gcm,
}

impl AesGcmCookieCodec {
    /// `key` must be exactly 32 bytes. Keys shorter or longer than that
    /// indicate a misconfiguration, not a runtime condition to recover from.
    pub fn new(key: &[u8]) -> Result<Self, CookieError> {
        if key.len() != 32 {
            return Err(CookieError::Encrypt(format!(
                "cookie key must be 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        })
    }
}

impl CookieCodec for AesGcmCookieCodec {
    fn encode(&self, plaintext: &str) -> Result<String, CookieError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CookieError::Encrypt(e.to_string()))?;

        let mut payload = Vec::with_capacity(nonce.len() + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(payload))
    }

    fn decode(&self, ciphertext: &str) -> Result<String, CookieError> {
        let payload = URL_SAFE_NO_PAD
            .decode(ciphertext)
            .map_err(|e| CookieError::Decrypt(e.to_string()))?;

        if payload.len() < 12 {
            return Err(CookieError::Decrypt("ciphertext shorter than nonce".into()));
        }
        let (nonce_bytes, body) = payload.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, body)
            .map_err(|e| CookieError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CookieError::Decrypt(e.to_string()))
    }
}
