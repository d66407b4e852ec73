//! Envelope encryption primitives.
//!
//! API key secrets are sealed with AES-256-GCM under a per-key subkey derived
//! from the process-wide data key. The data key itself is only ever persisted
//! in wrapped form (see [`crate::kms`]).

use std::fmt;
use std::sync::Arc;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;

use crate::error::{AppError, Result};

pub const DATA_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const SECRET_KEY_INFO: &str = "tenancy-api-key-secret-v1:";

/// Derive a 256-bit key from `ikm` for the given context.
pub(crate) fn derive_key(ikm: &[u8], info: &[u8]) -> Result<[u8; DATA_KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; DATA_KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| AppError::Kms(format!("key derivation failed: {}", e)))?;
    Ok(okm)
}

/// AES-256-GCM seal. Output is `nonce || ciphertext`.
pub(crate) fn seal(key: &[u8; DATA_KEY_LEN], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| AppError::Kms("encryption failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) fn open(key: &[u8; DATA_KEY_LEN], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(AppError::Kms("ciphertext too short".into()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| AppError::Kms("decryption failed".into()))
}

/// Plaintext data key held in memory for the life of the process.
///
/// Cloning is cheap and shares the same key material. The key never leaves
/// this type except through [`crate::kms`] when it is first wrapped.
#[derive(Clone)]
pub struct DataKey {
    key: Arc<[u8; DATA_KEY_LEN]>,
}

impl DataKey {
    pub fn generate() -> Self {
        let mut key = [0u8; DATA_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key: Arc::new(key) }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key: [u8; DATA_KEY_LEN] = bytes.try_into().map_err(|_| {
            AppError::Kms(format!(
                "data key must be {} bytes, got {}",
                DATA_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self { key: Arc::new(key) })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; DATA_KEY_LEN] {
        &self.key
    }

    fn subkey(&self, key_id: &str) -> Result<[u8; DATA_KEY_LEN]> {
        derive_key(
            self.key.as_slice(),
            format!("{}{}", SECRET_KEY_INFO, key_id).as_bytes(),
        )
    }

    /// Encrypt bound to `key_id`: the ciphertext only decrypts under the same id.
    pub fn encrypt(&self, plaintext: &[u8], key_id: &str) -> Result<Vec<u8>> {
        seal(&self.subkey(key_id)?, plaintext, key_id.as_bytes())
    }

    pub fn decrypt(&self, ciphertext: &[u8], key_id: &str) -> Result<Vec<u8>> {
        open(&self.subkey(key_id)?, ciphertext, key_id.as_bytes())
    }

    pub fn encrypt_secret(&self, secret: &str, key_id: &str) -> Result<Vec<u8>> {
        self.encrypt(secret.as_bytes(), key_id)
    }

    pub fn decrypt_secret(&self, ciphertext: &[u8], key_id: &str) -> Result<String> {
        let plaintext = self.decrypt(ciphertext, key_id)?;
        String::from_utf8(plaintext)
            .map_err(|_| AppError::Kms("decrypted secret is not valid UTF-8".into()))
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey([redacted])")
    }
}
