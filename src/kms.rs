//! Key management: minting and unwrapping the data key.

use crate::crypto::{self, DATA_KEY_LEN, DataKey};
use crate::error::{AppError, Result};

const WRAP_KEY_INFO: &[u8] = b"tenancy-kms-wrap-v1";
const WRAP_AAD: &[u8] = b"data-key";

/// Minimal surface of an external key-management service.
pub trait KeyManagementClient: Send + Sync {
    /// Mint a new data key. Returns the plaintext key and its wrapped form.
    fn create_data_key(&self) -> Result<(DataKey, Vec<u8>)>;

    fn decrypt_data_key(&self, encrypted: &[u8]) -> Result<DataKey>;
}

/// Wraps data keys under a locally configured master key.
pub struct LocalKms {
    wrapping_key: [u8; DATA_KEY_LEN],
}

impl LocalKms {
    pub fn new(master_key: &[u8]) -> Result<Self> {
        if master_key.len() != DATA_KEY_LEN {
            return Err(AppError::Kms(format!(
                "master key must be {} bytes, got {}",
                DATA_KEY_LEN,
                master_key.len()
            )));
        }
        Ok(Self {
            wrapping_key: crypto::derive_key(master_key, WRAP_KEY_INFO)?,
        })
    }

    pub fn from_hex(master_key_hex: &str) -> Result<Self> {
        let bytes = hex::decode(master_key_hex.trim())
            .map_err(|e| AppError::Kms(format!("invalid master key hex: {}", e)))?;
        Self::new(&bytes)
    }
}

impl KeyManagementClient for LocalKms {
    fn create_data_key(&self) -> Result<(DataKey, Vec<u8>)> {
        let key = DataKey::generate();
        let wrapped = crypto::seal(&self.wrapping_key, key.as_bytes(), WRAP_AAD)?;
        Ok((key, wrapped))
    }

    fn decrypt_data_key(&self, encrypted: &[u8]) -> Result<DataKey> {
        let plaintext = crypto::open(&self.wrapping_key, encrypted, WRAP_AAD)?;
        DataKey::from_bytes(&plaintext)
    }
}
