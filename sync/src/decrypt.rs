//! Value transformation between the store and the disk.

use std::path::Path;
use std::sync::Arc;

use fsconsul_secrets::{Keystore, SecretError, decrypt_tags};

/// Turns a raw stored value into the bytes written to disk.
pub trait ValueDecrypter: Send + Sync {
    /// Decrypt `raw`. Callers fall back to `raw` on error.
    fn decrypt(&self, raw: &[u8]) -> Result<Vec<u8>, SecretError>;
}

/// Writes values verbatim. Used for mappings without a keystore.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl ValueDecrypter for Passthrough {
    fn decrypt(&self, raw: &[u8]) -> Result<Vec<u8>, SecretError> {
        Ok(raw.to_vec())
    }
}

impl ValueDecrypter for Keystore {
    fn decrypt(&self, raw: &[u8]) -> Result<Vec<u8>, SecretError> {
        decrypt_tags(raw, self)
    }
}

/// The decrypter for a mapping's keystore setting.
pub fn decrypter_for(keystore: Option<&Path>) -> Arc<dyn ValueDecrypter> {
    match keystore {
        Some(root) => Arc::new(Keystore::new(root)),
        None => Arc::new(Passthrough),
    }
}
