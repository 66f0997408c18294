//! Directory of named AES keys.

use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::error::{Result, SecretError};

/// Size of an AES-GCM nonce in bytes.
pub(crate) const NONCE_SIZE: usize = 12;

/// A directory of key files, one base64 encoded key per file.
///
/// Keys are read from disk on every use so rotated key files are picked up
/// by long-running processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keystore {
    root: PathBuf,
}

impl Keystore {
    /// Create a keystore rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The keystore directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read and decode the key called `name`.
    pub fn load_key(&self, name: &str) -> Result<Vec<u8>> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(SecretError::InvalidKeyName(name.to_string()));
        }

        let path = self.root.join(name);
        debug!("Loading key {name} from {}", path.display());

        let encoded = std::fs::read_to_string(&path).map_err(|source| SecretError::KeyRead {
            name: name.to_string(),
            source,
        })?;

        STANDARD
            .decode(encoded.trim())
            .map_err(|source| SecretError::Base64 {
                field: "key file",
                source,
            })
    }

    /// Decrypt `ciphertext` with the key called `name`.
    pub(crate) fn open(
        &self,
        name: &str,
        nonce: &[u8],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        if nonce.len() != NONCE_SIZE {
            return Err(SecretError::InvalidNonce(nonce.len()));
        }

        let key = self.load_key(name)?;
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: ciphertext,
            aad,
        };

        let plaintext = match key.len() {
            16 => Aes128Gcm::new_from_slice(&key)
                .map_err(|_| SecretError::Decrypt(name.to_string()))?
                .decrypt(nonce, payload),
            32 => Aes256Gcm::new_from_slice(&key)
                .map_err(|_| SecretError::Decrypt(name.to_string()))?
                .decrypt(nonce, payload),
            len => {
                return Err(SecretError::InvalidKeyLength {
                    name: name.to_string(),
                    len,
                });
            }
        };

        plaintext.map_err(|_| SecretError::Decrypt(name.to_string()))
    }

    /// Encrypt `plaintext` with the key called `name`.
    pub(crate) fn seal(
        &self,
        name: &str,
        nonce: &[u8; NONCE_SIZE],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        let key = self.load_key(name)?;
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: plaintext,
            aad,
        };

        let ciphertext = match key.len() {
            16 => Aes128Gcm::new_from_slice(&key)
                .map_err(|_| SecretError::Encrypt(name.to_string()))?
                .encrypt(nonce, payload),
            32 => Aes256Gcm::new_from_slice(&key)
                .map_err(|_| SecretError::Encrypt(name.to_string()))?
                .encrypt(nonce, payload),
            len => {
                return Err(SecretError::InvalidKeyLength {
                    name: name.to_string(),
                    len,
                });
            }
        };

        ciphertext.map_err(|_| SecretError::Encrypt(name.to_string()))
    }
}
