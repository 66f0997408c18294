//! Error types for secret decryption.

use thiserror::Error;

/// Result type alias for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Errors that can occur while decrypting inline tags.
#[derive(Error, Debug)]
pub enum SecretError {
    /// A key file could not be read.
    #[error("failed to read key {name}: {source}")]
    KeyRead {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A key name would resolve outside the keystore.
    #[error("invalid key name: {0}")]
    InvalidKeyName(String),

    /// A key has an unsupported length.
    #[error("key {name} has unsupported length {len}, expected 16 or 32 bytes")]
    InvalidKeyLength { name: String, len: usize },

    /// A tag field is not valid base64.
    #[error("invalid base64 in {field}: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// A nonce has the wrong length.
    #[error("nonce must be 12 bytes, got {0}")]
    InvalidNonce(usize),

    /// Authentication or decryption failed.
    #[error("decryption failed with key {0}")]
    Decrypt(String),

    /// Encryption failed.
    #[error("encryption failed with key {0}")]
    Encrypt(String),
}
