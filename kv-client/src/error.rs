//! Error types for the KV client.

use thiserror::Error;

/// Result type alias for KV operations.
pub type Result<T> = std::result::Result<T, KvError>;

/// Errors that can occur while talking to the KV store.
#[derive(Error, Debug)]
pub enum KvError {
    /// The store answered with a non-success status.
    #[error("KV store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The store answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A stored value was not valid base64.
    #[error("invalid value for key {key}: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: base64::DecodeError,
    },

    /// TLS material could not be loaded.
    #[error("tls error: {0}")]
    Tls(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
