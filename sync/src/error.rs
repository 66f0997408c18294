//! Error types for the sync engine.

use std::path::PathBuf;

use fsconsul_kv_client::KvError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that end a mapping.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The mapping configuration is unusable.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The KV client could not be built.
    #[error("failed to create KV client: {0}")]
    Client(#[source] KvError),

    /// The watch gave up on the store.
    #[error("watch of {prefix:?} failed: {source}")]
    Watch {
        prefix: String,
        #[source]
        source: KvError,
    },

    /// The on-change command failed.
    #[error("on-change command failed: {0}")]
    Hook(#[from] HookError),
}

/// Errors in the configuration of a mapping or of the whole process.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A mapping has no local path.
    #[error("mapping for prefix {0:?} has an empty path")]
    EmptyPath(String),

    /// The raw on-change string could not be split into arguments.
    #[error("cannot parse on-change command: {0}")]
    InvalidCommand(String),

    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from running the on-change command.
#[derive(Error, Debug)]
pub enum HookError {
    /// The command could not be started.
    #[error("failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited unsuccessfully.
    #[error("{command} exited with {status}")]
    Exit {
        command: String,
        status: std::process::ExitStatus,
    },
}

/// Errors for a single key during materialization. These are logged and
/// never end a mapping.
#[derive(Error, Debug)]
pub enum KeyError {
    /// The key cannot be mapped below the mapping root.
    #[error("key {0:?} does not map to a file below the mapping root")]
    InvalidKey(String),

    /// IO error.
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
