//! Configuration types for mappings and the whole process.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use fsconsul_kv_client::ConsulConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::BackoffPolicy;

/// Full process configuration, as read from a JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Stop every mapping after its first successful reconciliation.
    #[serde(rename = "RunOnce", alias = "runOnce", alias = "runonce")]
    pub run_once: bool,

    /// Connection settings shared by all mappings.
    #[serde(rename = "Consul", alias = "consul")]
    pub consul: ConsulConfig,

    /// Prefix to directory mappings.
    #[serde(rename = "Mappings", alias = "mappings")]
    pub mappings: Vec<MappingConfig>,
}

impl WatchConfig {
    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();

        let body = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_slice(&body).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One prefix to directory mapping, as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Key prefix in the store.
    #[serde(rename = "Prefix", alias = "prefix")]
    pub prefix: String,

    /// Local directory mirroring the prefix.
    #[serde(rename = "Path", alias = "path")]
    pub path: String,

    /// Keystore directory for inline encrypted values.
    #[serde(rename = "Keystore", alias = "keystore")]
    pub keystore: String,

    /// Command and arguments to run after each change.
    #[serde(rename = "OnChange")]
    pub on_change: Vec<String>,

    /// Command line to run after each change, as a single string. Replaces
    /// `OnChange` when set.
    #[serde(rename = "onchange")]
    pub on_change_raw: String,
}

impl MappingConfig {
    /// Create a mapping config.
    pub fn new(prefix: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the keystore directory.
    pub fn with_keystore(mut self, keystore: impl Into<String>) -> Self {
        self.keystore = keystore.into();
        self
    }

    /// Set the on-change command.
    pub fn with_on_change<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_change = command.into_iter().map(Into::into).collect();
        self
    }

    /// Normalize into a [`MappingSpec`].
    pub fn resolve(&self) -> std::result::Result<MappingSpec, ConfigError> {
        let prefix = self
            .prefix
            .strip_prefix('/')
            .unwrap_or(&self.prefix)
            .to_string();

        let local_root = normalize_root(&self.path)
            .ok_or_else(|| ConfigError::EmptyPath(self.prefix.clone()))?;

        let keystore = (!self.keystore.is_empty()).then(|| PathBuf::from(&self.keystore));

        let on_change = if self.on_change_raw.trim().is_empty() {
            self.on_change.clone()
        } else {
            shlex::split(&self.on_change_raw)
                .ok_or_else(|| ConfigError::InvalidCommand(self.on_change_raw.clone()))?
        };

        Ok(MappingSpec {
            prefix,
            local_root,
            keystore,
            on_change: (!on_change.is_empty()).then_some(on_change),
        })
    }
}

/// A validated, normalized mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSpec {
    /// Key prefix, without a leading `/`.
    pub prefix: String,

    /// Mirror directory. Always ends in a path separator.
    pub local_root: PathBuf,

    /// Keystore directory. `None` writes values verbatim.
    pub keystore: Option<PathBuf>,

    /// Command and arguments to run after each change.
    pub on_change: Option<Vec<String>>,
}

/// Strip a stray trailing quote and enforce a trailing separator.
///
/// Some shells leave a `"` behind when a quoted path ends in a backslash.
fn normalize_root(path: &str) -> Option<PathBuf> {
    let path = path.strip_suffix('"').unwrap_or(path);
    if path.is_empty() {
        return None;
    }

    let mut root = path.to_string();
    if !root.ends_with(MAIN_SEPARATOR) && !root.ends_with('/') {
        root.push(MAIN_SEPARATOR);
    }

    Some(PathBuf::from(root))
}

/// Tunables of the engine itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Retry policy for blocking queries.
    pub backoff: BackoffPolicy,

    /// Snapshots a watcher may queue ahead of its orchestrator.
    pub snapshot_buffer: usize,
}

impl EngineOptions {
    /// Set the retry policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            snapshot_buffer: 1,
        }
    }
}
