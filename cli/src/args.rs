//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use fsconsul_kv_client::ConsulConfig;
use fsconsul_sync::{ConfigError, MappingConfig, WatchConfig};
use thiserror::Error;

/// Separator for several prefixes or paths in one positional argument.
const LIST_SEPARATOR: char = '|';

/// Write files to local directories from Consul KV prefixes and run a
/// command on any change.
///
/// Several mappings can be given at once by separating prefixes and paths
/// with `|`; both lists must have the same length.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "fsconsul", version, about, long_about)]
pub struct Cli {
    /// Consul HTTP API address with port
    #[arg(long, value_name = "HOST:PORT")]
    pub addr: Option<String>,

    /// Consul datacenter, uses the agent's own if blank
    #[arg(long)]
    pub dc: Option<String>,

    /// Directory of keys used for decryption
    #[arg(long, value_name = "DIR")]
    pub keystore: Option<String>,

    /// Token to use for ACL access
    #[arg(long)]
    pub token: Option<String>,

    /// JSON file holding all configuration; other options are then ignored
    #[arg(long = "config-file", alias = "configFile", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Exit after the first reconciliation of every mapping
    #[arg(long)]
    pub once: bool,

    /// Key prefix(es), `|`-separated
    #[arg(required_unless_present = "config_file")]
    pub prefix: Option<String>,

    /// Local path(s), `|`-separated
    #[arg(required_unless_present = "config_file")]
    pub path: Option<String>,

    /// Command and arguments to run after each change
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub on_change: Vec<String>,
}

/// Errors turning arguments into a [`WatchConfig`].
#[derive(Error, Debug)]
pub enum CliError {
    #[error("there must be an identical number of prefixes ({prefixes}) and paths ({paths})")]
    MismatchedMappings { prefixes: usize, paths: usize },

    #[error("a prefix and a path are required without --config-file")]
    MissingMapping,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MismatchedMappings { .. } | Self::MissingMapping => 1,
            Self::Config(ConfigError::Parse { .. }) => 3,
            Self::Config(_) => 2,
        }
    }
}

impl Cli {
    /// Build the process configuration, from the config file when one is
    /// given and from the remaining arguments otherwise.
    pub fn into_config(self) -> Result<WatchConfig, CliError> {
        if let Some(path) = &self.config_file {
            return Ok(WatchConfig::load(path)?);
        }

        let (Some(prefix), Some(path)) = (&self.prefix, &self.path) else {
            return Err(CliError::MissingMapping);
        };

        let prefixes: Vec<&str> = prefix.split(LIST_SEPARATOR).collect();
        let paths: Vec<&str> = path.split(LIST_SEPARATOR).collect();
        if prefixes.len() != paths.len() {
            return Err(CliError::MismatchedMappings {
                prefixes: prefixes.len(),
                paths: paths.len(),
            });
        }

        let keystore = self.keystore.clone().unwrap_or_default();
        let mappings = prefixes
            .into_iter()
            .zip(paths)
            .map(|(prefix, path)| {
                MappingConfig::new(prefix, path)
                    .with_keystore(keystore.as_str())
                    .with_on_change(self.on_change.iter().cloned())
            })
            .collect();

        let mut consul = ConsulConfig::new(self.addr.clone().unwrap_or_default());
        if let Some(dc) = &self.dc {
            consul = consul.with_dc(dc.as_str());
        }
        if let Some(token) = &self.token {
            consul = consul.with_token(token.as_str());
        }

        Ok(WatchConfig {
            run_once: self.once,
            consul,
            mappings,
        })
    }
}
