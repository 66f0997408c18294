//! Connection settings for the Consul agent.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Agent address used when none is configured.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8500";

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV: &str = "CONSUL_HTTP_TOKEN";

/// Connection settings shared by every mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Agent address, `host:port` or a full URL.
    #[serde(rename = "Addr", alias = "addr")]
    pub addr: String,

    /// Datacenter. Empty uses the agent's own.
    #[serde(rename = "DC", alias = "dc")]
    pub dc: String,

    /// ACL token.
    #[serde(rename = "Token", alias = "token")]
    pub token: String,

    /// Client private key (PEM).
    #[serde(rename = "KeyFile", alias = "keyFile", alias = "keyfile")]
    pub key_file: Option<PathBuf>,

    /// Client certificate (PEM).
    #[serde(rename = "CertFile", alias = "certFile", alias = "certfile")]
    pub cert_file: Option<PathBuf>,

    /// Extra CA certificate to trust (PEM).
    #[serde(rename = "CAFile", alias = "caFile", alias = "cafile")]
    pub ca_file: Option<PathBuf>,

    /// Force `https` when the address has no scheme.
    #[serde(rename = "UseTLS", alias = "useTLS", alias = "usetls")]
    pub use_tls: bool,
}

impl ConsulConfig {
    /// Create a config for the given address.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    /// Set the datacenter.
    pub fn with_dc(mut self, dc: impl Into<String>) -> Self {
        self.dc = dc.into();
        self
    }

    /// Set the ACL token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Fill in the default agent address.
    pub fn apply_defaults(&mut self) {
        if self.addr.is_empty() {
            self.addr = DEFAULT_ADDR.to_string();
        }
    }

    /// Take the token from the environment when none is configured.
    pub fn with_env_fallbacks(mut self) -> Self {
        if self.token.is_empty()
            && let Ok(token) = std::env::var(TOKEN_ENV)
        {
            self.token = token;
        }
        self
    }

    /// The token, if one is set.
    pub fn token(&self) -> Option<&str> {
        (!self.token.is_empty()).then_some(self.token.as_str())
    }

    /// Extra CA certificate. An empty path counts as unset.
    pub fn ca_file(&self) -> Option<&Path> {
        non_empty(&self.ca_file)
    }

    /// Client certificate and key, when both are set and non-empty.
    pub fn client_identity(&self) -> Option<(&Path, &Path)> {
        Some((non_empty(&self.cert_file)?, non_empty(&self.key_file)?))
    }

    /// Base URL of the agent's HTTP API, without a trailing slash.
    pub fn base_url(&self) -> String {
        let addr = self.addr.trim_end_matches('/');
        if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else if self.use_tls {
            format!("https://{addr}")
        } else {
            format!("http://{addr}")
        }
    }
}

fn non_empty(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}
