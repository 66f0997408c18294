//! Consul HTTP implementation of [`KvStore`].

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::debug;

use crate::config::ConsulConfig;
use crate::error::{KvError, Result};
use crate::store::{KvListing, KvPair, KvStore, ListQuery};

/// Header carrying the consistency index of a response.
const INDEX_HEADER: &str = "X-Consul-Index";

/// Header carrying the ACL token of a request.
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Client for the Consul KV HTTP API.
#[derive(Debug, Clone)]
pub struct ConsulClient {
    /// HTTP client, with TLS material already loaded.
    client: reqwest::Client,

    /// API base URL.
    base_url: String,

    /// Datacenter to query, if not the agent's own.
    datacenter: Option<String>,
}

impl ConsulClient {
    /// Build a client from the connection settings.
    pub fn new(config: &ConsulConfig) -> Result<Self> {
        Ok(Self {
            client: Self::build_http_client(config)?,
            base_url: config.base_url(),
            datacenter: (!config.dc.is_empty()).then(|| config.dc.clone()),
        })
    }

    /// The API base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_http_client(config: &ConsulConfig) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();

        if let Some(ca_file) = config.ca_file() {
            let pem = std::fs::read(ca_file)?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                KvError::Tls(format!("invalid certificate file {}: {e}", ca_file.display()))
            })?;
            if certs.is_empty() {
                return Err(KvError::Tls(format!(
                    "invalid certificate file {}: no certificates found",
                    ca_file.display()
                )));
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        if let Some((cert_file, key_file)) = config.client_identity() {
            let mut pem = std::fs::read(cert_file)?;
            pem.push(b'\n');
            pem.extend(std::fs::read(key_file)?);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                KvError::Tls(format!(
                    "invalid key pair {} / {}: {e}",
                    cert_file.display(),
                    key_file.display()
                ))
            })?;
            builder = builder.identity(identity);
        }

        Ok(builder.build()?)
    }

    fn parse_index(response: &reqwest::Response) -> Result<u64> {
        response
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| KvError::InvalidResponse(format!("missing or invalid {INDEX_HEADER}")))
    }
}

#[async_trait]
impl KvStore for ConsulClient {
    async fn list(&self, prefix: &str, query: &ListQuery) -> Result<KvListing> {
        let url = format!("{}/v1/kv/{prefix}", self.base_url);

        let mut params: Vec<(&str, String)> = vec![("recurse", "true".to_string())];
        if let Some(index) = query.wait_index {
            params.push(("index", index.to_string()));
        }
        if let Some(dc) = &self.datacenter {
            params.push(("dc", dc.clone()));
        }

        debug!("Listing {url} with {params:?}");

        let mut request = self.client.get(&url).query(&params);
        if let Some(token) = &query.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();

        // An empty prefix is reported as 404 but still carries an index.
        if status == reqwest::StatusCode::NOT_FOUND {
            let index = Self::parse_index(&response)?;
            debug!("Prefix {prefix} is empty at index {index}");
            return Ok(KvListing {
                pairs: Vec::new(),
                index,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KvError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let index = Self::parse_index(&response)?;
        let body = response.bytes().await?;
        let entries: Vec<ConsulKvEntry> = serde_json::from_slice(&body)?;

        let pairs = entries
            .into_iter()
            .map(ConsulKvEntry::into_pair)
            .collect::<Result<Vec<_>>>()?;

        debug!("Listed {} keys under {prefix} at index {index}", pairs.len());

        Ok(KvListing { pairs, index })
    }
}

/// One entry of a Consul KV list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulKvEntry {
    key: String,
    value: Option<String>,
}

impl ConsulKvEntry {
    fn into_pair(self) -> Result<KvPair> {
        let value = match self.value {
            Some(encoded) => STANDARD
                .decode(encoded)
                .map_err(|source| KvError::InvalidValue {
                    key: self.key.clone(),
                    source,
                })?,
            None => Vec::new(),
        };

        Ok(KvPair {
            key: self.key,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_decoding() {
        let entry: ConsulKvEntry = serde_json::from_str(
            r#"{"LockIndex":0,"Key":"app/config","Flags":0,"Value":"djE=","CreateIndex":5,"ModifyIndex":7}"#,
        )
        .unwrap();

        assert_eq!(entry.into_pair().unwrap(), KvPair::new("app/config", "v1"));
    }

    #[test]
    fn test_null_value_is_empty() {
        let entry: ConsulKvEntry =
            serde_json::from_str(r#"{"Key":"app/folder/","Value":null}"#).unwrap();

        assert_eq!(entry.into_pair().unwrap().value, Vec::<u8>::new());
    }

    #[test]
    fn test_bad_base64_is_rejected() {
        let entry: ConsulKvEntry =
            serde_json::from_str(r#"{"Key":"app/bad","Value":"***"}"#).unwrap();

        assert!(matches!(
            entry.into_pair(),
            Err(KvError::InvalidValue { key, .. }) if key == "app/bad"
        ));
    }

    #[test]
    fn test_missing_ca_file_fails() {
        let mut config = ConsulConfig::new("localhost:8501");
        config.ca_file = Some("/nonexistent/ca.cert".into());

        assert!(matches!(ConsulClient::new(&config), Err(KvError::Io(_))));
    }

    #[test]
    fn test_invalid_ca_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let ca_file = dir.path().join("ca.pem");
        std::fs::write(&ca_file, "not a certificate").unwrap();

        let mut config = ConsulConfig::new("localhost:8501");
        config.ca_file = Some(ca_file);

        assert!(matches!(ConsulClient::new(&config), Err(KvError::Tls(_))));
    }

    #[test]
    fn test_empty_tls_paths_build_plain_client() {
        let config: ConsulConfig = serde_json::from_str(
            r#"{"Addr": "localhost:8500", "CAFile": "", "CertFile": "", "KeyFile": ""}"#,
        )
        .unwrap();

        let client = ConsulClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8500");
    }

    #[test]
    fn test_datacenter_is_optional() {
        let client = ConsulClient::new(&ConsulConfig::new("localhost:8500")).unwrap();
        assert_eq!(client.datacenter, None);
        assert_eq!(client.base_url(), "http://localhost:8500");

        let client = ConsulClient::new(&ConsulConfig::new("localhost:8500").with_dc("east")).unwrap();
        assert_eq!(client.datacenter.as_deref(), Some("east"));
    }
}
