//! Fan-out over every configured mapping.

use std::sync::Arc;

use fsconsul_kv_client::{ConsulClient, ConsulConfig, KvStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{EngineOptions, MappingConfig, WatchConfig};
use crate::error::SyncError;
use crate::orchestrator::{MappingOrchestrator, failure_code};
use crate::status::{AggregateStatus, EXIT_SETUP, EXIT_WATCH};

/// Runs one orchestrator per mapping against a shared store.
///
/// Mappings share nothing but the store client. A failure in one is
/// recorded and never stops the others.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn KvStore>,
    token: Option<String>,
    options: EngineOptions,
}

impl Coordinator {
    /// Create a coordinator for `store`.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            token: None,
            options: EngineOptions::default(),
        }
    }

    /// Set the ACL token sent with every query.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the engine options.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one mapping to its terminal code.
    pub async fn run_mapping(
        &self,
        mapping: &MappingConfig,
        run_once: bool,
        cancel: CancellationToken,
    ) -> i32 {
        let spec = match mapping.resolve() {
            Ok(spec) => spec,
            Err(e) => {
                error!("Invalid mapping for {:?}: {e}", mapping.prefix);
                return EXIT_SETUP;
            }
        };

        MappingOrchestrator::new(
            spec,
            Arc::clone(&self.store),
            self.token.clone(),
            self.options.clone(),
            run_once,
        )
        .run(cancel)
        .await
        .code()
    }

    /// Run every mapping concurrently and wait for all of them.
    pub async fn run(
        &self,
        mappings: &[MappingConfig],
        run_once: bool,
        cancel: CancellationToken,
    ) -> AggregateStatus {
        let handles: Vec<_> = mappings
            .iter()
            .cloned()
            .map(|mapping| {
                let coordinator = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    coordinator.run_mapping(&mapping, run_once, cancel).await
                })
            })
            .collect();

        let mut status = AggregateStatus::new(run_once);
        for (mapping, handle) in mappings.iter().zip(handles) {
            let code = match handle.await {
                Ok(code) => code,
                Err(e) => {
                    error!("Mapping task for {:?} panicked: {e}", mapping.prefix);
                    EXIT_WATCH
                }
            };
            info!("Mapping {:?} finished with code {code}", mapping.prefix);
            status.push(mapping.prefix.clone(), code);
        }

        status
    }
}

/// Build the shared Consul client for `consul`.
fn connect(consul: &ConsulConfig) -> crate::error::Result<(Arc<dyn KvStore>, Option<String>)> {
    let mut consul = consul.clone().with_env_fallbacks();
    consul.apply_defaults();

    let client = ConsulClient::new(&consul).map_err(SyncError::Client)?;
    info!("Using Consul at {}", client.base_url());

    Ok((Arc::new(client), consul.token().map(str::to_string)))
}

/// Run a single mapping against Consul and return its terminal code.
pub async fn start_mapping(
    mapping: &MappingConfig,
    consul: &ConsulConfig,
    run_once: bool,
    cancel: CancellationToken,
) -> i32 {
    match connect(consul) {
        Ok((store, token)) => {
            Coordinator::new(store)
                .with_token(token)
                .run_mapping(mapping, run_once, cancel)
                .await
        }
        Err(e) => {
            error!("{e}");
            failure_code(&e)
        }
    }
}

/// Run every mapping of `config` against Consul.
pub async fn start_all(config: &WatchConfig, cancel: CancellationToken) -> AggregateStatus {
    match connect(&config.consul) {
        Ok((store, token)) => {
            Coordinator::new(store)
                .with_token(token)
                .run(&config.mappings, config.run_once, cancel)
                .await
        }
        Err(e) => {
            error!("{e}");
            let code = failure_code(&e);
            let mut status = AggregateStatus::new(config.run_once);
            for mapping in &config.mappings {
                status.push(mapping.prefix.clone(), code);
            }
            status
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_invalid_mapping_is_a_setup_failure() {
        let consul = ConsulConfig::new("127.0.0.1:1");
        let code = start_mapping(
            &MappingConfig::new("app", ""),
            &consul,
            true,
            CancellationToken::new(),
        )
        .await;
        assert_eq!(code, EXIT_SETUP);
    }

    #[tokio::test]
    async fn test_bad_tls_material_fails_every_mapping() {
        let dir = TempDir::new().unwrap();
        let mut consul = ConsulConfig::new("127.0.0.1:1");
        consul.ca_file = Some(dir.path().join("missing-ca.pem"));

        let config = WatchConfig {
            run_once: true,
            consul,
            mappings: vec![
                MappingConfig::new("a", dir.path().join("a").to_string_lossy()),
                MappingConfig::new("b", dir.path().join("b").to_string_lossy()),
            ],
        };

        let status = start_all(&config, CancellationToken::new()).await;
        assert_eq!(status.mappings.len(), 2);
        assert!(status.mappings.iter().all(|m| m.code == EXIT_SETUP));
        assert_eq!(status.exit_code(), EXIT_SETUP);
    }

    #[tokio::test]
    async fn test_unreachable_agent_fails_fast() {
        let dir = TempDir::new().unwrap();
        let consul = ConsulConfig::new("127.0.0.1:1");
        let mapping = MappingConfig::new("app", dir.path().to_string_lossy());

        let code = start_mapping(&mapping, &consul, false, CancellationToken::new()).await;
        assert_eq!(code, EXIT_WATCH);
    }
}
