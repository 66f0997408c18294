//! # fsconsul
//!
//! Entry point of the `fsconsul` binary: parses arguments, sets up logging
//! and hands every mapping to the sync engine.

pub mod args;

use anyhow::Context;
use fsconsul_sync::start_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub use args::{Cli, CliError};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

/// Log to stderr, filtered by `RUST_LOG`.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(DEFAULT_LOG_FILTER).context("invalid default log filter")?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

/// Cancel `cancel` on Ctrl-C.
fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, stopping all mappings");
                cancel.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {e}"),
        }
    });
}

/// Run with parsed arguments and return the process exit code.
pub async fn run(cli: Cli) -> i32 {
    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return e.exit_code();
        }
    };

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let status = start_all(&config, cancel).await;
    for failed in status.failures() {
        error!("Mapping {:?} failed with code {}", failed.prefix, failed.code);
    }

    status.exit_code()
}
