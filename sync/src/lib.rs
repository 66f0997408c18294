//! # Sync
//!
//! This crate keeps local directories in step with prefixes of a KV store.
//! Each configured mapping gets its own orchestrator, which owns a watcher
//! task long-polling the store and applies every changed snapshot to disk
//! before running the mapping's on-change command.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Coordinator                            │
//! │                 (one orchestrator per mapping)                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Watcher ──snapshots──► MappingOrchestrator ──► HookInvoker     │
//! │     │     ──errors───►        │                                 │
//! │     ▼                         ▼                                 │
//! │  retry_with_backoff      diff ──► Materializer ──► files        │
//! │     │                                  │                        │
//! │     ▼                                  ▼                        │
//! │  KvStore                         ValueDecrypter                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use fsconsul_sync::{MappingConfig, WatchConfig, start_all};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = WatchConfig {
//!     run_once: true,
//!     mappings: vec![MappingConfig::new("app", "/etc/app")],
//!     ..WatchConfig::default()
//! };
//! let status = start_all(&config, CancellationToken::new()).await;
//! std::process::exit(status.exit_code());
//! ```

pub mod config;
pub mod coordinator;
pub mod decrypt;
pub mod diff;
pub mod error;
pub mod hook;
pub mod materializer;
pub mod orchestrator;
pub mod path;
pub mod retry;
pub mod snapshot;
pub mod status;
pub mod watcher;

pub use config::{EngineOptions, MappingConfig, MappingSpec, WatchConfig};
pub use coordinator::{Coordinator, start_all, start_mapping};
pub use decrypt::{Passthrough, ValueDecrypter, decrypter_for};
pub use diff::{ReconciliationPlan, diff};
pub use error::{ConfigError, HookError, KeyError, Result, SyncError};
pub use hook::HookInvoker;
pub use materializer::{MaterializeReport, Materializer};
pub use orchestrator::{MappingOrchestrator, MappingOutcome, MappingState, ReconciliationState};
pub use retry::{BackoffPolicy, retry_with_backoff};
pub use snapshot::{KvMap, KvSnapshot};
pub use status::{AggregateStatus, EXIT_HOOK, EXIT_SETUP, EXIT_WATCH, MappingStatus, STILL_RUNNING};
pub use watcher::{WatchHandle, Watcher};
