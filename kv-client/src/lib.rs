//! # KV Client
//!
//! This crate provides read access to a Consul KV store for fsconsul.
//! It exposes a single operation, listing every key under a prefix, in two
//! flavors: an immediate list, and a blocking (long-poll) list that the
//! server holds open until the prefix changes past a given index.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         KV Client                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ConsulConfig ──► ConsulClient ──► KvListing                   │
//! │       │                │              │                         │
//! │       ▼                ▼              ▼                         │
//! │   TLS material     KvStore trait   KvPair + index              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod consul;
pub mod error;
pub mod store;

pub use config::{ConsulConfig, DEFAULT_ADDR};
pub use consul::ConsulClient;
pub use error::{KvError, Result};
pub use store::{KvListing, KvPair, KvStore, ListQuery};
