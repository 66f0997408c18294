//! # Secrets
//!
//! Values stored in the KV store may embed encrypted fragments as inline
//! tags. This crate finds those tags and replaces each one with its
//! plaintext, using AES-GCM keys kept in a keystore directory.
//!
//! An encrypted tag has five `|`-separated fields:
//!
//! ```text
//! [gosecret|<auth data>|<base64 ciphertext>|<base64 nonce>|<key name>]
//! ```
//!
//! The auth data is bound to the ciphertext as associated data, and
//! `<key name>` names a file in the keystore holding the base64 encoded key.

pub mod error;
pub mod keystore;
pub mod tag;

pub use error::{Result, SecretError};
pub use keystore::Keystore;
pub use tag::{TAG_PREFIX, decrypt_tags, seal};
