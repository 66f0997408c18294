//! The store-agnostic listing interface.

use async_trait::async_trait;

use crate::error::Result;

/// A single key and its raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    /// Full key, including the queried prefix.
    pub key: String,

    /// Raw value bytes. Keys without a value carry an empty vector.
    pub value: Vec<u8>,
}

impl KvPair {
    /// Create a new pair.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Result of listing a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvListing {
    /// Every pair under the prefix.
    pub pairs: Vec<KvPair>,

    /// Consistency index the store returned with this listing.
    pub index: u64,
}

/// Options for a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Block until the prefix changes past this index. `None` returns
    /// immediately.
    pub wait_index: Option<u64>,

    /// ACL token for the request.
    pub token: Option<String>,
}

impl ListQuery {
    /// A non-blocking query.
    pub fn immediate() -> Self {
        Self::default()
    }

    /// A blocking query that waits for a change past `index`.
    pub fn blocking(index: u64) -> Self {
        Self {
            wait_index: Some(index),
            token: None,
        }
    }

    /// Set the ACL token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }
}

/// A KV store that can list the keys under a prefix.
///
/// Implementations must be safe to call concurrently from many watchers.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// List every pair under `prefix`.
    ///
    /// With a `wait_index` set this is a long-poll: it returns once the
    /// prefix changed past that index or the store's own wait time elapsed.
    async fn list(&self, prefix: &str, query: &ListQuery) -> Result<KvListing>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_query_builders() {
        assert_eq!(ListQuery::immediate().wait_index, None);

        let query = ListQuery::blocking(42).with_token(Some("secret".to_string()));
        assert_eq!(query.wait_index, Some(42));
        assert_eq!(query.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_empty_token_is_dropped() {
        let query = ListQuery::immediate().with_token(Some(String::new()));
        assert_eq!(query.token, None);
    }
}
