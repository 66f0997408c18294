//! Point-in-time view of a prefix.

use std::collections::BTreeMap;

use fsconsul_kv_client::KvListing;
use tracing::debug;

/// Relative key to raw value.
pub type KvMap = BTreeMap<String, Vec<u8>>;

/// The full state of a prefix at one consistency index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvSnapshot {
    /// Values by relative key.
    pub entries: KvMap,

    /// Index the store returned with the query.
    pub index: u64,
}

impl KvSnapshot {
    /// Build a snapshot from a listing of `prefix`.
    ///
    /// Keys are made relative by removing the prefix and any leading `/`.
    /// Folder markers (an empty relative key, or one ending in `/`) are
    /// skipped since they have no file to back them.
    pub fn from_listing(prefix: &str, listing: KvListing) -> Self {
        let mut entries = KvMap::new();

        for pair in listing.pairs {
            let relative = relative_key(prefix, &pair.key);
            if relative.is_empty() || relative.ends_with('/') {
                debug!("Skipping folder key {:?}", pair.key);
                continue;
            }
            entries.insert(relative.to_string(), pair.value);
        }

        Self {
            entries,
            index: listing.index,
        }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the prefix has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strip `prefix` and then leading separators from `key`.
pub fn relative_key<'a>(prefix: &str, key: &'a str) -> &'a str {
    key.strip_prefix(prefix)
        .unwrap_or(key)
        .trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsconsul_kv_client::KvPair;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_relative_key() {
        assert_eq!(relative_key("app", "app/config"), "config");
        assert_eq!(relative_key("app/", "app/nested/key"), "nested/key");
        assert_eq!(relative_key("app", "app//config"), "config");
        assert_eq!(relative_key("", "/top"), "top");
    }

    #[test]
    fn test_from_listing_skips_folders() {
        let listing = KvListing {
            pairs: vec![
                KvPair::new("app", ""),
                KvPair::new("app/dir/", ""),
                KvPair::new("app/dir/file", "x"),
                KvPair::new("app/config", "v1"),
            ],
            index: 9,
        };

        let snapshot = KvSnapshot::from_listing("app", listing);
        assert_eq!(snapshot.index, 9);
        assert_eq!(
            snapshot.entries.keys().collect::<Vec<_>>(),
            vec!["config", "dir/file"]
        );
    }
}
