//! Applying reconciliation plans to disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::decrypt::ValueDecrypter;
use crate::diff::ReconciliationPlan;
use crate::error::KeyError;
use crate::path::key_path;

/// Writes and deletes the files below one mapping root.
///
/// Every key is handled on its own: a failure is logged, counted, and the
/// rest of the plan still runs. There is no rollback, so a partly failed
/// plan leaves the last successful write of each key in place.
pub struct Materializer {
    /// Mapping root.
    root: PathBuf,

    /// Transformation applied to each value before writing.
    decrypter: Arc<dyn ValueDecrypter>,
}

impl Materializer {
    /// Create a materializer for `root`.
    pub fn new(root: impl Into<PathBuf>, decrypter: Arc<dyn ValueDecrypter>) -> Self {
        Self {
            root: root.into(),
            decrypter,
        }
    }

    /// The mapping root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Apply `plan`: deletions first, then writes.
    pub async fn apply(&self, plan: &ReconciliationPlan) -> MaterializeReport {
        let mut report = MaterializeReport::default();

        for key in &plan.removed {
            debug!("Key deleted: {key}");
            match self.remove(key).await {
                Ok(true) => report.deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    error!("Failed to delete key file: {e}");
                    report.failed += 1;
                }
            }
        }

        for (key, raw) in &plan.upserted {
            match self.write(key, raw).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    error!("Failed to write key {key}: {e}");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Delete the file for `key`. Returns whether a file was removed.
    async fn remove(&self, key: &str) -> Result<bool, KeyError> {
        let path = key_path(&self.root, key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Already gone: {}", path.display());
                Ok(false)
            }
            Err(source) => Err(KeyError::Io {
                action: "delete",
                path,
                source,
            }),
        }
    }

    /// Write the decrypted value of `key` to its file.
    async fn write(&self, key: &str, raw: &[u8]) -> Result<(), KeyError> {
        let path = key_path(&self.root, key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| KeyError::Io {
                    action: "create parent directory of",
                    path: path.clone(),
                    source,
                })?;
        }

        let contents = match self.decrypter.decrypt(raw) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to decrypt value of {key}, writing it unchanged: {e}");
                raw.to_vec()
            }
        };

        debug!(
            "Key {key}: input length {}, output length {}",
            raw.len(),
            contents.len()
        );

        write_synced(&path, &contents).await?;
        info!("Wrote {} bytes to {}", contents.len(), path.display());

        Ok(())
    }
}

/// Create or truncate `path`, write `contents`, and flush to disk.
///
/// The handle is dropped, and the descriptor closed, before returning on
/// every path.
async fn write_synced(path: &Path, contents: &[u8]) -> Result<(), KeyError> {
    let io_error = |action: &'static str| {
        move |source| KeyError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    };

    let mut file = fs::File::create(path).await.map_err(io_error("create"))?;
    file.write_all(contents).await.map_err(io_error("write"))?;
    file.sync_all().await.map_err(io_error("sync"))?;

    Ok(())
}

/// Counts from applying one plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Files written.
    pub written: usize,

    /// Files deleted.
    pub deleted: usize,

    /// Keys that failed and were skipped.
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decrypt::Passthrough;
    use crate::snapshot::KvMap;
    use fsconsul_secrets::SecretError;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    struct AlwaysFails;

    impl ValueDecrypter for AlwaysFails {
        fn decrypt(&self, _raw: &[u8]) -> Result<Vec<u8>, SecretError> {
            Err(SecretError::Decrypt("test".to_string()))
        }
    }

    struct Uppercase;

    impl ValueDecrypter for Uppercase {
        fn decrypt(&self, raw: &[u8]) -> Result<Vec<u8>, SecretError> {
            Ok(raw.to_ascii_uppercase())
        }
    }

    fn plan(removed: &[&str], upserted: &[(&str, &str)]) -> ReconciliationPlan {
        ReconciliationPlan {
            removed: removed.iter().map(|k| k.to_string()).collect::<BTreeSet<_>>(),
            upserted: upserted
                .iter()
                .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
                .collect::<KvMap>(),
        }
    }

    #[tokio::test]
    async fn test_writes_nested_keys() {
        let dir = TempDir::new().unwrap();
        let materializer = Materializer::new(dir.path(), Arc::new(Passthrough));

        let report = materializer
            .apply(&plan(&[], &[("config", "v1"), ("nested/deep/key", "v2")]))
            .await;

        assert_eq!(report.written, 2);
        assert_eq!(std::fs::read(dir.path().join("config")).unwrap(), b"v1");
        assert_eq!(
            std::fs::read(dir.path().join("nested/deep/key")).unwrap(),
            b"v2"
        );
    }

    #[tokio::test]
    async fn test_apply_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("stale"), "old").unwrap();
        let materializer = Materializer::new(dir.path(), Arc::new(Passthrough));
        let plan = plan(&["stale"], &[("config", "v1")]);

        let first = materializer.apply(&plan).await;
        let second = materializer.apply(&plan).await;

        assert_eq!(first.deleted, 1);
        assert_eq!(second.deleted, 0);
        assert_eq!(second.failed, 0);
        assert_eq!(std::fs::read(dir.path().join("config")).unwrap(), b"v1");
        assert!(!dir.path().join("stale").exists());
    }

    #[tokio::test]
    async fn test_truncates_longer_previous_content() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config"), "a much longer old value").unwrap();
        let materializer = Materializer::new(dir.path(), Arc::new(Passthrough));

        materializer.apply(&plan(&[], &[("config", "new")])).await;
        assert_eq!(std::fs::read(dir.path().join("config")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_decrypt_failure_writes_raw_value() {
        let dir = TempDir::new().unwrap();
        let materializer = Materializer::new(dir.path(), Arc::new(AlwaysFails));

        let report = materializer
            .apply(&plan(&[], &[("secret", "[gosecret|a|b|c|d]")]))
            .await;

        assert_eq!(report.written, 1);
        assert_eq!(
            std::fs::read(dir.path().join("secret")).unwrap(),
            b"[gosecret|a|b|c|d]"
        );
    }

    #[tokio::test]
    async fn test_decrypted_value_is_written() {
        let dir = TempDir::new().unwrap();
        let materializer = Materializer::new(dir.path(), Arc::new(Uppercase));

        materializer.apply(&plan(&[], &[("config", "abc")])).await;
        assert_eq!(std::fs::read(dir.path().join("config")).unwrap(), b"ABC");
    }

    #[tokio::test]
    async fn test_bad_key_does_not_stop_plan() {
        let dir = TempDir::new().unwrap();
        // A file where a directory is needed makes `blocked/child` fail.
        std::fs::write(dir.path().join("blocked"), "file").unwrap();
        let materializer = Materializer::new(dir.path(), Arc::new(Passthrough));

        let report = materializer
            .apply(&plan(
                &[],
                &[("../escape", "x"), ("blocked/child", "y"), ("good", "z")],
            ))
            .await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.written, 1);
        assert_eq!(std::fs::read(dir.path().join("good")).unwrap(), b"z");
        assert!(!dir.path().parent().unwrap().join("escape").exists());
    }
}
