//! Long-poll watcher for one prefix.

use std::path::PathBuf;
use std::sync::Arc;

use fsconsul_kv_client::{KvError, KvListing, KvStore, ListQuery};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::retry::{BackoffPolicy, retry_with_backoff};
use crate::snapshot::KvSnapshot;

/// Watches one prefix and emits a snapshot each time it changes.
pub struct Watcher {
    /// Store to query.
    store: Arc<dyn KvStore>,

    /// Prefix to watch.
    prefix: String,

    /// Mapping root, created before the first query.
    root: PathBuf,

    /// ACL token.
    token: Option<String>,

    /// Retry policy for blocking queries.
    backoff: BackoffPolicy,
}

/// The receiving ends of a running watcher.
pub struct WatchHandle {
    /// Snapshots, in the order the store produced them.
    pub snapshots: mpsc::Receiver<KvSnapshot>,

    /// At most one terminal error.
    pub errors: mpsc::Receiver<KvError>,

    /// The watcher task.
    pub task: JoinHandle<()>,
}

impl Watcher {
    /// Create a watcher for `prefix`, mirrored at `root`.
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            root: root.into(),
            token: None,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Set the ACL token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the retry policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Start watching on a new task.
    ///
    /// The task stops when `cancel` fires, when the snapshot receiver is
    /// dropped, or after sending a terminal error.
    pub fn spawn(self, buffer: usize, cancel: CancellationToken) -> WatchHandle {
        let (snapshot_tx, snapshots) = mpsc::channel(buffer.max(1));
        let (error_tx, errors) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            if let Err(e) = self.run(&snapshot_tx, &cancel).await {
                error!("Watch of {:?} stopped: {e}", self.prefix);
                // A dropped receiver means nobody is left to tell.
                let _ = error_tx.try_send(e);
            }
        });

        WatchHandle {
            snapshots,
            errors,
            task,
        }
    }

    async fn run(
        &self,
        snapshots: &mpsc::Sender<KvSnapshot>,
        cancel: &CancellationToken,
    ) -> Result<(), KvError> {
        if let Err(e) = tokio::fs::create_dir_all(&self.root).await {
            warn!("Failed to create {}: {e}", self.root.display());
        }

        // No retries on the first query: an unreachable store should fail
        // the mapping right away.
        let query = ListQuery::immediate().with_token(self.token.clone());
        let listing = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            listing = self.store.list(&self.prefix, &query) => listing?,
        };

        let mut index = listing.index;
        info!("Watching {:?} from index {index}", self.prefix);

        if !emit(snapshots, cancel, KvSnapshot::from_listing(&self.prefix, listing)).await {
            return Ok(());
        }

        loop {
            if cancel.is_cancelled() {
                debug!("Watch of {:?} cancelled", self.prefix);
                return Ok(());
            }

            let listing = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                listing = self.blocking_list(index) => listing?,
            };

            debug!(
                "Prefix {:?} index {index} -> {}",
                self.prefix, listing.index
            );

            let next = listing.index;
            if !emit(snapshots, cancel, KvSnapshot::from_listing(&self.prefix, listing)).await {
                return Ok(());
            }

            index = if next < index {
                warn!("Index of {:?} went backwards ({index} -> {next}), resetting", self.prefix);
                0
            } else {
                next
            };
        }
    }

    async fn blocking_list(&self, index: u64) -> Result<KvListing, KvError> {
        let query = ListQuery::blocking(index).with_token(self.token.clone());

        retry_with_backoff(self.backoff, || self.store.list(&self.prefix, &query)).await
    }
}

/// Send `snapshot` unless cancelled first. Returns whether it was delivered.
async fn emit(
    snapshots: &mpsc::Sender<KvSnapshot>,
    cancel: &CancellationToken,
    snapshot: KvSnapshot,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = snapshots.send(snapshot) => sent.is_ok(),
    }
}
