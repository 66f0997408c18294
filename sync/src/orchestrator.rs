//! The per-mapping watch/reconcile/hook state machine.

use std::fmt;
use std::sync::Arc;

use fsconsul_kv_client::{KvError, KvStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{EngineOptions, MappingSpec};
use crate::decrypt::decrypter_for;
use crate::diff::{ReconciliationPlan, diff};
use crate::error::SyncError;
use crate::hook::HookInvoker;
use crate::materializer::Materializer;
use crate::snapshot::{KvMap, KvSnapshot};
use crate::status::{EXIT_HOOK, EXIT_SETUP, EXIT_WATCH};
use crate::watcher::{WatchHandle, Watcher};

/// Lifecycle of one mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingState {
    Init,
    StartingWatch,
    AwaitingSnapshot,
    Reconciling,
    InvokingHook,
    Done,
    Failed,
}

impl fmt::Display for MappingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::StartingWatch => "starting_watch",
            Self::AwaitingSnapshot => "awaiting_snapshot",
            Self::Reconciling => "reconciling",
            Self::InvokingHook => "invoking_hook",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a mapping ended.
#[derive(Debug)]
pub enum MappingOutcome {
    /// Run-once mode finished its first reconciliation.
    Completed,

    /// Cancelled, or the watcher went away without an error.
    Stopped,

    /// A fatal error ended the mapping.
    Failed(SyncError),
}

impl MappingOutcome {
    /// Process exit code for this outcome.
    pub fn code(&self) -> i32 {
        match self {
            Self::Completed | Self::Stopped => 0,
            Self::Failed(e) => failure_code(e),
        }
    }
}

/// Exit code for a fatal error.
pub fn failure_code(error: &SyncError) -> i32 {
    match error {
        SyncError::Config(_) | SyncError::Client(_) => EXIT_SETUP,
        SyncError::Watch { .. } => EXIT_WATCH,
        SyncError::Hook(_) => EXIT_HOOK,
    }
}

/// The last reconciled mapping of one orchestrator.
#[derive(Debug, Default)]
pub struct ReconciliationState {
    previous: Option<KvMap>,
}

impl ReconciliationState {
    /// The plan for `next`, or `None` when nothing changed.
    ///
    /// Before the first commit there is nothing to compare with, so a plan
    /// is always returned, possibly an empty one. Run-once mode relies on
    /// this: an empty prefix still completes one cycle, runs the hook and
    /// exits instead of waiting for a change that may never come.
    pub fn plan(&self, next: &KvMap) -> Option<ReconciliationPlan> {
        match &self.previous {
            None => Some(diff(&KvMap::new(), next)),
            Some(previous) => {
                let plan = diff(previous, next);
                (!plan.is_empty()).then_some(plan)
            }
        }
    }

    /// Record `entries` as reconciled.
    pub fn commit(&mut self, entries: KvMap) {
        self.previous = Some(entries);
    }

    /// The last reconciled mapping.
    pub fn previous(&self) -> Option<&KvMap> {
        self.previous.as_ref()
    }
}

/// Logs state transitions of one mapping.
struct StateLog {
    prefix: String,
    current: MappingState,
}

impl StateLog {
    fn enter(&mut self, next: MappingState) {
        debug!("Mapping {:?}: {} -> {next}", self.prefix, self.current);
        self.current = next;
    }
}

/// Runs one mapping from first query to a terminal state.
pub struct MappingOrchestrator {
    spec: MappingSpec,
    store: Arc<dyn KvStore>,
    token: Option<String>,
    options: EngineOptions,
    run_once: bool,
    materializer: Materializer,
    hook: Option<HookInvoker>,
    state: ReconciliationState,
    log: StateLog,
}

impl MappingOrchestrator {
    /// Create an orchestrator for a resolved mapping.
    pub fn new(
        spec: MappingSpec,
        store: Arc<dyn KvStore>,
        token: Option<String>,
        options: EngineOptions,
        run_once: bool,
    ) -> Self {
        let materializer = Materializer::new(
            spec.local_root.clone(),
            decrypter_for(spec.keystore.as_deref()),
        );
        let hook = spec.on_change.as_deref().and_then(HookInvoker::new);
        let log = StateLog {
            prefix: spec.prefix.clone(),
            current: MappingState::Init,
        };

        Self {
            spec,
            store,
            token,
            options,
            run_once,
            materializer,
            hook,
            state: ReconciliationState::default(),
            log,
        }
    }

    /// Run until done, failed, or cancelled.
    ///
    /// The watcher runs on a child of `cancel` and is always stopped and
    /// joined before this returns.
    pub async fn run(mut self, cancel: CancellationToken) -> MappingOutcome {
        info!(
            "Mirroring {:?} to {}",
            self.spec.prefix,
            self.spec.local_root.display()
        );

        self.log.enter(MappingState::StartingWatch);
        let watch_cancel = cancel.child_token();
        let WatchHandle {
            mut snapshots,
            mut errors,
            task,
        } = Watcher::new(
            Arc::clone(&self.store),
            self.spec.prefix.clone(),
            self.spec.local_root.clone(),
        )
        .with_token(self.token.clone())
        .with_backoff(self.options.backoff)
        .spawn(self.options.snapshot_buffer, watch_cancel.clone());

        let outcome = self.drive(&mut snapshots, &mut errors, &cancel).await;

        watch_cancel.cancel();
        drop(snapshots);
        if let Err(e) = task.await {
            warn!("Watcher for {:?} ended abnormally: {e}", self.spec.prefix);
        }

        match &outcome {
            MappingOutcome::Completed => self.log.enter(MappingState::Done),
            MappingOutcome::Stopped => debug!("Mapping {:?} stopped", self.spec.prefix),
            MappingOutcome::Failed(e) => {
                error!("Mapping {:?} failed: {e}", self.spec.prefix);
                self.log.enter(MappingState::Failed);
            }
        }

        outcome
    }

    async fn drive(
        &mut self,
        snapshots: &mut mpsc::Receiver<KvSnapshot>,
        errors: &mut mpsc::Receiver<KvError>,
        cancel: &CancellationToken,
    ) -> MappingOutcome {
        loop {
            self.log.enter(MappingState::AwaitingSnapshot);

            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return MappingOutcome::Stopped,
                Some(snapshot) = snapshots.recv() => snapshot,
                Some(source) = errors.recv() => {
                    return MappingOutcome::Failed(SyncError::Watch {
                        prefix: self.spec.prefix.clone(),
                        source,
                    });
                }
                else => return MappingOutcome::Stopped,
            };

            self.log.enter(MappingState::Reconciling);
            let Some(plan) = self.state.plan(&snapshot.entries) else {
                debug!(
                    "No changes under {:?} at index {}",
                    self.spec.prefix, snapshot.index
                );
                continue;
            };

            let report = self.materializer.apply(&plan).await;
            info!(
                "Reconciled {:?} at index {}: {} written, {} deleted, {} failed",
                self.spec.prefix, snapshot.index, report.written, report.deleted, report.failed
            );
            self.state.commit(snapshot.entries);

            if let Some(hook) = &self.hook {
                self.log.enter(MappingState::InvokingHook);
                if let Err(e) = hook.run().await {
                    return MappingOutcome::Failed(e.into());
                }
            }

            if self.run_once {
                return MappingOutcome::Completed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(entries: &[(&str, &str)]) -> KvMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_first_plan_is_never_suppressed() {
        let state = ReconciliationState::default();
        let plan = state.plan(&KvMap::new()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_unchanged_snapshot_is_suppressed() {
        let mut state = ReconciliationState::default();
        state.commit(map(&[("config", "v1")]));

        assert_eq!(state.plan(&map(&[("config", "v1")])), None);
    }

    #[test]
    fn test_changed_snapshot_yields_plan() {
        let mut state = ReconciliationState::default();
        state.commit(map(&[("config", "v1"), ("old", "x")]));

        let plan = state.plan(&map(&[("config", "v2")])).unwrap();
        assert_eq!(plan.removed.into_iter().collect::<Vec<_>>(), vec!["old"]);
        assert_eq!(plan.upserted, map(&[("config", "v2")]));
    }

    #[test]
    fn test_commit_replaces_previous() {
        let mut state = ReconciliationState::default();
        state.commit(map(&[("a", "1")]));
        state.commit(map(&[("b", "2")]));
        assert_eq!(state.previous(), Some(&map(&[("b", "2")])));
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(MappingOutcome::Completed.code(), 0);
        assert_eq!(MappingOutcome::Stopped.code(), 0);

        let watch = SyncError::Watch {
            prefix: "app".to_string(),
            source: KvError::InvalidResponse("down".to_string()),
        };
        assert_eq!(MappingOutcome::Failed(watch).code(), EXIT_WATCH);

        let config = SyncError::Config(crate::error::ConfigError::EmptyPath("app".to_string()));
        assert_eq!(MappingOutcome::Failed(config).code(), EXIT_SETUP);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(MappingState::AwaitingSnapshot.to_string(), "awaiting_snapshot");
        assert_eq!(MappingState::InvokingHook.to_string(), "invoking_hook");
    }
}
