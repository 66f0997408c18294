//! Turning two snapshots into a reconciliation plan.

use std::collections::BTreeSet;

use crate::snapshot::KvMap;

/// The filesystem changes needed to move from one snapshot to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Keys whose files must be deleted.
    pub removed: BTreeSet<String>,

    /// Keys whose files must be (re)written, with their raw values.
    pub upserted: KvMap,
}

impl ReconciliationPlan {
    /// Whether the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.upserted.is_empty()
    }
}

/// Compare the previously reconciled mapping with a new one.
///
/// Identical mappings give an empty plan. Otherwise every key of `next` is
/// upserted, unchanged values included, and every key missing from `next`
/// is removed.
pub fn diff(previous: &KvMap, next: &KvMap) -> ReconciliationPlan {
    if previous == next {
        return ReconciliationPlan::default();
    }

    let removed = previous
        .keys()
        .filter(|key| !next.contains_key(*key))
        .cloned()
        .collect();

    ReconciliationPlan {
        removed,
        upserted: next.clone(),
    }
}
