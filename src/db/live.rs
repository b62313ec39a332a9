//! Live task queries.
//!
//! A live query re-runs its predicate after every committed write and pushes
//! an ordered change set to its callback when the result moved. Indices in
//! `deletions` refer to the previous result; `insertions` and `modifications`
//! refer to the new one. A row whose relative position changed is reported as
//! a deletion plus an insertion.
//!
//! Refreshes from concurrent writers are serialized, so each one queries a
//! state at least as new as the one delivered before it. Callbacks run while
//! that ordering is held and must not write to the same database.

use super::Database;
use crate::types::{Task, TaskFilter};
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

/// Ordered change batch for one live query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub insertions: Vec<usize>,
    pub deletions: Vec<usize>,
    pub modifications: Vec<usize>,
    /// Database revision the new result was read at.
    pub revision: u64,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.deletions.is_empty() && self.modifications.is_empty()
    }
}

/// Identity plus the fields whose change counts as a modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RowKey {
    id: String,
    fingerprint: (i64, bool, String, usize, usize),
}

impl RowKey {
    pub(crate) fn of(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            fingerprint: (
                task.updated_at,
                task.is_completed,
                task.name.clone(),
                task.items.len(),
                task.completed_count(),
            ),
        }
    }
}

/// Compute the change set turning `old` into `new`.
pub(crate) fn diff(old: &[RowKey], new: &[RowKey]) -> ChangeSet {
    let old_pos: HashMap<&str, usize> = old
        .iter()
        .enumerate()
        .map(|(i, key)| (key.id.as_str(), i))
        .collect();

    // Rows present on both sides, in new order, with their old index
    let common: Vec<(usize, usize)> = new
        .iter()
        .enumerate()
        .filter_map(|(ni, key)| old_pos.get(key.id.as_str()).map(|&oi| (ni, oi)))
        .collect();
    let old_indices: Vec<usize> = common.iter().map(|&(_, oi)| oi).collect();
    let keep = longest_increasing(&old_indices);

    let mut changes = ChangeSet::default();
    let mut stayed = vec![false; old.len()];

    for (idx, &(ni, oi)) in common.iter().enumerate() {
        if keep[idx] {
            stayed[oi] = true;
            if old[oi].fingerprint != new[ni].fingerprint {
                changes.modifications.push(ni);
            }
        } else {
            changes.insertions.push(ni);
        }
    }

    for (ni, key) in new.iter().enumerate() {
        if !old_pos.contains_key(key.id.as_str()) {
            changes.insertions.push(ni);
        }
    }
    changes.insertions.sort_unstable();

    changes.deletions = (0..old.len()).filter(|&oi| !stayed[oi]).collect();
    changes
}

/// Mask of one longest strictly increasing subsequence of `seq`.
fn longest_increasing(seq: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut keep = vec![false; seq.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        keep[i] = true;
        cursor = prev[i];
    }
    keep
}

type Callback = Box<dyn Fn(&ChangeSet, &[Task]) + Send + Sync>;

struct Observer {
    id: u64,
    filter: TaskFilter,
    snapshot: Mutex<Vec<RowKey>>,
    callback: Callback,
}

/// Registered live queries of one database.
#[derive(Default)]
pub(crate) struct LiveRegistry {
    next_id: AtomicU64,
    /// Count of committed writes.
    revision: AtomicU64,
    observers: Mutex<Vec<Arc<Observer>>>,
    /// Held from query to callback so deliveries follow commit order.
    delivery: Mutex<()>,
}

impl LiveRegistry {
    /// Record a commit. Called with the connection lock held.
    pub(crate) fn bump(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    fn delivering(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, filter: TaskFilter, snapshot: Vec<RowKey>, callback: Callback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let observer = Arc::new(Observer {
            id,
            filter,
            snapshot: Mutex::new(snapshot),
            callback,
        });
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
        id
    }

    fn remove(&self, id: u64) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|o| o.id != id);
        observers.len() != before
    }

    fn len(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Re-run every registered query and notify those whose result changed.
    pub(crate) fn refresh(&self, db: &Database) {
        let _delivering = self.delivering();
        let observers: Vec<Arc<Observer>> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for observer in observers {
            let (revision, tasks) = match db.list_tasks_with_revision(observer.filter) {
                Ok(result) => result,
                Err(err) => {
                    warn!(query = observer.id, error = %err, "Live query refresh failed");
                    continue;
                }
            };
            let keys: Vec<RowKey> = tasks.iter().map(RowKey::of).collect();

            let changes = {
                let mut snapshot = observer
                    .snapshot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let mut changes = diff(&snapshot, &keys);
                if !changes.is_empty() {
                    *snapshot = keys;
                    changes.revision = revision;
                }
                changes
            };

            if changes.is_empty() {
                continue;
            }
            debug!(
                query = observer.id,
                revision,
                insertions = changes.insertions.len(),
                deletions = changes.deletions.len(),
                modifications = changes.modifications.len(),
                "Live query changed"
            );
            (observer.callback)(&changes, &tasks);
        }
    }
}

/// Handle to a registered live query. Dropping it unregisters the query.
pub struct LiveQuery {
    id: u64,
    filter: TaskFilter,
    registry: Weak<LiveRegistry>,
}

impl LiveQuery {
    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    /// Stop receiving change sets.
    pub fn cancel(self) {}
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl Database {
    /// Observe the tasks matching `filter`.
    ///
    /// The current result is taken as the baseline; the callback only fires
    /// for later changes, with the change set and the fresh result.
    pub fn observe_tasks<F>(&self, filter: TaskFilter, callback: F) -> Result<LiveQuery>
    where
        F: Fn(&ChangeSet, &[Task]) + Send + Sync + 'static,
    {
        let id = {
            let _delivering = self.live.delivering();
            let baseline = self.list_tasks(filter)?;
            let snapshot = baseline.iter().map(RowKey::of).collect();
            self.live.register(filter, snapshot, Box::new(callback))
        };

        Ok(LiveQuery {
            id,
            filter,
            registry: Arc::downgrade(&self.live),
        })
    }

    /// Number of live queries currently registered.
    pub fn live_query_count(&self) -> usize {
        self.live.len()
    }
}
