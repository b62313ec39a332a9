//! Filtered task list model backing a pending or completed tasks screen.
//!
//! The list attaches a live query only once it has seen a non-empty result,
//! so while empty it would miss the first task moving into it. To cover that
//! gap it listens on the notification bus: an event for a task that belongs
//! in this list but is not visible triggers one explicit re-query.
//!
//! Fetched and live results carry the database revision they were read at;
//! a result older than the one on screen is dropped.

use crate::bus::{EventKind, NotificationBus, SubscriptionId, TaskEvent};
use crate::db::Database;
use crate::db::live::{ChangeSet, LiveQuery};
use crate::types::{Task, TaskFilter};
use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

#[derive(Default)]
struct ViewState {
    tasks: Vec<Task>,
    revision: u64,
    live: Option<LiveQuery>,
    manual_refreshes: usize,
    live_updates: usize,
    last_changes: Option<ChangeSet>,
}

struct ViewInner {
    db: Database,
    filter: TaskFilter,
    state: Mutex<ViewState>,
}

impl ViewInner {
    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_event(self: &Arc<Self>, event: &TaskEvent) {
        // A task whose new state falls outside this list cannot be missing from it
        if !self.filter.matches(event.is_completed) {
            return;
        }
        let visible = self.state().tasks.iter().any(|t| t.id == event.task_id);
        if visible {
            return;
        }

        debug!(
            filter = ?self.filter,
            task_id = %event.task_id,
            "Task missing from list, re-querying"
        );
        if let Err(err) = self.refetch() {
            warn!(filter = ?self.filter, error = %err, "Manual task list refresh failed");
        }
    }

    fn refetch(self: &Arc<Self>) -> Result<()> {
        self.state().manual_refreshes += 1;
        self.load()
    }

    /// Fetch the list and attach the live query once it has rows.
    fn load(self: &Arc<Self>) -> Result<()> {
        let (revision, tasks) = self.db.list_tasks_with_revision(self.filter)?;
        let needs_live = {
            let mut state = self.state();
            state.apply(revision, tasks);
            state.live.is_none() && !state.tasks.is_empty()
        };
        if needs_live {
            self.attach_live()?;
        }
        Ok(())
    }

    fn attach_live(self: &Arc<Self>) -> Result<()> {
        let weak: Weak<ViewInner> = Arc::downgrade(self);
        let live = self.db.observe_tasks(self.filter, move |changes, tasks| {
            if let Some(inner) = weak.upgrade() {
                let mut state = inner.state();
                if state.apply(changes.revision, tasks.to_vec()) {
                    state.live_updates += 1;
                    state.last_changes = Some(changes.clone());
                }
            }
        })?;

        let attached = {
            let mut state = self.state();
            if state.live.is_none() {
                state.live = Some(live);
                true
            } else {
                false
            }
        };
        if attached {
            // Writes between our fetch and registration are in the baseline only
            self.load()?;
        }
        Ok(())
    }
}

impl ViewState {
    /// Replace the visible tasks unless `revision` is older than what is shown.
    fn apply(&mut self, revision: u64, tasks: Vec<Task>) -> bool {
        if revision < self.revision {
            return false;
        }
        self.revision = revision;
        self.tasks = tasks;
        true
    }
}

/// A task list filtered by completion state.
pub struct TaskListView {
    inner: Arc<ViewInner>,
    bus: Arc<NotificationBus>,
    subscriptions: Vec<SubscriptionId>,
}

impl TaskListView {
    /// Fetch the initial list and start listening for changes.
    pub fn new(db: Database, bus: Arc<NotificationBus>, filter: TaskFilter) -> Result<Self> {
        let inner = Arc::new(ViewInner {
            db,
            filter,
            state: Mutex::new(ViewState::default()),
        });

        // Listen before the first fetch so no event slips in between
        let subscriptions = [EventKind::TaskCompletion, EventKind::TaskPending]
            .into_iter()
            .map(|kind| {
                let weak = Arc::downgrade(&inner);
                bus.subscribe(kind, move |event| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_event(event);
                    }
                })
            })
            .collect();
        let view = Self {
            inner,
            bus,
            subscriptions,
        };

        view.inner.load()?;
        Ok(view)
    }

    pub fn filter(&self) -> TaskFilter {
        self.inner.filter
    }

    /// Currently visible tasks, in list order.
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.state().tasks.clone()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.inner.state().tasks.iter().map(|t| t.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.state().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live query is attached.
    pub fn is_live(&self) -> bool {
        self.inner.state().live.is_some()
    }

    /// Number of explicit re-queries performed, including [`refresh`](Self::refresh).
    pub fn manual_refreshes(&self) -> usize {
        self.inner.state().manual_refreshes
    }

    /// Number of change sets received from the live query.
    pub fn live_updates(&self) -> usize {
        self.inner.state().live_updates
    }

    pub fn last_changes(&self) -> Option<ChangeSet> {
        self.inner.state().last_changes.clone()
    }

    /// Re-query on demand.
    pub fn refresh(&self) -> Result<()> {
        self.inner.refetch()
    }
}

impl Drop for TaskListView {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}
