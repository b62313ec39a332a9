//! Task completion coordinator.
//!
//! Every item mutation flows through here. One logical mutation runs in
//! this order:
//!
//! 1. persist the item change,
//! 2. re-evaluate the completion rule against the post-mutation items,
//! 3. persist the task's completion flag if it differs, and refresh its
//!    `updated_at` whenever an item was added, removed or checked/unchecked,
//! 4. publish at most one of `TaskCompletion` / `TaskPending`,
//! 5. play success feedback if the task just completed.
//!
//! Steps 1-3 share one immediate transaction, so a failure anywhere in them
//! leaves both rows untouched and nothing is published.

use crate::bus::{NotificationBus, TaskEvent};
use crate::completion::Verdict;
use crate::db::items::{delete_item_internal, insert_item_internal, load_items_internal, update_item_internal};
use crate::db::tasks::{get_task_internal, set_completion_internal, touch_task_internal};
use crate::db::{Database, now_ms};
use crate::error::{TaskError, TaskResult};
use crate::feedback::{Feedback, FeedbackKind};
use crate::types::{ItemUpdate, MutationOutcome, NewItem, Task, Transition, validate_id, validate_text};
use anyhow::Result;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrates item mutations and the resulting task state changes.
#[derive(Clone)]
pub struct TaskCompletionCoordinator {
    db: Database,
    bus: Arc<NotificationBus>,
    feedback: Arc<dyn Feedback>,
}

impl TaskCompletionCoordinator {
    pub fn new(db: Database, bus: Arc<NotificationBus>, feedback: Arc<dyn Feedback>) -> Self {
        Self { db, bus, feedback }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    /// Append a new item to a task.
    ///
    /// A completed parent is always reopened, even when the new item is
    /// itself done: the completion rule is not consulted here.
    pub fn on_item_created(&self, task_id: &str, new_item: NewItem) -> TaskResult<MutationOutcome> {
        let result = self.item_created(task_id, &new_item);
        self.finish("item_created", task_id, result)
    }

    /// Apply field changes to an item of `task_id`, then recompute the task.
    pub fn on_item_mutated(
        &self,
        task_id: &str,
        item_id: &str,
        update: ItemUpdate,
    ) -> TaskResult<MutationOutcome> {
        let result = self.item_mutated(task_id, item_id, &update);
        self.finish("item_mutated", task_id, result)
    }

    /// Like [`on_item_mutated`](Self::on_item_mutated), resolving the parent
    /// task from the item itself.
    pub fn on_item_edited(&self, item_id: &str, update: ItemUpdate) -> TaskResult<MutationOutcome> {
        let parent = match self.db.item_parent(item_id) {
            Ok(Some(parent)) => parent,
            Ok(None) => return Err(self.edit_failed(item_id, TaskError::item_not_found(item_id))),
            Err(err) => return Err(self.edit_failed(item_id, err.into())),
        };
        self.on_item_mutated(&parent, item_id, update)
    }

    /// Delete items of a task, then recompute the task.
    ///
    /// Ids that are already gone are skipped. Returns `None` when the task
    /// itself no longer exists, in which case its items went with it.
    pub fn on_item_deleted<S: AsRef<str>>(
        &self,
        task_id: &str,
        item_ids: &[S],
    ) -> TaskResult<Option<MutationOutcome>> {
        let ids: Vec<&str> = item_ids.iter().map(AsRef::as_ref).collect();
        let result = self.item_deleted(task_id, &ids);
        self.finish("item_deleted", task_id, result)
    }

    fn item_created(&self, task_id: &str, new_item: &NewItem) -> TaskResult<MutationOutcome> {
        if let Some(ref id) = new_item.id {
            validate_id("id", id)?;
        }
        validate_text("title", &new_item.title)?;
        let now = now_ms();

        let outcome = self.db.write(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut task = load_task(&tx, task_id)?;

            let item = insert_item_internal(&tx, task_id, new_item, now)?;
            task.items.push(item.clone());

            let transition = if task.is_completed {
                set_completion_internal(&tx, task_id, false, now)?;
                task.is_completed = false;
                Some(Transition::Reopened)
            } else {
                touch_task_internal(&tx, task_id, now)?;
                None
            };
            task.updated_at = now;

            tx.commit()?;
            Ok(MutationOutcome {
                task,
                item: Some(item),
                deleted: Vec::new(),
                transition,
            })
        })?;

        debug!(task_id = %task_id, item_id = ?outcome.item.as_ref().map(|i| &i.id), "Item created");
        self.announce(&outcome);
        Ok(outcome)
    }

    fn item_mutated(
        &self,
        task_id: &str,
        item_id: &str,
        update: &ItemUpdate,
    ) -> TaskResult<MutationOutcome> {
        if update.is_empty() {
            return Err(TaskError::invalid_value("update", "nothing to update"));
        }
        if let Some(ref title) = update.title {
            validate_text("title", title)?;
        }
        let now = now_ms();

        let outcome = self.db.write(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut task = load_task(&tx, task_id)?;

            let was_completed = task
                .items
                .iter()
                .find(|i| i.id == item_id)
                .map(|i| i.is_completed);
            let item = update_item_internal(&tx, task_id, item_id, update, now)?;
            task.items = load_items_internal(&tx, task_id)?;

            let toggled = was_completed != Some(item.is_completed);
            let transition = recompute(&tx, &mut task, toggled, now)?;

            tx.commit()?;
            Ok(MutationOutcome {
                task,
                item: Some(item),
                deleted: Vec::new(),
                transition,
            })
        })?;

        debug!(task_id = %task_id, item_id = %item_id, "Item updated");
        self.announce(&outcome);
        Ok(outcome)
    }

    fn item_deleted(&self, task_id: &str, item_ids: &[&str]) -> TaskResult<Option<MutationOutcome>> {
        let now = now_ms();

        let outcome = self.db.write(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(mut task) = get_task_internal(&tx, task_id)? else {
                return Ok(None);
            };

            let mut deleted = Vec::new();
            for &item_id in item_ids {
                if delete_item_internal(&tx, task_id, item_id)? {
                    deleted.push(item_id.to_string());
                } else {
                    debug!(task_id = %task_id, item_id = %item_id, "Item already gone, skipping");
                }
            }
            task.items = load_items_internal(&tx, task_id)?;

            let transition = recompute(&tx, &mut task, !deleted.is_empty(), now)?;

            tx.commit()?;
            Ok(Some(MutationOutcome {
                task,
                item: None,
                deleted,
                transition,
            }))
        })?;

        match outcome {
            Some(ref outcome) => {
                debug!(task_id = %task_id, deleted = outcome.deleted.len(), "Items deleted");
                self.announce(outcome);
            }
            None => debug!(task_id = %task_id, "Task already gone, item delete is a no-op"),
        }
        Ok(outcome)
    }

    /// Steps 4 and 5: publish and play feedback after a committed transition.
    fn announce(&self, outcome: &MutationOutcome) {
        let Some(transition) = outcome.transition else {
            return;
        };
        let task = &outcome.task;

        match transition {
            Transition::Completed => {
                info!(task_id = %task.id, "Task completed");
                self.bus.publish(&TaskEvent::completed(task));
                self.play(FeedbackKind::Success);
            }
            Transition::Reopened => {
                info!(task_id = %task.id, "Task reopened");
                self.bus.publish(&TaskEvent::pending(task));
            }
        }
    }

    fn finish<T>(&self, op: &'static str, task_id: &str, result: TaskResult<T>) -> TaskResult<T> {
        if let Err(ref err) = result {
            warn!(op, task_id = %task_id, code = ?err.code(), error = %err, "Item operation failed");
            self.play(FeedbackKind::Error);
        }
        result
    }

    /// Failure before the parent task is known.
    fn edit_failed(&self, item_id: &str, err: TaskError) -> TaskError {
        warn!(op = "item_edited", item_id = %item_id, code = ?err.code(), error = %err, "Item operation failed");
        self.play(FeedbackKind::Error);
        err
    }

    fn play(&self, kind: FeedbackKind) {
        if let Err(err) = self.feedback.play(kind) {
            warn!(?kind, error = %err, "Feedback failed");
        }
    }
}

fn load_task(conn: &Connection, task_id: &str) -> Result<Task> {
    let task = get_task_internal(conn, task_id)?.ok_or_else(|| TaskError::task_not_found(task_id))?;
    Ok(task)
}

/// Apply the completion rule to `task` and persist a changed flag.
///
/// `items_changed` refreshes `updated_at` even when the flag stays put.
fn recompute(
    conn: &Connection,
    task: &mut Task,
    items_changed: bool,
    now: i64,
) -> Result<Option<Transition>> {
    let transition = match (task.should_complete(), task.is_completed) {
        (Verdict::Complete, false) => Transition::Completed,
        (Verdict::Pending, true) => Transition::Reopened,
        _ => {
            if items_changed {
                touch_task_internal(conn, &task.id, now)?;
                task.updated_at = now;
            }
            return Ok(None);
        }
    };

    let done = transition == Transition::Completed;
    set_completion_internal(conn, &task.id, done, now)?;
    task.is_completed = done;
    task.updated_at = now;
    Ok(Some(transition))
}
