//! Core types for tasks and their checklist items.

use crate::error::{TaskError, TaskResult};
use serde::{Deserialize, Serialize};

/// Maximum length of a task name or item title, in characters.
pub const MAX_TEXT_LEN: usize = 1000;

/// Maximum length of a caller-supplied id.
pub const MAX_ID_LEN: usize = 36;

/// Validate a user-editable text field (task name, item title).
pub fn validate_text(field: &'static str, value: &str) -> TaskResult<()> {
    if value.trim().is_empty() {
        return Err(TaskError::missing_field(field));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(TaskError::invalid_value(
            field,
            format!("{} must be at most {} characters", field, MAX_TEXT_LEN),
        ));
    }
    Ok(())
}

/// Validate a caller-supplied id.
pub fn validate_id(field: &'static str, value: &str) -> TaskResult<()> {
    if value.is_empty() {
        return Err(TaskError::missing_field(field));
    }
    if value.len() > MAX_ID_LEN {
        return Err(TaskError::invalid_value(
            field,
            format!("{} must be at most {} characters", field, MAX_ID_LEN),
        ));
    }
    Ok(())
}

/// A task owning an ordered checklist of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    /// Owned items in append order.
    pub items: Vec<Item>,
    /// Cached completion state, maintained by the coordinator.
    pub is_completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Number of items that are checked off.
    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_completed).count()
    }
}

/// A checklist entry belonging to exactly one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub is_completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for appending a new item to a task.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    /// Explicit id; a UUIDv7 is generated when absent.
    pub id: Option<String>,
    pub title: String,
    pub is_completed: bool,
}

impl NewItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            is_completed: false,
        }
    }

    pub fn completed(mut self, done: bool) -> Self {
        self.is_completed = done;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Field changes applied to an existing item. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub is_completed: Option<bool>,
}

impl ItemUpdate {
    pub fn complete() -> Self {
        Self {
            title: None,
            is_completed: Some(true),
        }
    }

    pub fn revert() -> Self {
        Self {
            title: None,
            is_completed: Some(false),
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            is_completed: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.is_completed.is_none()
    }
}

/// Predicate over a task's completion flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl TaskFilter {
    /// Whether a task with the given completion flag satisfies this filter.
    pub fn matches(&self, is_completed: bool) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Pending => !is_completed,
            TaskFilter::Completed => is_completed,
        }
    }

    /// SQL fragment for the WHERE clause (empty for `All`).
    pub(crate) fn sql_predicate(&self) -> &'static str {
        match self {
            TaskFilter::All => "",
            TaskFilter::Pending => "WHERE is_completed = 0",
            TaskFilter::Completed => "WHERE is_completed = 1",
        }
    }
}

/// A change in a task's completion state caused by an item mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The task became complete.
    Completed,
    /// The task went back to pending.
    Reopened,
}

/// Result of a coordinated item mutation.
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    /// Parent task as committed, items included.
    pub task: Task,
    /// Item created or updated by the operation (none for deletions).
    pub item: Option<Item>,
    /// Ids actually removed by a deletion; already-missing ids are left out.
    pub deleted: Vec<String>,
    pub transition: Option<Transition>,
}

impl MutationOutcome {
    /// True when the parent task has no items left.
    pub fn is_empty(&self) -> bool {
        self.task.items.is_empty()
    }
}
