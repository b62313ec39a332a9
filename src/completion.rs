//! Completion rule: derives a task's target completion state from its items.
//!
//! The rule is pure and always evaluated against the full post-mutation item
//! set, never incrementally.

use crate::types::{Item, Task};
use serde::Serialize;

/// Outcome of evaluating the completion rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every item is checked off.
    Complete,
    /// At least one item is still open.
    Pending,
    /// No items: the rule has no opinion and the task keeps its state.
    Unchanged,
}

impl Verdict {
    /// The completion flag this verdict asks for, if any.
    pub fn target(self) -> Option<bool> {
        match self {
            Verdict::Complete => Some(true),
            Verdict::Pending => Some(false),
            Verdict::Unchanged => None,
        }
    }
}

/// Evaluate the completion rule over a set of items.
pub fn should_complete(items: &[Item]) -> Verdict {
    if items.is_empty() {
        Verdict::Unchanged
    } else if items.iter().all(|item| item.is_completed) {
        Verdict::Complete
    } else {
        Verdict::Pending
    }
}

impl Task {
    /// Evaluate the completion rule against this task's current items.
    pub fn should_complete(&self) -> Verdict {
        should_complete(&self.items)
    }
}
