//! Output formatting utilities for text and JSON.

use crate::types::{Item, MutationOutcome, Task, Transition};
use serde_json::json;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Human readable age of `timestamp_ms` as seen at `now_ms`.
pub fn relative_date(timestamp_ms: i64, now_ms: i64) -> String {
    let seconds_ago = (now_ms - timestamp_ms).max(0) / 1000;

    if seconds_ago < MINUTE {
        format!("{} seconds ago", seconds_ago)
    } else if seconds_ago < HOUR {
        format!("{} minutes ago", seconds_ago / MINUTE)
    } else if seconds_ago < DAY {
        format!("{} hours ago", seconds_ago / HOUR)
    } else if seconds_ago < WEEK {
        format!("{} days ago", seconds_ago / DAY)
    } else {
        format!("{} weeks ago", seconds_ago / WEEK)
    }
}

fn checkbox(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

fn format_item_line(item: &Item) -> String {
    format!("  {} {}  ({})\n", checkbox(item.is_completed), item.title, item.id)
}

/// Format a task with its checklist. `items` is the display order to use.
pub fn format_task_text(task: &Task, items: &[Item], now_ms: i64) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} {}  ({})\n",
        checkbox(task.is_completed),
        task.name,
        task.id
    ));
    out.push_str(&format!(
        "  {}/{} done, updated {}\n",
        task.completed_count(),
        task.items.len(),
        relative_date(task.updated_at, now_ms)
    ));
    for item in items {
        out.push_str(&format_item_line(item));
    }

    out
}

/// Format a task list, one line per task.
pub fn format_tasks_text(tasks: &[Task], now_ms: i64) -> String {
    if tasks.is_empty() {
        return "No tasks.\n".to_string();
    }

    let mut out = String::new();
    for task in tasks {
        out.push_str(&format!(
            "{} {}  {}/{}  {}  ({})\n",
            checkbox(task.is_completed),
            task.name,
            task.completed_count(),
            task.items.len(),
            relative_date(task.created_at, now_ms),
            task.id
        ));
    }
    out
}

/// Format the result of an item mutation.
pub fn format_outcome_text(outcome: &MutationOutcome) -> String {
    let mut out = String::new();

    if let Some(ref item) = outcome.item {
        out.push_str(&format!("{} {}  ({})\n", checkbox(item.is_completed), item.title, item.id));
    }
    if !outcome.deleted.is_empty() {
        out.push_str(&format!("Deleted {} item(s)\n", outcome.deleted.len()));
    }
    match outcome.transition {
        Some(Transition::Completed) => {
            out.push_str(&format!("Task \"{}\" completed\n", outcome.task.name))
        }
        Some(Transition::Reopened) => {
            out.push_str(&format!("Task \"{}\" is pending again\n", outcome.task.name))
        }
        None => {}
    }
    if outcome.is_empty() {
        out.push_str(&format!("Task \"{}\" has no items\n", outcome.task.name));
    }

    out
}

/// JSON rendering of any serializable result.
pub fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string())
}
