//! Task CRUD and predicate queries.

use super::items::load_items_internal;
use super::{Database, now_ms};
use crate::error::TaskError;
use crate::types::{Task, TaskFilter, validate_id, validate_text};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::{debug, info};
use uuid::Uuid;

/// Ordering shared by every task list: pending first, newest first.
pub(crate) const TASK_ORDER: &str = "ORDER BY is_completed ASC, created_at DESC, id ASC";

/// Parse a task row. Items are loaded separately.
pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        name: row.get("name")?,
        items: Vec::new(),
        is_completed: row.get("is_completed")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to get a task and its items using an existing connection.
pub(crate) fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT * FROM tasks WHERE id = ?1",
            params![task_id],
            parse_task_row,
        )
        .optional()?;

    match task {
        Some(mut task) => {
            task.items = load_items_internal(conn, &task.id)?;
            Ok(Some(task))
        }
        None => Ok(None),
    }
}

fn list_tasks_internal(conn: &Connection, filter: TaskFilter) -> Result<Vec<Task>> {
    let sql = format!("SELECT * FROM tasks {} {}", filter.sql_predicate(), TASK_ORDER);
    let mut stmt = conn.prepare(&sql)?;
    let mut tasks = stmt
        .query_map([], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for task in &mut tasks {
        task.items = load_items_internal(conn, &task.id)?;
    }

    Ok(tasks)
}

/// Write a task's completion flag and bump `updated_at`.
pub(crate) fn set_completion_internal(
    conn: &Connection,
    task_id: &str,
    is_completed: bool,
    now: i64,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE tasks SET is_completed = ?1, updated_at = ?2 WHERE id = ?3",
        params![is_completed, now, task_id],
    )?;
    if rows == 0 {
        return Err(TaskError::task_not_found(task_id).into());
    }
    Ok(())
}

/// Refresh a task's `updated_at` without changing its completion flag.
pub(crate) fn touch_task_internal(conn: &Connection, task_id: &str, now: i64) -> Result<()> {
    let rows = conn.execute(
        "UPDATE tasks SET updated_at = ?1 WHERE id = ?2",
        params![now, task_id],
    )?;
    if rows == 0 {
        return Err(TaskError::task_not_found(task_id).into());
    }
    Ok(())
}

impl Database {
    /// Create a new, empty, pending task.
    /// If id is provided, uses it as the task ID; otherwise generates UUID7.
    pub fn create_task(&self, id: Option<String>, name: &str) -> Result<Task> {
        if let Some(ref id) = id {
            validate_id("id", id)?;
        }
        validate_text("name", name)?;

        let task_id = id.unwrap_or_else(|| Uuid::now_v7().to_string());
        let now = now_ms();

        let task = self.write(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO tasks (id, name, is_completed, created_at, updated_at)
                 VALUES (?1, ?2, 0, ?3, ?3)",
                params![&task_id, name, now],
            )?;
            tx.commit()?;

            Ok(Task {
                id: task_id.clone(),
                name: name.to_string(),
                items: Vec::new(),
                is_completed: false,
                created_at: now,
                updated_at: now,
            })
        })?;

        info!(task_id = %task.id, "Task created");
        Ok(task)
    }

    /// Get a task (with items) by ID.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// List tasks matching a completion predicate, in list order.
    pub fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        self.with_conn(|conn| list_tasks_internal(conn, filter))
    }

    /// Like [`list_tasks`](Self::list_tasks), together with the revision the
    /// result reflects.
    pub fn list_tasks_with_revision(&self, filter: TaskFilter) -> Result<(u64, Vec<Task>)> {
        self.with_conn(|conn| {
            let revision = self.revision();
            Ok((revision, list_tasks_internal(conn, filter)?))
        })
    }

    /// Rename a task.
    pub fn rename_task(&self, task_id: &str, name: &str) -> Result<Task> {
        validate_text("name", name)?;
        let now = now_ms();

        self.write(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let rows = tx.execute(
                "UPDATE tasks SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, now, task_id],
            )?;
            if rows == 0 {
                return Err(TaskError::task_not_found(task_id).into());
            }
            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| TaskError::task_not_found(task_id))?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Delete a task together with its items.
    ///
    /// Deleting a task that no longer exists is not an error; the return value
    /// tells whether a row was removed.
    pub fn delete_task(&self, task_id: &str) -> Result<bool> {
        let deleted = self.write(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            // Items go with the task through ON DELETE CASCADE
            let rows = tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            tx.commit()?;
            Ok(rows > 0)
        })?;

        if deleted {
            info!(task_id = %task_id, "Task deleted");
        } else {
            debug!(task_id = %task_id, "Task already gone, delete is a no-op");
        }
        Ok(deleted)
    }
}
