//! Item storage. Mutations that affect a task's completion go through
//! [`crate::coordinator::TaskCompletionCoordinator`]; the helpers here run
//! inside its transactions.

use super::Database;
use crate::error::TaskError;
use crate::types::{Item, ItemUpdate, NewItem};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

pub fn parse_item_row(row: &Row) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        title: row.get("title")?,
        is_completed: row.get("is_completed")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Load a task's items in append order.
pub(crate) fn load_items_internal(conn: &Connection, task_id: &str) -> Result<Vec<Item>> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, title, is_completed, created_at, updated_at
         FROM items WHERE task_id = ?1
         ORDER BY position ASC",
    )?;
    let items = stmt
        .query_map(params![task_id], parse_item_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

pub(crate) fn get_item_internal(conn: &Connection, item_id: &str) -> Result<Option<Item>> {
    let item = conn
        .query_row(
            "SELECT id, task_id, title, is_completed, created_at, updated_at
             FROM items WHERE id = ?1",
            params![item_id],
            parse_item_row,
        )
        .optional()?;
    Ok(item)
}

/// Append an item at the end of a task's checklist.
pub(crate) fn insert_item_internal(
    conn: &Connection,
    task_id: &str,
    new_item: &NewItem,
    now: i64,
) -> Result<Item> {
    let item_id = new_item
        .id
        .clone()
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM items WHERE task_id = ?1",
        params![task_id],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO items (id, task_id, title, is_completed, position, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            &item_id,
            task_id,
            &new_item.title,
            new_item.is_completed,
            position,
            now
        ],
    )?;

    Ok(Item {
        id: item_id,
        task_id: task_id.to_string(),
        title: new_item.title.clone(),
        is_completed: new_item.is_completed,
        created_at: now,
        updated_at: now,
    })
}

/// Apply field changes to an item that must belong to `task_id`.
pub(crate) fn update_item_internal(
    conn: &Connection,
    task_id: &str,
    item_id: &str,
    update: &ItemUpdate,
    now: i64,
) -> Result<Item> {
    let mut item = get_item_internal(conn, item_id)?
        .filter(|item| item.task_id == task_id)
        .ok_or_else(|| TaskError::item_not_found(item_id))?;

    if let Some(ref title) = update.title {
        item.title = title.clone();
    }
    if let Some(done) = update.is_completed {
        item.is_completed = done;
    }
    item.updated_at = now;

    conn.execute(
        "UPDATE items SET title = ?1, is_completed = ?2, updated_at = ?3 WHERE id = ?4",
        params![&item.title, item.is_completed, now, item_id],
    )?;

    Ok(item)
}

/// Delete one item of `task_id`. Returns false when it was already gone.
pub(crate) fn delete_item_internal(conn: &Connection, task_id: &str, item_id: &str) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM items WHERE id = ?1 AND task_id = ?2",
        params![item_id, task_id],
    )?;
    Ok(rows > 0)
}

impl Database {
    /// Get an item by ID.
    pub fn get_item(&self, item_id: &str) -> Result<Option<Item>> {
        self.with_conn(|conn| get_item_internal(conn, item_id))
    }

    /// Id of the task owning an item.
    pub fn item_parent(&self, item_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let parent = conn
                .query_row(
                    "SELECT task_id FROM items WHERE id = ?1",
                    params![item_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(parent)
        })
    }

    /// Items of a task in display order: open items first, newest first.
    pub fn list_items_for_display(&self, task_id: &str) -> Result<Vec<Item>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, title, is_completed, created_at, updated_at
                 FROM items WHERE task_id = ?1
                 ORDER BY is_completed ASC, created_at DESC, position DESC",
            )?;
            let items = stmt
                .query_map(params![task_id], parse_item_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(items)
        })
    }
}
