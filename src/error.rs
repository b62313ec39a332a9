//! Error types surfaced at the coordinator boundary.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,

    // Not found errors
    TaskNotFound,
    ItemNotFound,

    // Store errors
    StoreWriteFailed,
}

/// Kind of entity referenced by a not-found error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Task,
    Item,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Task => write!(f, "Task"),
            Entity::Item => write!(f, "Item"),
        }
    }
}

/// Why a field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Missing,
    Invalid,
}

/// Failure of a task or item operation.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{field}: {reason}")]
    Validation {
        field: &'static str,
        kind: ValidationKind,
        reason: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("store write failed: {0}")]
    StoreWrite(String),
}

impl TaskError {
    pub fn missing_field(field: &'static str) -> Self {
        TaskError::Validation {
            field,
            kind: ValidationKind::Missing,
            reason: format!("{} is required", field),
        }
    }

    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        TaskError::Validation {
            field,
            kind: ValidationKind::Invalid,
            reason: reason.into(),
        }
    }

    pub fn task_not_found(id: &str) -> Self {
        TaskError::NotFound {
            entity: Entity::Task,
            id: id.to_string(),
        }
    }

    pub fn item_not_found(id: &str) -> Self {
        TaskError::NotFound {
            entity: Entity::Item,
            id: id.to_string(),
        }
    }

    pub fn store(err: impl fmt::Display) -> Self {
        TaskError::StoreWrite(err.to_string())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            TaskError::Validation {
                kind: ValidationKind::Missing,
                ..
            } => ErrorCode::MissingRequiredField,
            TaskError::Validation {
                kind: ValidationKind::Invalid,
                ..
            } => ErrorCode::InvalidFieldValue,
            TaskError::NotFound {
                entity: Entity::Task,
                ..
            } => ErrorCode::TaskNotFound,
            TaskError::NotFound {
                entity: Entity::Item,
                ..
            } => ErrorCode::ItemNotFound,
            TaskError::StoreWrite(_) => ErrorCode::StoreWriteFailed,
        }
    }

    /// Short message suitable for a transient on-screen prompt.
    pub fn user_message(&self) -> String {
        match self {
            TaskError::Validation { reason, .. } => reason.clone(),
            TaskError::NotFound { entity, .. } => {
                format!("{} no longer exists", entity)
            }
            TaskError::StoreWrite(_) => "Could not save changes. Please try again.".to_string(),
        }
    }
}

// Lets db code return TaskError through anyhow and get it back intact.
impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TaskError>() {
            Ok(task_err) => task_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(sql_err) => TaskError::from(sql_err),
                Err(err) => TaskError::store(format!("{:#}", err)),
            },
        }
    }
}

impl From<rusqlite::Error> for TaskError {
    fn from(err: rusqlite::Error) -> Self {
        TaskError::store(err)
    }
}

/// Result type for task operations.
pub type TaskResult<T> = std::result::Result<T, TaskError>;
