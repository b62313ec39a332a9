//! In-process notification bus for cross-view task state sync.
//!
//! Views that show a filtered subset of tasks subscribe here so they learn
//! about completion changes even when their own live query has not fired.
//! The bus is an explicit dependency handed to each consumer.

use crate::types::Task;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Event names on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A task became complete.
    TaskCompletion,
    /// A task went back to pending.
    TaskPending,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskCompletion => "task_completion",
            EventKind::TaskPending => "task_pending",
        }
    }
}

/// Payload: the affected task and its new state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEvent {
    pub kind: EventKind,
    pub task_id: String,
    pub is_completed: bool,
    pub updated_at: i64,
}

impl TaskEvent {
    pub fn completed(task: &Task) -> Self {
        Self {
            kind: EventKind::TaskCompletion,
            task_id: task.id.clone(),
            is_completed: true,
            updated_at: task.updated_at,
        }
    }

    pub fn pending(task: &Task) -> Self {
        Self {
            kind: EventKind::TaskPending,
            task_id: task.id.clone(),
            is_completed: false,
            updated_at: task.updated_at,
        }
    }
}

/// Identifies a subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&TaskEvent) + Send + Sync>;

/// Publish/subscribe channel keyed by [`EventKind`].
///
/// Delivery is synchronous, in subscription order, on the publishing thread.
/// Handlers are invoked without the internal lock held, so they may
/// subscribe, unsubscribe or publish.
pub struct NotificationBus {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a handler for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut map = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(kind).or_default().push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut map = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        for handlers in map.values_mut() {
            let before = handlers.len();
            handlers.retain(|(sid, _)| *sid != id);
            removed |= handlers.len() != before;
        }
        removed
    }

    /// Number of handlers registered for an event kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let map = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to every handler of its kind. Returns the number of
    /// handlers reached.
    pub fn publish(&self, event: &TaskEvent) -> usize {
        let handlers: Vec<Handler> = {
            let map = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            map.get(&event.kind)
                .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        debug!(
            event = event.kind.as_str(),
            task_id = %event.task_id,
            handlers = handlers.len(),
            "Publishing task event"
        );

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
