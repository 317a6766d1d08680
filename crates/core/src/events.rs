//! Queue change notifications.
//!
//! The engine builds events while holding a department lock and dispatches them after the lock
//! is released. Observers run on the mutating thread and must not block.

use crate::queue::{QueueEntry, QueueStatus, ReorderDirection};
use crate::{DepartmentId, EntryId};
use serde::Serialize;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    Admitted {
        entry: QueueEntry,
    },
    Reordered {
        department_id: DepartmentId,
        entry_id: EntryId,
        direction: ReorderDirection,
        /// Active entry ids in their new rank order.
        order: Vec<EntryId>,
    },
    StatusChanged {
        from: QueueStatus,
        entry: QueueEntry,
    },
    Removed {
        entry: QueueEntry,
    },
}

impl QueueEvent {
    pub fn department_id(&self) -> &DepartmentId {
        match self {
            QueueEvent::Admitted { entry }
            | QueueEvent::StatusChanged { entry, .. }
            | QueueEvent::Removed { entry } => &entry.department_id,
            QueueEvent::Reordered { department_id, .. } => department_id,
        }
    }
}

pub trait QueueObserver: Send + Sync {
    fn on_event(&self, event: &QueueEvent);
}

/// Logs every event at `info`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl QueueObserver for TracingObserver {
    fn on_event(&self, event: &QueueEvent) {
        match event {
            QueueEvent::Admitted { entry } => tracing::info!(
                department = %entry.department_id,
                entry = %entry.id,
                patient = %entry.patient_id,
                rank = ?entry.sequence_rank,
                "patient admitted"
            ),
            QueueEvent::Reordered {
                department_id,
                entry_id,
                direction,
                ..
            } => tracing::info!(
                department = %department_id,
                entry = %entry_id,
                direction = ?direction,
                "queue reordered"
            ),
            QueueEvent::StatusChanged { from, entry } => tracing::info!(
                department = %entry.department_id,
                entry = %entry.id,
                from = %from,
                to = %entry.status,
                "entry status changed"
            ),
            QueueEvent::Removed { entry } => tracing::info!(
                department = %entry.department_id,
                entry = %entry.id,
                "entry removed"
            ),
        }
    }
}

/// Forwards events into an mpsc channel. A disconnected receiver is ignored.
pub struct ChannelObserver {
    sender: Mutex<Sender<QueueEvent>>,
}

impl ChannelObserver {
    pub fn new(sender: Sender<QueueEvent>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl QueueObserver for ChannelObserver {
    fn on_event(&self, event: &QueueEvent) {
        let Ok(sender) = self.sender.lock() else {
            tracing::warn!("event channel lock poisoned, dropping event");
            return;
        };
        if sender.send(event.clone()).is_err() {
            tracing::debug!("event receiver dropped");
        }
    }
}
