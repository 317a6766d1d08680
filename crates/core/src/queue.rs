//! Per-department queue state.
//!
//! [`DepartmentQueue`] is the single-threaded ordering model: one ordered list of active entries
//! plus a bounded history of entries that left the ordering. It knows nothing about locks;
//! [`crate::engine::QueueEngine`] wraps one in a `Mutex` per department.
//!
//! Rank is the 1-based index into the active list, written back to every active entry after
//! each mutation, so ranks are dense by construction. Every mutating method validates in full
//! before touching any state; an `Err` means nothing changed.
//!
//! Transition table:
//!
//! | from              | to                | note                                   |
//! |-------------------|-------------------|----------------------------------------|
//! | `waiting`         | `in_consultation` | subject to consultation/provider limits|
//! | `in_consultation` | `completed`       | leaves the ordering, kept in history   |
//! | `waiting`         | `no_show`         | leaves the ordering, kept in history   |
//! | `no_show`         | `waiting`         | re-inserted at the tail                |

use crate::{AppointmentId, DepartmentId, EntryId, PatientId, QueueError, QueueResult};
use chrono::{DateTime, Utc};
use qms_types::NonEmptyText;
use qms_uuid::{TimestampId, TimestampIdGenerator};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    InConsultation,
    NoShow,
    Completed,
}

impl QueueStatus {
    /// Active entries hold a rank; `no_show` and `completed` do not.
    pub fn is_active(&self) -> bool {
        matches!(self, QueueStatus::Waiting | QueueStatus::InConsultation)
    }

    pub fn can_transition_to(&self, to: QueueStatus) -> bool {
        use QueueStatus::*;
        matches!(
            (self, to),
            (Waiting, InConsultation) | (InConsultation, Completed) | (Waiting, NoShow) | (NoShow, Waiting)
        )
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::InConsultation => "in_consultation",
            QueueStatus::NoShow => "no_show",
            QueueStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for QueueStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "waiting" => Ok(QueueStatus::Waiting),
            "in_consultation" => Ok(QueueStatus::InConsultation),
            "no_show" => Ok(QueueStatus::NoShow),
            "completed" => Ok(QueueStatus::Completed),
            other => Err(QueueError::InvalidInput(format!(
                "unknown queue status '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderDirection {
    Up,
    Down,
}

impl FromStr for ReorderDirection {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "up" => Ok(ReorderDirection::Up),
            "down" => Ok(ReorderDirection::Down),
            other => Err(QueueError::InvalidInput(format!(
                "reorder direction must be 'up' or 'down', got '{other}'"
            ))),
        }
    }
}

/// A patient's live place in a department queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub id: EntryId,
    /// `None` for walk-ins.
    pub appointment_id: Option<AppointmentId>,
    pub patient_id: PatientId,
    pub department_id: DepartmentId,
    pub joined_at: DateTime<Utc>,
    pub status: QueueStatus,
    /// Present exactly when the entry is active.
    pub sequence_rank: Option<u32>,
    /// Staff member running the consultation, when one was named.
    pub provider: Option<NonEmptyText>,
    pub updated_at: DateTime<Utc>,
}

/// What a status change did, for the engine to index and report.
#[derive(Debug)]
pub(crate) struct Transition {
    pub from: QueueStatus,
    pub entry: QueueEntry,
    pub evicted: Vec<EntryId>,
}

#[derive(Debug)]
pub struct DepartmentQueue {
    department_id: DepartmentId,
    entries: HashMap<EntryId, QueueEntry>,
    order: Vec<EntryId>,
    history: VecDeque<EntryId>,
    last_id: Option<TimestampId>,
}

impl DepartmentQueue {
    pub fn new(department_id: DepartmentId) -> Self {
        Self {
            department_id,
            entries: HashMap::new(),
            order: Vec::new(),
            history: VecDeque::new(),
            last_id: None,
        }
    }

    pub fn department_id(&self) -> &DepartmentId {
        &self.department_id
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &EntryId) -> Option<&QueueEntry> {
        self.entries.get(id)
    }

    /// Active entries in rank order.
    pub fn active(&self) -> Vec<QueueEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    /// Retained `no_show`/`completed` entries, oldest first.
    pub fn history(&self) -> Vec<QueueEntry> {
        self.history
            .iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    pub fn active_len(&self) -> usize {
        self.order.len()
    }

    pub fn active_for_patient(&self, patient: &PatientId) -> Option<&QueueEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .find(|e| &e.patient_id == patient)
    }

    pub fn active_for_appointment(&self, appointment: &AppointmentId) -> Option<&QueueEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .find(|e| e.appointment_id.as_ref() == Some(appointment))
    }

    /// Appends a new `waiting` entry at the tail.
    pub fn admit(
        &mut self,
        patient_id: PatientId,
        appointment_id: Option<AppointmentId>,
        now: DateTime<Utc>,
    ) -> QueueResult<QueueEntry> {
        self.ensure_not_queued(&patient_id)?;

        let id = TimestampIdGenerator::generate_at(now, self.last_id.as_ref());
        let joined_at = id.timestamp();
        self.last_id = Some(id.clone());

        let entry = QueueEntry {
            id: EntryId::new(id),
            appointment_id,
            patient_id,
            department_id: self.department_id.clone(),
            joined_at,
            status: QueueStatus::Waiting,
            sequence_rank: None,
            provider: None,
            updated_at: joined_at,
        };

        self.order.push(entry.id.clone());
        self.entries.insert(entry.id.clone(), entry.clone());
        self.renumber();

        Ok(self.entries[&entry.id].clone())
    }

    /// Swaps an active entry with its active neighbour. Returns `false` at a boundary.
    pub fn reorder(&mut self, id: &EntryId, direction: ReorderDirection) -> QueueResult<bool> {
        let index = self
            .order
            .iter()
            .position(|e| e == id)
            .ok_or_else(|| QueueError::NotInQueue(id.clone()))?;

        let neighbour = match direction {
            ReorderDirection::Up => index.checked_sub(1),
            ReorderDirection::Down => Some(index + 1).filter(|&i| i < self.order.len()),
        };

        match neighbour {
            Some(other) => {
                self.order.swap(index, other);
                self.renumber();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Applies a status change according to the transition table.
    ///
    /// `consultation_limit` caps concurrent `in_consultation` entries (`None` = unlimited);
    /// `provider`, when given on a start, must not already be in a consultation here.
    pub(crate) fn transition(
        &mut self,
        id: &EntryId,
        to: QueueStatus,
        provider: Option<NonEmptyText>,
        consultation_limit: Option<usize>,
        history_limit: usize,
        now: DateTime<Utc>,
    ) -> QueueResult<Transition> {
        let current = self
            .entries
            .get(id)
            .ok_or_else(|| QueueError::UnknownEntry(id.clone()))?;
        let from = current.status;

        if !from.can_transition_to(to) {
            return Err(QueueError::InvalidTransition { from, to });
        }

        let mut evicted = Vec::new();
        match (from, to) {
            (QueueStatus::Waiting, QueueStatus::InConsultation) => {
                self.check_can_start(provider.as_ref(), consultation_limit)?;
                let entry = self.entry_mut(id)?;
                entry.status = to;
                entry.provider = provider;
                entry.updated_at = now;
            }
            (QueueStatus::NoShow, QueueStatus::Waiting) => {
                let patient = current.patient_id.clone();
                self.ensure_not_queued(&patient)?;
                self.history.retain(|h| h != id);
                self.order.push(id.clone());
                let entry = self.entry_mut(id)?;
                entry.status = to;
                entry.provider = None;
                entry.updated_at = now;
            }
            _ => {
                // Leaving the ordering: in_consultation -> completed, waiting -> no_show.
                self.order.retain(|o| o != id);
                self.history.push_back(id.clone());
                let entry = self.entry_mut(id)?;
                entry.status = to;
                entry.sequence_rank = None;
                entry.updated_at = now;
                evicted = self.trim_history(history_limit);
            }
        }

        self.renumber();
        Ok(Transition {
            from,
            entry: self.entries[id].clone(),
            evicted,
        })
    }

    /// Deletes an active entry outright.
    pub fn remove(&mut self, id: &EntryId) -> QueueResult<QueueEntry> {
        if !self.order.contains(id) {
            return Err(match self.entries.contains_key(id) {
                true => QueueError::NotInQueue(id.clone()),
                false => QueueError::UnknownEntry(id.clone()),
            });
        }

        self.order.retain(|o| o != id);
        let mut removed = self
            .entries
            .remove(id)
            .ok_or_else(|| QueueError::UnknownEntry(id.clone()))?;
        removed.sequence_rank = None;
        self.renumber();
        Ok(removed)
    }

    /// Drops every entry linked to `appointment`: the active one, if any, and retained history.
    /// Returns what was dropped; the ordering is compacted.
    pub fn release_appointment(&mut self, appointment: &AppointmentId) -> Vec<QueueEntry> {
        let linked: Vec<EntryId> = self
            .entries
            .values()
            .filter(|e| e.appointment_id.as_ref() == Some(appointment))
            .map(|e| e.id.clone())
            .collect();
        if linked.is_empty() {
            return Vec::new();
        }

        self.order.retain(|id| !linked.contains(id));
        self.history.retain(|id| !linked.contains(id));
        let mut released: Vec<QueueEntry> = linked
            .iter()
            .filter_map(|id| self.entries.remove(id))
            .map(|mut entry| {
                entry.sequence_rank = None;
                entry
            })
            .collect();
        released.sort_by(|a, b| a.id.cmp(&b.id));
        self.renumber();
        released
    }

    fn ensure_not_queued(&self, patient: &PatientId) -> QueueResult<()> {
        if self.active_for_patient(patient).is_some() {
            return Err(QueueError::AlreadyQueued {
                patient: patient.clone(),
                department: self.department_id.clone(),
            });
        }
        Ok(())
    }

    fn check_can_start(
        &self,
        provider: Option<&NonEmptyText>,
        consultation_limit: Option<usize>,
    ) -> QueueResult<()> {
        let in_consultation: Vec<&QueueEntry> = self
            .order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|e| e.status == QueueStatus::InConsultation)
            .collect();

        if let Some(limit) = consultation_limit {
            if in_consultation.len() >= limit {
                return Err(QueueError::ConsultationLimitReached {
                    department: self.department_id.clone(),
                    limit,
                });
            }
        }

        if let Some(provider) = provider {
            if in_consultation
                .iter()
                .any(|e| e.provider.as_ref() == Some(provider))
            {
                return Err(QueueError::ProviderBusy(provider.to_string()));
            }
        }
        Ok(())
    }

    fn entry_mut(&mut self, id: &EntryId) -> QueueResult<&mut QueueEntry> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| QueueError::UnknownEntry(id.clone()))
    }

    fn trim_history(&mut self, limit: usize) -> Vec<EntryId> {
        let mut evicted = Vec::new();
        while self.history.len() > limit {
            if let Some(oldest) = self.history.pop_front() {
                self.entries.remove(&oldest);
                evicted.push(oldest);
            }
        }
        evicted
    }

    fn renumber(&mut self) {
        for (index, id) in self.order.iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.sequence_rank = Some(index as u32 + 1);
            }
        }
    }
}
