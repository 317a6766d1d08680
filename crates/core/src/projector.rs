//! # Queue Status Projector
//!
//! Stateless derivation of patient-facing and staff-facing views from the engine's current
//! queue and the department's average processing time. Nothing is cached: every call reads the
//! latest committed queue state.

use crate::config::LoadThresholds;
use crate::engine::QueueEngine;
use crate::queue::{QueueEntry, QueueStatus};
use crate::{CoreConfig, DepartmentId, EntryId, PatientId, QueueError, QueueResult};
use serde::Serialize;
use std::fmt;

/// Position and wait estimate for one active entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub entry_id: EntryId,
    pub department_id: DepartmentId,
    pub status: QueueStatus,
    pub position: u32,
    pub total_in_queue: u32,
    pub estimated_wait_minutes: u32,
    pub percent_complete: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartmentLoad {
    Low,
    Normal,
    Busy,
    Critical,
}

impl fmt::Display for DepartmentLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepartmentLoad::Low => "low",
            DepartmentLoad::Normal => "normal",
            DepartmentLoad::Busy => "busy",
            DepartmentLoad::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl DepartmentLoad {
    /// Classifies a department by the projected wait of its last active entry.
    ///
    /// Active patients with no staff available is always critical.
    pub fn classify(
        longest_wait_minutes: u32,
        total_active: u32,
        staff_available: u32,
        thresholds: &LoadThresholds,
    ) -> Self {
        if total_active > 0 && staff_available == 0 {
            return DepartmentLoad::Critical;
        }
        match longest_wait_minutes {
            w if w < thresholds.low_below => DepartmentLoad::Low,
            w if w < thresholds.normal_below => DepartmentLoad::Normal,
            w if w < thresholds.busy_below => DepartmentLoad::Busy,
            _ => DepartmentLoad::Critical,
        }
    }
}

/// Staff dashboard counts for one department.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DepartmentSummary {
    pub department_id: DepartmentId,
    pub waiting: u32,
    pub in_consultation: u32,
    /// Counted from retained history only.
    pub no_show: u32,
    /// Counted from retained history only.
    pub completed: u32,
    pub total_active: u32,
    pub average_processing_minutes: u32,
    pub staff_available: u32,
    pub longest_wait_minutes: u32,
    pub load: DepartmentLoad,
}

/// Computes the snapshot for `entry` from a department's active list.
///
/// `active` must be in rank order, as returned by [`QueueEngine::list_active`].
pub fn snapshot(
    active: &[QueueEntry],
    entry: &EntryId,
    average_processing_minutes: u32,
) -> QueueResult<QueueSnapshot> {
    let (index, subject) = active
        .iter()
        .enumerate()
        .find(|(_, e)| &e.id == entry)
        .ok_or_else(|| QueueError::NotInQueue(entry.clone()))?;

    let position = subject.sequence_rank.unwrap_or(index as u32 + 1);
    let total_in_queue = active.len() as u32;

    Ok(QueueSnapshot {
        entry_id: subject.id.clone(),
        department_id: subject.department_id.clone(),
        status: subject.status,
        position,
        total_in_queue,
        estimated_wait_minutes: wait_minutes(position.saturating_sub(1), average_processing_minutes),
        percent_complete: percent_complete(position, total_in_queue),
    })
}

/// `ahead` patients at `average` minutes each, saturating at `u32::MAX`.
fn wait_minutes(ahead: u32, average: u32) -> u32 {
    ahead.saturating_mul(average)
}

fn percent_complete(position: u32, total: u32) -> f64 {
    if total <= 1 {
        return 100.0;
    }
    let raw = 100.0 * (1.0 - f64::from(position) / f64::from(total));
    raw.clamp(0.0, 100.0)
}

pub struct QueueStatusProjector<'a> {
    engine: &'a QueueEngine,
    cfg: &'a CoreConfig,
}

impl<'a> QueueStatusProjector<'a> {
    pub fn new(engine: &'a QueueEngine, cfg: &'a CoreConfig) -> Self {
        Self { engine, cfg }
    }

    /// Snapshot for an entry that must be active in `department`.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotInQueue`] for entries that are `no_show`, `completed`, unknown or
    /// queued in another department.
    ///
    /// The department record and the active list are read under separate locks, so an
    /// administrative edit landing between the two reads is not reflected atomically.
    pub fn project(&self, department: &DepartmentId, entry: &EntryId) -> QueueResult<QueueSnapshot> {
        let average = self
            .engine
            .departments()
            .get(department)?
            .average_processing_minutes();
        let active = self.engine.list_active(department)?;
        snapshot(&active, entry, average)
    }

    /// Snapshot for a patient's active entry in `department`, if any.
    pub fn project_patient(
        &self,
        department: &DepartmentId,
        patient: &PatientId,
    ) -> QueueResult<Option<QueueSnapshot>> {
        let average = self
            .engine
            .departments()
            .get(department)?
            .average_processing_minutes();
        let active = self.engine.list_active(department)?;

        active
            .iter()
            .find(|e| &e.patient_id == patient)
            .map(|e| snapshot(&active, &e.id, average))
            .transpose()
    }

    /// Counts and load for one department. Not atomic across the record, queue and history.
    pub fn summary(&self, department: &DepartmentId) -> QueueResult<DepartmentSummary> {
        let record = self.engine.departments().get(department)?;
        let active = self.engine.list_active(department)?;
        let history = self.engine.history(department)?;

        let count = |entries: &[QueueEntry], status: QueueStatus| {
            entries.iter().filter(|e| e.status == status).count() as u32
        };

        let total_active = active.len() as u32;
        let longest_wait_minutes =
            wait_minutes(total_active.saturating_sub(1), record.average_processing_minutes());

        Ok(DepartmentSummary {
            department_id: department.clone(),
            waiting: count(&active, QueueStatus::Waiting),
            in_consultation: count(&active, QueueStatus::InConsultation),
            no_show: count(&history, QueueStatus::NoShow),
            completed: count(&history, QueueStatus::Completed),
            total_active,
            average_processing_minutes: record.average_processing_minutes(),
            staff_available: record.staff_available(),
            longest_wait_minutes,
            load: DepartmentLoad::classify(
                longest_wait_minutes,
                total_active,
                record.staff_available(),
                &self.cfg.load_thresholds(),
            ),
        })
    }
}
