//! # Queue Engine
//!
//! Owns one [`DepartmentQueue`] per department, each behind its own `Mutex`, so operations on
//! different departments never contend. A separate entry index maps entry ids to their
//! department so callers can address an entry by id alone.
//!
//! Lock order is department queue, then entry index. The index is never held while a
//! department lock is acquired. Events are collected under the department lock and delivered
//! to observers after it is released.

use crate::events::{QueueEvent, QueueObserver};
use crate::queue::{DepartmentQueue, QueueEntry, QueueStatus, ReorderDirection};
use crate::registries::departments::DepartmentRegistry;
use crate::registries::shared::{lock, read, write};
use crate::{
    AppointmentId, CoreConfig, DepartmentId, EntryId, PatientId, QueueError, QueueResult,
};
use chrono::Utc;
use qms_types::NonEmptyText;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

type SharedQueue = Arc<Mutex<DepartmentQueue>>;

pub struct QueueEngine {
    cfg: Arc<CoreConfig>,
    departments: Arc<DepartmentRegistry>,
    queues: RwLock<HashMap<DepartmentId, SharedQueue>>,
    entry_index: RwLock<HashMap<EntryId, DepartmentId>>,
    observers: RwLock<Vec<Arc<dyn QueueObserver>>>,
}

impl QueueEngine {
    pub fn new(cfg: Arc<CoreConfig>, departments: Arc<DepartmentRegistry>) -> Self {
        Self {
            cfg,
            departments,
            queues: RwLock::new(HashMap::new()),
            entry_index: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn departments(&self) -> &DepartmentRegistry {
        &self.departments
    }

    pub fn subscribe(&self, observer: Arc<dyn QueueObserver>) -> QueueResult<()> {
        write(&self.observers, "observers")?.push(observer);
        Ok(())
    }

    /// Adds a patient at the tail of a department queue.
    ///
    /// # Errors
    ///
    /// - [`QueueError::UnknownDepartment`] if the department is not registered.
    /// - [`QueueError::AlreadyQueued`] if the patient already has an active entry there.
    pub fn admit(
        &self,
        department: &DepartmentId,
        patient: &PatientId,
        appointment: Option<AppointmentId>,
    ) -> QueueResult<QueueEntry> {
        let queue = self.queue_for(department)?;

        let entry = {
            let mut q = lock(&queue, "department queue")?;
            let mut index = write(&self.entry_index, "entry index")?;
            let entry = q.admit(patient.clone(), appointment, Utc::now())?;
            index.insert(entry.id.clone(), department.clone());
            entry
        };

        self.notify(&[QueueEvent::Admitted {
            entry: entry.clone(),
        }]);
        Ok(entry)
    }

    /// Moves an active entry one place towards the head (`Up`) or tail (`Down`).
    ///
    /// At either end the call is a no-op. Returns the department's active entries afterwards.
    pub fn reorder(
        &self,
        department: &DepartmentId,
        entry: &EntryId,
        direction: ReorderDirection,
    ) -> QueueResult<Vec<QueueEntry>> {
        let queue = self.queue_for(department)?;

        let (moved, active) = {
            let mut q = lock(&queue, "department queue")?;
            let moved = q.reorder(entry, direction)?;
            (moved, q.active())
        };

        if moved {
            self.notify(&[QueueEvent::Reordered {
                department_id: department.clone(),
                entry_id: entry.clone(),
                direction,
                order: active.iter().map(|e| e.id.clone()).collect(),
            }]);
        }
        Ok(active)
    }

    /// Applies a status change to an entry.
    pub fn set_status(&self, entry: &EntryId, to: QueueStatus) -> QueueResult<QueueEntry> {
        self.transition(entry, to, None)
    }

    /// Moves a `waiting` entry into consultation, optionally naming the provider.
    ///
    /// # Errors
    ///
    /// Besides the usual transition errors, [`QueueError::ConsultationLimitReached`] and
    /// [`QueueError::ProviderBusy`].
    pub fn start_consultation(
        &self,
        entry: &EntryId,
        provider: Option<NonEmptyText>,
    ) -> QueueResult<QueueEntry> {
        self.transition(entry, QueueStatus::InConsultation, provider)
    }

    /// Deletes an active entry, for example when its appointment is cancelled.
    pub fn remove(&self, entry: &EntryId) -> QueueResult<QueueEntry> {
        let department = self.department_of(entry)?;
        let queue = self.queue_for(&department)?;

        let removed = {
            let mut q = lock(&queue, "department queue")?;
            let mut index = write(&self.entry_index, "entry index")?;
            let removed = q.remove(entry)?;
            index.remove(entry);
            removed
        };

        self.notify(&[QueueEvent::Removed {
            entry: removed.clone(),
        }]);
        Ok(removed)
    }

    /// Drops every entry of `department` linked to a cancelled appointment, whether it is
    /// still active or retained as `no_show` history. Dropped entries become unknown.
    pub fn release_appointment(
        &self,
        department: &DepartmentId,
        appointment: &AppointmentId,
    ) -> QueueResult<Vec<QueueEntry>> {
        let Some(queue) = self.existing_queue(department)? else {
            return Ok(Vec::new());
        };

        let released = {
            let mut q = lock(&queue, "department queue")?;
            let mut index = write(&self.entry_index, "entry index")?;
            let released = q.release_appointment(appointment);
            for entry in &released {
                index.remove(&entry.id);
            }
            released
        };

        let events: Vec<QueueEvent> = released
            .iter()
            .map(|entry| QueueEvent::Removed {
                entry: entry.clone(),
            })
            .collect();
        self.notify(&events);
        Ok(released)
    }

    /// Active entries of a department in rank order.
    pub fn list_active(&self, department: &DepartmentId) -> QueueResult<Vec<QueueEntry>> {
        match self.existing_queue(department)? {
            Some(queue) => {
                let q = lock(&queue, "department queue")?;
                Ok(q.active())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Retained `no_show` and `completed` entries, oldest first.
    pub fn history(&self, department: &DepartmentId) -> QueueResult<Vec<QueueEntry>> {
        match self.existing_queue(department)? {
            Some(queue) => {
                let q = lock(&queue, "department queue")?;
                Ok(q.history())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Looks up an entry that is active or still retained in history.
    pub fn entry(&self, entry: &EntryId) -> QueueResult<QueueEntry> {
        let department = self.department_of(entry)?;
        let queue = self.queue_for(&department)?;
        let q = lock(&queue, "department queue")?;
        let found = q.get(entry).cloned();
        found.ok_or_else(|| QueueError::UnknownEntry(entry.clone()))
    }

    pub fn active_entry_for_patient(
        &self,
        department: &DepartmentId,
        patient: &PatientId,
    ) -> QueueResult<Option<QueueEntry>> {
        match self.existing_queue(department)? {
            Some(queue) => {
                let q = lock(&queue, "department queue")?;
                Ok(q.active_for_patient(patient).cloned())
            }
            None => Ok(None),
        }
    }

    pub fn active_entry_for_appointment(
        &self,
        department: &DepartmentId,
        appointment: &AppointmentId,
    ) -> QueueResult<Option<QueueEntry>> {
        match self.existing_queue(department)? {
            Some(queue) => {
                let q = lock(&queue, "department queue")?;
                Ok(q.active_for_appointment(appointment).cloned())
            }
            None => Ok(None),
        }
    }

    fn transition(
        &self,
        entry: &EntryId,
        to: QueueStatus,
        provider: Option<NonEmptyText>,
    ) -> QueueResult<QueueEntry> {
        let department = self.department_of(entry)?;
        let consultation_limit = match to {
            QueueStatus::InConsultation => self
                .cfg
                .consultation_limit()
                .for_department(&self.departments.get(&department)?),
            _ => None,
        };
        let queue = self.queue_for(&department)?;

        let transition = {
            let mut q = lock(&queue, "department queue")?;
            let mut index = write(&self.entry_index, "entry index")?;
            let transition = q.transition(
                entry,
                to,
                provider,
                consultation_limit,
                self.cfg.history_limit(),
                Utc::now(),
            )?;
            for evicted in &transition.evicted {
                index.remove(evicted);
            }
            transition
        };

        if !transition.evicted.is_empty() {
            tracing::debug!(
                department = %department,
                evicted = transition.evicted.len(),
                "trimmed queue history"
            );
        }

        self.notify(&[QueueEvent::StatusChanged {
            from: transition.from,
            entry: transition.entry.clone(),
        }]);
        Ok(transition.entry)
    }

    fn department_of(&self, entry: &EntryId) -> QueueResult<DepartmentId> {
        read(&self.entry_index, "entry index")?
            .get(entry)
            .cloned()
            .ok_or_else(|| QueueError::UnknownEntry(entry.clone()))
    }

    /// The department's queue, created on first use.
    fn queue_for(&self, department: &DepartmentId) -> QueueResult<SharedQueue> {
        if let Some(queue) = self.existing_queue(department)? {
            return Ok(queue);
        }

        let mut queues = write(&self.queues, "queues")?;
        let queue = queues
            .entry(department.clone())
            .or_insert_with(|| Arc::new(Mutex::new(DepartmentQueue::new(department.clone()))));
        Ok(Arc::clone(queue))
    }

    /// The department's queue if one exists yet. Fails for unregistered departments.
    fn existing_queue(&self, department: &DepartmentId) -> QueueResult<Option<SharedQueue>> {
        if !self.departments.contains(department)? {
            return Err(QueueError::UnknownDepartment(department.clone()));
        }
        Ok(read(&self.queues, "queues")?.get(department).cloned())
    }

    /// Delivers events to every subscribed observer. A poisoned observer list is recovered
    /// rather than dropping the events, since the list itself is only ever appended to.
    fn notify(&self, events: &[QueueEvent]) {
        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(poisoned) => {
                tracing::warn!("observer list lock poisoned, delivering to recovered list");
                poisoned.into_inner().clone()
            }
        };
        for event in events {
            for observer in &observers {
                observer.on_event(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsultationLimit, LoadThresholds};
    use crate::events::ChannelObserver;
    use crate::registries::departments::Department;
    use std::collections::HashSet;
    use std::sync::mpsc;

    fn dept(id: &str) -> DepartmentId {
        DepartmentId::parse(id).unwrap()
    }

    fn patient(id: &str) -> PatientId {
        PatientId::parse(id).unwrap()
    }

    fn department(id: &str, average: u32, staff: u32) -> Department {
        Department::new(dept(id), NonEmptyText::new(id).unwrap(), average, staff).unwrap()
    }

    fn engine_with(cfg: CoreConfig) -> QueueEngine {
        let registry = DepartmentRegistry::with_departments([
            department("cardiology", 10, 1),
            department("neurology", 18, 2),
        ])
        .unwrap();
        QueueEngine::new(Arc::new(cfg), Arc::new(registry))
    }

    fn engine() -> QueueEngine {
        engine_with(CoreConfig::default())
    }

    fn assert_dense(engine: &QueueEngine, department: &DepartmentId) {
        let ranks: Vec<u32> = engine
            .list_active(department)
            .unwrap()
            .iter()
            .map(|e| e.sequence_rank.unwrap())
            .collect();
        let expected: Vec<u32> = (1..=ranks.len() as u32).collect();
        assert_eq!(ranks, expected);
    }

    #[test]
    fn test_admit_unknown_department() {
        let engine = engine();
        let result = engine.admit(&dept("oncology"), &patient("P1"), None);
        assert!(matches!(result, Err(QueueError::UnknownDepartment(_))));
        assert!(matches!(
            engine.list_active(&dept("oncology")),
            Err(QueueError::UnknownDepartment(_))
        ));
    }

    #[test]
    fn test_same_patient_may_queue_in_two_departments() {
        let engine = engine();
        engine.admit(&dept("cardiology"), &patient("P1"), None).unwrap();
        engine.admit(&dept("neurology"), &patient("P1"), None).unwrap();

        let again = engine.admit(&dept("cardiology"), &patient("P1"), None);
        assert!(matches!(again, Err(QueueError::AlreadyQueued { .. })));
    }

    #[test]
    fn test_ranks_stay_dense_through_mixed_operations() {
        let engine = engine();
        let cardiology = dept("cardiology");
        let ids: Vec<EntryId> = ["A", "B", "C", "D"]
            .iter()
            .map(|p| engine.admit(&cardiology, &patient(p), None).unwrap().id)
            .collect();

        engine.set_status(&ids[1], QueueStatus::NoShow).unwrap();
        assert_dense(&engine, &cardiology);
        engine.reorder(&cardiology, &ids[3], ReorderDirection::Up).unwrap();
        assert_dense(&engine, &cardiology);
        engine.start_consultation(&ids[0], None).unwrap();
        engine.set_status(&ids[0], QueueStatus::Completed).unwrap();
        assert_dense(&engine, &cardiology);
        engine.set_status(&ids[1], QueueStatus::Waiting).unwrap();
        engine.remove(&ids[2]).unwrap();
        assert_dense(&engine, &cardiology);

        let order: Vec<String> = engine
            .list_active(&cardiology)
            .unwrap()
            .iter()
            .map(|e| e.patient_id.to_string())
            .collect();
        assert_eq!(order, ["D", "B"]);
    }

    #[test]
    fn test_ranks_stay_dense_under_random_operations() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let engine = engine();
        let cardiology = dept("cardiology");
        let mut rng = StdRng::seed_from_u64(7);
        let mut known: Vec<EntryId> = Vec::new();

        for i in 0..400 {
            let pick = |rng: &mut StdRng, known: &[EntryId]| {
                (!known.is_empty()).then(|| known[rng.gen_range(0..known.len())].clone())
            };
            match rng.gen_range(0..6) {
                0 | 1 => {
                    let p = patient(&format!("P{}", rng.gen_range(0..30)));
                    if let Ok(entry) = engine.admit(&cardiology, &p, None) {
                        known.push(entry.id);
                    }
                }
                2 => {
                    if let Some(id) = pick(&mut rng, &known) {
                        let direction = if i % 2 == 0 {
                            ReorderDirection::Up
                        } else {
                            ReorderDirection::Down
                        };
                        let _ = engine.reorder(&cardiology, &id, direction);
                    }
                }
                3 => {
                    if let Some(id) = pick(&mut rng, &known) {
                        let to = [
                            QueueStatus::Waiting,
                            QueueStatus::InConsultation,
                            QueueStatus::NoShow,
                            QueueStatus::Completed,
                        ][rng.gen_range(0..4)];
                        let _ = engine.set_status(&id, to);
                    }
                }
                4 => {
                    if let Some(id) = pick(&mut rng, &known) {
                        let _ = engine.remove(&id);
                    }
                }
                _ => {
                    if let Some(id) = pick(&mut rng, &known) {
                        let _ = engine.start_consultation(&id, None);
                    }
                }
            }
            assert_dense(&engine, &cardiology);

            let active = engine.list_active(&cardiology).unwrap();
            let patients: HashSet<_> = active.iter().map(|e| e.patient_id.clone()).collect();
            assert_eq!(patients.len(), active.len());
            assert!(active.iter().all(|e| e.status.is_active()));
        }
    }

    #[test]
    fn test_reorder_up_then_down_restores_order() {
        let engine = engine();
        let cardiology = dept("cardiology");
        engine.admit(&cardiology, &patient("A"), None).unwrap();
        let b = engine.admit(&cardiology, &patient("B"), None).unwrap();
        engine.admit(&cardiology, &patient("C"), None).unwrap();
        let before = engine.list_active(&cardiology).unwrap();

        let after_up = engine.reorder(&cardiology, &b.id, ReorderDirection::Up).unwrap();
        assert_eq!(after_up[0].id, b.id);
        let after_down = engine
            .reorder(&cardiology, &b.id, ReorderDirection::Down)
            .unwrap();
        assert_eq!(after_down, before);
    }

    #[test]
    fn test_reorder_at_boundary_is_noop_without_event() {
        let engine = engine();
        let (tx, rx) = mpsc::channel();
        let cardiology = dept("cardiology");
        let a = engine.admit(&cardiology, &patient("A"), None).unwrap();
        engine.subscribe(Arc::new(ChannelObserver::new(tx))).unwrap();

        let active = engine.reorder(&cardiology, &a.id, ReorderDirection::Up).unwrap();
        assert_eq!(active.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_reorder_entry_from_another_department() {
        let engine = engine();
        let a = engine.admit(&dept("neurology"), &patient("A"), None).unwrap();
        let result = engine.reorder(&dept("cardiology"), &a.id, ReorderDirection::Up);
        assert!(matches!(result, Err(QueueError::NotInQueue(_))));
    }

    #[test]
    fn test_unknown_entry() {
        let engine = engine();
        let id = EntryId::parse("20260111T143522.045Z-550e8400e29b41d4a716446655440000").unwrap();
        assert!(matches!(
            engine.set_status(&id, QueueStatus::NoShow),
            Err(QueueError::UnknownEntry(_))
        ));
        assert!(matches!(engine.entry(&id), Err(QueueError::UnknownEntry(_))));
    }

    #[test]
    fn test_staff_consultation_limit() {
        let cfg = CoreConfig::new(
            10,
            ConsultationLimit::StaffAvailable,
            30,
            LoadThresholds::default(),
        )
        .unwrap();
        let engine = engine_with(cfg);
        let cardiology = dept("cardiology");
        let a = engine.admit(&cardiology, &patient("A"), None).unwrap();
        let b = engine.admit(&cardiology, &patient("B"), None).unwrap();

        engine.start_consultation(&a.id, None).unwrap();
        let result = engine.set_status(&b.id, QueueStatus::InConsultation);
        assert!(matches!(
            result,
            Err(QueueError::ConsultationLimitReached { limit: 1, .. })
        ));

        engine.set_status(&a.id, QueueStatus::Completed).unwrap();
        engine.set_status(&b.id, QueueStatus::InConsultation).unwrap();
    }

    #[test]
    fn test_evicted_history_entries_become_unknown() {
        let cfg = CoreConfig::new(1, ConsultationLimit::Unlimited, 30, LoadThresholds::default())
            .unwrap();
        let engine = engine_with(cfg);
        let cardiology = dept("cardiology");
        let a = engine.admit(&cardiology, &patient("A"), None).unwrap();
        let b = engine.admit(&cardiology, &patient("B"), None).unwrap();

        engine.set_status(&a.id, QueueStatus::NoShow).unwrap();
        engine.set_status(&b.id, QueueStatus::NoShow).unwrap();

        assert_eq!(engine.history(&cardiology).unwrap().len(), 1);
        assert!(matches!(engine.entry(&a.id), Err(QueueError::UnknownEntry(_))));
        assert_eq!(engine.entry(&b.id).unwrap().status, QueueStatus::NoShow);
    }

    #[test]
    fn test_observers_receive_events_in_order() {
        let engine = engine();
        let (tx, rx) = mpsc::channel();
        engine.subscribe(Arc::new(ChannelObserver::new(tx))).unwrap();
        let cardiology = dept("cardiology");

        let a = engine.admit(&cardiology, &patient("A"), None).unwrap();
        engine.set_status(&a.id, QueueStatus::NoShow).unwrap();

        assert!(matches!(rx.recv().unwrap(), QueueEvent::Admitted { .. }));
        match rx.recv().unwrap() {
            QueueEvent::StatusChanged { from, entry } => {
                assert_eq!(from, QueueStatus::Waiting);
                assert_eq!(entry.status, QueueStatus::NoShow);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_events_still_delivered_after_observer_lock_poisoned() {
        let engine = engine();
        let (tx, rx) = mpsc::channel();
        engine.subscribe(Arc::new(ChannelObserver::new(tx))).unwrap();

        std::thread::scope(|s| {
            let poisoner = s.spawn(|| {
                let _guard = engine.observers.write().unwrap();
                panic!("observer registration failed");
            });
            assert!(poisoner.join().is_err());
        });
        assert!(engine.observers.is_poisoned());

        let entry = engine.admit(&dept("cardiology"), &patient("A"), None).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            QueueEvent::Admitted { entry: delivered } if delivered.id == entry.id
        ));
    }

    #[test]
    fn test_active_entry_lookups() {
        let engine = engine();
        let cardiology = dept("cardiology");
        let appointment = AppointmentId::generate();
        let a = engine
            .admit(&cardiology, &patient("A"), Some(appointment))
            .unwrap();

        assert_eq!(
            engine
                .active_entry_for_appointment(&cardiology, &appointment)
                .unwrap()
                .map(|e| e.id),
            Some(a.id.clone())
        );
        assert!(engine
            .active_entry_for_patient(&dept("neurology"), &patient("A"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_release_appointment_forgets_linked_entries() {
        let engine = engine();
        let cardiology = dept("cardiology");
        let appointment = AppointmentId::generate();
        let a = engine
            .admit(&cardiology, &patient("A"), Some(appointment))
            .unwrap();
        engine.set_status(&a.id, QueueStatus::NoShow).unwrap();
        let b = engine.admit(&cardiology, &patient("B"), None).unwrap();

        let (tx, rx) = mpsc::channel();
        engine.subscribe(Arc::new(ChannelObserver::new(tx))).unwrap();

        let released = engine.release_appointment(&cardiology, &appointment).unwrap();
        assert_eq!(released.len(), 1);
        assert!(matches!(engine.entry(&a.id), Err(QueueError::UnknownEntry(_))));
        assert!(matches!(
            engine.set_status(&a.id, QueueStatus::Waiting),
            Err(QueueError::UnknownEntry(_))
        ));
        assert_eq!(engine.entry(&b.id).unwrap().sequence_rank, Some(1));
        assert!(matches!(
            rx.try_recv().unwrap(),
            QueueEvent::Removed { entry } if entry.id == a.id
        ));

        assert!(engine
            .release_appointment(&dept("neurology"), &appointment)
            .unwrap()
            .is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_admissions_keep_ranks_dense() {
        let engine = engine();
        let cardiology = dept("cardiology");
        let neurology = dept("neurology");

        std::thread::scope(|s| {
            for t in 0..8 {
                let engine = &engine;
                let department = if t % 2 == 0 { &cardiology } else { &neurology };
                s.spawn(move || {
                    for i in 0..25 {
                        let p = patient(&format!("T{t}-{i}"));
                        let entry = engine.admit(department, &p, None).unwrap();
                        if i % 5 == 0 {
                            engine.set_status(&entry.id, QueueStatus::NoShow).unwrap();
                        }
                    }
                });
            }
        });

        for department in [&cardiology, &neurology] {
            let active = engine.list_active(department).unwrap();
            assert_eq!(active.len(), 4 * 20);
            assert_dense(&engine, department);
            let ids: HashSet<_> = active.iter().map(|e| e.id.clone()).collect();
            assert_eq!(ids.len(), active.len());
            assert!(active.windows(2).all(|w| w[0].joined_at < w[1].joined_at));
        }
    }
}
