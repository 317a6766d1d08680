//! Clinic services.
//!
//! [`Clinic`] wires the registries to the queue engine and owns the flows that cross them:
//! appointment check-in admits into the queue, cancellation releases any live entry, and
//! completing an entry completes its appointment.

use crate::engine::QueueEngine;
use crate::events::TracingObserver;
use crate::projector::QueueStatusProjector;
use crate::queue::{QueueEntry, QueueStatus};
use crate::registries::appointments::{Appointment, AppointmentRegistry};
use crate::registries::departments::{Department, DepartmentRegistry};
use crate::registries::patients::PatientStore;
use crate::{AppointmentId, CoreConfig, DepartmentId, EntryId, PatientId, QueueError, QueueResult};
use std::sync::Arc;

pub struct Clinic {
    cfg: Arc<CoreConfig>,
    departments: Arc<DepartmentRegistry>,
    patients: Arc<PatientStore>,
    appointments: AppointmentRegistry,
    engine: QueueEngine,
}

impl Clinic {
    /// Builds the services over the given departments. Queue events are logged via `tracing`.
    pub fn new(cfg: Arc<CoreConfig>, departments: Vec<Department>) -> QueueResult<Self> {
        let departments = Arc::new(DepartmentRegistry::with_departments(departments)?);
        let patients = Arc::new(PatientStore::new());
        let appointments = AppointmentRegistry::new(
            Arc::clone(&cfg),
            Arc::clone(&departments),
            Arc::clone(&patients),
        );
        let engine = QueueEngine::new(Arc::clone(&cfg), Arc::clone(&departments));
        engine.subscribe(Arc::new(TracingObserver))?;

        Ok(Self {
            cfg,
            departments,
            patients,
            appointments,
            engine,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn departments(&self) -> &DepartmentRegistry {
        &self.departments
    }

    pub fn patients(&self) -> &PatientStore {
        &self.patients
    }

    pub fn appointments(&self) -> &AppointmentRegistry {
        &self.appointments
    }

    pub fn engine(&self) -> &QueueEngine {
        &self.engine
    }

    pub fn projector(&self) -> QueueStatusProjector<'_> {
        QueueStatusProjector::new(&self.engine, &self.cfg)
    }

    /// Checks in a scheduled appointment and admits the patient to its department's queue.
    ///
    /// If admission fails (for example [`QueueError::AlreadyQueued`]) the appointment stays
    /// `scheduled`.
    pub fn check_in(&self, appointment: &AppointmentId) -> QueueResult<(Appointment, QueueEntry)> {
        self.appointments.check_in_with(appointment, |a| {
            self.engine
                .admit(&a.department_id, &a.patient_id, Some(a.id))
        })
    }

    /// Admits a registered patient without an appointment.
    pub fn walk_in(&self, department: &DepartmentId, patient: &PatientId) -> QueueResult<QueueEntry> {
        if !self.patients.contains(patient)? {
            return Err(QueueError::UnknownPatient(patient.clone()));
        }
        self.engine.admit(department, patient, None)
    }

    /// Cancels an appointment and drops its queue entries: the active one, if any, and a
    /// retained `no_show` entry that could otherwise be restored.
    pub fn cancel_appointment(&self, appointment: &AppointmentId) -> QueueResult<Appointment> {
        let (cancelled, released) = self.appointments.cancel_with(appointment, |a| {
            self.engine.release_appointment(&a.department_id, &a.id)
        })?;

        for entry in &released {
            tracing::info!(
                appointment = %cancelled.id,
                entry = %entry.id,
                status = %entry.status,
                "released queue entry of cancelled appointment"
            );
        }
        Ok(cancelled)
    }

    /// Finishes a consultation and completes the linked appointment.
    ///
    /// The appointment transition is validated before the entry is touched, so either both
    /// complete or neither does.
    pub fn complete_entry(&self, entry: &EntryId) -> QueueResult<QueueEntry> {
        match self.engine.entry(entry)?.appointment_id {
            Some(appointment) => self
                .appointments
                .complete_with(&appointment, |_| {
                    self.engine.set_status(entry, QueueStatus::Completed)
                })
                .map(|(_, completed)| completed),
            None => self.engine.set_status(entry, QueueStatus::Completed),
        }
    }

    /// Status change entry point for staff actions. Completion goes through
    /// [`Clinic::complete_entry`] so the appointment follows.
    pub fn set_entry_status(&self, entry: &EntryId, to: QueueStatus) -> QueueResult<QueueEntry> {
        match to {
            QueueStatus::Completed => self.complete_entry(entry),
            _ => self.engine.set_status(entry, to),
        }
    }
}
