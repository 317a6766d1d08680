//! Appointment Registry.
//!
//! Scheduled appointments, independent of live queue state. The registry validates bookings
//! against the patient and department registries and refuses overlapping active appointments
//! for the same patient in the same department.
//!
//! Status transitions:
//!
//! | from         | to           | operation                                 |
//! |--------------|--------------|-------------------------------------------|
//! | `scheduled`  | `checked_in` | [`AppointmentRegistry::check_in_with`]    |
//! | `scheduled`  | `cancelled`  | [`AppointmentRegistry::cancel_with`]      |
//! | `checked_in` | `cancelled`  | [`AppointmentRegistry::cancel_with`]      |
//! | `checked_in` | `completed`  | [`AppointmentRegistry::complete_with`]    |

use super::departments::DepartmentRegistry;
use super::patients::PatientStore;
use super::shared::{read, write};
use crate::config::CoreConfig;
use crate::{AppointmentId, DepartmentId, PatientId, QueueError, QueueResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use qms_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    CheckedIn,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Scheduled and checked-in appointments block overlapping bookings.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::CheckedIn)
    }

    fn can_transition_to(&self, to: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, to),
            (Scheduled, CheckedIn)
                | (Scheduled, Cancelled)
                | (CheckedIn, Cancelled)
                | (CheckedIn, Completed)
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::CheckedIn => "checked_in",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_id: PatientId,
    pub department_id: DepartmentId,
    pub doctor_id: NonEmptyText,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.scheduled_date.and_time(self.scheduled_time)
    }
}

/// Booking request.
#[derive(Clone, Debug)]
pub struct NewAppointment {
    pub patient_id: PatientId,
    pub department_id: DepartmentId,
    pub doctor_id: NonEmptyText,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub notes: Option<String>,
}

#[derive(Debug)]
pub struct AppointmentRegistry {
    cfg: Arc<CoreConfig>,
    departments: Arc<DepartmentRegistry>,
    patients: Arc<PatientStore>,
    appointments: RwLock<HashMap<AppointmentId, Appointment>>,
}

impl AppointmentRegistry {
    pub fn new(
        cfg: Arc<CoreConfig>,
        departments: Arc<DepartmentRegistry>,
        patients: Arc<PatientStore>,
    ) -> Self {
        Self {
            cfg,
            departments,
            patients,
            appointments: RwLock::new(HashMap::new()),
        }
    }

    /// Books a new appointment in `scheduled` state.
    ///
    /// # Errors
    ///
    /// - [`QueueError::UnknownPatient`] / [`QueueError::UnknownDepartment`] if either is not
    ///   registered.
    /// - [`QueueError::AppointmentConflict`] if the patient already holds a scheduled or
    ///   checked-in appointment in the same department whose slot overlaps this one.
    pub fn book(&self, request: NewAppointment) -> QueueResult<Appointment> {
        if !self.patients.contains(&request.patient_id)? {
            return Err(QueueError::UnknownPatient(request.patient_id));
        }
        if !self.departments.contains(&request.department_id)? {
            return Err(QueueError::UnknownDepartment(request.department_id));
        }

        let appointment = Appointment {
            id: AppointmentId::generate(),
            patient_id: request.patient_id,
            department_id: request.department_id,
            doctor_id: request.doctor_id,
            scheduled_date: request.scheduled_date,
            scheduled_time: request.scheduled_time,
            status: AppointmentStatus::Scheduled,
            notes: request
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            created_at: Utc::now(),
        };

        let mut appointments = write(&self.appointments, "appointments")?;
        self.check_overlap(&appointments, &appointment)?;
        appointments.insert(appointment.id, appointment.clone());

        tracing::info!(
            appointment = %appointment.id,
            patient = %appointment.patient_id,
            department = %appointment.department_id,
            "booked appointment"
        );
        Ok(appointment)
    }

    pub fn get(&self, id: &AppointmentId) -> QueueResult<Appointment> {
        read(&self.appointments, "appointments")?
            .get(id)
            .cloned()
            .ok_or(QueueError::UnknownAppointment(*id))
    }

    /// Moves a scheduled appointment to a new date and time.
    pub fn reschedule(
        &self,
        id: &AppointmentId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> QueueResult<Appointment> {
        let mut appointments = write(&self.appointments, "appointments")?;
        let current = appointments
            .get(id)
            .ok_or(QueueError::UnknownAppointment(*id))?;

        if current.status != AppointmentStatus::Scheduled {
            return Err(QueueError::InvalidAppointmentTransition {
                from: current.status,
                to: AppointmentStatus::Scheduled,
            });
        }

        let mut moved = current.clone();
        moved.scheduled_date = date;
        moved.scheduled_time = time;
        self.check_overlap(&appointments, &moved)?;
        appointments.insert(*id, moved.clone());

        tracing::info!(appointment = %id, starts_at = %moved.starts_at(), "rescheduled appointment");
        Ok(moved)
    }

    /// Moves a scheduled appointment to `checked_in` once `admit` succeeds.
    ///
    /// `admit` runs while the registry lock is held, after the transition has been validated;
    /// if it fails, the appointment is left untouched and its error is returned.
    pub fn check_in_with<T>(
        &self,
        id: &AppointmentId,
        admit: impl FnOnce(&Appointment) -> QueueResult<T>,
    ) -> QueueResult<(Appointment, T)> {
        self.transition_with(id, AppointmentStatus::CheckedIn, admit)
    }

    /// Cancels an appointment once `release` (removal of any live queue entry) succeeds.
    pub fn cancel_with<T>(
        &self,
        id: &AppointmentId,
        release: impl FnOnce(&Appointment) -> QueueResult<T>,
    ) -> QueueResult<(Appointment, T)> {
        self.transition_with(id, AppointmentStatus::Cancelled, release)
    }

    pub fn cancel(&self, id: &AppointmentId) -> QueueResult<Appointment> {
        self.cancel_with(id, |_| Ok(())).map(|(a, _)| a)
    }

    pub fn mark_checked_in(&self, id: &AppointmentId) -> QueueResult<Appointment> {
        self.check_in_with(id, |_| Ok(())).map(|(a, _)| a)
    }

    /// Completes a checked-in appointment once `finish` (the queue-side completion) succeeds.
    pub fn complete_with<T>(
        &self,
        id: &AppointmentId,
        finish: impl FnOnce(&Appointment) -> QueueResult<T>,
    ) -> QueueResult<(Appointment, T)> {
        self.transition_with(id, AppointmentStatus::Completed, finish)
    }

    pub fn mark_completed(&self, id: &AppointmentId) -> QueueResult<Appointment> {
        self.complete_with(id, |_| Ok(())).map(|(a, _)| a)
    }

    /// All appointments of a patient, earliest first.
    pub fn for_patient(&self, patient: &PatientId) -> QueueResult<Vec<Appointment>> {
        let mut found: Vec<Appointment> = read(&self.appointments, "appointments")?
            .values()
            .filter(|a| &a.patient_id == patient)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.starts_at(), a.created_at));
        Ok(found)
    }

    /// Appointments still ahead of the patient: checked in, or scheduled at or after `now`.
    pub fn upcoming_for_patient(
        &self,
        patient: &PatientId,
        now: NaiveDateTime,
    ) -> QueueResult<Vec<Appointment>> {
        Ok(self
            .for_patient(patient)?
            .into_iter()
            .filter(|a| is_upcoming(a, now))
            .collect())
    }

    /// Everything that is not upcoming: completed, cancelled, or scheduled in the past.
    pub fn past_for_patient(
        &self,
        patient: &PatientId,
        now: NaiveDateTime,
    ) -> QueueResult<Vec<Appointment>> {
        Ok(self
            .for_patient(patient)?
            .into_iter()
            .filter(|a| !is_upcoming(a, now))
            .collect())
    }

    /// Scheduled (not yet checked-in) appointments of a department on `date`, by time.
    pub fn for_department_on(
        &self,
        department: &DepartmentId,
        date: NaiveDate,
    ) -> QueueResult<Vec<Appointment>> {
        let mut found: Vec<Appointment> = read(&self.appointments, "appointments")?
            .values()
            .filter(|a| {
                &a.department_id == department
                    && a.scheduled_date == date
                    && a.status == AppointmentStatus::Scheduled
            })
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.scheduled_time, a.created_at));
        Ok(found)
    }

    fn transition_with<T>(
        &self,
        id: &AppointmentId,
        to: AppointmentStatus,
        effect: impl FnOnce(&Appointment) -> QueueResult<T>,
    ) -> QueueResult<(Appointment, T)> {
        let mut appointments = write(&self.appointments, "appointments")?;
        let appointment = appointments
            .get_mut(id)
            .ok_or(QueueError::UnknownAppointment(*id))?;

        if !appointment.status.can_transition_to(to) {
            tracing::warn!(
                appointment = %id,
                from = %appointment.status,
                to = %to,
                "rejected appointment transition"
            );
            return Err(QueueError::InvalidAppointmentTransition {
                from: appointment.status,
                to,
            });
        }

        let outcome = effect(&*appointment)?;
        appointment.status = to;

        tracing::info!(appointment = %id, status = %to, "appointment status changed");
        Ok((appointment.clone(), outcome))
    }

    fn check_overlap(
        &self,
        appointments: &HashMap<AppointmentId, Appointment>,
        candidate: &Appointment,
    ) -> QueueResult<()> {
        let slot = Duration::minutes(i64::from(self.cfg.appointment_slot_minutes()));
        let start = candidate.starts_at();

        let clash = appointments.values().find(|existing| {
            existing.id != candidate.id
                && existing.status.is_active()
                && existing.patient_id == candidate.patient_id
                && existing.department_id == candidate.department_id
                && start < existing.starts_at() + slot
                && existing.starts_at() < start + slot
        });

        match clash {
            Some(existing) => {
                tracing::debug!(
                    candidate = %candidate.id,
                    existing = %existing.id,
                    "appointment overlaps an existing booking"
                );
                Err(QueueError::AppointmentConflict(existing.id))
            }
            None => Ok(()),
        }
    }
}

fn is_upcoming(appointment: &Appointment, now: NaiveDateTime) -> bool {
    match appointment.status {
        AppointmentStatus::CheckedIn => true,
        AppointmentStatus::Scheduled => appointment.starts_at() >= now,
        AppointmentStatus::Cancelled | AppointmentStatus::Completed => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registries::departments::Department;

    fn setup() -> AppointmentRegistry {
        let departments = Arc::new(DepartmentRegistry::new());
        for id in ["cardiology", "neurology"] {
            departments
                .register(
                    Department::new(
                        DepartmentId::parse(id).unwrap(),
                        NonEmptyText::new(id).unwrap(),
                        10,
                        2,
                    )
                    .unwrap(),
                )
                .unwrap();
        }
        let patients = Arc::new(PatientStore::new());
        patients
            .register(
                PatientId::parse("P1").unwrap(),
                NonEmptyText::new("John Doe").unwrap(),
                NonEmptyText::new("555-0100").unwrap(),
            )
            .unwrap();

        AppointmentRegistry::new(Arc::new(CoreConfig::default()), departments, patients)
    }

    fn request(department: &str, date: &str, time: &str) -> NewAppointment {
        NewAppointment {
            patient_id: PatientId::parse("P1").unwrap(),
            department_id: DepartmentId::parse(department).unwrap(),
            doctor_id: NonEmptyText::new("dr-smith").unwrap(),
            scheduled_date: date.parse().unwrap(),
            scheduled_time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            notes: None,
        }
    }

    #[test]
    fn test_book_creates_scheduled_appointment() {
        let registry = setup();
        let booked = registry
            .book(NewAppointment {
                notes: Some("  Follow-up  ".into()),
                ..request("cardiology", "2025-05-05", "09:30")
            })
            .unwrap();

        assert_eq!(booked.status, AppointmentStatus::Scheduled);
        assert_eq!(booked.notes.as_deref(), Some("Follow-up"));
        assert_eq!(registry.get(&booked.id).unwrap(), booked);
    }

    #[test]
    fn test_book_requires_known_patient_and_department() {
        let registry = setup();

        let unknown_patient = NewAppointment {
            patient_id: PatientId::parse("P999").unwrap(),
            ..request("cardiology", "2025-05-05", "09:30")
        };
        assert!(matches!(
            registry.book(unknown_patient),
            Err(QueueError::UnknownPatient(_))
        ));

        assert!(matches!(
            registry.book(request("dermatology", "2025-05-05", "09:30")),
            Err(QueueError::UnknownDepartment(_))
        ));
    }

    #[test]
    fn test_book_rejects_overlap_in_same_department() {
        let registry = setup();
        let first = registry.book(request("cardiology", "2025-05-05", "09:30")).unwrap();

        match registry.book(request("cardiology", "2025-05-05", "09:45")) {
            Err(QueueError::AppointmentConflict(id)) => assert_eq!(id, first.id),
            other => panic!("expected conflict, got {other:?}"),
        }

        // Back-to-back slots and other departments are fine.
        assert!(registry.book(request("cardiology", "2025-05-05", "10:00")).is_ok());
        assert!(registry.book(request("neurology", "2025-05-05", "09:30")).is_ok());
    }

    #[test]
    fn test_cancelled_appointment_frees_the_slot() {
        let registry = setup();
        let first = registry.book(request("cardiology", "2025-05-05", "09:30")).unwrap();
        registry.cancel(&first.id).unwrap();

        assert!(registry.book(request("cardiology", "2025-05-05", "09:30")).is_ok());
    }

    #[test]
    fn test_transition_table() {
        let registry = setup();
        let a = registry.book(request("cardiology", "2025-05-05", "09:30")).unwrap();

        assert!(matches!(
            registry.mark_completed(&a.id),
            Err(QueueError::InvalidAppointmentTransition {
                from: AppointmentStatus::Scheduled,
                to: AppointmentStatus::Completed
            })
        ));

        registry.mark_checked_in(&a.id).unwrap();
        assert!(registry.mark_checked_in(&a.id).is_err());
        assert_eq!(
            registry.mark_completed(&a.id).unwrap().status,
            AppointmentStatus::Completed
        );
        assert!(registry.cancel(&a.id).is_err());
    }

    #[test]
    fn test_check_in_with_failing_effect_leaves_appointment_scheduled() {
        let registry = setup();
        let a = registry.book(request("cardiology", "2025-05-05", "09:30")).unwrap();

        let result: QueueResult<(Appointment, ())> = registry.check_in_with(&a.id, |_| {
            Err(QueueError::InvalidInput("admission refused".into()))
        });
        assert!(result.is_err());
        assert_eq!(
            registry.get(&a.id).unwrap().status,
            AppointmentStatus::Scheduled
        );
    }

    #[test]
    fn test_reschedule_checks_overlap_excluding_itself() {
        let registry = setup();
        let a = registry.book(request("cardiology", "2025-05-05", "09:00")).unwrap();
        let b = registry.book(request("cardiology", "2025-05-05", "11:00")).unwrap();

        // Nudging within its own slot does not clash with itself.
        let moved = registry
            .reschedule(&a.id, a.scheduled_date, NaiveTime::from_hms_opt(9, 15, 0).unwrap())
            .unwrap();
        assert_eq!(moved.scheduled_time, NaiveTime::from_hms_opt(9, 15, 0).unwrap());

        assert!(matches!(
            registry.reschedule(&a.id, a.scheduled_date, b.scheduled_time),
            Err(QueueError::AppointmentConflict(_))
        ));
    }

    #[test]
    fn test_reschedule_only_from_scheduled() {
        let registry = setup();
        let a = registry.book(request("cardiology", "2025-05-05", "09:00")).unwrap();
        registry.cancel(&a.id).unwrap();

        assert!(matches!(
            registry.reschedule(&a.id, a.scheduled_date, a.scheduled_time),
            Err(QueueError::InvalidAppointmentTransition { .. })
        ));
    }

    #[test]
    fn test_upcoming_and_past_split() {
        let registry = setup();
        let past = registry.book(request("cardiology", "2025-04-20", "10:00")).unwrap();
        let future = registry.book(request("neurology", "2025-05-15", "14:00")).unwrap();
        let done = registry.book(request("cardiology", "2025-05-01", "09:00")).unwrap();
        registry.mark_checked_in(&done.id).unwrap();
        registry.mark_completed(&done.id).unwrap();

        let now: NaiveDateTime = "2025-05-01T12:00:00".parse().unwrap();
        let patient = PatientId::parse("P1").unwrap();

        let upcoming: Vec<_> = registry
            .upcoming_for_patient(&patient, now)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(upcoming, vec![future.id]);

        let history: Vec<_> = registry
            .past_for_patient(&patient, now)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(history, vec![past.id, done.id]);
    }

    #[test]
    fn test_for_department_on_lists_scheduled_by_time() {
        let registry = setup();
        let late = registry.book(request("cardiology", "2025-05-05", "11:00")).unwrap();
        let early = registry.book(request("cardiology", "2025-05-05", "09:00")).unwrap();
        registry.book(request("neurology", "2025-05-05", "10:00")).unwrap();

        let date: NaiveDate = "2025-05-05".parse().unwrap();
        let ids: Vec<_> = registry
            .for_department_on(&DepartmentId::parse("cardiology").unwrap(), date)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }
}
