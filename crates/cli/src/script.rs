//! Scripted queue sessions.
//!
//! A script is a YAML list of steps run in order against one fresh [`Clinic`]. Steps that
//! create entries or appointments may name them with `as:`; later steps refer to that label
//! instead of the generated id. A failing step is reported and the script carries on.
//!
//! ```yaml
//! - op: register_patient
//!   id: P1
//!   name: John Doe
//!   contact: "555-0100"
//! - op: walk_in
//!   department: cardiology
//!   patient: P1
//!   as: john
//! - op: project
//!   department: cardiology
//!   entry: john
//! ```

use chrono::{Local, NaiveDate, NaiveTime};
use qms_core::{
    AppointmentId, Clinic, DepartmentId, EntryId, NewAppointment, PatientId, QueueError,
    QueueResult, QueueStatus, ReorderDirection,
};
use qms_types::NonEmptyText;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    RegisterPatient {
        id: String,
        name: String,
        contact: String,
    },
    WalkIn {
        department: String,
        patient: String,
        #[serde(rename = "as")]
        label: Option<String>,
    },
    Book {
        patient: String,
        department: String,
        doctor: String,
        date: NaiveDate,
        time: NaiveTime,
        #[serde(rename = "as")]
        label: Option<String>,
    },
    CheckIn {
        appointment: String,
        #[serde(rename = "as")]
        label: Option<String>,
    },
    Cancel {
        appointment: String,
    },
    Reschedule {
        appointment: String,
        date: NaiveDate,
        time: NaiveTime,
    },
    Appointments {
        patient: String,
        #[serde(default)]
        when: Window,
    },
    DayList {
        department: String,
        date: NaiveDate,
    },
    Reorder {
        department: String,
        entry: String,
        direction: ReorderDirection,
    },
    SetStatus {
        entry: String,
        status: QueueStatus,
        provider: Option<String>,
    },
    Remove {
        entry: String,
    },
    List {
        department: String,
    },
    Project {
        department: String,
        entry: String,
    },
    PatientStatus {
        department: String,
        patient: String,
    },
    Summary {
        department: String,
    },
}

/// Which of a patient's appointments to list, relative to the current local time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    #[default]
    All,
    Upcoming,
    Past,
}

pub fn parse(yaml_text: &str) -> Result<Vec<Step>, String> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        format!("script error at {path}: {}", err.into_inner())
    })
}

/// Outcome of one step, already rendered for printing.
pub type StepOutput = QueueResult<String>;

pub struct Session<'a> {
    clinic: &'a Clinic,
    entries: HashMap<String, EntryId>,
    appointments: HashMap<String, AppointmentId>,
}

impl<'a> Session<'a> {
    pub fn new(clinic: &'a Clinic) -> Self {
        Self {
            clinic,
            entries: HashMap::new(),
            appointments: HashMap::new(),
        }
    }

    pub fn run(&mut self, step: Step) -> StepOutput {
        match step {
            Step::RegisterPatient { id, name, contact } => {
                let patient = self.clinic.patients().register(
                    PatientId::parse(&id)?,
                    NonEmptyText::new(&name)?,
                    NonEmptyText::new(&contact)?,
                )?;
                Ok(format!("registered patient {}", patient.id))
            }
            Step::WalkIn {
                department,
                patient,
                label,
            } => {
                let entry = self
                    .clinic
                    .walk_in(&DepartmentId::parse(&department)?, &PatientId::parse(&patient)?)?;
                self.remember_entry(label, &entry.id);
                render(&entry)
            }
            Step::Book {
                patient,
                department,
                doctor,
                date,
                time,
                label,
            } => {
                let appointment = self.clinic.appointments().book(NewAppointment {
                    patient_id: PatientId::parse(&patient)?,
                    department_id: DepartmentId::parse(&department)?,
                    doctor_id: NonEmptyText::new(&doctor)?,
                    scheduled_date: date,
                    scheduled_time: time,
                    notes: None,
                })?;
                if let Some(label) = label {
                    self.appointments.insert(label, appointment.id);
                }
                render(&appointment)
            }
            Step::CheckIn { appointment, label } => {
                let id = self.appointment(&appointment)?;
                let (_, entry) = self.clinic.check_in(&id)?;
                self.remember_entry(label, &entry.id);
                render(&entry)
            }
            Step::Cancel { appointment } => {
                let id = self.appointment(&appointment)?;
                render(&self.clinic.cancel_appointment(&id)?)
            }
            Step::Reschedule {
                appointment,
                date,
                time,
            } => {
                let id = self.appointment(&appointment)?;
                render(&self.clinic.appointments().reschedule(&id, date, time)?)
            }
            Step::Appointments { patient, when } => {
                let patient = PatientId::parse(&patient)?;
                if !self.clinic.patients().contains(&patient)? {
                    return Err(QueueError::UnknownPatient(patient));
                }
                let registry = self.clinic.appointments();
                let now = Local::now().naive_local();
                let found = match when {
                    Window::All => registry.for_patient(&patient)?,
                    Window::Upcoming => registry.upcoming_for_patient(&patient, now)?,
                    Window::Past => registry.past_for_patient(&patient, now)?,
                };
                render(&found)
            }
            Step::DayList { department, date } => render(
                &self
                    .clinic
                    .appointments()
                    .for_department_on(&DepartmentId::parse(&department)?, date)?,
            ),
            Step::Reorder {
                department,
                entry,
                direction,
            } => {
                let entries = self.clinic.engine().reorder(
                    &DepartmentId::parse(&department)?,
                    &self.entry(&entry)?,
                    direction,
                )?;
                render(&entries)
            }
            Step::SetStatus {
                entry,
                status,
                provider,
            } => {
                let id = self.entry(&entry)?;
                let updated = match (status, provider) {
                    (QueueStatus::InConsultation, Some(provider)) => self
                        .clinic
                        .engine()
                        .start_consultation(&id, Some(NonEmptyText::new(&provider)?))?,
                    (status, _) => self.clinic.set_entry_status(&id, status)?,
                };
                render(&updated)
            }
            Step::Remove { entry } => {
                let removed = self.clinic.engine().remove(&self.entry(&entry)?)?;
                render(&removed)
            }
            Step::List { department } => {
                render(&self.clinic.engine().list_active(&DepartmentId::parse(&department)?)?)
            }
            Step::Project { department, entry } => render(
                &self
                    .clinic
                    .projector()
                    .project(&DepartmentId::parse(&department)?, &self.entry(&entry)?)?,
            ),
            Step::PatientStatus {
                department,
                patient,
            } => render(&self.clinic.projector().project_patient(
                &DepartmentId::parse(&department)?,
                &PatientId::parse(&patient)?,
            )?),
            Step::Summary { department } => {
                render(&self.clinic.projector().summary(&DepartmentId::parse(&department)?)?)
            }
        }
    }

    fn remember_entry(&mut self, label: Option<String>, id: &EntryId) {
        if let Some(label) = label {
            self.entries.insert(label, id.clone());
        }
    }

    /// Resolves a label, falling back to parsing a literal entry id.
    fn entry(&self, reference: &str) -> QueueResult<EntryId> {
        match self.entries.get(reference) {
            Some(id) => Ok(id.clone()),
            None => EntryId::parse(reference),
        }
    }

    fn appointment(&self, reference: &str) -> QueueResult<AppointmentId> {
        match self.appointments.get(reference) {
            Some(id) => Ok(*id),
            None => AppointmentId::parse(reference),
        }
    }
}

fn render<T: serde::Serialize>(value: &T) -> StepOutput {
    serde_json::to_string(value)
        .map_err(|e| QueueError::InvalidInput(format!("failed to render result: {e}")))
}
