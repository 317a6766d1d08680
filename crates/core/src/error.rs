use crate::{AppointmentId, AppointmentStatus, DepartmentId, EntryId, PatientId, QueueStatus};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("patient {patient} already has an active entry in department {department}")]
    AlreadyQueued {
        patient: PatientId,
        department: DepartmentId,
    },
    #[error("invalid queue transition from {from} to {to}")]
    InvalidTransition { from: QueueStatus, to: QueueStatus },
    #[error("entry {0} is not active in this department's queue")]
    NotInQueue(EntryId),
    #[error("unknown department: {0}")]
    UnknownDepartment(DepartmentId),
    #[error("unknown queue entry: {0}")]
    UnknownEntry(EntryId),

    #[error("department {department} has reached its limit of {limit} concurrent consultations")]
    ConsultationLimitReached {
        department: DepartmentId,
        limit: usize,
    },
    #[error("provider {0} is already in a consultation")]
    ProviderBusy(String),

    #[error("unknown patient: {0}")]
    UnknownPatient(PatientId),
    #[error("unknown appointment: {0}")]
    UnknownAppointment(AppointmentId),
    #[error("department {0} is already registered")]
    DuplicateDepartment(DepartmentId),
    #[error("patient {0} is already registered")]
    DuplicatePatient(PatientId),
    #[error("appointment overlaps existing appointment {0} for the same patient and department")]
    AppointmentConflict(AppointmentId),
    #[error("invalid appointment transition from {from} to {to}")]
    InvalidAppointmentTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("failed to read configuration file: {0}")]
    ConfigRead(std::io::Error),
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),
    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl QueueError {
    /// Stable snake_case name of the error kind, for wire responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            QueueError::InvalidInput(_) => "invalid_input",
            QueueError::AlreadyQueued { .. } => "already_queued",
            QueueError::InvalidTransition { .. } => "invalid_transition",
            QueueError::NotInQueue(_) => "not_in_queue",
            QueueError::UnknownDepartment(_) => "unknown_department",
            QueueError::UnknownEntry(_) => "unknown_entry",
            QueueError::ConsultationLimitReached { .. } => "consultation_limit_reached",
            QueueError::ProviderBusy(_) => "provider_busy",
            QueueError::UnknownPatient(_) => "unknown_patient",
            QueueError::UnknownAppointment(_) => "unknown_appointment",
            QueueError::DuplicateDepartment(_) => "duplicate_department",
            QueueError::DuplicatePatient(_) => "duplicate_patient",
            QueueError::AppointmentConflict(_) => "appointment_conflict",
            QueueError::InvalidAppointmentTransition { .. } => "invalid_appointment_transition",
            QueueError::ConfigRead(_) => "config_read",
            QueueError::ConfigParse(_) => "config_parse",
            QueueError::LockPoisoned(_) => "lock_poisoned",
        }
    }
}

impl From<qms_types::TextError> for QueueError {
    fn from(e: qms_types::TextError) -> Self {
        QueueError::InvalidInput(e.to_string())
    }
}

impl From<qms_types::SlugError> for QueueError {
    fn from(e: qms_types::SlugError) -> Self {
        QueueError::InvalidInput(e.to_string())
    }
}

impl From<qms_uuid::UuidError> for QueueError {
    fn from(e: qms_uuid::UuidError) -> Self {
        QueueError::InvalidInput(e.to_string())
    }
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
