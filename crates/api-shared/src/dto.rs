//! Wire types for the REST API.
//!
//! Timestamps travel as RFC 3339 strings, dates as `YYYY-MM-DD`, times as `HH:MM[:SS]`, and
//! enum values as their snake_case names.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Body of every non-2xx response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    /// Stable snake_case error kind, e.g. `already_queued`.
    pub error: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateDepartmentReq {
    pub id: String,
    pub name: String,
    pub average_processing_minutes: u32,
    #[serde(default)]
    pub staff_available: u32,
}

/// Partial department edit; omitted fields are left unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateDepartmentReq {
    pub name: Option<String>,
    pub average_processing_minutes: Option<u32>,
    pub staff_available: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DepartmentRes {
    pub id: String,
    pub name: String,
    pub average_processing_minutes: u32,
    pub staff_available: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListDepartmentsRes {
    pub departments: Vec<DepartmentRes>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterPatientReq {
    pub id: String,
    pub name: String,
    /// Phone number or email address.
    pub contact: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientRes {
    pub id: String,
    pub name: String,
    pub contact: String,
    pub registered_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BookAppointmentReq {
    pub patient_id: String,
    pub department_id: String,
    pub doctor_id: String,
    pub date: String,
    pub time: String,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AppointmentRes {
    pub id: String,
    pub patient_id: String,
    pub department_id: String,
    pub doctor_id: String,
    pub date: String,
    pub time: String,
    pub status: String,
    pub notes: Option<String>,
}

/// New slot for a scheduled appointment.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RescheduleReq {
    pub date: String,
    pub time: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListAppointmentsRes {
    pub appointments: Vec<AppointmentRes>,
}

/// Walk-in admission.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AdmitReq {
    pub patient_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueueEntryRes {
    pub id: String,
    pub appointment_id: Option<String>,
    pub patient_id: String,
    pub department_id: String,
    pub joined_at: String,
    pub status: String,
    pub rank: Option<u32>,
    pub provider: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListQueueRes {
    pub entries: Vec<QueueEntryRes>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckInRes {
    pub appointment: AppointmentRes,
    pub entry: QueueEntryRes,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReorderReq {
    /// `up` or `down`.
    pub direction: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SetStatusReq {
    /// `waiting`, `in_consultation`, `no_show` or `completed`.
    pub status: String,
    /// Staff member starting the consultation. Only used with `in_consultation`.
    pub provider: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueueSnapshotRes {
    pub entry_id: String,
    pub department_id: String,
    pub status: String,
    pub position: u32,
    pub total_in_queue: u32,
    pub estimated_wait_minutes: u32,
    pub percent_complete: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DepartmentSummaryRes {
    pub department_id: String,
    pub waiting: u32,
    pub in_consultation: u32,
    pub no_show: u32,
    pub completed: u32,
    pub total_active: u32,
    pub longest_wait_minutes: u32,
    /// `low`, `normal`, `busy` or `critical`.
    pub load: String,
}

/// A patient's place in one department's queue. `snapshot` is absent when the patient has no
/// active entry there.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientQueueStatusRes {
    pub department_id: String,
    pub patient_id: String,
    pub queued: bool,
    pub snapshot: Option<QueueSnapshotRes>,
}
