//! Conversions between core records and wire types.

use api_shared::{
    AppointmentRes, DepartmentRes, DepartmentSummaryRes, PatientRes, QueueEntryRes,
    QueueSnapshotRes,
};
use chrono::{NaiveDate, NaiveTime};
use qms_core::{
    Appointment, Department, DepartmentSummary, Patient, QueueEntry, QueueError, QueueResult,
    QueueSnapshot,
};

pub fn department(d: &Department) -> DepartmentRes {
    DepartmentRes {
        id: d.id().to_string(),
        name: d.name().to_string(),
        average_processing_minutes: d.average_processing_minutes(),
        staff_available: d.staff_available(),
    }
}

pub fn patient(p: &Patient) -> PatientRes {
    PatientRes {
        id: p.id.to_string(),
        name: p.name.to_string(),
        contact: p.contact.to_string(),
        registered_at: p.registered_at.to_rfc3339(),
    }
}

pub fn appointment(a: &Appointment) -> AppointmentRes {
    AppointmentRes {
        id: a.id.to_string(),
        patient_id: a.patient_id.to_string(),
        department_id: a.department_id.to_string(),
        doctor_id: a.doctor_id.to_string(),
        date: a.scheduled_date.format("%Y-%m-%d").to_string(),
        time: a.scheduled_time.format("%H:%M").to_string(),
        status: a.status.to_string(),
        notes: a.notes.clone(),
    }
}

pub fn entry(e: &QueueEntry) -> QueueEntryRes {
    QueueEntryRes {
        id: e.id.to_string(),
        appointment_id: e.appointment_id.map(|a| a.to_string()),
        patient_id: e.patient_id.to_string(),
        department_id: e.department_id.to_string(),
        joined_at: e.joined_at.to_rfc3339(),
        status: e.status.to_string(),
        rank: e.sequence_rank,
        provider: e.provider.as_ref().map(|p| p.to_string()),
    }
}

pub fn snapshot(s: &QueueSnapshot) -> QueueSnapshotRes {
    QueueSnapshotRes {
        entry_id: s.entry_id.to_string(),
        department_id: s.department_id.to_string(),
        status: s.status.to_string(),
        position: s.position,
        total_in_queue: s.total_in_queue,
        estimated_wait_minutes: s.estimated_wait_minutes,
        percent_complete: s.percent_complete,
    }
}

pub fn summary(s: &DepartmentSummary) -> DepartmentSummaryRes {
    DepartmentSummaryRes {
        department_id: s.department_id.to_string(),
        waiting: s.waiting,
        in_consultation: s.in_consultation,
        no_show: s.no_show,
        completed: s.completed,
        total_active: s.total_active,
        longest_wait_minutes: s.longest_wait_minutes,
        load: s.load.to_string(),
    }
}

pub fn parse_date(input: &str) -> QueueResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| QueueError::InvalidInput(format!("invalid date '{input}': {e}")))
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_time(input: &str) -> QueueResult<NaiveTime> {
    let input = input.trim();
    NaiveTime::parse_from_str(input, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M:%S"))
        .map_err(|e| QueueError::InvalidInput(format!("invalid time '{input}': {e}")))
}
