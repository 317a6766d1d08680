//! # API REST
//!
//! REST API implementation for QMS.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! Uses `api-shared` for wire types and `qms-core` for all queue logic. Handlers only parse,
//! delegate to [`Clinic`] and convert.

#![warn(rust_2018_idioms)]

mod convert;
pub mod error;

use api_shared::{
    AdmitReq, AppointmentRes, BookAppointmentReq, CheckInRes, CreateDepartmentReq,
    DepartmentRes, DepartmentSummaryRes, ErrorRes, HealthRes, HealthService,
    ListAppointmentsRes, ListDepartmentsRes, ListQueueRes, PatientQueueStatusRes, PatientRes,
    QueueEntryRes, QueueSnapshotRes, RegisterPatientReq, RescheduleReq, ReorderReq,
    SetStatusReq, UpdateDepartmentReq,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use chrono::Local;
use qms_core::{
    Appointment, AppointmentId, Clinic, Department, DepartmentId, DepartmentUpdate, EntryId,
    NewAppointment, PatientId, QueueError, QueueStatus, ReorderDirection,
};
use qms_types::NonEmptyText;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub use error::{ApiError, ApiResult};

/// Application state shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    clinic: Arc<Clinic>,
}

impl AppState {
    pub fn new(clinic: Arc<Clinic>) -> Self {
        Self { clinic }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_departments,
        create_department,
        update_department,
        list_queue,
        admit,
        department_summary,
        department_history,
        reorder,
        entry_status,
        patient_status,
        department_appointments,
        set_status,
        remove_entry,
        register_patient,
        book_appointment,
        patient_appointments,
        check_in,
        cancel_appointment,
        reschedule_appointment,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        CreateDepartmentReq,
        UpdateDepartmentReq,
        DepartmentRes,
        ListDepartmentsRes,
        RegisterPatientReq,
        PatientRes,
        BookAppointmentReq,
        AppointmentRes,
        RescheduleReq,
        ListAppointmentsRes,
        AdmitReq,
        QueueEntryRes,
        ListQueueRes,
        CheckInRes,
        ReorderReq,
        SetStatusReq,
        QueueSnapshotRes,
        PatientQueueStatusRes,
        DepartmentSummaryRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/departments", get(list_departments).post(create_department))
        .route("/departments/:id", patch(update_department))
        .route("/departments/:id/queue", get(list_queue).post(admit))
        .route("/departments/:id/summary", get(department_summary))
        .route("/departments/:id/history", get(department_history))
        .route("/departments/:id/queue/:entry_id/reorder", post(reorder))
        .route("/departments/:id/queue/:entry_id/status", get(entry_status))
        .route("/departments/:id/patients/:patient_id/status", get(patient_status))
        .route("/departments/:id/appointments", get(department_appointments))
        .route("/queue/:entry_id", delete(remove_entry))
        .route("/queue/:entry_id/status", post(set_status))
        .route("/patients", post(register_patient))
        .route("/patients/:id/appointments", get(patient_appointments))
        .route("/appointments", post(book_appointment))
        .route("/appointments/:id/check-in", post(check_in))
        .route("/appointments/:id/cancel", post(cancel_appointment))
        .route("/appointments/:id/reschedule", post(reschedule_appointment))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn text(field: &str, value: &str) -> Result<NonEmptyText, QueueError> {
    NonEmptyText::new(value).map_err(|_| QueueError::InvalidInput(format!("{field} is required")))
}

fn appointment_list(appointments: &[Appointment]) -> ListAppointmentsRes {
    ListAppointmentsRes {
        appointments: appointments.iter().map(convert::appointment).collect(),
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct DepartmentSearch {
    /// Case-insensitive filter on name or id.
    search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/departments",
    params(DepartmentSearch),
    responses(
        (status = 200, description = "Departments ordered by id", body = ListDepartmentsRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn list_departments(
    State(state): State<AppState>,
    Query(query): Query<DepartmentSearch>,
) -> ApiResult<Json<ListDepartmentsRes>> {
    let registry = state.clinic.departments();
    let departments = match query.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => registry.search(term)?,
        _ => registry.list()?,
    };
    Ok(Json(ListDepartmentsRes {
        departments: departments.iter().map(convert::department).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/departments",
    request_body = CreateDepartmentReq,
    responses(
        (status = 201, description = "Department registered", body = DepartmentRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 409, description = "Department already exists", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn create_department(
    State(state): State<AppState>,
    Json(req): Json<CreateDepartmentReq>,
) -> ApiResult<(StatusCode, Json<DepartmentRes>)> {
    let department = Department::new(
        DepartmentId::parse(&req.id)?,
        text("name", &req.name)?,
        req.average_processing_minutes,
        req.staff_available,
    )?;
    let res = convert::department(&department);
    state.clinic.departments().register(department)?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    patch,
    path = "/departments/{id}",
    params(("id" = String, Path, description = "Department id")),
    request_body = UpdateDepartmentReq,
    responses(
        (status = 200, description = "Department updated", body = DepartmentRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Unknown department", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn update_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDepartmentReq>,
) -> ApiResult<Json<DepartmentRes>> {
    let update = DepartmentUpdate {
        name: req.name.as_deref().map(|n| text("name", n)).transpose()?,
        average_processing_minutes: req.average_processing_minutes,
        staff_available: req.staff_available,
    };
    let updated = state
        .clinic
        .departments()
        .update(&DepartmentId::parse(&id)?, update)?;
    Ok(Json(convert::department(&updated)))
}

#[utoipa::path(
    get,
    path = "/departments/{id}/queue",
    params(("id" = String, Path, description = "Department id")),
    responses(
        (status = 200, description = "Active entries in rank order", body = ListQueueRes),
        (status = 404, description = "Unknown department", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn list_queue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ListQueueRes>> {
    let entries = state
        .clinic
        .engine()
        .list_active(&DepartmentId::parse(&id)?)?;
    Ok(Json(ListQueueRes {
        entries: entries.iter().map(convert::entry).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/departments/{id}/queue",
    params(("id" = String, Path, description = "Department id")),
    request_body = AdmitReq,
    responses(
        (status = 201, description = "Walk-in admitted", body = QueueEntryRes),
        (status = 404, description = "Unknown department or patient", body = ErrorRes),
        (status = 409, description = "Patient already queued", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn admit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AdmitReq>,
) -> ApiResult<(StatusCode, Json<QueueEntryRes>)> {
    let entry = state
        .clinic
        .walk_in(&DepartmentId::parse(&id)?, &PatientId::parse(&req.patient_id)?)?;
    Ok((StatusCode::CREATED, Json(convert::entry(&entry))))
}

#[utoipa::path(
    get,
    path = "/departments/{id}/summary",
    params(("id" = String, Path, description = "Department id")),
    responses(
        (status = 200, description = "Queue counts and load level", body = DepartmentSummaryRes),
        (status = 404, description = "Unknown department", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn department_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DepartmentSummaryRes>> {
    let summary = state
        .clinic
        .projector()
        .summary(&DepartmentId::parse(&id)?)?;
    Ok(Json(convert::summary(&summary)))
}

#[utoipa::path(
    get,
    path = "/departments/{id}/history",
    params(("id" = String, Path, description = "Department id")),
    responses(
        (status = 200, description = "Retained no-show and completed entries", body = ListQueueRes),
        (status = 404, description = "Unknown department", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn department_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ListQueueRes>> {
    let entries = state.clinic.engine().history(&DepartmentId::parse(&id)?)?;
    Ok(Json(ListQueueRes {
        entries: entries.iter().map(convert::entry).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/departments/{id}/queue/{entry_id}/reorder",
    params(
        ("id" = String, Path, description = "Department id"),
        ("entry_id" = String, Path, description = "Queue entry id")
    ),
    request_body = ReorderReq,
    responses(
        (status = 200, description = "Active entries after the move", body = ListQueueRes),
        (status = 400, description = "Bad direction", body = ErrorRes),
        (status = 404, description = "Entry not active in this department", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn reorder(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(String, String)>,
    Json(req): Json<ReorderReq>,
) -> ApiResult<Json<ListQueueRes>> {
    let direction: ReorderDirection = req.direction.parse()?;
    let entries = state.clinic.engine().reorder(
        &DepartmentId::parse(&id)?,
        &EntryId::parse(&entry_id)?,
        direction,
    )?;
    Ok(Json(ListQueueRes {
        entries: entries.iter().map(convert::entry).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/departments/{id}/queue/{entry_id}/status",
    params(
        ("id" = String, Path, description = "Department id"),
        ("entry_id" = String, Path, description = "Queue entry id")
    ),
    responses(
        (status = 200, description = "Position and wait estimate", body = QueueSnapshotRes),
        (status = 404, description = "Entry not active in this department", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn entry_status(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(String, String)>,
) -> ApiResult<Json<QueueSnapshotRes>> {
    let snapshot = state
        .clinic
        .projector()
        .project(&DepartmentId::parse(&id)?, &EntryId::parse(&entry_id)?)?;
    Ok(Json(convert::snapshot(&snapshot)))
}

#[utoipa::path(
    get,
    path = "/departments/{id}/patients/{patient_id}/status",
    params(
        ("id" = String, Path, description = "Department id"),
        ("patient_id" = String, Path, description = "Patient id")
    ),
    responses(
        (status = 200, description = "Snapshot of the patient's active entry, if any", body = PatientQueueStatusRes),
        (status = 404, description = "Unknown department", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn patient_status(
    State(state): State<AppState>,
    Path((id, patient_id)): Path<(String, String)>,
) -> ApiResult<Json<PatientQueueStatusRes>> {
    let department = DepartmentId::parse(&id)?;
    let patient = PatientId::parse(&patient_id)?;
    let snapshot = state.clinic.projector().project_patient(&department, &patient)?;
    Ok(Json(PatientQueueStatusRes {
        department_id: department.to_string(),
        patient_id: patient.to_string(),
        queued: snapshot.is_some(),
        snapshot: snapshot.as_ref().map(convert::snapshot),
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct DayFilter {
    /// `YYYY-MM-DD`; defaults to today.
    date: Option<String>,
}

#[utoipa::path(
    get,
    path = "/departments/{id}/appointments",
    params(("id" = String, Path, description = "Department id"), DayFilter),
    responses(
        (status = 200, description = "Scheduled appointments of the day by time", body = ListAppointmentsRes),
        (status = 400, description = "Bad date", body = ErrorRes),
        (status = 404, description = "Unknown department", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn department_appointments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(filter): Query<DayFilter>,
) -> ApiResult<Json<ListAppointmentsRes>> {
    let department = DepartmentId::parse(&id)?;
    if !state.clinic.departments().contains(&department)? {
        return Err(QueueError::UnknownDepartment(department).into());
    }
    let date = match filter.date.as_deref() {
        Some(date) => convert::parse_date(date)?,
        None => Local::now().date_naive(),
    };
    let appointments = state
        .clinic
        .appointments()
        .for_department_on(&department, date)?;
    Ok(Json(appointment_list(&appointments)))
}

#[utoipa::path(
    post,
    path = "/queue/{entry_id}/status",
    params(("entry_id" = String, Path, description = "Queue entry id")),
    request_body = SetStatusReq,
    responses(
        (status = 200, description = "Entry after the change", body = QueueEntryRes),
        (status = 404, description = "Unknown entry", body = ErrorRes),
        (status = 409, description = "Patient queued again", body = ErrorRes),
        (status = 422, description = "Transition not allowed", body = ErrorRes)
    )
)]
/// Applies a staff status action. `in_consultation` may name the provider.
#[axum::debug_handler]
async fn set_status(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Json(req): Json<SetStatusReq>,
) -> ApiResult<Json<QueueEntryRes>> {
    let entry_id = EntryId::parse(&entry_id)?;
    let status: QueueStatus = req.status.parse()?;

    let entry = match status {
        QueueStatus::InConsultation => {
            let provider = req
                .provider
                .as_deref()
                .map(|p| text("provider", p))
                .transpose()?;
            state.clinic.engine().start_consultation(&entry_id, provider)?
        }
        other => state.clinic.set_entry_status(&entry_id, other)?,
    };
    Ok(Json(convert::entry(&entry)))
}

#[utoipa::path(
    delete,
    path = "/queue/{entry_id}",
    params(("entry_id" = String, Path, description = "Queue entry id")),
    responses(
        (status = 200, description = "Removed entry", body = QueueEntryRes),
        (status = 404, description = "Unknown or inactive entry", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn remove_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> ApiResult<Json<QueueEntryRes>> {
    let removed = state.clinic.engine().remove(&EntryId::parse(&entry_id)?)?;
    Ok(Json(convert::entry(&removed)))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = RegisterPatientReq,
    responses(
        (status = 201, description = "Patient registered", body = PatientRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 409, description = "Patient id taken", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn register_patient(
    State(state): State<AppState>,
    Json(req): Json<RegisterPatientReq>,
) -> ApiResult<(StatusCode, Json<PatientRes>)> {
    let patient = state.clinic.patients().register(
        PatientId::parse(&req.id)?,
        text("name", &req.name)?,
        text("contact", &req.contact)?,
    )?;
    Ok((StatusCode::CREATED, Json(convert::patient(&patient))))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct AppointmentWindow {
    /// `upcoming`, `past` or `all` (default).
    when: Option<String>,
}

#[utoipa::path(
    get,
    path = "/patients/{id}/appointments",
    params(("id" = String, Path, description = "Patient id"), AppointmentWindow),
    responses(
        (status = 200, description = "Appointments, earliest first", body = ListAppointmentsRes),
        (status = 400, description = "Bad window", body = ErrorRes),
        (status = 404, description = "Unknown patient", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn patient_appointments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(window): Query<AppointmentWindow>,
) -> ApiResult<Json<ListAppointmentsRes>> {
    let patient = PatientId::parse(&id)?;
    if !state.clinic.patients().contains(&patient)? {
        return Err(QueueError::UnknownPatient(patient).into());
    }

    let registry = state.clinic.appointments();
    let now = Local::now().naive_local();
    let appointments = match window.when.as_deref().map(str::trim) {
        None | Some("") | Some("all") => registry.for_patient(&patient)?,
        Some("upcoming") => registry.upcoming_for_patient(&patient, now)?,
        Some("past") => registry.past_for_patient(&patient, now)?,
        Some(other) => {
            return Err(QueueError::InvalidInput(format!(
                "when must be 'upcoming', 'past' or 'all', got '{other}'"
            ))
            .into())
        }
    };
    Ok(Json(appointment_list(&appointments)))
}

#[utoipa::path(
    post,
    path = "/appointments",
    request_body = BookAppointmentReq,
    responses(
        (status = 201, description = "Appointment booked", body = AppointmentRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Unknown patient or department", body = ErrorRes),
        (status = 409, description = "Overlapping appointment", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn book_appointment(
    State(state): State<AppState>,
    Json(req): Json<BookAppointmentReq>,
) -> ApiResult<(StatusCode, Json<AppointmentRes>)> {
    let appointment = state.clinic.appointments().book(NewAppointment {
        patient_id: PatientId::parse(&req.patient_id)?,
        department_id: DepartmentId::parse(&req.department_id)?,
        doctor_id: text("doctor_id", &req.doctor_id)?,
        scheduled_date: convert::parse_date(&req.date)?,
        scheduled_time: convert::parse_time(&req.time)?,
        notes: req.notes,
    })?;
    Ok((StatusCode::CREATED, Json(convert::appointment(&appointment))))
}

#[utoipa::path(
    post,
    path = "/appointments/{id}/check-in",
    params(("id" = String, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Checked in and queued", body = CheckInRes),
        (status = 404, description = "Unknown appointment", body = ErrorRes),
        (status = 409, description = "Patient already queued", body = ErrorRes),
        (status = 422, description = "Appointment not scheduled", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn check_in(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CheckInRes>> {
    let (appointment, entry) = state.clinic.check_in(&AppointmentId::parse(&id)?)?;
    Ok(Json(CheckInRes {
        appointment: convert::appointment(&appointment),
        entry: convert::entry(&entry),
    }))
}

#[utoipa::path(
    post,
    path = "/appointments/{id}/cancel",
    params(("id" = String, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Cancelled; any live queue entry removed", body = AppointmentRes),
        (status = 404, description = "Unknown appointment", body = ErrorRes),
        (status = 422, description = "Appointment already closed", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn cancel_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AppointmentRes>> {
    let cancelled = state
        .clinic
        .cancel_appointment(&AppointmentId::parse(&id)?)?;
    Ok(Json(convert::appointment(&cancelled)))
}

#[utoipa::path(
    post,
    path = "/appointments/{id}/reschedule",
    params(("id" = String, Path, description = "Appointment id")),
    request_body = RescheduleReq,
    responses(
        (status = 200, description = "Appointment moved", body = AppointmentRes),
        (status = 400, description = "Bad date or time", body = ErrorRes),
        (status = 404, description = "Unknown appointment", body = ErrorRes),
        (status = 409, description = "Overlapping appointment", body = ErrorRes),
        (status = 422, description = "Appointment no longer scheduled", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn reschedule_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RescheduleReq>,
) -> ApiResult<Json<AppointmentRes>> {
    let moved = state.clinic.appointments().reschedule(
        &AppointmentId::parse(&id)?,
        convert::parse_date(&req.date)?,
        convert::parse_time(&req.time)?,
    )?;
    Ok(Json(convert::appointment(&moved)))
}
