//! # QMS Core
//!
//! Core business logic for the hospital queue management system.
//!
//! This crate contains the in-memory domain model and its operations:
//! - Department, patient and appointment registries
//! - Per-department queues with dense 1-based ranks and a checked status state machine
//! - Position and wait-time projection for patients and staff dashboards
//!
//! **No API concerns**: HTTP servers, CLI parsing and environment handling belong in
//! `api-rest`, `cli` or the `qms-run` binary.

pub mod clinic;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod ids;
pub mod projector;
pub mod queue;
pub mod registries;

pub use clinic::Clinic;
pub use config::{ConsultationLimit, CoreConfig, LoadThresholds};
pub use engine::QueueEngine;
pub use error::{QueueError, QueueResult};
pub use events::{ChannelObserver, QueueEvent, QueueObserver, TracingObserver};
pub use ids::{AppointmentId, DepartmentId, EntryId, PatientId};
pub use projector::{DepartmentLoad, DepartmentSummary, QueueSnapshot, QueueStatusProjector};
pub use queue::{QueueEntry, QueueStatus, ReorderDirection};
pub use registries::appointments::{Appointment, AppointmentStatus, NewAppointment};
pub use registries::departments::{Department, DepartmentUpdate};
pub use registries::patients::Patient;
