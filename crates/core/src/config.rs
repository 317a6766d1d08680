//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Core code never reads process-wide environment variables; the
//! binaries read them and hand the raw strings to the parsers below.

use crate::constants::{
    CONSULTATION_LIMIT_STAFF, CONSULTATION_LIMIT_UNLIMITED, DEFAULT_APPOINTMENT_SLOT_MINUTES,
    DEFAULT_BUSY_LOAD_BELOW_MINUTES, DEFAULT_DEPARTMENTS, DEFAULT_HISTORY_LIMIT,
    DEFAULT_LOW_LOAD_BELOW_MINUTES, DEFAULT_NORMAL_LOAD_BELOW_MINUTES,
};
use crate::registries::departments::Department;
use crate::{DepartmentId, QueueError, QueueResult};
use qms_types::NonEmptyText;
use serde::Deserialize;
use std::path::Path;

/// How many entries of one department may be `in_consultation` at the same time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsultationLimit {
    /// No department-level limit. Department capacity is advisory only.
    #[default]
    Unlimited,
    /// The same fixed limit for every department.
    Fixed(usize),
    /// Each department may run as many consultations as it has staff available.
    StaffAvailable,
}

impl ConsultationLimit {
    /// Resolve the limit for a department, `None` meaning unlimited.
    pub fn for_department(&self, department: &Department) -> Option<usize> {
        match self {
            ConsultationLimit::Unlimited => None,
            ConsultationLimit::Fixed(n) => Some(*n),
            ConsultationLimit::StaffAvailable => Some(department.staff_available() as usize),
        }
    }
}

/// Projected-wait boundaries (minutes) for the department load levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadThresholds {
    pub low_below: u32,
    pub normal_below: u32,
    pub busy_below: u32,
}

impl Default for LoadThresholds {
    fn default() -> Self {
        Self {
            low_below: DEFAULT_LOW_LOAD_BELOW_MINUTES,
            normal_below: DEFAULT_NORMAL_LOAD_BELOW_MINUTES,
            busy_below: DEFAULT_BUSY_LOAD_BELOW_MINUTES,
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    history_limit: usize,
    consultation_limit: ConsultationLimit,
    appointment_slot_minutes: u32,
    load_thresholds: LoadThresholds,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            consultation_limit: ConsultationLimit::default(),
            appointment_slot_minutes: DEFAULT_APPOINTMENT_SLOT_MINUTES,
            load_thresholds: LoadThresholds::default(),
        }
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        history_limit: usize,
        consultation_limit: ConsultationLimit,
        appointment_slot_minutes: u32,
        load_thresholds: LoadThresholds,
    ) -> QueueResult<Self> {
        if history_limit == 0 {
            return Err(QueueError::InvalidInput(
                "history_limit must be at least 1".into(),
            ));
        }
        if consultation_limit == ConsultationLimit::Fixed(0) {
            return Err(QueueError::InvalidInput(
                "consultation_limit must allow at least one consultation".into(),
            ));
        }
        if appointment_slot_minutes == 0 {
            return Err(QueueError::InvalidInput(
                "appointment_slot_minutes must be at least 1".into(),
            ));
        }
        if !(load_thresholds.low_below < load_thresholds.normal_below
            && load_thresholds.normal_below < load_thresholds.busy_below)
        {
            return Err(QueueError::InvalidInput(
                "load thresholds must be strictly increasing".into(),
            ));
        }

        Ok(Self {
            history_limit,
            consultation_limit,
            appointment_slot_minutes,
            load_thresholds,
        })
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn consultation_limit(&self) -> ConsultationLimit {
        self.consultation_limit
    }

    pub fn appointment_slot_minutes(&self) -> u32 {
        self.appointment_slot_minutes
    }

    pub fn load_thresholds(&self) -> LoadThresholds {
        self.load_thresholds
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the consultation limit from an optional string value.
///
/// Accepts `unlimited`, `staff` or a positive integer. `None` or blank yields
/// [`ConsultationLimit::Unlimited`].
pub fn consultation_limit_from_env_value(value: Option<String>) -> QueueResult<ConsultationLimit> {
    let Some(value) = non_blank(value) else {
        return Ok(ConsultationLimit::Unlimited);
    };

    match value.to_lowercase().as_str() {
        CONSULTATION_LIMIT_UNLIMITED => Ok(ConsultationLimit::Unlimited),
        CONSULTATION_LIMIT_STAFF => Ok(ConsultationLimit::StaffAvailable),
        other => match other.parse::<usize>() {
            Ok(limit) if limit > 0 => Ok(ConsultationLimit::Fixed(limit)),
            _ => Err(QueueError::ConfigParse(format!(
                "consultation limit must be 'unlimited', 'staff' or a positive integer, got '{value}'"
            ))),
        },
    }
}

/// Parse an optional `usize`, falling back to `default` when unset or blank.
pub fn usize_from_env_value(value: Option<String>, default: usize) -> QueueResult<usize> {
    non_blank(value)
        .map(|v| {
            v.parse::<usize>()
                .map_err(|e| QueueError::ConfigParse(format!("'{v}' is not a valid count: {e}")))
        })
        .transpose()
        .map(|v| v.unwrap_or(default))
}

/// Parse an optional `u32`, falling back to `default` when unset or blank.
pub fn u32_from_env_value(value: Option<String>, default: u32) -> QueueResult<u32> {
    non_blank(value)
        .map(|v| {
            v.parse::<u32>()
                .map_err(|e| QueueError::ConfigParse(format!("'{v}' is not a valid number: {e}")))
        })
        .transpose()
        .map(|v| v.unwrap_or(default))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DepartmentSeedWire {
    id: String,
    name: String,
    average_processing_minutes: u32,
    #[serde(default)]
    staff_available: u32,
}

/// Parse a YAML list of departments.
///
/// Schema mismatches are reported with the path of the failing field (for example
/// `[2].average_processing_minutes`).
pub fn parse_department_seed(yaml_text: &str) -> QueueResult<Vec<Department>> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    let wire: Vec<DepartmentSeedWire> = match serde_path_to_error::deserialize(deserializer) {
        Ok(parsed) => parsed,
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() {
                "<root>"
            } else {
                path.as_str()
            };
            return Err(QueueError::ConfigParse(format!(
                "department seed schema mismatch at {path}: {source}"
            )));
        }
    };

    wire.into_iter()
        .map(|d| {
            Department::new(
                DepartmentId::parse(&d.id)?,
                NonEmptyText::new(&d.name)?,
                d.average_processing_minutes,
                d.staff_available,
            )
        })
        .collect()
}

/// Read and parse a department seed file.
pub fn load_department_seed(path: &Path) -> QueueResult<Vec<Department>> {
    let text = std::fs::read_to_string(path).map_err(QueueError::ConfigRead)?;
    parse_department_seed(&text)
}

/// The built-in department set.
pub fn default_departments() -> QueueResult<Vec<Department>> {
    DEFAULT_DEPARTMENTS
        .iter()
        .map(|(id, name, average, staff)| {
            Department::new(
                DepartmentId::parse(id)?,
                NonEmptyText::new(name)?,
                *average,
                *staff,
            )
        })
        .collect()
}
