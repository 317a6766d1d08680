//! Typed identifiers for the records the core manages.
//!
//! Each identifier wraps a validated primitive so that a department id can never be passed where
//! a patient id is expected, and so that ids arriving from API or CLI input are checked once at
//! the boundary.

use crate::QueueResult;
use qms_types::{NonEmptyText, Slug};
use qms_uuid::{CanonicalUuid, TimestampId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Department identifier, a slug such as `cardiology`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentId(Slug);

impl DepartmentId {
    pub fn parse(input: &str) -> QueueResult<Self> {
        Ok(Self(Slug::new(input)?))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Patient identifier as issued by registration, for example `P12345`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(NonEmptyText);

impl PatientId {
    pub fn parse(input: &str) -> QueueResult<Self> {
        Ok(Self(NonEmptyText::new(input)?))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Appointment identifier, generated on booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentId(CanonicalUuid);

impl AppointmentId {
    pub fn generate() -> Self {
        Self(CanonicalUuid::new())
    }

    pub fn parse(input: &str) -> QueueResult<Self> {
        Ok(Self(CanonicalUuid::parse(input)?))
    }
}

/// Queue entry identifier.
///
/// The timestamp component is the moment the patient joined the queue; ids are issued inside
/// the department lock and are strictly increasing per department.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(TimestampId);

impl EntryId {
    pub(crate) fn new(id: TimestampId) -> Self {
        Self(id)
    }

    pub fn parse(input: &str) -> QueueResult<Self> {
        Ok(Self(TimestampId::from_str(input)?))
    }

    pub fn timestamp_id(&self) -> &TimestampId {
        &self.0
    }
}

macro_rules! display_and_from_str {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $ty {
                type Err = crate::QueueError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Self::parse(s)
                }
            }
        )+
    };
}

display_and_from_str!(DepartmentId, PatientId, AppointmentId, EntryId);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueueError;

    #[test]
    fn test_department_id_rejects_display_names() {
        assert!(DepartmentId::parse("cardiology").is_ok());
        assert!(matches!(
            DepartmentId::parse("General Medicine"),
            Err(QueueError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_patient_id_is_trimmed() {
        let id: PatientId = " P12345 ".parse().unwrap();
        assert_eq!(id.as_str(), "P12345");
    }

    #[test]
    fn test_entry_id_parses_its_display_form() {
        let raw = "20260111T143522.045Z-550e8400e29b41d4a716446655440000";
        let id = EntryId::parse(raw).unwrap();
        assert_eq!(id.to_string(), raw);
        assert!(EntryId::parse("p1").is_err());
    }

    #[test]
    fn test_appointment_id_serializes_transparently() {
        let id = AppointmentId::parse("550e8400e29b41d4a716446655440000").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"550e8400e29b41d4a716446655440000\"");
    }
}
