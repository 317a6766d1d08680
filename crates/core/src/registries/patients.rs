//! Patient Record Store.

use super::shared::{read, write};
use crate::{PatientId, QueueError, QueueResult};
use chrono::{DateTime, Utc};
use qms_types::NonEmptyText;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// A registered patient. Identity is fixed at registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: NonEmptyText,
    /// Phone number or email address.
    pub contact: NonEmptyText,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PatientStore {
    patients: RwLock<BTreeMap<PatientId, Patient>>,
}

impl PatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        id: PatientId,
        name: NonEmptyText,
        contact: NonEmptyText,
    ) -> QueueResult<Patient> {
        let mut patients = write(&self.patients, "patients")?;
        if patients.contains_key(&id) {
            return Err(QueueError::DuplicatePatient(id));
        }

        let patient = Patient {
            id: id.clone(),
            name,
            contact,
            registered_at: Utc::now(),
        };
        patients.insert(id, patient.clone());

        tracing::info!(patient = %patient.id, "registered patient");
        Ok(patient)
    }

    pub fn get(&self, id: &PatientId) -> QueueResult<Patient> {
        read(&self.patients, "patients")?
            .get(id)
            .cloned()
            .ok_or_else(|| QueueError::UnknownPatient(id.clone()))
    }

    pub fn contains(&self, id: &PatientId) -> QueueResult<bool> {
        Ok(read(&self.patients, "patients")?.contains_key(id))
    }

    pub fn list(&self) -> QueueResult<Vec<Patient>> {
        Ok(read(&self.patients, "patients")?.values().cloned().collect())
    }
}
