//! Department Registry.
//!
//! Department metadata consumed by the queue engine (existence checks, consultation limits) and
//! by the status projector (average processing time for ETA math).

use super::shared::{read, write};
use crate::constants::MAX_AVERAGE_PROCESSING_MINUTES;
use crate::{DepartmentId, QueueError, QueueResult};
use qms_types::NonEmptyText;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// A hospital department with its own independent queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Department {
    id: DepartmentId,
    name: NonEmptyText,
    average_processing_minutes: u32,
    staff_available: u32,
}

impl Department {
    /// Creates a department record.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidInput`] if `average_processing_minutes` is zero or longer
    /// than a day.
    pub fn new(
        id: DepartmentId,
        name: NonEmptyText,
        average_processing_minutes: u32,
        staff_available: u32,
    ) -> QueueResult<Self> {
        validate_average(average_processing_minutes)?;
        Ok(Self {
            id,
            name,
            average_processing_minutes,
            staff_available,
        })
    }

    pub fn id(&self) -> &DepartmentId {
        &self.id
    }

    pub fn name(&self) -> &NonEmptyText {
        &self.name
    }

    pub fn average_processing_minutes(&self) -> u32 {
        self.average_processing_minutes
    }

    pub fn staff_available(&self) -> u32 {
        self.staff_available
    }
}

fn validate_average(minutes: u32) -> QueueResult<()> {
    if minutes == 0 {
        return Err(QueueError::InvalidInput(
            "average processing time must be a positive number of minutes".into(),
        ));
    }
    if minutes > MAX_AVERAGE_PROCESSING_MINUTES {
        return Err(QueueError::InvalidInput(format!(
            "average processing time must be at most {MAX_AVERAGE_PROCESSING_MINUTES} minutes"
        )));
    }
    Ok(())
}

/// Partial update applied by administrative edits. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default)]
pub struct DepartmentUpdate {
    pub name: Option<NonEmptyText>,
    pub average_processing_minutes: Option<u32>,
    pub staff_available: Option<u32>,
}

#[derive(Debug, Default)]
pub struct DepartmentRegistry {
    departments: RwLock<BTreeMap<DepartmentId, Department>>,
}

impl DepartmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of departments, rejecting duplicate ids.
    pub fn with_departments(departments: impl IntoIterator<Item = Department>) -> QueueResult<Self> {
        let registry = Self::new();
        for department in departments {
            registry.register(department)?;
        }
        Ok(registry)
    }

    pub fn register(&self, department: Department) -> QueueResult<()> {
        let mut departments = write(&self.departments, "departments")?;
        if departments.contains_key(department.id()) {
            return Err(QueueError::DuplicateDepartment(department.id().clone()));
        }
        tracing::info!(department = %department.id(), "registered department");
        departments.insert(department.id().clone(), department);
        Ok(())
    }

    pub fn get(&self, id: &DepartmentId) -> QueueResult<Department> {
        read(&self.departments, "departments")?
            .get(id)
            .cloned()
            .ok_or_else(|| QueueError::UnknownDepartment(id.clone()))
    }

    pub fn contains(&self, id: &DepartmentId) -> QueueResult<bool> {
        Ok(read(&self.departments, "departments")?.contains_key(id))
    }

    /// All departments ordered by id.
    pub fn list(&self) -> QueueResult<Vec<Department>> {
        Ok(read(&self.departments, "departments")?
            .values()
            .cloned()
            .collect())
    }

    /// Applies an administrative edit and returns the updated record.
    ///
    /// The update is validated in full before anything is written.
    pub fn update(&self, id: &DepartmentId, update: DepartmentUpdate) -> QueueResult<Department> {
        if let Some(minutes) = update.average_processing_minutes {
            validate_average(minutes)?;
        }

        let mut departments = write(&self.departments, "departments")?;
        let department = departments
            .get_mut(id)
            .ok_or_else(|| QueueError::UnknownDepartment(id.clone()))?;

        if let Some(name) = update.name {
            department.name = name;
        }
        if let Some(minutes) = update.average_processing_minutes {
            department.average_processing_minutes = minutes;
        }
        if let Some(staff) = update.staff_available {
            department.staff_available = staff;
        }

        tracing::info!(department = %id, "updated department");
        Ok(department.clone())
    }

    /// Case-insensitive substring match on name or id.
    pub fn search(&self, term: &str) -> QueueResult<Vec<Department>> {
        let needle = term.trim().to_lowercase();
        Ok(read(&self.departments, "departments")?
            .values()
            .filter(|d| {
                d.name.as_str().to_lowercase().contains(&needle) || d.id.as_str().contains(&needle)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn department(id: &str, name: &str, average: u32) -> Department {
        Department::new(
            DepartmentId::parse(id).unwrap(),
            NonEmptyText::new(name).unwrap(),
            average,
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let registry = DepartmentRegistry::new();
        registry.register(department("cardiology", "Cardiology", 10)).unwrap();

        let id = DepartmentId::parse("cardiology").unwrap();
        let fetched = registry.get(&id).unwrap();
        assert_eq!(fetched.name().as_str(), "Cardiology");
        assert_eq!(fetched.average_processing_minutes(), 10);
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let registry = DepartmentRegistry::new();
        registry.register(department("cardiology", "Cardiology", 10)).unwrap();

        let result = registry.register(department("cardiology", "Heart", 12));
        assert!(matches!(result, Err(QueueError::DuplicateDepartment(_))));
    }

    #[test]
    fn test_get_unknown_department() {
        let registry = DepartmentRegistry::new();
        let id = DepartmentId::parse("nowhere").unwrap();
        assert!(matches!(
            registry.get(&id),
            Err(QueueError::UnknownDepartment(_))
        ));
    }

    #[test]
    fn test_new_rejects_zero_average() {
        let result = Department::new(
            DepartmentId::parse("x").unwrap(),
            NonEmptyText::new("X").unwrap(),
            0,
            1,
        );
        assert!(matches!(result, Err(QueueError::InvalidInput(_))));
    }

    #[test]
    fn test_average_is_capped_at_one_day() {
        let new = |minutes| {
            Department::new(
                DepartmentId::parse("icu").unwrap(),
                NonEmptyText::new("ICU").unwrap(),
                minutes,
                1,
            )
        };
        assert!(new(MAX_AVERAGE_PROCESSING_MINUTES).is_ok());
        assert!(matches!(
            new(u32::MAX / 2 + 1),
            Err(QueueError::InvalidInput(_))
        ));

        let registry = DepartmentRegistry::new();
        registry.register(department("icu", "ICU", 30)).unwrap();
        let id = DepartmentId::parse("icu").unwrap();
        let rejected = registry.update(
            &id,
            DepartmentUpdate {
                average_processing_minutes: Some(MAX_AVERAGE_PROCESSING_MINUTES + 1),
                ..Default::default()
            },
        );
        assert!(matches!(rejected, Err(QueueError::InvalidInput(_))));
        assert_eq!(registry.get(&id).unwrap().average_processing_minutes(), 30);
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let registry = DepartmentRegistry::new();
        registry.register(department("neurology", "Neurology", 18)).unwrap();
        let id = DepartmentId::parse("neurology").unwrap();

        let rejected = registry.update(
            &id,
            DepartmentUpdate {
                name: Some(NonEmptyText::new("Neuro").unwrap()),
                average_processing_minutes: Some(0),
                staff_available: None,
            },
        );
        assert!(rejected.is_err());
        assert_eq!(registry.get(&id).unwrap().name().as_str(), "Neurology");

        let updated = registry
            .update(
                &id,
                DepartmentUpdate {
                    staff_available: Some(9),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.staff_available(), 9);
        assert_eq!(updated.average_processing_minutes(), 18);
    }

    #[test]
    fn test_list_is_sorted_and_search_matches_name() {
        let registry = DepartmentRegistry::with_departments([
            department("pediatrics", "Pediatrics", 8),
            department("general", "General Medicine", 8),
            department("cardiology", "Cardiology", 10),
        ])
        .unwrap();

        let ids: Vec<String> = registry
            .list()
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(ids, ["cardiology", "general", "pediatrics"]);

        let found = registry.search("MEDIC").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id().as_str(), "general");
    }
}
