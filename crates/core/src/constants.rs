//! Defaults used when configuration leaves a value unset.

/// Retained `no_show`/`completed` entries per department.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Upper bound on a department's average processing time (one day).
pub const MAX_AVERAGE_PROCESSING_MINUTES: u32 = 24 * 60;

/// Length of the window an appointment occupies when checking for overlaps.
pub const DEFAULT_APPOINTMENT_SLOT_MINUTES: u32 = 30;

/// Projected longest wait (minutes) below which a department counts as low traffic.
pub const DEFAULT_LOW_LOAD_BELOW_MINUTES: u32 = 15;
/// Below this a department is operating normally.
pub const DEFAULT_NORMAL_LOAD_BELOW_MINUTES: u32 = 30;
/// Below this a department is busy; at or above it, critical.
pub const DEFAULT_BUSY_LOAD_BELOW_MINUTES: u32 = 40;

/// Accepted spellings of `QMS_CONSULTATION_LIMIT` besides a positive integer.
pub const CONSULTATION_LIMIT_UNLIMITED: &str = "unlimited";
pub const CONSULTATION_LIMIT_STAFF: &str = "staff";

/// Built-in department set: (id, name, average minutes per patient, staff available).
pub const DEFAULT_DEPARTMENTS: &[(&str, &str, u32, u32)] = &[
    ("cardiology", "Cardiology", 10, 8),
    ("dermatology", "Dermatology", 12, 4),
    ("neurology", "Neurology", 18, 6),
    ("orthopedics", "Orthopedics", 15, 5),
    ("pediatrics", "Pediatrics", 8, 7),
    ("general", "General Medicine", 8, 10),
];
