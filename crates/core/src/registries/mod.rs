//! Reference-data registries.
//!
//! Simple keyed stores for departments, patients and appointments. Records are read-mostly and
//! sit behind `RwLock`s so concurrent readers never wait on one another.

pub mod appointments;
pub mod departments;
pub mod patients;
pub(crate) mod shared;
