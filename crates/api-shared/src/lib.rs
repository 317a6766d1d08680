//! # API Shared
//!
//! Shared definitions for QMS APIs.
//!
//! Contains:
//! - Wire request/response types (`dto` module) with OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Wire types carry plain strings and numbers; conversion from and validation into the core
//! domain types happens in the API crates.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
