//! Identifier utilities.
//!
//! QMS uses two identifier shapes:
//!
//! - [`CanonicalUuid`]: a random UUID in a *canonical* text form, **32 lowercase hexadecimal
//!   characters** (no hyphens). Appointments are keyed by these.
//! - [`TimestampId`]: a time-prefixed identifier, `YYYYMMDDTHHMMSS.mmmZ-<canonical uuid>`.
//!   Queue entries are keyed by these so that the identifier also records when the patient
//!   joined the queue.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Canonical form is *required* for externally supplied identifiers (for example, from CLI/API
//! inputs). Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are rejected by
//! [`CanonicalUuid::parse`].
//!
//! ## Monotonic timestamp identifiers
//! [`TimestampIdGenerator::generate`] takes the previously issued identifier and guarantees a
//! strictly later timestamp. Callers that generate inside a per-queue lock therefore get a
//! strictly increasing sequence per queue, even when the wall clock stalls or steps backwards.

mod service;

pub use service::{CanonicalUuid, TimestampId, TimestampIdGenerator, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
