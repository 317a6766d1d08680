//! Internal implementation of the identifier types.

use crate::{UuidError, UuidResult};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";

/// QMS's canonical UUID representation (32 lowercase hex characters, no hyphens).
///
/// This wrapper type guarantees that once constructed, the contained UUID is in canonical
/// format.
///
/// # Construction
/// - [`CanonicalUuid::new`] generates a new random identifier.
/// - [`CanonicalUuid::parse`] validates an externally supplied identifier.
///
/// # Display format
/// When displayed or converted to string, `CanonicalUuid` always produces the canonical
/// 32-character lowercase hex format without hyphens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUuid(Uuid);

impl Default for CanonicalUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl CanonicalUuid {
    /// Generates a new random (version 4) UUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing `uuid::Uuid`. Every UUID has a canonical rendering, so this cannot fail.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Validates and parses a UUID string that must already be in canonical form.
    ///
    /// This does **not** normalise other common UUID forms (for example, hyphenated or uppercase).
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "UUID must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid UUID '{}': {}", input, e)))
    }

    /// Returns the UUID as a `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical UUID form.
    ///
    /// This is a purely syntactic check: exactly 32 bytes, all of them `0-9` or `a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for CanonicalUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for CanonicalUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalUuid::parse(s)
    }
}

/// A time-prefixed unique identifier.
///
/// Format:
/// `YYYYMMDDTHHMMSS.mmmZ-<canonical_uuid>`
///
/// Example:
/// `20260111T143522.045Z-550e8400e29b41d4a716446655440000`
///
/// Timestamps are held at millisecond precision, the precision of the text form, so a value
/// survives a display/parse round trip unchanged. Ordering compares the timestamp first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimestampId {
    timestamp: DateTime<Utc>,
    uuid: CanonicalUuid,
}

impl TimestampId {
    /// Returns the timestamp component.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the UUID component.
    pub fn uuid(&self) -> &CanonicalUuid {
        &self.uuid
    }
}

impl FromStr for TimestampId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts_str, uuid_str) = s.split_once('-').ok_or_else(|| {
            UuidError::InvalidInput(format!("Invalid timestamp id format: '{}'", s))
        })?;

        let ts_no_z = ts_str.strip_suffix('Z').ok_or_else(|| {
            UuidError::InvalidInput(format!("Timestamp must end with 'Z': '{}'", ts_str))
        })?;

        let naive =
            chrono::NaiveDateTime::parse_from_str(ts_no_z, TIMESTAMP_FORMAT).map_err(|e| {
                UuidError::InvalidInput(format!("Invalid timestamp format '{}': {}", ts_str, e))
            })?;

        Ok(Self {
            timestamp: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
            uuid: CanonicalUuid::parse(uuid_str)?,
        })
    }
}

impl fmt::Display for TimestampId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Z-{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.uuid
        )
    }
}

/// Issues [`TimestampId`]s.
///
/// Zero-sized; all methods are associated functions.
pub struct TimestampIdGenerator;

impl TimestampIdGenerator {
    /// Generate a new timestamp id.
    ///
    /// If `previous` is provided, the timestamp is guaranteed to be strictly greater than the
    /// previous one (by at least 1 ms). This is designed to be called **inside a per-queue
    /// lock**, passing the last id issued for that queue.
    pub fn generate(previous: Option<&TimestampId>) -> TimestampId {
        Self::generate_at(Utc::now(), previous)
    }

    /// As [`TimestampIdGenerator::generate`] with an explicit clock reading.
    pub fn generate_at(now: DateTime<Utc>, previous: Option<&TimestampId>) -> TimestampId {
        let now = now.trunc_subsecs(3);

        let timestamp = match previous {
            Some(prev) if now <= prev.timestamp => prev.timestamp + Duration::milliseconds(1),
            _ => now,
        };

        TimestampId {
            timestamp,
            uuid: CanonicalUuid::new(),
        }
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use super::{CanonicalUuid, TimestampId};
    use std::str::FromStr;

    impl serde::Serialize for CanonicalUuid {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> serde::Deserialize<'de> for CanonicalUuid {
        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            CanonicalUuid::parse(&s).map_err(serde::de::Error::custom)
        }
    }

    impl serde::Serialize for TimestampId {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> serde::Deserialize<'de> for TimestampId {
        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            TimestampId::from_str(&s).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_generates_canonical_uuid() {
        let id = CanonicalUuid::new();
        let canonical = id.to_string();

        assert_eq!(canonical.len(), 32);
        assert!(CanonicalUuid::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_valid_canonical_uuid() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let result = CanonicalUuid::parse(canonical);

        assert_eq!(result.unwrap().to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated_uuid() {
        let result = CanonicalUuid::parse("550e8400-e29b-41d4-a716-446655440000");

        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_non_canonical_inputs() {
        for input in [
            "550E8400E29B41D4A716446655440000",
            "550e8400e29b41d4a71644665544000",
            "550e8400e29b41d4a7164466554400000",
            "550e8400e29b41d4a716446655440zzz",
            "",
        ] {
            assert!(CanonicalUuid::parse(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_from_uuid_matches_simple_form() {
        let raw = Uuid::new_v4();
        let id = CanonicalUuid::from_uuid(raw);

        assert_eq!(id.uuid(), raw);
        assert_eq!(id.to_string(), raw.simple().to_string());
    }

    #[test]
    fn test_generate_monotonic_same_instant() {
        let id1 = TimestampIdGenerator::generate(None);
        // No sleep, forces the increment path.
        let id2 = TimestampIdGenerator::generate(Some(&id1));

        assert!(id2.timestamp() > id1.timestamp());
        assert!(id2 > id1);
    }

    #[test]
    fn test_generate_survives_clock_going_backwards() {
        let later = Utc.with_ymd_and_hms(2026, 1, 11, 14, 35, 22).unwrap();
        let earlier = later - Duration::seconds(30);

        let id1 = TimestampIdGenerator::generate_at(later, None);
        let id2 = TimestampIdGenerator::generate_at(earlier, Some(&id1));

        assert_eq!(id2.timestamp(), later + Duration::milliseconds(1));
    }

    #[test]
    fn test_timestamp_id_display_format() {
        let at = Utc.with_ymd_and_hms(2026, 1, 11, 14, 35, 22).unwrap() + Duration::milliseconds(45);
        let id = TimestampIdGenerator::generate_at(at, None);
        let displayed = id.to_string();

        let (ts, uuid) = displayed.split_once('-').unwrap();
        assert_eq!(ts, "20260111T143522.045Z");
        assert!(CanonicalUuid::is_canonical(uuid));
    }

    #[test]
    fn test_timestamp_id_round_trip() {
        let original_str = "20260111T143522.045Z-550e8400e29b41d4a716446655440000";
        let original = TimestampId::from_str(original_str).unwrap();
        let parsed = TimestampId::from_str(&original.to_string()).unwrap();

        assert_eq!(original.to_string(), original_str);
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_generated_id_round_trips_exactly() {
        let id = TimestampIdGenerator::generate(None);
        let parsed = TimestampId::from_str(&id.to_string()).unwrap();

        assert_eq!(id, parsed);
    }

    #[test]
    fn test_timestamp_id_parse_errors() {
        let missing_hyphen = "20260111T143522.045Z550e8400e29b41d4a716446655440000";
        match TimestampId::from_str(missing_hyphen) {
            Err(UuidError::InvalidInput(msg)) => assert!(msg.contains("Invalid timestamp id format")),
            _ => panic!("Expected InvalidInput error"),
        }

        let missing_z = "20260111T143522.045-550e8400e29b41d4a716446655440000";
        match TimestampId::from_str(missing_z) {
            Err(UuidError::InvalidInput(msg)) => assert!(msg.contains("must end with 'Z'")),
            _ => panic!("Expected InvalidInput error"),
        }

        let bad_date = "20260199T143522.045Z-550e8400e29b41d4a716446655440000";
        match TimestampId::from_str(bad_date) {
            Err(UuidError::InvalidInput(msg)) => assert!(msg.contains("Invalid timestamp format")),
            _ => panic!("Expected InvalidInput error"),
        }

        assert!(TimestampId::from_str("20260111T143522.045Z-not-a-valid-uuid").is_err());
    }

    #[test]
    fn test_serde_uses_text_form() {
        let id = TimestampId::from_str("20260111T143522.045Z-550e8400e29b41d4a716446655440000")
            .unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"20260111T143522.045Z-550e8400e29b41d4a716446655440000\"");

        let back: TimestampId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        let rejected: Result<CanonicalUuid, _> = serde_json::from_str("\"NOT-CANONICAL\"");
        assert!(rejected.is_err());
    }
}
