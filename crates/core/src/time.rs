//! Server timestamps.
//!
//! The service stamps rows with naive UTC datetimes and sends them without an
//! offset (`2024-05-01T10:00:00.123456`). Both that form and RFC 3339 are
//! accepted; values are always written back as RFC 3339.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub type Timestamp = DateTime<Utc>;

/// Parses an RFC 3339 timestamp, or a naive one read as UTC.
pub fn parse(raw: &str) -> Result<Timestamp, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(stamped) => Ok(stamped.with_timezone(&Utc)),
        Err(_) => raw.parse::<NaiveDateTime>().map(|naive| naive.and_utc()),
    }
}

pub fn serialize<S: Serializer>(value: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
}

/// The same encoding for `Option<Timestamp>` fields.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => super::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}"))),
            None => Ok(None),
        }
    }
}
