// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strict JSON encoding: UTC timestamps serialize to second precision
//! (`YYYY-MM-DDTHH:MM:SS`, no fractional seconds, no offset suffix), the
//! same shape the original `StrictJSONEncoder` produced for `datetime`
//! values via `isoformat()`. Use the `serialize_with`/`deserialize_with`
//! helpers on any `DateTime<Utc>` field that crosses the wire.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.format(FORMAT).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let naive = NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(DeError::custom)?;
    Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
}

pub mod option {
    use super::*;

    pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match dt {
            Some(dt) => serializer.serialize_str(&dt.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(raw) => {
                let naive = NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(DeError::custom)?;
                Ok(Some(DateTime::from_naive_utc_and_offset(naive, Utc)))
            }
            None => Ok(None),
        }
    }
}

/// Encodes a serializable value as strict JSON text. Never panics: a
/// serialization failure is surfaced as an error string rather than
/// via `unwrap`/`expect`.
pub fn to_strict_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

pub fn to_strict_json_pretty<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Formats `dt` the same way the serializer does, for call sites that
/// only need the string (e.g. building a log line) and not full-value
/// serialization.
pub fn format_strict(dt: &DateTime<Utc>) -> String {
    dt.format(FORMAT).to_string()
}

/// Round-trips `raw` through the strict parser, surfacing a `serde_json`
/// error so callers share one error type with the rest of this module.
pub fn parse_strict(raw: &str) -> Result<DateTime<Utc>, serde_json::Error> {
    NaiveDateTime::parse_from_str(raw, FORMAT)
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .map_err(serde_json::Error::custom)
}

#[cfg(test)]
#[path = "strict_json_tests.rs"]
mod tests;
