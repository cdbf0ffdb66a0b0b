//! Typed record load/save over a key-value store
//!
//! Records are stored as JSON. Timestamps are written as ISO-8601 strings
//! with millisecond precision (`2024-05-01T09:30:00.250Z`) and parsed back
//! from any RFC 3339 string.

use crate::{storage::kv::StoreHandle, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Current time truncated to whole milliseconds
///
/// Every timestamp the crate creates goes through here, so values survive a
/// save/load cycle unchanged.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// The Unix epoch, used for missing last-read markers
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Format a timestamp the way records store it
pub fn to_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp
pub fn from_iso(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|ts| ts.with_timezone(&Utc))
}

/// Load the record stored under `key`
///
/// A missing key yields `T::default()`. So does content that cannot be read
/// or parsed; that case is logged and never reaches the caller.
pub fn load<T>(store: &StoreHandle, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::warn!("Failed to read '{}' from store, using defaults: {}", key, e);
            return T::default();
        }
    };

    if raw.trim().is_empty() {
        return T::default();
    }

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Malformed record under '{}', using defaults: {}", key, e);
            T::default()
        }
    }
}

/// Serialize `value` and store it under `key`
pub fn save<T: Serialize>(store: &StoreHandle, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    store.set(key, &json)
}

/// Serde adapter for `DateTime<Utc>` as a millisecond ISO-8601 string
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as ISO-8601
    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_iso(ts))
    }

    /// Deserialize from RFC 3339
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::from_iso(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<DateTime<Utc>>`; `null` and missing map to `None`
pub mod iso_millis_option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as ISO-8601 or `null`
    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&super::to_iso(ts)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from RFC 3339; `null` and unreadable values become `None`
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => match super::from_iso(&s) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable timestamp '{}': {}", s, e);
                    None
                }
            },
            other => {
                tracing::warn!("Ignoring non-string timestamp {}", other);
                None
            }
        })
    }
}

/// Serde adapters for collections inside shared records
///
/// An entry that does not deserialize is logged and skipped, so one bad entry
/// never takes the rest of the record down with it. A value of the wrong
/// shape reads as an empty collection.
pub mod lenient {
    use serde::{de::DeserializeOwned, Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeMap;

    /// Deserialize a list, keeping the readable entries
    pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let items = match Value::deserialize(deserializer)? {
            Value::Array(items) => items,
            Value::Null => return Ok(Vec::new()),
            other => {
                tracing::warn!("Expected a list, ignoring {}", other);
                return Ok(Vec::new());
            }
        };

        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable list entry: {}", e);
                    None
                }
            })
            .collect())
    }

    /// Deserialize a string-keyed map, keeping the readable entries
    pub fn map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let entries = match Value::deserialize(deserializer)? {
            Value::Object(entries) => entries,
            Value::Null => return Ok(BTreeMap::new()),
            other => {
                tracing::warn!("Expected a map, ignoring {}", other);
                return Ok(BTreeMap::new());
            }
        };

        Ok(entries
            .into_iter()
            .filter_map(|(key, item)| match serde_json::from_value(item) {
                Ok(entry) => Some((key, entry)),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry '{}': {}", key, e);
                    None
                }
            })
            .collect())
    }
}
