//! Custom serializers for flat CSV rows: sentinel strings for absent values and
//! nested records embedded as JSON text

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use std::{fmt::Display, str::FromStr};

pub const UNKNOWN: &str = "unknown";
pub const NOT_APPLICABLE: &str = "not_applicable";

fn serialize_with_sentinel<S, T>(
    value: &Option<T>,
    sentinel: &str,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Display,
{
    match value {
        Some(v) => serializer.collect_str(v),
        None => serializer.serialize_str(sentinel),
    }
}

fn deserialize_with_sentinel<'de, D, T>(
    deserializer: D,
    sentinel: &str,
) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == sentinel {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("Invalid value '{trimmed}': {e}")))
}

/// Serialize an absent value as "unknown"
pub fn serialize_unknown<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Display,
{
    serialize_with_sentinel(value, UNKNOWN, serializer)
}

/// Deserialize "unknown" (or an empty cell) as `None`
pub fn deserialize_unknown<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    deserialize_with_sentinel(deserializer, UNKNOWN)
}

/// Serialize an absent value as "not_applicable"
pub fn serialize_not_applicable<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Display,
{
    serialize_with_sentinel(value, NOT_APPLICABLE, serializer)
}

/// Deserialize "not_applicable" (or an empty cell) as `None`
pub fn deserialize_not_applicable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    deserialize_with_sentinel(deserializer, NOT_APPLICABLE)
}

/// Serialize a nested sequence as a JSON string cell
pub fn serialize_json_string<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let json =
        serde_json::to_string(value).map_err(<S::Error as serde::ser::Error>::custom)?;
    serializer.serialize_str(&json)
}

/// Deserialize a nested sequence from a JSON string cell
pub fn deserialize_json_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = String::deserialize(deserializer)?;
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw)
        .map_err(|e| serde::de::Error::custom(format!("Invalid JSON cell: {e}")))
}
