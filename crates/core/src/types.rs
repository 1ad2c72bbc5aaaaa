use serde::{Deserialize, Deserializer};

/// Identifier of a calendar-generation job, opaque to the client.
pub type JobId = String;

/// Identifier of a Printful mockup task. Separate namespace from [`JobId`].
pub type TaskKey = String;

/// Identifier the service assigns to an uploaded file.
pub type FileId = String;

/// Accept an identifier sent either as a JSON string or as a bare number.
///
/// The service hands out both shapes depending on which backend stored the
/// record, and the client treats them as the same opaque string.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, got {other}"
        ))),
    }
}

/// Optional variant of [`deserialize_id`]; `null` maps to `None`.
pub fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, got {other}"
        ))),
    }
}
