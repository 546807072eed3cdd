// src/utils/serialization.rs
//! Serialization utilities for access credentials.
//!
//! Provides serialization and deserialization functions for:
//! - JSON data structures
//! - base64url-wrapped JSON, as carried in redirect URLs
//! - status list indices, which issuers emit either as strings or numbers

use serde::{de::DeserializeOwned, Serialize};
use serde_json;

/// Serializes a value to a JSON string.
///
/// # Arguments
/// * `data` - The value to serialize (must implement `Serialize`)
///
/// # Returns
/// - `Ok(String)` with JSON representation on success
/// - `Err(serde_json::Error)` if serialization fails
pub fn serialize<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(data)
}

/// Deserializes a value from a JSON string.
///
/// # Arguments
/// * `data` - JSON string to deserialize
///
/// # Returns
/// - `Ok(T)` with deserialized value on success
/// - `Err(serde_json::Error)` if deserialization fails
pub fn deserialize<T: DeserializeOwned>(data: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(data)
}

/// Serializes a value to JSON and wraps it in unpadded base64url.
///
/// The output only uses `[A-Za-z0-9_-]`, so it can be placed in a query
/// string without further escaping.
pub fn encode_base64_json<T: Serialize>(data: &T) -> Result<String, String> {
    let json = serde_json::to_vec(data).map_err(|e| format!("JSON encoding failed: {}", e))?;
    Ok(base64::encode_config(json, base64::URL_SAFE_NO_PAD))
}

/// Reverses [`encode_base64_json`].
///
/// Trailing padding is tolerated.
///
/// # Errors
/// A description of the failing stage (base64 or JSON).
pub fn decode_base64_json<T: DeserializeOwned>(data: &str) -> Result<T, String> {
    let bytes = base64::decode_config(data.trim_end_matches('='), base64::URL_SAFE_NO_PAD)
        .map_err(|e| format!("Base64 decoding failed: {}", e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("JSON decoding failed: {}", e))
}

/// Decodes base64 in either the standard or the url-safe alphabet.
pub fn decode_base64_any(data: &str) -> Result<Vec<u8>, String> {
    let trimmed = data.trim().trim_end_matches('=');
    base64::decode_config(trimmed, base64::STANDARD_NO_PAD)
        .or_else(|_| base64::decode_config(trimmed, base64::URL_SAFE_NO_PAD))
        .map_err(|e| format!("Base64 decoding failed: {}", e))
}

/// Serde adapter for status list indices.
///
/// Written as a decimal string, read from either a string or a number.
pub mod status_index {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Index {
        Number(usize),
        Text(String),
    }

    pub fn serialize<S: Serializer>(index: &usize, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&index.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
        match Index::deserialize(deserializer)? {
            Index::Number(n) => Ok(n),
            Index::Text(s) => s
                .parse()
                .map_err(|_| de::Error::custom(format!("invalid status list index {s:?}"))),
        }
    }
}
