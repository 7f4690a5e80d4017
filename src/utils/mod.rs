//! Miscellaneous public handy functions are collected here, such as key path normalization and
//! serde helpers for the on-disk formats of the origin storage.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serializer};

pub mod path;

/// Serializes raw bytes the way Go's `encoding/json` does for `[]byte`: standard base64.
pub fn serialize_base64<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(bytes))
}

pub fn deserialize_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    // Go encodes a nil slice as null
    let input: Option<String> = Deserialize::deserialize(deserializer)?;
    match input {
        Some(s) => STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom),
        None => Ok(Vec::new()),
    }
}
