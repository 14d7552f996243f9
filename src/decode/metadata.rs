//! Metadata mapping and its two wire dialects.
//!
//! The JSON dialect is an object whose values are strings or arrays of
//! strings. The legacy dialect prints one `key: value` line per reported
//! value; a field reported several times becomes a [`MetadataValue::Multiple`]
//! in both dialects.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ExtractError, Result};

/// Field carrying the detected content type.
pub const CONTENT_TYPE: &str = "Content-Type";

/// Field carrying the document creation timestamp.
pub const CREATION_DATE: &str = "Creation-Date";

/// A metadata field value: one string, or several in reported order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Single(String),
    Multiple(Vec<String>),
}

impl MetadataValue {
    /// First reported value.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(v) => Some(v),
            Self::Multiple(vs) => vs.first().map(String::as_str),
        }
    }

    /// All reported values in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple(_))
    }

    fn merge(&mut self, other: MetadataValue) {
        let mut values = match std::mem::replace(self, Self::Multiple(Vec::new())) {
            Self::Single(v) => vec![v],
            Self::Multiple(vs) => vs,
        };
        match other {
            Self::Single(v) => values.push(v),
            Self::Multiple(vs) => values.extend(vs),
        }
        *self = Self::Multiple(values);
    }
}

impl PartialEq<str> for MetadataValue {
    fn eq(&self, other: &str) -> bool {
        matches!(self, Self::Single(v) if v == other)
    }
}

impl PartialEq<&str> for MetadataValue {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

/// Field name to value mapping, in the order the engine reported fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field; a repeated name appends to the existing value.
    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.merge(value),
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// First value of a field, for fields that may be list-valued.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetadataValue::first)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.first(CONTENT_TYPE)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::ops::Index<&str> for Metadata {
    type Output = MetadataValue;

    fn index(&self, key: &str) -> &MetadataValue {
        self.get(key)
            .unwrap_or_else(|| panic!("no metadata field named {key:?}"))
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(MetadataVisitor)
    }
}

struct MetadataVisitor;

impl<'de> Visitor<'de> for MetadataVisitor {
    type Value = Metadata;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of metadata fields")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Metadata, A::Error> {
        let mut metadata = Metadata::new();
        while let Some((key, raw)) = access.next_entry::<String, serde_json::Value>()? {
            let value = wire_value(raw).map_err(|msg| de::Error::custom(format!("{key}: {msg}")))?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }
}

fn wire_value(raw: serde_json::Value) -> std::result::Result<MetadataValue, String> {
    match raw {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(wire_scalar)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(MetadataValue::Multiple),
        other => wire_scalar(other).map(MetadataValue::Single),
    }
}

fn wire_scalar(raw: serde_json::Value) -> std::result::Result<String, String> {
    match raw {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("unexpected value {other}")),
    }
}

/// Decode a JSON metadata object.
pub fn parse_json(raw: &[u8]) -> Result<Metadata> {
    serde_json::from_slice(raw).map_err(|e| ExtractError::Decode(format!("metadata JSON: {e}")))
}

/// Decode line-oriented `key: value` metadata.
///
/// Values are quoted line by line before YAML parsing, so a value such as
/// `problem: test` survives intact.
pub fn parse_legacy(raw: &str) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let quoted = quote_line(line)?;
        let entry: BTreeMap<String, String> = serde_yaml::from_str(&quoted)
            .map_err(|e| ExtractError::Decode(format!("metadata line {}: {e}", index + 1)))?;
        for (key, value) in entry {
            metadata.insert(key, MetadataValue::Single(value));
        }
    }
    Ok(metadata)
}

/// Quote the key and everything after the first `": "` of a line, so `#`
/// and further colons stay literal.
fn quote_line(line: &str) -> Result<Cow<'_, str>> {
    let (key, value) = match line.split_once(": ") {
        Some(pair) => pair,
        None => match line.strip_suffix(':') {
            Some(key) => (key, ""),
            None => return Ok(Cow::Borrowed(line)),
        },
    };
    Ok(Cow::Owned(format!("{}: {}", quote(key.trim())?, quote(value)?)))
}

fn quote(s: &str) -> Result<String> {
    serde_json::to_string(s).map_err(|e| ExtractError::Decode(e.to_string()))
}
