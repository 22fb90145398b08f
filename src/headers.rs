//! Header maps as they travel across the JSON boundary.
//!
//! Callers send headers as an ordered object whose values are a string or an
//! array of strings; numbers and booleans are accepted and rendered as text.
//! Origin headers go back out in the same shape:
//! `set-cookie` is always an array, any other repeated header is joined with
//! `", "`.

use hyper::header::{HeaderMap, SET_COOKIE};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Ordered header name → value mapping.
pub type HeaderFields = IndexMap<String, HeaderField>;

/// A header value as it appears in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HeaderField {
    One(String),
    Many(Vec<String>),
}

impl HeaderField {
    /// The value as a single line, multiple values joined with `", "`.
    pub fn joined(&self) -> String {
        match self {
            HeaderField::One(v) => v.clone(),
            HeaderField::Many(vs) => vs.join(", "),
        }
    }

    /// Each value on its own.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            HeaderField::One(v) => std::slice::from_ref(v),
            HeaderField::Many(vs) => vs,
        };
        slice.iter().map(String::as_str)
    }
}

impl TryFrom<Value> for HeaderField {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(scalar_text)
                .collect::<Result<_, _>>()
                .map(HeaderField::Many),
            other => scalar_text(other).map(HeaderField::One),
        }
    }
}

impl<'de> Deserialize<'de> for HeaderField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        HeaderField::try_from(value).map_err(serde::de::Error::custom)
    }
}

fn scalar_text(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        v @ (Value::Number(_) | Value::Bool(_)) => Ok(v.to_string()),
        other => Err(format!("header value must be a string, number or boolean, got {other}")),
    }
}

impl From<&str> for HeaderField {
    fn from(v: &str) -> Self {
        HeaderField::One(v.to_string())
    }
}

/// Case-insensitive lookup in a caller-supplied header object.
pub fn find<'a>(fields: &'a HeaderFields, name: &str) -> Option<&'a HeaderField> {
    fields
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// Convert an origin response header map to the JSON shape.
///
/// Names are lowercase (hyper normalizes them); first-seen order is kept.
/// Values that are not valid UTF-8 are decoded lossily.
pub fn from_header_map(map: &HeaderMap) -> HeaderFields {
    let mut fields = HeaderFields::with_capacity(map.keys_len());
    for name in map.keys() {
        let values: Vec<String> = map
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        let field = if name == SET_COOKIE {
            HeaderField::Many(values)
        } else if values.len() == 1 {
            HeaderField::One(values.into_iter().next().unwrap_or_default())
        } else {
            HeaderField::One(values.join(", "))
        };
        fields.insert(name.as_str().to_string(), field);
    }
    fields
}
