//! Recursive structured values backing configuration files, templates and the
//! structured-value event emission path.

use bytes::{BufMut, Bytes};
use indexmap::IndexMap;

use crate::wire::{Decode, DecodeError, Encode};

/// Ordered string-keyed mapping of values.
///
/// Insertion order is preserved so that components initialize in the order
/// they appear in configuration files.
pub type ValueMap = IndexMap<String, Value>;

const TAG_INT: u8 = 0;
const TAG_REAL: u8 = 1;
const TAG_STR: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_OBJECT: u8 = 4;
const TAG_ARRAY: u8 = 5;

/// A structured value: integer, real, string, boolean, object or array.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Str(String),
    Bool(bool),
    Object(ValueMap),
    Array(Vec<Value>),
}

impl Value {
    /// Parses a value from configuration text.
    pub fn parse_str(text: &str) -> Result<Self, serde_json::Error> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(Self::from_json(json))
    }

    /// Converts a parsed JSON tree. `null` means "unset": null-valued object
    /// keys and array elements are dropped, a top-level null becomes an empty
    /// object.
    pub fn from_json(json: serde_json::Value) -> Self {
        Self::try_from_json(json).unwrap_or_else(|| Value::Object(ValueMap::new()))
    }

    fn try_from_json(json: serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(value) => Some(Value::Bool(value)),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Some(Value::Int(value)),
                None => number.as_f64().map(Value::Real),
            },
            serde_json::Value::String(value) => Some(Value::Str(value)),
            serde_json::Value::Array(items) => Some(Value::Array(
                items.into_iter().filter_map(Self::try_from_json).collect(),
            )),
            serde_json::Value::Object(entries) => Some(Value::Object(
                entries
                    .into_iter()
                    .filter_map(|(key, value)| Some((key, Self::try_from_json(value)?)))
                    .collect(),
            )),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a real, widening integers.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl Encode for Value {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Value::Int(value) => {
                buf.put_u8(TAG_INT);
                value.encode(buf);
            }
            Value::Real(value) => {
                buf.put_u8(TAG_REAL);
                value.encode(buf);
            }
            Value::Str(value) => {
                buf.put_u8(TAG_STR);
                value.encode(buf);
            }
            Value::Bool(value) => {
                buf.put_u8(TAG_BOOL);
                value.encode(buf);
            }
            Value::Object(entries) => {
                buf.put_u8(TAG_OBJECT);
                entries.encode(buf);
            }
            Value::Array(items) => {
                buf.put_u8(TAG_ARRAY);
                items.encode(buf);
            }
        }
    }
}

impl Decode for Value {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        match u8::decode(buf)? {
            TAG_INT => Ok(Value::Int(i64::decode(buf)?)),
            TAG_REAL => Ok(Value::Real(f64::decode(buf)?)),
            TAG_STR => Ok(Value::Str(String::decode(buf)?)),
            TAG_BOOL => Ok(Value::Bool(bool::decode(buf)?)),
            TAG_OBJECT => Ok(Value::Object(ValueMap::decode(buf)?)),
            TAG_ARRAY => Ok(Value::Array(Vec::decode(buf)?)),
            value => Err(DecodeError::InvalidDiscriminator {
                kind: "value tag",
                value,
            }),
        }
    }
}

/// Replaces `"$name"` strings with the matching value from `params`,
/// recursing through objects and arrays. Unknown names are left verbatim.
pub fn substitute(value: &mut Value, params: &ValueMap) {
    match value {
        Value::Str(text) => {
            if let Some(name) = text.strip_prefix('$') {
                if let Some(replacement) = params.get(name) {
                    *value = replacement.clone();
                }
            }
        }
        Value::Object(entries) => substitute_object(entries, params),
        Value::Array(items) => {
            for item in items {
                substitute(item, params);
            }
        }
        _ => {}
    }
}

/// [`substitute`] over every value of an object.
pub fn substitute_object(object: &mut ValueMap, params: &ValueMap) {
    for (_, value) in object.iter_mut() {
        substitute(value, params);
    }
}

/// Merges `overlay` on top of `base`: overlay keys win, nested objects merge
/// recursively, everything else (including arrays) is replaced wholesale.
pub fn merge_objects(base: &ValueMap, overlay: &ValueMap) -> ValueMap {
    let mut merged = base.clone();
    for (key, value) in overlay {
        let merged_value = match (merged.get(key), value) {
            (Some(Value::Object(base_entries)), Value::Object(overlay_entries)) => {
                Value::Object(merge_objects(base_entries, overlay_entries))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), merged_value);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Decode, Encode};

    fn object(entries: &[(&str, Value)]) -> ValueMap {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn parses_configuration_text() {
        let value = Value::parse_str(r#"{"speed": 10, "scale": 1.5, "name": "x", "on": true}"#)
            .expect("valid json");
        let entries = value.as_object().expect("object");
        assert_eq!(entries["speed"], Value::Int(10));
        assert_eq!(entries["scale"], Value::Real(1.5));
        assert_eq!(entries["name"], Value::Str("x".into()));
        assert_eq!(entries["on"], Value::Bool(true));
    }

    #[test]
    fn null_keys_are_dropped() {
        let value = Value::parse_str(r#"{"a": null, "b": 1}"#).expect("valid json");
        let entries = value.as_object().expect("object");
        assert!(!entries.contains_key("a"));
        assert_eq!(entries["b"], Value::Int(1));
    }

    #[test]
    fn binary_roundtrip() {
        let value = Value::Object(object(&[
            ("count", Value::Int(3)),
            ("items", Value::Array(vec![Value::Bool(false), Value::Real(0.5)])),
        ]));
        let bytes = value.to_bytes();
        assert_eq!(Value::from_bytes(&bytes).expect("decodable"), value);
    }

    #[test]
    fn substitution_replaces_known_names() {
        let mut value = Value::Object(object(&[
            ("target", Value::Str("$who".into())),
            ("other", Value::Str("$unknown".into())),
        ]));
        let params = object(&[("who", Value::Int(3))]);

        substitute(&mut value, &params);

        let entries = value.as_object().expect("object");
        assert_eq!(entries["target"], Value::Int(3));
        assert_eq!(entries["other"], Value::Str("$unknown".into()));
    }

    #[test]
    fn merge_overlays_nested_objects() {
        let base = object(&[
            ("health", Value::Object(object(&[("current", Value::Int(100)), ("max", Value::Int(100))]))),
            ("name", Value::Str("grunt".into())),
        ]);
        let overlay = object(&[(
            "health",
            Value::Object(object(&[("current", Value::Int(50))])),
        )]);

        let merged = merge_objects(&base, &overlay);

        let health = merged["health"].as_object().expect("object");
        assert_eq!(health["current"], Value::Int(50));
        assert_eq!(health["max"], Value::Int(100));
        assert_eq!(merged["name"], Value::Str("grunt".into()));
    }
}
