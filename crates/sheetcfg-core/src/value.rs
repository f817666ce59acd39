//! Tagged value and key types flowing out of the cell decoder.
//!
//! Every decode branch produces one of these variants; there is no dynamic
//! container anywhere in the pipeline. Serialization preserves insertion
//! order and stringifies map keys, matching JSON's key-type restriction.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::schema::FieldKind;

/// The concrete key type of one keyed output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Int32,
    Int64,
    Uint32,
    Uint64,
    String,
}

impl KeyKind {
    /// Derive the key kind from a key field's kind. Float, bool and
    /// message fields cannot key a table.
    pub fn from_field(kind: &FieldKind) -> Option<KeyKind> {
        match kind {
            FieldKind::Int32 | FieldKind::Enum => Some(KeyKind::Int32),
            FieldKind::Int64 => Some(KeyKind::Int64),
            FieldKind::Uint32 => Some(KeyKind::Uint32),
            FieldKind::Uint64 => Some(KeyKind::Uint64),
            FieldKind::String => Some(KeyKind::String),
            _ => None,
        }
    }
}

/// A normalized table key. Within one collection all keys share one variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::I32(v) => write!(f, "{v}"),
            Key::I64(v) => write!(f, "{v}"),
            Key::U32(v) => write!(f, "{v}"),
            Key::U64(v) => write!(f, "{v}"),
            Key::Str(v) => write!(f, "{v}"),
        }
    }
}

impl Key {
    /// Coerce a decoded value onto a single key kind.
    ///
    /// Integer values convert across widths only when the target can
    /// represent them exactly; string targets take the display form; a
    /// string source must parse as the target's integer type. `None` means
    /// the row carrying this key must be dropped with a diagnostic --
    /// defaulting to zero here would alias distinct keys.
    pub fn from_value(value: &Value, kind: KeyKind) -> Option<Key> {
        match kind {
            KeyKind::String => match value {
                Value::Str(s) => Some(Key::Str(s.clone())),
                Value::I32(v) => Some(Key::Str(v.to_string())),
                Value::I64(v) => Some(Key::Str(v.to_string())),
                Value::U32(v) => Some(Key::Str(v.to_string())),
                Value::U64(v) => Some(Key::Str(v.to_string())),
                _ => None,
            },
            KeyKind::Int32 => int_candidate(value).and_then(|v| i32::try_from(v).ok().map(Key::I32)),
            KeyKind::Int64 => int_candidate(value).and_then(|v| i64::try_from(v).ok().map(Key::I64)),
            KeyKind::Uint32 => int_candidate(value).and_then(|v| u32::try_from(v).ok().map(Key::U32)),
            KeyKind::Uint64 => int_candidate(value).and_then(|v| u64::try_from(v).ok().map(Key::U64)),
        }
    }
}

fn int_candidate(value: &Value) -> Option<i128> {
    match value {
        Value::I32(v) => Some(i128::from(*v)),
        Value::I64(v) => Some(i128::from(*v)),
        Value::U32(v) => Some(i128::from(*v)),
        Value::U64(v) => Some(i128::from(*v)),
        Value::Str(s) => s.trim().parse::<i128>().ok(),
        _ => None,
    }
}

/// One decoded cell value: scalar, list, map, nested record or raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<Key, Value>),
    /// Nested record keyed by JSON field name.
    Record(IndexMap<String, Value>),
    /// Raw-JSON passthrough column (`format=json`).
    Json(serde_json::Value),
}

impl Value {
    pub fn as_record(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Record(m) => Some(m),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::I32(v) => serializer.serialize_i32(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::U32(v) => serializer.serialize_u32(*v),
            Value::U64(v) => serializer.serialize_u64(*v),
            Value::F32(v) => serializer.serialize_f32(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
            Value::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            Value::Json(v) => v.serialize(serializer),
        }
    }
}
