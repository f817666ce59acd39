//! Message schema model and registry (the schema provider).
//!
//! The registry is built once from a YAML schema document and then only
//! read; the decoder never mutates it. Field lookup tries the declared
//! name first and falls back to the JSON name, so spreadsheet headers may
//! use either spelling.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{ExportError, Result};

/// Scalar and message field kinds supported by the cell grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float,
    Double,
    Bool,
    String,
    Enum,
    /// Nested message type, referenced by name through the provider.
    Message(String),
}

impl FieldKind {
    fn parse(name: &str) -> FieldKind {
        match name {
            "int32" | "sint32" | "sfixed32" => FieldKind::Int32,
            "int64" | "sint64" | "sfixed64" => FieldKind::Int64,
            "uint32" | "fixed32" => FieldKind::Uint32,
            "uint64" | "fixed64" => FieldKind::Uint64,
            "float" => FieldKind::Float,
            "double" => FieldKind::Double,
            "bool" => FieldKind::Bool,
            "string" => FieldKind::String,
            "enum" => FieldKind::Enum,
            other => FieldKind::Message(other.to_string()),
        }
    }
}

/// Key/value field pair of a map field.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: FieldSchema,
    pub value: FieldSchema,
}

/// One field descriptor: declared name, JSON name, kind and cardinality.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub json_name: String,
    pub kind: FieldKind,
    pub repeated: bool,
    pub map_entry: Option<Box<MapEntry>>,
}

impl FieldSchema {
    pub fn is_map(&self) -> bool {
        self.map_entry.is_some()
    }
}

/// Ordered field set of one message type.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl MessageSchema {
    /// Find a field by declared name, falling back to the JSON name.
    pub fn find_field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.json_name == name))
    }
}

/// Read-only lookup interface handed to the decoder and materializer.
pub trait SchemaProvider {
    fn find_message(&self, name: &str) -> Option<&MessageSchema>;
}

/// Parse-once registry of message schemas, loaded from a YAML document.
pub struct SchemaRegistry {
    messages: HashMap<String, MessageSchema>,
}

#[derive(Deserialize)]
struct SchemaDoc {
    messages: HashMap<String, Vec<RawField>>,
}

#[derive(Deserialize)]
struct RawField {
    name: String,
    kind: String,
    #[serde(default)]
    json_name: Option<String>,
    #[serde(default)]
    repeated: bool,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl SchemaRegistry {
    /// Build a registry from a YAML schema document string.
    pub fn from_yaml_str(yaml: &str) -> Result<SchemaRegistry> {
        let doc: SchemaDoc =
            serde_yaml::from_str(yaml).map_err(|e| ExportError::Schema(e.to_string()))?;
        let mut messages = HashMap::new();
        for (name, raw_fields) in doc.messages {
            let mut fields = Vec::with_capacity(raw_fields.len());
            for raw in raw_fields {
                fields.push(convert_field(&name, raw)?);
            }
            messages.insert(name.clone(), MessageSchema { name, fields });
        }
        Ok(SchemaRegistry { messages })
    }

    /// Build a registry from a YAML schema file.
    pub fn from_yaml_file(path: &std::path::Path) -> Result<SchemaRegistry> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}

impl SchemaProvider for SchemaRegistry {
    fn find_message(&self, name: &str) -> Option<&MessageSchema> {
        self.messages.get(name)
    }
}

fn convert_field(message: &str, raw: RawField) -> Result<FieldSchema> {
    let json_name = raw
        .json_name
        .unwrap_or_else(|| derive_json_name(&raw.name));
    if raw.kind == "map" {
        let key_kind = raw.key.ok_or_else(|| {
            ExportError::Schema(format!("{message}.{}: map field without key kind", raw.name))
        })?;
        let value_kind = raw.value.ok_or_else(|| {
            ExportError::Schema(format!("{message}.{}: map field without value kind", raw.name))
        })?;
        let entry = MapEntry {
            key: synthetic_field("key", FieldKind::parse(&key_kind)),
            value: synthetic_field("value", FieldKind::parse(&value_kind)),
        };
        return Ok(FieldSchema {
            name: raw.name,
            json_name,
            kind: FieldKind::Message(format!("{message}.MapEntry")),
            repeated: true,
            map_entry: Some(Box::new(entry)),
        });
    }
    Ok(FieldSchema {
        name: raw.name,
        json_name,
        kind: FieldKind::parse(&raw.kind),
        repeated: raw.repeated,
        map_entry: None,
    })
}

fn synthetic_field(name: &str, kind: FieldKind) -> FieldSchema {
    FieldSchema {
        name: name.to_string(),
        json_name: name.to_string(),
        kind,
        repeated: false,
        map_entry: None,
    }
}

/// Derive the JSON name from a declared field name: underscores removed,
/// the following letter upper-cased, first letter lower-cased.
/// `Id` -> `id`, `cfg_id` -> `cfgId`, `CfgId` -> `cfgId`.
pub fn derive_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    let mut chars = out.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => out,
    }
}
