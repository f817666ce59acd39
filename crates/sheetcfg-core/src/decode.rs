//! Recursive cell-text decoding against a field schema.
//!
//! The grammar embeds repeated, map and nested-message values inside a
//! single cell. Lines split on `\n`; elements split on `;` at the outer
//! nesting level and on `,` once nested. Nesting deeper than two levels
//! is unsupported.
//! Omission, not an empty container, is the field-unset representation:
//! zero decoded elements or pairs collapse to `None`.

use indexmap::IndexMap;
use tracing::warn;

use crate::annotation::{ColumnSpec, FieldMode};
use crate::error::Result;
use crate::schema::{FieldKind, FieldSchema, MapEntry, SchemaProvider};
use crate::value::{Key, KeyKind, Value};

pub struct CellDecoder<'a> {
    provider: &'a dyn SchemaProvider,
}

impl<'a> CellDecoder<'a> {
    pub fn new(provider: &'a dyn SchemaProvider) -> Self {
        CellDecoder { provider }
    }

    /// Decode a raw-JSON passthrough cell (`format=json` column).
    ///
    /// The outer braces may be omitted for message-typed cells; the body is
    /// wrapped in `{...}` before parsing when neither end is already a
    /// brace. A parse failure is a per-cell error the caller downgrades to
    /// a diagnostic.
    pub fn decode_json(&self, cell: &str) -> Result<Option<Value>> {
        let cell = cell.trim();
        if cell.is_empty() {
            return Ok(None);
        }
        let body = if !cell.starts_with('{') && !cell.ends_with('}') {
            format!("{{{cell}}}")
        } else {
            cell.to_string()
        };
        let parsed: serde_json::Value = serde_json::from_str(&body)?;
        Ok(Some(Value::Json(parsed)))
    }

    /// Decode one cell against a field schema. `nested` is true when this
    /// field sits inside another repeated/map/message value and must use
    /// the inner separator.
    pub fn decode(
        &self,
        field: &FieldSchema,
        spec: &ColumnSpec,
        cell: &str,
        nested: bool,
    ) -> Option<Value> {
        let cell = cell.trim();
        if cell.is_empty() {
            return None;
        }
        if let Some(entry) = &field.map_entry {
            return self.decode_map(entry, spec, cell, nested);
        }
        if field.repeated {
            return self.decode_list(field, spec, cell, nested);
        }
        self.decode_single(field, spec, cell)
    }

    fn decode_list(
        &self,
        field: &FieldSchema,
        spec: &ColumnSpec,
        cell: &str,
        nested: bool,
    ) -> Option<Value> {
        let sep = element_separator(nested);
        let mut items = Vec::new();
        for line in cell.split('\n') {
            for token in line.split(sep) {
                if let Some(value) = self.decode_single(field, spec, token) {
                    items.push(value);
                }
            }
        }
        if items.is_empty() {
            None
        } else {
            Some(Value::List(items))
        }
    }

    fn decode_map(
        &self,
        entry: &MapEntry,
        spec: &ColumnSpec,
        cell: &str,
        nested: bool,
    ) -> Option<Value> {
        let Some(key_kind) = KeyKind::from_field(&entry.key.kind) else {
            warn!(column = %spec.name, "map key kind cannot key a table, cell skipped");
            return None;
        };
        let sep = element_separator(nested);
        let mut pairs = IndexMap::new();
        for line in cell.split('\n') {
            for token in line.split(sep) {
                let Some((key_text, value_text)) = token.split_once('_') else {
                    continue;
                };
                let Some(key_value) = self.decode_single(&entry.key, spec, key_text) else {
                    continue;
                };
                let Some(value) = self.decode_single(&entry.value, spec, value_text) else {
                    continue;
                };
                let Some(key) = Key::from_value(&key_value, key_kind) else {
                    warn!(column = %spec.name, key = key_text, "map key not representable, pair skipped");
                    continue;
                };
                pairs.insert(key, value);
            }
        }
        if pairs.is_empty() {
            None
        } else {
            Some(Value::Map(pairs))
        }
    }

    fn decode_single(&self, field: &FieldSchema, spec: &ColumnSpec, cell: &str) -> Option<Value> {
        let cell = cell.trim();
        if cell.is_empty() {
            return None;
        }
        let value = match &field.kind {
            FieldKind::Int32 => Value::I32(parse_int(cell) as i32),
            FieldKind::Int64 => Value::I64(parse_int(cell)),
            FieldKind::Uint32 => Value::U32(parse_uint(cell) as u32),
            FieldKind::Uint64 => Value::U64(parse_uint(cell)),
            FieldKind::Float => Value::F32(cell.parse().unwrap_or(0.0)),
            FieldKind::Double => Value::F64(cell.parse().unwrap_or(0.0)),
            FieldKind::Bool => Value::Bool(cell.eq_ignore_ascii_case("true") || cell == "1"),
            FieldKind::String => Value::Str(cell.to_string()),
            // Enums stay as their underlying integer, never resolved to a
            // symbolic name.
            FieldKind::Enum => Value::I32(parse_int(cell) as i32),
            FieldKind::Message(name) => return self.decode_message(name, spec, cell),
        };
        Some(value)
    }

    fn decode_message(&self, type_name: &str, spec: &ColumnSpec, cell: &str) -> Option<Value> {
        let Some(message) = self.provider.find_message(type_name) else {
            warn!(message = type_name, column = %spec.name, "nested message type not found");
            return None;
        };
        let mut record = IndexMap::new();
        match spec.mode() {
            FieldMode::Positional => {
                // Tokens map onto the declared field order; extra tokens
                // are truncated, extra fields stay unset.
                for (index, token) in cell.split('_').enumerate() {
                    let Some(sub) = message.fields.get(index) else {
                        break;
                    };
                    if let Some(value) = self.decode(sub, spec, token, true) {
                        record.insert(sub.json_name.clone(), value);
                    }
                }
            }
            FieldMode::Explicit => {
                for part in cell.split('#') {
                    let Some((name, value_text)) = part.split_once('_') else {
                        continue;
                    };
                    let Some(sub) = message.find_field(name) else {
                        warn!(message = type_name, field = name, "sub-field not found, skipped");
                        continue;
                    };
                    if let Some(value) = self.decode(sub, spec, value_text, true) {
                        record.insert(sub.json_name.clone(), value);
                    }
                }
            }
        }
        if record.is_empty() {
            None
        } else {
            Some(Value::Record(record))
        }
    }
}

fn element_separator(nested: bool) -> char {
    if nested { ',' } else { ';' }
}

fn parse_int(s: &str) -> i64 {
    // Malformed numeric text resolves to zero; sparse and legacy data
    // cells rely on it.
    s.parse().unwrap_or(0)
}

fn parse_uint(s: &str) -> u64 {
    s.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::parse_column_spec;
    use crate::schema::SchemaRegistry;

    const SCHEMA: &str = r#"
messages:
  Item:
    - { name: Id, kind: int32 }
    - { name: Count, kind: int32 }
  Monster:
    - { name: CfgId, kind: int32 }
    - { name: Name, kind: string }
    - { name: Hp, kind: int64 }
    - { name: Rate, kind: double }
    - { name: Boss, kind: bool }
    - { name: DropIds, kind: int32, repeated: true }
    - { name: Drops, kind: map, key: int32, value: string }
    - { name: Reward, kind: Item }
    - { name: Bag, kind: map, key: int32, value: Item }
"#;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_yaml_str(SCHEMA).unwrap()
    }

    fn spec(header: &str) -> ColumnSpec {
        parse_column_spec(header, 0, "Monster").unwrap()
    }

    fn field<'a>(reg: &'a SchemaRegistry, name: &str) -> &'a FieldSchema {
        reg.find_message("Monster").unwrap().find_field(name).unwrap()
    }

    #[test]
    fn test_empty_cell_is_absent() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert_eq!(dec.decode(field(&reg, "CfgId"), &spec("CfgId"), "  ", false), None);
    }

    #[test]
    fn test_scalar_kinds() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert_eq!(
            dec.decode(field(&reg, "CfgId"), &spec("CfgId"), "17", false),
            Some(Value::I32(17))
        );
        assert_eq!(
            dec.decode(field(&reg, "Hp"), &spec("Hp"), "90000000000", false),
            Some(Value::I64(90_000_000_000))
        );
        assert_eq!(
            dec.decode(field(&reg, "Rate"), &spec("Rate"), "0.5", false),
            Some(Value::F64(0.5))
        );
        assert_eq!(
            dec.decode(field(&reg, "Name"), &spec("Name"), "slime", false),
            Some(Value::Str("slime".into()))
        );
    }

    #[test]
    fn test_malformed_int_is_silent_zero() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert_eq!(
            dec.decode(field(&reg, "CfgId"), &spec("CfgId"), "not-a-number", false),
            Some(Value::I32(0))
        );
        assert_eq!(
            dec.decode(field(&reg, "Hp"), &spec("Hp"), "12x", false),
            Some(Value::I64(0))
        );
    }

    #[test]
    fn test_bool_variants() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        let f = field(&reg, "Boss");
        let s = spec("Boss");
        assert_eq!(dec.decode(f, &s, "TRUE", false), Some(Value::Bool(true)));
        assert_eq!(dec.decode(f, &s, "1", false), Some(Value::Bool(true)));
        assert_eq!(dec.decode(f, &s, "yes", false), Some(Value::Bool(false)));
        assert_eq!(dec.decode(f, &s, "0", false), Some(Value::Bool(false)));
    }

    #[test]
    fn test_repeated_outer_separator() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert_eq!(
            dec.decode(field(&reg, "DropIds"), &spec("DropIds"), "1;2;3", false),
            Some(Value::List(vec![Value::I32(1), Value::I32(2), Value::I32(3)]))
        );
    }

    #[test]
    fn test_repeated_nested_separator_decodes_identically() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert_eq!(
            dec.decode(field(&reg, "DropIds"), &spec("DropIds"), "1,2,3", true),
            Some(Value::List(vec![Value::I32(1), Value::I32(2), Value::I32(3)]))
        );
    }

    #[test]
    fn test_repeated_newlines_split_lines() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert_eq!(
            dec.decode(field(&reg, "DropIds"), &spec("DropIds"), "1;2\n3", false),
            Some(Value::List(vec![Value::I32(1), Value::I32(2), Value::I32(3)]))
        );
    }

    #[test]
    fn test_repeated_all_empty_tokens_is_absent_not_empty_list() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert_eq!(
            dec.decode(field(&reg, "DropIds"), &spec("DropIds"), " ; ; ", false),
            None
        );
    }

    #[test]
    fn test_map_cell() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        let got = dec
            .decode(field(&reg, "Drops"), &spec("Drops"), "1_v1;2_v2", false)
            .unwrap();
        let Value::Map(pairs) = got else { panic!("expected map") };
        assert_eq!(pairs.get(&Key::I32(1)), Some(&Value::Str("v1".into())));
        assert_eq!(pairs.get(&Key::I32(2)), Some(&Value::Str("v2".into())));
    }

    #[test]
    fn test_map_cell_without_pairs_is_absent() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert_eq!(
            dec.decode(field(&reg, "Drops"), &spec("Drops"), "nounderscore", false),
            None
        );
    }

    #[test]
    fn test_nested_positional() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        let got = dec
            .decode(field(&reg, "Reward"), &spec("Reward#Field=no"), "5_3", false)
            .unwrap();
        let Value::Record(rec) = got else { panic!("expected record") };
        assert_eq!(rec.get("id"), Some(&Value::I32(5)));
        assert_eq!(rec.get("count"), Some(&Value::I32(3)));
    }

    #[test]
    fn test_nested_positional_truncates_extra_tokens() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        let got = dec
            .decode(field(&reg, "Reward"), &spec("Reward#Field=no"), "5_3_9_9", false)
            .unwrap();
        let Value::Record(rec) = got else { panic!("expected record") };
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn test_nested_explicit() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        let got = dec
            .decode(
                field(&reg, "Reward"),
                &spec("Reward#Field=full"),
                "Count_3#Id_5",
                false,
            )
            .unwrap();
        let Value::Record(rec) = got else { panic!("expected record") };
        assert_eq!(rec.get("id"), Some(&Value::I32(5)));
        assert_eq!(rec.get("count"), Some(&Value::I32(3)));
    }

    #[test]
    fn test_nested_explicit_unresolved_name_is_skipped() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        let got = dec
            .decode(
                field(&reg, "Reward"),
                &spec("Reward#Field=full"),
                "Bogus_9#Id_5",
                false,
            )
            .unwrap();
        let Value::Record(rec) = got else { panic!("expected record") };
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.get("id"), Some(&Value::I32(5)));
    }

    #[test]
    fn test_fully_empty_nested_record_is_absent() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert_eq!(
            dec.decode(field(&reg, "Reward"), &spec("Reward#Field=full"), "#", false),
            None
        );
    }

    #[test]
    fn test_map_of_messages_uses_inner_separator() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        // The pair splits on the first `_`: key `1`, value `5` decoded as
        // a positional Item with only its first field set.
        let got = dec
            .decode(field(&reg, "Bag"), &spec("Bag#Field=no"), "1_5", false)
            .unwrap();
        let Value::Map(pairs) = got else { panic!("expected map") };
        let Value::Record(item) = pairs.get(&Key::I32(1)).unwrap() else {
            panic!("expected record value")
        };
        assert_eq!(item.get("id"), Some(&Value::I32(5)));
    }

    #[test]
    fn test_json_passthrough_autowrap() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        let got = dec.decode_json(r#""a": 1"#).unwrap().unwrap();
        assert_eq!(got, Value::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_json_passthrough_already_wrapped() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        let got = dec.decode_json(r#"{"a": [1, 2]}"#).unwrap().unwrap();
        assert_eq!(got, Value::Json(serde_json::json!({"a": [1, 2]})));
    }

    #[test]
    fn test_json_parse_failure_is_an_error() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert!(dec.decode_json("{not json").is_err());
    }

    #[test]
    fn test_json_empty_cell_is_absent() {
        let reg = registry();
        let dec = CellDecoder::new(&reg);
        assert_eq!(dec.decode_json("").unwrap(), None);
    }
}
