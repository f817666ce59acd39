//! Parser for header-cell column annotations.
//!
//! Grammar: `Name(#key=value)*`, e.g. `Reward#Field=no#ref=Item`. Header
//! cells may wrap across lines in the source workbook; embedded newlines
//! are stripped before parsing.

use crate::error::{ExportError, Result};

/// How a message-typed column names its sub-fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// Sub-fields assigned by declared order, `_`-separated (`5_3`).
    Positional,
    /// Self-describing `Name_Value` pairs, `#`-separated (`Id_5#Count_3`).
    Explicit,
}

/// One parsed header column. Built fresh per sheet-parse pass.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Base field name as written in the header.
    pub name: String,
    /// JSON name of the resolved field; defaults to `name` until the
    /// materializer resolves the field against the schema.
    pub json_name: String,
    /// Zero-based column index in the sheet.
    pub column: usize,
    /// `format=json` marks the column for raw-JSON passthrough.
    pub format: Option<String>,
    /// Raw `field=` path tokens, split on `_`. `["no"]` and `["full"]`
    /// are mode sentinels.
    pub field_path: Option<Vec<String>>,
    /// `ref=<name>` cross-table reference target.
    pub reference: Option<String>,
    /// Export-group tag, assigned later from the group row.
    pub group: String,
}

impl ColumnSpec {
    /// Any `field=` value other than the single `full` sentinel behaves as
    /// positional mode. This flattening is an exercised data-entry
    /// convention in existing tables; do not differentiate further.
    pub fn mode(&self) -> FieldMode {
        match &self.field_path {
            Some(path) if path.len() == 1 && path[0] == "full" => FieldMode::Explicit,
            _ => FieldMode::Positional,
        }
    }

    pub fn is_json(&self) -> bool {
        self.format.as_deref() == Some("json")
    }
}

/// Parse one trimmed header cell into a column spec.
///
/// `sheet` is only used for error context. An empty base name is the
/// unparsable-header case and aborts the containing sheet's parse.
pub fn parse_column_spec(cell: &str, column: usize, sheet: &str) -> Result<ColumnSpec> {
    let cell: String = cell.trim().chars().filter(|&c| c != '\n' && c != '\r').collect();
    let mut parts = cell.split('#');
    let name = parts.next().unwrap_or("").trim().to_string();
    if name.is_empty() {
        return Err(ExportError::Header {
            sheet: sheet.to_string(),
            cell,
        });
    }
    let mut spec = ColumnSpec {
        json_name: name.clone(),
        name,
        column,
        format: None,
        field_path: None,
        reference: None,
        group: String::new(),
    };
    for arg in parts {
        let Some((key, value)) = arg.split_once('=') else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "field" => {
                spec.field_path = Some(value.split('_').map(str::to_string).collect());
            }
            "format" => {
                spec.format = Some(value.to_string());
            }
            "ref" => {
                spec.reference = Some(value.to_string());
            }
            _ => {}
        }
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        let spec = parse_column_spec("CfgId", 0, "Monster").unwrap();
        assert_eq!(spec.name, "CfgId");
        assert_eq!(spec.column, 0);
        assert_eq!(spec.mode(), FieldMode::Positional);
        assert!(!spec.is_json());
        assert!(spec.reference.is_none());
    }

    #[test]
    fn test_positional_sentinel() {
        let spec = parse_column_spec("Reward#Field=no", 2, "Monster").unwrap();
        assert_eq!(spec.name, "Reward");
        assert_eq!(spec.field_path, Some(vec!["no".to_string()]));
        assert_eq!(spec.mode(), FieldMode::Positional);
    }

    #[test]
    fn test_explicit_sentinel() {
        let spec = parse_column_spec("Reward#Field=full", 2, "Monster").unwrap();
        assert_eq!(spec.mode(), FieldMode::Explicit);
    }

    #[test]
    fn test_named_path_flattens_to_positional() {
        let spec = parse_column_spec("Reward#Field=Id_Count", 2, "Monster").unwrap();
        assert_eq!(
            spec.field_path,
            Some(vec!["Id".to_string(), "Count".to_string()])
        );
        assert_eq!(spec.mode(), FieldMode::Positional);
    }

    #[test]
    fn test_format_and_ref() {
        let spec = parse_column_spec("Extra#format=json#ref=Item", 3, "Monster").unwrap();
        assert!(spec.is_json());
        assert_eq!(spec.reference.as_deref(), Some("Item"));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let spec = parse_column_spec("Reward#FIELD=full#Format=json", 0, "Monster").unwrap();
        assert_eq!(spec.mode(), FieldMode::Explicit);
        assert!(spec.is_json());
    }

    #[test]
    fn test_embedded_newlines_are_stripped() {
        let spec = parse_column_spec("Reward\n#Field=no", 0, "Monster").unwrap();
        assert_eq!(spec.name, "Reward");
        assert_eq!(spec.field_path, Some(vec!["no".to_string()]));
    }

    #[test]
    fn test_empty_name_is_an_error() {
        assert!(parse_column_spec("#field=no", 0, "Monster").is_err());
        assert!(parse_column_spec("  ", 0, "Monster").is_err());
    }

    #[test]
    fn test_argument_without_equals_is_ignored() {
        let spec = parse_column_spec("Reward#json", 0, "Monster").unwrap();
        assert!(spec.format.is_none());
    }
}
