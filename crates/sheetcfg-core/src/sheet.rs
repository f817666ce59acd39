//! Sheet materialization: a row state machine turning sheet rows into a
//! keyed or ordered collection of records.
//!
//! Row states: seeking the header row, optionally consuming the
//! export-group row, then data rows. Rows whose leading cell starts with
//! `#` are comments, except for the explicit `##var` header marker and
//! `##group` group marker.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use tracing::{debug, warn};

use crate::annotation::{ColumnSpec, parse_column_spec};
use crate::decode::CellDecoder;
use crate::error::{ExportError, Result};
use crate::schema::SchemaProvider;
use crate::source::Workbook;
use crate::value::{Key, KeyKind, Value};

/// Output container kind for one logical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    #[serde(alias = "map")]
    Keyed,
    #[serde(alias = "slice", alias = "list")]
    Ordered,
}

/// One materialized table: a keyed collection with a single concrete key
/// type, or an ordered sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetResult {
    Keyed {
        kind: KeyKind,
        rows: IndexMap<Key, Value>,
    },
    Ordered(Vec<Value>),
}

impl SheetResult {
    pub fn len(&self) -> usize {
        match self {
            SheetResult::Keyed { rows, .. } => rows.len(),
            SheetResult::Ordered(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the records in insertion order, regardless of kind.
    pub fn records(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            SheetResult::Keyed { rows, .. } => Box::new(rows.values()),
            SheetResult::Ordered(rows) => Box::new(rows.iter()),
        }
    }
}

impl Serialize for SheetResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SheetResult::Keyed { rows, .. } => {
                let mut map = serializer.serialize_map(Some(rows.len()))?;
                for (key, value) in rows {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
            SheetResult::Ordered(rows) => {
                let mut seq = serializer.serialize_seq(Some(rows.len()))?;
                for value in rows {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}

/// Per-sheet parse options.
#[derive(Debug, Clone)]
pub struct SheetOptions {
    pub sheet: String,
    pub message: String,
    pub kind: ContainerKind,
    /// Key column name (declared or JSON). Defaults to the first parsed
    /// column for keyed tables.
    pub key: Option<String>,
    /// Explicit key-kind override; otherwise derived from the key field.
    pub key_kind: Option<KeyKind>,
}

/// Export-group configuration for one run. `filter: None` disables
/// column-level filtering entirely.
#[derive(Debug, Clone, Default)]
pub struct ExportGroups {
    pub filter: Option<String>,
    pub default_group: String,
}

impl ExportGroups {
    fn column_included(&self, group: &str) -> bool {
        match &self.filter {
            Some(token) => group.contains(token.as_str()),
            None => true,
        }
    }
}

/// The result of materializing one sheet.
#[derive(Debug)]
pub struct SheetOutput {
    pub result: SheetResult,
    pub specs: Vec<ColumnSpec>,
    /// JSON name of the key field, when the table is keyed.
    pub key_json_name: Option<String>,
}

fn is_header_row(col0: &str) -> bool {
    col0.starts_with("##var") || !col0.starts_with('#')
}

fn is_group_row(col0: &str) -> bool {
    col0.starts_with("##group") || !col0.starts_with('#')
}

/// Materialize one sheet into a collection of decoded records.
pub fn materialize_sheet(
    provider: &dyn SchemaProvider,
    workbook: &mut dyn Workbook,
    opts: &SheetOptions,
    groups: &ExportGroups,
) -> Result<SheetOutput> {
    let message = provider
        .find_message(&opts.message)
        .ok_or_else(|| ExportError::MessageNotFound {
            sheet: opts.sheet.clone(),
            message: opts.message.clone(),
        })?;
    let decoder = CellDecoder::new(provider);
    let rows = workbook.rows(&opts.sheet)?;

    let mut specs: Vec<ColumnSpec> = Vec::new();
    let mut group_row_done = false;
    let mut key_json_name: Option<String> = None;
    let mut key_kind: Option<KeyKind> = opts.key_kind;

    let mut keyed_rows: IndexMap<Key, Value> = IndexMap::new();
    let mut ordered_rows: Vec<Value> = Vec::new();

    for (row_index, row) in rows.iter().enumerate() {
        if row.is_empty() {
            debug!(sheet = %opts.sheet, row = row_index, "empty row skipped");
            continue;
        }
        let col0 = row[0].trim();

        // Header row: the first row whose leading cell is not a comment
        // marker, or the explicit `##var` marker.
        if specs.is_empty() && is_header_row(col0) {
            for (column, cell) in row.iter().enumerate() {
                let cell = cell.trim();
                if cell.is_empty() || cell.starts_with('#') {
                    continue; // comment column
                }
                let mut spec = parse_column_spec(cell, column, &opts.sheet)?;
                if let Some(field) = message.find_field(&spec.name) {
                    spec.json_name = field.json_name.clone();
                }
                specs.push(spec);
            }
            if opts.kind == ContainerKind::Keyed {
                let key_name = match &opts.key {
                    Some(name) if !name.trim().is_empty() => name.clone(),
                    // Default: first parsed column is the key column.
                    _ => match specs.first() {
                        Some(first) => first.name.clone(),
                        None => {
                            return Err(ExportError::Header {
                                sheet: opts.sheet.clone(),
                                cell: String::new(),
                            });
                        }
                    },
                };
                let field = message.find_field(&key_name).ok_or_else(|| {
                    ExportError::KeyKind {
                        sheet: opts.sheet.clone(),
                        field: key_name.clone(),
                    }
                })?;
                key_json_name = Some(field.json_name.clone());
                if key_kind.is_none() {
                    key_kind = KeyKind::from_field(&field.kind);
                }
                if key_kind.is_none() {
                    return Err(ExportError::KeyKind {
                        sheet: opts.sheet.clone(),
                        field: key_name,
                    });
                }
            }
            continue;
        }

        // Export-group row: consumed once, immediately after the header,
        // only when a group filter is active for this run. Blank cells
        // fall back to the run's default group tag.
        if !group_row_done && !specs.is_empty() && groups.filter.is_some() && is_group_row(col0) {
            for spec in &mut specs {
                let tag = row
                    .get(spec.column)
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty())
                    .unwrap_or(groups.default_group.as_str());
                spec.group = tag.to_string();
            }
            group_row_done = true;
            continue;
        }

        // Comment row.
        if col0.starts_with('#') {
            continue;
        }

        // Data row.
        let mut record: IndexMap<String, Value> = IndexMap::new();
        for spec in &specs {
            if group_row_done && !groups.column_included(&spec.group) {
                continue;
            }
            let Some(field) = message.find_field(&spec.name) else {
                warn!(sheet = %opts.sheet, row = row_index, column = %spec.name, "field not found, column skipped");
                continue;
            };
            let Some(cell) = row.get(spec.column) else {
                continue; // row is shorter than the header
            };
            let cell = cell.trim();
            let decoded = if spec.is_json() {
                match decoder.decode_json(cell) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(sheet = %opts.sheet, row = row_index, column = %spec.name, error = %e, "bad JSON cell skipped");
                        continue;
                    }
                }
            } else {
                decoder.decode(field, spec, cell, false)
            };
            if let Some(value) = decoded {
                record.insert(field.json_name.clone(), value);
            }
        }

        match opts.kind {
            ContainerKind::Keyed => {
                // Both resolved while parsing the header row.
                let (Some(key_name), Some(kind)) = (key_json_name.as_deref(), key_kind) else {
                    continue;
                };
                let Some(key_value) = record.get(key_name) else {
                    warn!(sheet = %opts.sheet, row = row_index, key = key_name, "row missing key value, dropped");
                    continue;
                };
                let Some(key) = Key::from_value(key_value, kind) else {
                    warn!(sheet = %opts.sheet, row = row_index, key = key_name, "key not representable, row dropped");
                    continue;
                };
                keyed_rows.insert(key, Value::Record(record));
            }
            ContainerKind::Ordered => {
                ordered_rows.push(Value::Record(record));
            }
        }
    }

    let result = match opts.kind {
        ContainerKind::Keyed => SheetResult::Keyed {
            // A keyed sheet with no rows still carries its key kind.
            kind: key_kind.unwrap_or(KeyKind::Int32),
            rows: keyed_rows,
        },
        ContainerKind::Ordered => SheetResult::Ordered(ordered_rows),
    };
    Ok(SheetOutput {
        result,
        specs,
        key_json_name,
    })
}
