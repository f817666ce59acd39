//! Cross-table reference integrity checking.
//!
//! Runs after all sheets for a run are merged. Purely diagnostic: a
//! dangling reference is reported, never escalated. Lists of nested
//! records are not traversed (known limitation).

use indexmap::IndexMap;
use tracing::warn;

use crate::export::ExportEntry;
use crate::sheet::SheetResult;
use crate::value::{Key, KeyKind, Value};

/// One dangling or uncheckable reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RefIssue {
    pub table: String,
    pub column: String,
    pub target: String,
    pub candidate: String,
}

/// Check every `ref=<target>` column of every entry against the target
/// table's key set. Returns the issues found, after logging each one.
pub fn check_references(entries: &IndexMap<String, ExportEntry>) -> Vec<RefIssue> {
    let mut issues = Vec::new();
    for entry in entries.values() {
        for spec in &entry.specs {
            let Some(target) = &spec.reference else {
                continue;
            };
            let Some(target_entry) = entries.get(target) else {
                warn!(table = %entry.name, column = %spec.name, target = %target, "ref target table does not exist");
                continue;
            };
            let SheetResult::Keyed { kind, rows } = &target_entry.result else {
                warn!(table = %entry.name, column = %spec.name, target = %target, "ref target table is not keyed");
                continue;
            };
            let Some(target_key_name) = &target_entry.key_json_name else {
                continue;
            };
            for record in entry.result.records() {
                let Some(fields) = record.as_record() else {
                    continue;
                };
                let Some(value) = fields.get(&spec.json_name) else {
                    continue;
                };
                match value {
                    Value::List(items) => {
                        for item in items {
                            check_candidate(
                                entry, spec, target, target_key_name, *kind, rows, item,
                                &mut issues,
                            );
                        }
                    }
                    other => {
                        check_candidate(
                            entry, spec, target, target_key_name, *kind, rows, other,
                            &mut issues,
                        );
                    }
                }
            }
        }
    }
    issues
}

#[allow(clippy::too_many_arguments)]
fn check_candidate(
    entry: &ExportEntry,
    spec: &crate::annotation::ColumnSpec,
    target: &str,
    target_key_name: &str,
    kind: KeyKind,
    rows: &IndexMap<Key, Value>,
    value: &Value,
    issues: &mut Vec<RefIssue>,
) {
    // A candidate identifier is a bare scalar, or the sub-field of a
    // nested record named like the target's key field.
    let candidate = match value {
        Value::Record(fields) => match fields.get(target_key_name) {
            Some(v) => v,
            None => return,
        },
        Value::List(_) | Value::Map(_) | Value::Json(_) => return,
        other => other,
    };
    let Some(key) = Key::from_value(candidate, kind) else {
        return;
    };
    if !rows.contains_key(&key) {
        warn!(
            table = %entry.name,
            column = %spec.name,
            target = %target,
            id = %key,
            "dangling reference"
        );
        issues.push(RefIssue {
            table: entry.name.clone(),
            column: spec.name.clone(),
            target: target.to_string(),
            candidate: key.to_string(),
        });
    }
}
