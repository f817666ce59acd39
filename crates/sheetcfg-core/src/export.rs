//! The export pipeline: routes sheets to logical tables, merges, writes
//! pretty-printed JSON documents plus an optional hash manifest, hands
//! manager metadata to the template renderer and finishes with the
//! reference check.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::annotation::ColumnSpec;
use crate::error::{ExportError, Result};
use crate::merge::merge_results;
use crate::refcheck::check_references;
use crate::schema::SchemaProvider;
use crate::sheet::{ContainerKind, ExportGroups, SheetOptions, SheetResult, materialize_sheet};
use crate::source::WorkbookOpener;
use crate::value::KeyKind;

/// One routing entry: which sheet of which workbook feeds which table.
#[derive(Debug, Clone, Deserialize)]
pub struct SheetRoute {
    /// Workbook file name, resolved against the import directory.
    pub workbook: String,
    pub sheet: String,
    /// Message type name; defaults to the sheet name.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: ContainerKind,
    /// Key column override for keyed tables.
    #[serde(default)]
    pub key: Option<String>,
    /// Key kind override.
    #[serde(default)]
    pub key_kind: Option<KeyKind>,
    /// Merge target: logical table this sheet contributes rows to.
    #[serde(default)]
    pub merge: Option<String>,
    /// Sheet-level export group tag.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub comment: String,
}

fn default_kind() -> ContainerKind {
    ContainerKind::Keyed
}

/// A code template and where its rendered output goes.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSpec {
    pub template: PathBuf,
    pub output: PathBuf,
}

/// Options for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub import_dir: PathBuf,
    pub export_dir: PathBuf,
    /// Optional JSON manifest mapping output file name to content hash.
    pub hash_manifest: Option<PathBuf>,
    pub groups: ExportGroups,
    pub routes: Vec<SheetRoute>,
    pub templates: Vec<TemplateSpec>,
}

/// One merged logical table plus everything the serializer, code
/// generator and reference checker need. Lives for one export run.
#[derive(Debug)]
pub struct ExportEntry {
    /// Logical table name; also the output file stem.
    pub name: String,
    /// Sheet that first contributed to this entry.
    pub sheet: String,
    pub message: String,
    pub kind: ContainerKind,
    pub result: SheetResult,
    /// Column specs of the first contributing sheet.
    pub specs: Vec<ColumnSpec>,
    pub key_json_name: Option<String>,
    pub comment: String,
    /// True when this entry is a named merge target.
    pub merged: bool,
}

/// Generated-code metadata for one table manager.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerInfo {
    pub message: String,
    pub manager: String,
    pub kind: ContainerKind,
    pub file: String,
    pub comment: String,
}

/// Fills a code template with manager metadata. Pure templating; the
/// implementation lives with the caller.
pub trait TemplateRenderer {
    fn render(&self, template: &str, managers: &[ManagerInfo]) -> std::result::Result<String, String>;
}

/// Summary of one completed export run.
#[derive(Debug)]
pub struct ExportSummary {
    pub tables: usize,
    pub outputs: Vec<String>,
    pub ref_issues: usize,
}

pub struct ExportRun<'a> {
    provider: &'a dyn SchemaProvider,
    opener: &'a dyn WorkbookOpener,
    opts: &'a ExportOptions,
    renderer: Option<&'a dyn TemplateRenderer>,
}

impl<'a> ExportRun<'a> {
    pub fn new(
        provider: &'a dyn SchemaProvider,
        opener: &'a dyn WorkbookOpener,
        opts: &'a ExportOptions,
    ) -> Self {
        ExportRun {
            provider,
            opener,
            opts,
            renderer: None,
        }
    }

    pub fn with_renderer(mut self, renderer: &'a dyn TemplateRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Run the whole export: materialize and merge every routed sheet,
    /// write outputs, generate code, then check references.
    pub fn run(&self) -> Result<ExportSummary> {
        let entries = self.collect_entries()?;
        let outputs = self.write_tables(&entries)?;
        self.generate_code(&entries)?;
        let ref_issues = check_references(&entries).len();
        info!(
            tables = entries.len(),
            ref_issues, "export run complete"
        );
        Ok(ExportSummary {
            tables: entries.len(),
            outputs,
            ref_issues,
        })
    }

    /// Materialize every routed sheet and merge same-target sheets, in
    /// route order. Entry order is first-appearance order and is
    /// observable in the generated code.
    pub fn collect_entries(&self) -> Result<IndexMap<String, ExportEntry>> {
        let mut entries: IndexMap<String, ExportEntry> = IndexMap::new();
        for route in &self.opts.routes {
            let sheet_group = route
                .group
                .as_deref()
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .unwrap_or(&self.opts.groups.default_group);
            if let Some(filter) = &self.opts.groups.filter {
                if !sheet_group.contains(filter.as_str()) {
                    info!(sheet = %route.sheet, group = sheet_group, "sheet excluded by export group");
                    continue;
                }
            }
            let message = route
                .message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| route.sheet.clone());
            let sheet_opts = SheetOptions {
                sheet: route.sheet.clone(),
                message: message.clone(),
                kind: route.kind,
                key: route.key.clone(),
                key_kind: route.key_kind,
            };
            let path = self.opts.import_dir.join(&route.workbook);
            let mut workbook = self.opener.open(&path)?;
            let output = materialize_sheet(
                self.provider,
                workbook.as_mut(),
                &sheet_opts,
                &self.opts.groups,
            )?;
            info!(workbook = %route.workbook, sheet = %route.sheet, rows = output.result.len(), "sheet materialized");

            let merged = route.merge.as_deref().is_some_and(|m| !m.is_empty());
            let target = if merged {
                route.merge.clone().unwrap_or_default()
            } else {
                route.sheet.clone()
            };
            match entries.get_mut(&target) {
                Some(existing) => {
                    merge_results(&mut existing.result, output.result, &target)?;
                    existing.merged |= merged;
                    info!(target = %target, sheet = %route.sheet, "sheet merged into target");
                }
                None => {
                    entries.insert(
                        target.clone(),
                        ExportEntry {
                            name: target,
                            sheet: route.sheet.clone(),
                            message,
                            kind: route.kind,
                            result: output.result,
                            specs: output.specs,
                            key_json_name: output.key_json_name,
                            comment: route.comment.clone(),
                            merged,
                        },
                    );
                }
            }
        }
        Ok(entries)
    }

    /// Write one pretty-printed JSON document per entry, plus the hash
    /// manifest when configured.
    fn write_tables(&self, entries: &IndexMap<String, ExportEntry>) -> Result<Vec<String>> {
        let mut outputs = Vec::with_capacity(entries.len());
        let mut hashes: BTreeMap<String, String> = BTreeMap::new();
        for entry in entries.values() {
            let json = serde_json::to_string_pretty(&entry.result)?;
            let file_name = format!("{}.json", entry.name);
            fs::write(self.opts.export_dir.join(&file_name), &json)?;
            hashes.insert(file_name.clone(), content_hash(json.as_bytes()));
            outputs.push(file_name);
        }
        if let Some(manifest_path) = &self.opts.hash_manifest {
            let json = serde_json::to_string_pretty(&hashes)?;
            fs::write(manifest_path, json)?;
        }
        Ok(outputs)
    }

    fn generate_code(&self, entries: &IndexMap<String, ExportEntry>) -> Result<()> {
        if self.opts.templates.is_empty() {
            return Ok(());
        }
        let Some(renderer) = self.renderer else {
            warn!("templates configured but no renderer installed, skipping code generation");
            return Ok(());
        };
        let managers = manager_infos(entries);
        for spec in &self.opts.templates {
            let template = fs::read_to_string(&spec.template)?;
            let rendered =
                renderer
                    .render(&template, &managers)
                    .map_err(|message| ExportError::Template {
                        file: spec.template.display().to_string(),
                        message,
                    })?;
            fs::write(&spec.output, rendered)?;
        }
        Ok(())
    }
}

/// Build manager metadata, one per entry, in entry order. Unmerged tables
/// get a pluralized manager name; merge targets keep their target name.
pub fn manager_infos(entries: &IndexMap<String, ExportEntry>) -> Vec<ManagerInfo> {
    entries
        .values()
        .map(|entry| ManagerInfo {
            message: entry.message.clone(),
            manager: if entry.merged {
                entry.name.clone()
            } else {
                format!("{}s", entry.message)
            },
            kind: entry.kind,
            file: format!("{}.json", entry.name),
            comment: entry.comment.clone(),
        })
        .collect()
}

/// SHA-256 content hash, hex-encoded, for the change-detection manifest.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
