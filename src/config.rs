//! YAML run configuration for the exporter CLI.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use sheetcfg_core::export::{ExportOptions, SheetRoute, TemplateSpec};
use sheetcfg_core::sheet::ExportGroups;

/// One export run as described by the user's YAML file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// YAML schema-definition document for the message registry.
    pub schema_file: PathBuf,
    pub import_dir: PathBuf,
    pub export_dir: PathBuf,
    /// Optional JSON manifest mapping output file name to content hash.
    #[serde(default)]
    pub hash_manifest: Option<PathBuf>,
    /// Active export-group filter token (e.g. `c` or `s`); empty or
    /// absent disables group filtering.
    #[serde(default)]
    pub export_group: Option<String>,
    /// Group tag assigned to blank group cells.
    #[serde(default = "default_group")]
    pub default_group: String,
    #[serde(default)]
    pub templates: Vec<TemplateSpec>,
    /// Sheet-to-table routing entries, processed in order.
    pub sheets: Vec<SheetRoute>,
}

fn default_group() -> String {
    "cs".to_string()
}

impl RunConfig {
    pub fn load(path: &Path) -> anyhow::Result<RunConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: RunConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn to_export_options(&self) -> ExportOptions {
        ExportOptions {
            import_dir: self.import_dir.clone(),
            export_dir: self.export_dir.clone(),
            hash_manifest: self.hash_manifest.clone(),
            groups: ExportGroups {
                filter: self
                    .export_group
                    .clone()
                    .filter(|g| !g.trim().is_empty()),
                default_group: self.default_group.clone(),
            },
            routes: self.sheets.clone(),
            templates: self.templates.clone(),
        }
    }
}
