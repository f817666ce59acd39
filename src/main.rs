//! sheetcfg - spreadsheet to typed-JSON config exporter

mod codegen;
mod config;
mod xlsx;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use sheetcfg_core::{ExportRun, SchemaRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Usage: sheetcfg [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>    Run configuration YAML (default: sheetcfg.yaml)");
    eprintln!("  -g, --group <TOKEN>    Override the export-group filter");
    eprintln!("  -h, --help             Print help");
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut config_path = PathBuf::from("sheetcfg.yaml");
    let mut group_override: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return;
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
                config_path = PathBuf::from(&args[i]);
            }
            "-g" | "--group" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --group requires a value");
                    std::process::exit(1);
                }
                group_override = Some(args[i].to_string());
            }
            arg => {
                eprintln!("Error: Unknown option: {}", arg);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    if let Err(e) = run(&config_path, group_override) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config_path: &Path, group_override: Option<String>) -> anyhow::Result<()> {
    let config = config::RunConfig::load(config_path)?;
    info!(
        config = %config_path.display(),
        sheets = config.sheets.len(),
        "export run starting"
    );

    let registry = SchemaRegistry::from_yaml_file(&config.schema_file)
        .with_context(|| format!("loading schema {}", config.schema_file.display()))?;

    let mut opts = config.to_export_options();
    if let Some(group) = group_override {
        opts.groups.filter = Some(group).filter(|g| !g.trim().is_empty());
    }

    let opener = xlsx::XlsxOpener;
    let renderer = codegen::BlockRenderer;
    let summary = ExportRun::new(&registry, &opener, &opts)
        .with_renderer(&renderer)
        .run()?;

    println!(
        "Exported {} tables to {} ({} dangling references)",
        summary.tables,
        opts.export_dir.display(),
        summary.ref_issues
    );
    Ok(())
}
