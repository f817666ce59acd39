//! Tabular source traits and the in-memory workbook used by tests.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// An open workbook yielding rows of raw cell text per named sheet.
/// Cells are trimmed at the point of use, not here.
pub trait Workbook {
    fn rows(&mut self, sheet: &str) -> Result<Vec<Vec<String>>>;
}

/// Opens workbooks by path. Missing workbooks are fatal for the sheet
/// that needed them.
pub trait WorkbookOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn Workbook>>;
}

/// In-memory workbook for tests and programmatic use.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: HashMap<String, Vec<Vec<String>>>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_sheet<S: Into<String>>(&mut self, name: S, rows: Vec<Vec<String>>) {
        self.sheets.insert(name.into(), rows);
    }

    /// Convenience for building a sheet from string literals.
    pub fn sheet_from_rows<S: Into<String>>(&mut self, name: S, rows: &[&[&str]]) {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        self.insert_sheet(name, rows);
    }
}

impl Workbook for MemoryWorkbook {
    fn rows(&mut self, sheet: &str) -> Result<Vec<Vec<String>>> {
        self.sheets
            .get(sheet)
            .cloned()
            .ok_or_else(|| crate::error::ExportError::Sheet {
                sheet: sheet.to_string(),
                message: "sheet not found".to_string(),
            })
    }
}

/// Opener over a fixed set of in-memory workbooks, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    workbooks: HashMap<String, MemoryWorkbook>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_workbook<S: Into<String>>(&mut self, file_name: S, workbook: MemoryWorkbook) {
        self.workbooks.insert(file_name.into(), workbook);
    }
}

impl WorkbookOpener for MemorySource {
    fn open(&self, path: &Path) -> Result<Box<dyn Workbook>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match self.workbooks.get(&name) {
            Some(wb) => Ok(Box::new(wb.clone())),
            None => Err(crate::error::ExportError::Source {
                path: path.display().to_string(),
                message: "workbook not found".to_string(),
            }),
        }
    }
}
