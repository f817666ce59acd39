//! Calamine-backed workbook adapter for xlsx files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};
use sheetcfg_core::error::ExportError;
use sheetcfg_core::source::{Workbook, WorkbookOpener};

pub struct XlsxOpener;

struct XlsxWorkbook {
    workbook: Xlsx<BufReader<File>>,
}

impl WorkbookOpener for XlsxOpener {
    fn open(&self, path: &Path) -> sheetcfg_core::Result<Box<dyn Workbook>> {
        let workbook: Xlsx<BufReader<File>> =
            open_workbook(path).map_err(|e: calamine::XlsxError| ExportError::Source {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Box::new(XlsxWorkbook { workbook }))
    }
}

impl Workbook for XlsxWorkbook {
    fn rows(&mut self, sheet: &str) -> sheetcfg_core::Result<Vec<Vec<String>>> {
        let range = self
            .workbook
            .worksheet_range(sheet)
            .map_err(|e| ExportError::Sheet {
                sheet: sheet.to_string(),
                message: e.to_string(),
            })?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        Ok(rows)
    }
}

/// Render a cell the way a data author typed it: whole floats lose their
/// fraction (calamine reports `5` as `5.0`), everything else falls back
/// to the value's display form.
fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
