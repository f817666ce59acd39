//! Error types for sheetcfg core.

use thiserror::Error;

/// Errors that abort an export run.
///
/// Row-level problems (missing key value, unresolved field name, malformed
/// per-cell JSON) are logged as diagnostics and skipped instead; they never
/// surface through this type.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workbook {path}: {message}")]
    Source { path: String, message: String },

    #[error("sheet {sheet}: {message}")]
    Sheet { sheet: String, message: String },

    #[error("sheet {sheet}: unparsable header cell {cell:?}")]
    Header { sheet: String, cell: String },

    #[error("sheet {sheet}: message {message} not found")]
    MessageNotFound { sheet: String, message: String },

    #[error("sheet {sheet}: key field {field} has no usable key type")]
    KeyKind { sheet: String, field: String },

    #[error("merge target {target}: container kinds do not match")]
    MergeKind { target: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("template {file}: {message}")]
    Template { file: String, message: String },
}

pub type Result<T> = std::result::Result<T, ExportError>;
