//! sheetcfg-core - cell grammar decoding, sheet materialization, merging
//! and cross-table reference checking.

pub mod annotation;
pub mod decode;
pub mod error;
pub mod export;
pub mod merge;
pub mod refcheck;
pub mod schema;
pub mod sheet;
pub mod source;
pub mod value;

pub use annotation::{ColumnSpec, FieldMode};
pub use decode::CellDecoder;
pub use error::{ExportError, Result};
pub use export::{ExportOptions, ExportRun, ExportSummary, SheetRoute, TemplateRenderer};
pub use schema::{FieldKind, FieldSchema, MessageSchema, SchemaProvider, SchemaRegistry};
pub use sheet::{ContainerKind, ExportGroups, SheetOptions, SheetResult};
pub use source::{MemorySource, MemoryWorkbook, Workbook, WorkbookOpener};
pub use value::{Key, KeyKind, Value};
