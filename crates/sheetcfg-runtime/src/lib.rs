//! sheetcfg-runtime - typed config tables with atomic hot reload.
//!
//! Many readers may call into the tables while a reload is in progress;
//! they always see one fully-published generation. Reloads themselves are
//! serialized and all-or-nothing: if any table fails to decode, nothing
//! is published.

pub mod error;
pub mod store;
pub mod table;

pub use error::{Result, StoreError};
pub use store::ConfigStore;
pub use table::{ListTable, MapTable, StoreTable};
