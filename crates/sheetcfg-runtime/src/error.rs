//! Error types for the runtime config store.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error reading {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("decode error in {file}: {source}")]
    Decode {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config format: {file}")]
    UnsupportedFormat { file: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
