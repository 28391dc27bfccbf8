use std::path::{Path, PathBuf};

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to process score table {path}: {source}")]
    Polars {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
    #[error("{path} is not a Gold score table (columns: {found})")]
    SchemaMismatch { path: PathBuf, found: String },
    #[error("failed to write JSON report {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SinkError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn polars(path: &Path, source: PolarsError) -> Self {
        Self::Polars {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SinkError>;
