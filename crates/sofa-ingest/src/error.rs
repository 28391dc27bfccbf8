use std::path::PathBuf;

use polars::prelude::PolarsError;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read CSV {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("{path} is missing required column(s): {columns}")]
    MissingColumns { path: PathBuf, columns: String },

    #[error("{path} row {row}: invalid {column}: {message}")]
    InvalidValue {
        path: PathBuf,
        row: usize,
        column: String,
        message: String,
    },
}

impl IngestError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: PolarsError) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// `row` is 0-based; messages report the 1-based data row.
    pub(crate) fn invalid(
        path: impl Into<PathBuf>,
        row: usize,
        column: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            path: path.into(),
            row: row + 1,
            column: column.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
