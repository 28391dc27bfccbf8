//! CSV loading and column resolution shared by the loaders.

use std::path::Path;

use polars::prelude::*;
use sofa_common::find_column;

use crate::error::{IngestError, Result};

/// Reads a CSV with every column as text. Typed conversion happens per cell
/// so that one malformed value reports its row instead of failing the file.
pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::read(path, e))?
        .finish()
        .map_err(|e| IngestError::read(path, e))?;
    tracing::debug!(path = %path.display(), rows = df.height(), "read CSV");
    Ok(df)
}

/// A logical column and the header spellings accepted for it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

impl ColumnSpec {
    pub(crate) const fn new(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { name, aliases }
    }

    fn resolve(&self, df: &DataFrame) -> Option<String> {
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .find_map(|candidate| find_column(df, candidate))
    }
}

/// Resolves required columns in order, failing with every missing name at
/// once.
pub(crate) fn resolve_required(
    df: &DataFrame,
    path: &Path,
    specs: &[ColumnSpec],
) -> Result<Vec<String>> {
    let mut resolved = Vec::with_capacity(specs.len());
    let mut missing = Vec::new();
    for spec in specs {
        match spec.resolve(df) {
            Some(column) => resolved.push(column),
            None => missing.push(spec.name),
        }
    }
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing.join(", "),
        });
    }
    Ok(resolved)
}

pub(crate) fn resolve_optional(df: &DataFrame, spec: ColumnSpec) -> Option<String> {
    spec.resolve(df)
}
