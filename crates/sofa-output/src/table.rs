//! Keyed CSV score table.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use sofa_core::ScoreSink;
use sofa_model::{RecordKey, SofaScoreRecord};

use crate::error::{Result, SinkError};
use crate::frame::{records_to_frame, row_key, score_columns};

/// Score table stored as one CSV file.
///
/// Each `replace` rewrites the file: existing rows whose key appears in the
/// batch are removed, the batch is appended, and the result replaces the old
/// file through a rename.
#[derive(Debug, Clone)]
pub struct CsvScoreSink {
    path: PathBuf,
}

impl CsvScoreSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current table, or `None` when the file does not exist yet or is empty.
    pub fn read_table(&self) -> Result<Option<DataFrame>> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.len() == 0 => return Ok(None),
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SinkError::io(&self.path, err)),
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(self.path.clone()))
            .map_err(|e| SinkError::polars(&self.path, e))?
            .finish()
            .map_err(|e| SinkError::polars(&self.path, e))?;
        self.check_schema(&df)?;
        Ok(Some(df))
    }

    fn check_schema(&self, df: &DataFrame) -> Result<()> {
        let found: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        if found != score_columns() {
            return Err(SinkError::SchemaMismatch {
                path: self.path.clone(),
                found: found.join(", "),
            });
        }
        Ok(())
    }

    fn write_table(&self, df: &mut DataFrame) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;
        }
        let staging = self.path.with_extension("csv.partial");
        let mut file = File::create(&staging).map_err(|e| SinkError::io(&staging, e))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| SinkError::polars(&staging, e))?;
        fs::rename(&staging, &self.path).map_err(|e| SinkError::io(&self.path, e))
    }
}

/// Drops rows whose key is in `keys`. Rows with unreadable keys are kept.
fn without_keys(df: &DataFrame, keys: &BTreeSet<RecordKey>) -> PolarsResult<(DataFrame, usize)> {
    let keep: Vec<bool> = (0..df.height())
        .map(|idx| row_key(df, idx).is_none_or(|key| !keys.contains(&key)))
        .collect();
    let removed = keep.iter().filter(|kept| !**kept).count();
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok((df.filter(&mask)?, removed))
}

impl ScoreSink for CsvScoreSink {
    type Error = SinkError;

    fn replace(&mut self, records: &[SofaScoreRecord]) -> Result<usize> {
        let incoming = records_to_frame(records).map_err(|e| SinkError::polars(&self.path, e))?;
        let keys: BTreeSet<RecordKey> = records.iter().map(SofaScoreRecord::key).collect();
        let mut table = match self.read_table()? {
            Some(existing) => {
                let (mut kept, removed) =
                    without_keys(&existing, &keys).map_err(|e| SinkError::polars(&self.path, e))?;
                kept.vstack_mut(&incoming)
                    .map_err(|e| SinkError::polars(&self.path, e))?;
                tracing::debug!(
                    path = %self.path.display(),
                    replaced = removed,
                    inserted = records.len(),
                    "replaced score rows"
                );
                kept
            }
            None => incoming,
        };
        self.write_table(&mut table)?;
        Ok(records.len())
    }
}
