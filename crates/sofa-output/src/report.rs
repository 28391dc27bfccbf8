use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{Result, SinkError};

/// Writes `report` as pretty-printed JSON, creating parent directories.
pub fn write_json_report<T: Serialize + ?Sized>(path: &Path, report: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| SinkError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report).map_err(|source| SinkError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .map_err(|e| SinkError::io(path, e))?;
    tracing::info!(path = %path.display(), "wrote JSON report");
    Ok(())
}
