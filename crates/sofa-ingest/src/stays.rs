use std::path::Path;

use polars::prelude::*;
use sofa_common::{any_to_datetime, any_to_i64, column_value};
use sofa_model::IcuStay;

use crate::error::{IngestError, Result};
use crate::frame::{ColumnSpec, read_frame, resolve_optional, resolve_required};

const PATIENT: ColumnSpec = ColumnSpec::new("patient_id", &["subject_id", "person_id"]);
const STAY: ColumnSpec = ColumnSpec::new("stay_id", &["visit_detail_id", "icustay_id"]);
const INTIME: ColumnSpec = ColumnSpec::new(
    "intime",
    &["admission_time", "visit_detail_start_datetime"],
);
const OUTTIME: ColumnSpec = ColumnSpec::new(
    "outtime",
    &["discharge_time", "visit_detail_end_datetime"],
);
const HADM: ColumnSpec = ColumnSpec::new("hadm_id", &["visit_occurrence_id"]);

pub fn load_stays(path: &Path) -> Result<Vec<IcuStay>> {
    let df = read_frame(path)?;
    stays_from_frame(&df, path)
}

/// Converts an ICU stay frame. Stays are returned in file order; eligibility
/// is decided later against the windowing config.
pub fn stays_from_frame(df: &DataFrame, path: &Path) -> Result<Vec<IcuStay>> {
    let columns = resolve_required(df, path, &[PATIENT, STAY, INTIME, OUTTIME])?;
    let (patient_col, stay_col, intime_col, outtime_col) =
        (&columns[0], &columns[1], &columns[2], &columns[3]);
    let hadm_col = resolve_optional(df, HADM);

    let mut stays = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let id = |column: &str| {
            any_to_i64(column_value(df, column, idx))
                .ok_or_else(|| IngestError::invalid(path, idx, column, "expected an integer id"))
        };
        let time = |column: &str| {
            any_to_datetime(column_value(df, column, idx))
                .ok_or_else(|| IngestError::invalid(path, idx, column, "expected a timestamp"))
        };
        stays.push(IcuStay {
            patient_id: id(patient_col)?,
            hadm_id: hadm_col
                .as_deref()
                .and_then(|name| any_to_i64(column_value(df, name, idx))),
            stay_id: id(stay_col)?,
            intime: time(intime_col)?,
            outtime: time(outtime_col)?,
        });
    }
    tracing::info!(path = %path.display(), stays = stays.len(), "loaded ICU stays");
    Ok(stays)
}
