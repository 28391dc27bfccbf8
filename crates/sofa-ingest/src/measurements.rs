//! Standardized measurement loading.

use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::*;
use sofa_common::{
    any_to_bool, any_to_datetime, any_to_f64, any_to_i64, any_to_string_non_empty, column_value,
};
use sofa_model::{Measurement, SofaParameter};

use crate::error::{IngestError, Result};
use crate::frame::{ColumnSpec, read_frame, resolve_optional, resolve_required};

const PATIENT: ColumnSpec = ColumnSpec::new("patient_id", &["subject_id", "person_id"]);
const STAY: ColumnSpec = ColumnSpec::new("stay_id", &["visit_detail_id", "icustay_id"]);
const CONCEPT: ColumnSpec = ColumnSpec::new(
    "concept",
    &["concept_name", "concept_id", "measurement_concept_id", "parameter"],
);
const VALUE: ColumnSpec = ColumnSpec::new("value", &["value_as_number", "valuenum"]);
const TIMESTAMP: ColumnSpec = ColumnSpec::new(
    "timestamp",
    &["charttime", "measurement_datetime", "starttime"],
);
const UNIT: ColumnSpec = ColumnSpec::new("unit", &["unit_source_value", "valueuom"]);
const OUTLIER: ColumnSpec = ColumnSpec::new("is_outlier", &["outlier"]);
const ERROR: ColumnSpec = ColumnSpec::new("is_error", &["error"]);

/// Measurements plus the rows that named concepts outside the SOFA table.
#[derive(Debug, Clone, Default)]
pub struct MeasurementLoad {
    pub measurements: Vec<Measurement>,
    /// Count of skipped rows per unrecognised concept.
    pub unknown_concepts: BTreeMap<String, usize>,
}

impl MeasurementLoad {
    pub fn skipped(&self) -> usize {
        self.unknown_concepts.values().sum()
    }
}

pub fn load_measurements(path: &Path) -> Result<MeasurementLoad> {
    let df = read_frame(path)?;
    measurements_from_frame(&df, path)
}

/// Converts a measurement frame. Missing quality flag columns mean "not
/// flagged"; a blank value is kept as `None` so the scorer can reject it.
pub fn measurements_from_frame(df: &DataFrame, path: &Path) -> Result<MeasurementLoad> {
    let columns = resolve_required(df, path, &[PATIENT, STAY, CONCEPT, VALUE, TIMESTAMP])?;
    let (patient_col, stay_col, concept_col, value_col, timestamp_col) =
        (&columns[0], &columns[1], &columns[2], &columns[3], &columns[4]);
    let unit_col = resolve_optional(df, UNIT);
    let outlier_col = resolve_optional(df, OUTLIER);
    let error_col = resolve_optional(df, ERROR);

    let mut load = MeasurementLoad::default();
    for idx in 0..df.height() {
        let Some(concept) = any_to_string_non_empty(column_value(df, concept_col, idx)) else {
            return Err(IngestError::invalid(path, idx, concept_col, "blank concept"));
        };
        let Some(parameter) = SofaParameter::from_concept(&concept) else {
            *load.unknown_concepts.entry(concept).or_default() += 1;
            continue;
        };

        let patient_id = any_to_i64(column_value(df, patient_col, idx))
            .ok_or_else(|| IngestError::invalid(path, idx, patient_col, "expected an integer id"))?;
        let stay_id = any_to_i64(column_value(df, stay_col, idx))
            .ok_or_else(|| IngestError::invalid(path, idx, stay_col, "expected an integer id"))?;
        let timestamp = any_to_datetime(column_value(df, timestamp_col, idx))
            .ok_or_else(|| IngestError::invalid(path, idx, timestamp_col, "expected a timestamp"))?;

        let flag = |column: &Option<String>| {
            column
                .as_deref()
                .and_then(|name| any_to_bool(column_value(df, name, idx)))
                .unwrap_or(false)
        };

        load.measurements.push(Measurement {
            patient_id,
            stay_id,
            parameter,
            value: any_to_f64(column_value(df, value_col, idx)),
            unit: unit_col
                .as_deref()
                .and_then(|name| any_to_string_non_empty(column_value(df, name, idx))),
            timestamp,
            is_outlier: flag(&outlier_col),
            is_error: flag(&error_col),
        });
    }

    if !load.unknown_concepts.is_empty() {
        tracing::debug!(
            path = %path.display(),
            skipped = load.skipped(),
            concepts = load.unknown_concepts.len(),
            "skipped measurements outside the SOFA parameter table"
        );
    }
    tracing::info!(
        path = %path.display(),
        measurements = load.measurements.len(),
        "loaded measurements"
    );
    Ok(load)
}
