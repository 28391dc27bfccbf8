//! Gold score table layout.

use polars::prelude::*;
use sofa_common::{any_to_datetime, any_to_i64, column_value, format_datetime, format_numeric};
use sofa_model::{OrganSystem, RecordKey, SofaParameter, SofaScoreRecord};

/// Columns identifying a row; a re-run replaces rows sharing these values.
pub const KEY_COLUMNS: [&str; 3] = ["patient_id", "stay_id", "window_start"];

/// Column order of the score table.
pub fn score_columns() -> Vec<String> {
    let mut columns: Vec<String> = KEY_COLUMNS
        .into_iter()
        .chain(["window_end", "window_number", "icu_day"])
        .map(str::to_string)
        .collect();
    columns.extend(
        OrganSystem::ALL
            .iter()
            .map(|system| format!("{}_score", system.as_str())),
    );
    columns.extend(
        ["total_sofa_score", "severity", "missing_components", "cohort"].map(str::to_string),
    );
    columns.extend(
        SofaParameter::ALL
            .iter()
            .map(|parameter| parameter.as_str().to_string()),
    );
    columns.extend(
        [
            "pf_ratio",
            "ventilated",
            "imputed_parameters",
            "spo2_fio2_surrogate",
            "calculation_notes",
        ]
        .map(str::to_string),
    );
    columns
}

fn record_cells(record: &SofaScoreRecord) -> Vec<Option<String>> {
    let mut cells = vec![
        Some(record.patient_id.to_string()),
        Some(record.stay_id.to_string()),
        Some(format_datetime(record.window_start)),
        Some(format_datetime(record.window_end)),
        Some(record.window_number.to_string()),
        Some(record.icu_day.to_string()),
    ];
    cells.extend(
        record
            .subscores
            .iter()
            .map(|(_, subscore)| subscore.points().map(|points| points.to_string())),
    );
    let missing: Vec<&str> = record
        .missing_components
        .iter()
        .map(|system| system.as_str())
        .collect();
    cells.push(Some(record.total.to_string()));
    cells.push(Some(record.severity.as_str().to_string()));
    cells.push(non_empty(missing.join(";")));
    cells.push(Some(record.cohort_label.clone()));
    cells.extend(
        SofaParameter::ALL
            .iter()
            .map(|parameter| record.values.get(parameter).copied().map(format_numeric)),
    );
    let imputed: Vec<String> = record
        .imputation
        .iter()
        .map(|(parameter, method)| format!("{parameter}:{method}"))
        .collect();
    cells.push(record.pf_ratio.map(format_numeric));
    cells.push(Some(record.ventilated.to_string()));
    cells.push(non_empty(imputed.join(";")));
    cells.push(Some(record.spo2_fio2_surrogate.to_string()));
    cells.push(non_empty(record.notes.clone()));
    cells
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Builds a text-typed frame with one row per record, in [`score_columns`]
/// order. Text columns keep the table stable across CSV round trips.
pub fn records_to_frame(records: &[SofaScoreRecord]) -> PolarsResult<DataFrame> {
    let names = score_columns();
    let mut cells: Vec<Vec<Option<String>>> =
        vec![Vec::with_capacity(records.len()); names.len()];
    for record in records {
        for (column, cell) in cells.iter_mut().zip(record_cells(record)) {
            column.push(cell);
        }
    }
    let columns: Vec<Column> = names
        .iter()
        .zip(cells)
        .map(|(name, values)| Series::new(name.as_str().into(), values).into())
        .collect();
    DataFrame::new(columns)
}

/// Key of row `idx` in a score table. `None` when a key cell is unreadable.
pub fn row_key(df: &DataFrame, idx: usize) -> Option<RecordKey> {
    Some(RecordKey {
        patient_id: any_to_i64(column_value(df, KEY_COLUMNS[0], idx))?,
        stay_id: any_to_i64(column_value(df, KEY_COLUMNS[1], idx))?,
        window_start: any_to_datetime(column_value(df, KEY_COLUMNS[2], idx))?,
    })
}
