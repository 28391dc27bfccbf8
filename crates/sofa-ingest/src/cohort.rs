//! Disease cohort resolution from diagnosis codes.

use std::collections::BTreeSet;
use std::path::Path;

use polars::prelude::*;
use sofa_common::{any_to_i64, any_to_string_non_empty, column_value};
use sofa_model::{CohortConfig, CohortMembership, PatientId};

use crate::error::{IngestError, Result};
use crate::frame::{ColumnSpec, read_frame, resolve_required};

const PATIENT: ColumnSpec = ColumnSpec::new("patient_id", &["subject_id", "person_id"]);
const ICD: ColumnSpec = ColumnSpec::new(
    "icd_code",
    &["condition_source_value", "icd9_code", "icd10_code"],
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub patient_id: PatientId,
    pub icd_code: String,
}

/// Strips dots and whitespace and upper-cases, so `J96.00` matches `J9600`.
pub fn normalize_icd_code(code: &str) -> String {
    code.chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '.')
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

pub fn load_diagnoses(path: &Path) -> Result<Vec<Diagnosis>> {
    let df = read_frame(path)?;
    diagnoses_from_frame(&df, path)
}

/// Rows with a blank code are skipped.
pub fn diagnoses_from_frame(df: &DataFrame, path: &Path) -> Result<Vec<Diagnosis>> {
    let columns = resolve_required(df, path, &[PATIENT, ICD])?;
    let (patient_col, icd_col) = (&columns[0], &columns[1]);
    let mut diagnoses = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let Some(code) = any_to_string_non_empty(column_value(df, icd_col, idx)) else {
            continue;
        };
        let patient_id = any_to_i64(column_value(df, patient_col, idx))
            .ok_or_else(|| IngestError::invalid(path, idx, patient_col, "expected an integer id"))?;
        diagnoses.push(Diagnosis {
            patient_id,
            icd_code: code,
        });
    }
    Ok(diagnoses)
}

/// Patients with any diagnosis matching a configured ARI code.
pub fn resolve_cohort(diagnoses: &[Diagnosis], config: &CohortConfig) -> CohortMembership {
    let codes: BTreeSet<String> = config
        .ari_icd_codes
        .iter()
        .map(|code| normalize_icd_code(code))
        .collect();
    let membership = CohortMembership::new(
        diagnoses
            .iter()
            .filter(|diagnosis| codes.contains(&normalize_icd_code(&diagnosis.icd_code)))
            .map(|diagnosis| diagnosis.patient_id),
    );
    tracing::info!(
        diagnoses = diagnoses.len(),
        ari_patients = membership.len(),
        "resolved disease cohort"
    );
    membership
}

pub fn load_cohort(path: &Path, config: &CohortConfig) -> Result<CohortMembership> {
    let diagnoses = load_diagnoses(path)?;
    Ok(resolve_cohort(&diagnoses, config))
}
