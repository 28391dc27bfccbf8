use std::fs;
use std::path::PathBuf;

use sofa_ingest::{IngestError, load_cohort, load_measurements, load_stays};
use sofa_model::{Cohort, CohortConfig, SofaParameter};
use tempfile::TempDir;

fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write csv");
    path
}

#[test]
fn loads_measurements_with_aliases_and_flags() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "measurements.csv",
        "subject_id,stay_id,concept_name,value_as_number,unit,charttime,is_outlier,is_error\n\
         1,10,Platelets,120,10^3/uL,2180-07-23 08:00:00,false,false\n\
         1,10,3016723,1.4,mg/dL,2180-07-23T09:30:00,0,0\n\
         1,10,Heart Rate,88,bpm,2180-07-23 10:00:00,0,0\n\
         1,10,GCS,,points,2180-07-23 11:00:00,0,1\n\
         1,10,MAP,400,mmHg,2180-07-23 12:00:00,1,0\n",
    );

    let load = load_measurements(&path).unwrap();
    assert_eq!(load.measurements.len(), 4);
    assert_eq!(load.skipped(), 1);
    assert_eq!(load.unknown_concepts["Heart Rate"], 1);

    let platelets = &load.measurements[0];
    assert_eq!(platelets.parameter, SofaParameter::Platelets);
    assert_eq!(platelets.value, Some(120.0));
    assert_eq!(platelets.unit.as_deref(), Some("10^3/uL"));

    assert_eq!(load.measurements[1].parameter, SofaParameter::Creatinine);

    let gcs = &load.measurements[2];
    assert!(gcs.is_error);
    assert_eq!(gcs.value, None);

    assert!(load.measurements[3].is_outlier);
}

#[test]
fn flag_columns_are_optional() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "measurements.csv",
        "patient_id,stay_id,concept,value,timestamp\n2,20,FiO2,50,2180-01-01 00:00\n",
    );
    let load = load_measurements(&path).unwrap();
    assert_eq!(load.measurements.len(), 1);
    assert!(!load.measurements[0].is_flagged());
}

#[test]
fn reports_missing_columns() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "measurements.csv", "patient_id,concept,value\n1,MAP,70\n");
    let err = load_measurements(&path).unwrap_err();
    match err {
        IngestError::MissingColumns { columns, .. } => {
            assert_eq!(columns, "stay_id, timestamp");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn reports_bad_timestamp_with_row() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "stays.csv",
        "subject_id,hadm_id,stay_id,intime,outtime\n\
         1,100,10,2180-07-23 08:00:00,2180-07-25 08:00:00\n\
         2,200,20,not a time,2180-07-25 08:00:00\n",
    );
    let err = load_stays(&path).unwrap_err();
    match err {
        IngestError::InvalidValue { row, column, .. } => {
            assert_eq!(row, 2);
            assert_eq!(column, "intime");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn loads_stays() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "stays.csv",
        "subject_id,hadm_id,stay_id,intime,outtime\n\
         1,100,10,2180-07-23 08:00:00,2180-07-25 08:00:00\n\
         2,,20,2180-08-01 00:00:00,2180-08-01 12:00:00\n",
    );
    let stays = load_stays(&path).unwrap();
    assert_eq!(stays.len(), 2);
    assert_eq!(stays[0].hadm_id, Some(100));
    assert_eq!(stays[0].duration(), chrono::Duration::hours(48));
    assert_eq!(stays[1].hadm_id, None);
}

#[test]
fn resolves_cohort_from_diagnoses() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "diagnoses.csv",
        "subject_id,icd_code\n1,J96.00\n2,I10\n3,\n4,518.81\n",
    );
    let membership = load_cohort(&path, &CohortConfig::default()).unwrap();
    assert_eq!(membership.cohort_of(1), Cohort::Ari);
    assert_eq!(membership.cohort_of(2), Cohort::Other);
    assert_eq!(membership.cohort_of(3), Cohort::Other);
    assert_eq!(membership.cohort_of(4), Cohort::Ari);
}
