use std::cell::Cell;
use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use sofa_core::{
    InMemoryMeasurementSource, MeasurementSource, MemorySink, PipelineError, ScoreSink,
    SofaPipeline, SourceError,
};
use sofa_model::{
    Cohort, CohortMembership, DropReason, GoldConfig, IcuStay, ImputationMethod, Measurement,
    OrganSystem, PatientId, SeverityCategory, SofaParameter, SofaScoreRecord, Subscore,
};

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2180, 7, 23)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn h(hours: i64) -> NaiveDateTime {
    base() + Duration::hours(hours)
}

fn stay(patient_id: PatientId, stay_id: i64, hours: i64) -> IcuStay {
    IcuStay::new(patient_id, stay_id, base(), h(hours))
}

fn m(
    patient_id: PatientId,
    stay_id: i64,
    parameter: SofaParameter,
    value: f64,
    hour: i64,
) -> Measurement {
    Measurement::new(patient_id, stay_id, parameter, value, h(hour))
}

/// A complete set of inputs inside the window starting at `start_hour`.
fn full_window(patient_id: PatientId, stay_id: i64, start_hour: i64) -> Vec<Measurement> {
    let at = |offset| start_hour + offset;
    vec![
        m(patient_id, stay_id, SofaParameter::Pao2, 80.0, at(2)),
        m(patient_id, stay_id, SofaParameter::Fio2, 50.0, at(2)),
        m(patient_id, stay_id, SofaParameter::MechanicalVentilation, 1.0, at(1)),
        m(patient_id, stay_id, SofaParameter::Map, 65.0, at(3)),
        m(patient_id, stay_id, SofaParameter::Platelets, 120.0, at(4)),
        m(patient_id, stay_id, SofaParameter::Bilirubin, 2.5, at(4)),
        m(patient_id, stay_id, SofaParameter::Gcs, 15.0, at(5)),
        m(patient_id, stay_id, SofaParameter::Creatinine, 1.0, at(4)),
        m(patient_id, stay_id, SofaParameter::UrineOutput, 150.0, at(6)),
        m(patient_id, stay_id, SofaParameter::UrineOutput, 150.0, at(12)),
    ]
}

fn relaxed_config() -> GoldConfig {
    let mut config = GoldConfig::default();
    config.missing_data.require_respiratory = false;
    config
}

fn run(
    config: &GoldConfig,
    stays: &[IcuStay],
    measurements: Vec<Measurement>,
    cohort: &CohortMembership,
) -> (sofa_model::RunSummary, MemorySink) {
    let source = InMemoryMeasurementSource::new(measurements);
    let mut sink = MemorySink::new();
    let summary = SofaPipeline::new(config)
        .unwrap()
        .run(stays, &source, cohort, &mut sink)
        .unwrap();
    (summary, sink)
}

fn only_record(sink: &MemorySink) -> &SofaScoreRecord {
    assert_eq!(sink.len(), 1);
    sink.records().next().unwrap()
}

#[test]
fn scores_a_complete_window() {
    let config = GoldConfig::default();
    let (summary, sink) = run(
        &config,
        &[stay(1, 10, 24)],
        full_window(1, 10, 0),
        &CohortMembership::new([1]),
    );
    let record = only_record(&sink);

    assert_eq!(record.subscores.respiratory, Subscore::Score(3));
    assert_eq!(record.subscores.cardiovascular, Subscore::Score(1));
    assert_eq!(record.subscores.coagulation, Subscore::Score(1));
    assert_eq!(record.subscores.liver, Subscore::Score(2));
    assert_eq!(record.subscores.cns, Subscore::Score(0));
    assert_eq!(record.subscores.renal, Subscore::Score(3));
    assert_eq!(record.total, 10);
    assert_eq!(record.severity, SeverityCategory::Moderate);
    assert!(record.missing_components.is_empty());
    assert!(record.ventilated);
    assert_eq!(record.pf_ratio, Some(160.0));
    assert_eq!(record.values[&SofaParameter::UrineOutput], 300.0);
    assert_eq!(record.cohort, Cohort::Ari);
    assert_eq!(record.cohort_label, "ARI");
    assert!(record.imputation.is_empty());
    insta::assert_snapshot!(
        record.notes,
        @"Respiratory: PaO2/FiO2 < 200 with ventilation; Cardiovascular: MAP < 70; Coagulation: platelets < 150; Liver: bilirubin >= 2.0; CNS: GCS 15; Renal: urine output < 500 mL"
    );

    assert_eq!(summary.windows_generated, 1);
    assert_eq!(summary.windows_written, 1);
    assert_eq!(summary.high_risk_count, 1);
    assert_eq!(summary.availability_pct(OrganSystem::Renal), 100.0);
}

#[test]
fn surrogate_ratio_stands_in_for_missing_pao2() {
    let config = GoldConfig::default();
    let measurements = vec![
        m(1, 10, SofaParameter::Spo2, 95.0, 1),
        m(1, 10, SofaParameter::Fio2, 50.0, 1),
    ];
    let no_cohort = CohortMembership::default();
    let (summary, sink) = run(&config, &[stay(1, 10, 24)], measurements, &no_cohort);
    let record = only_record(&sink);

    let ratio = record.pf_ratio.unwrap();
    assert!((ratio - 190.0).abs() < 1e-9);
    assert!(record.spo2_fio2_surrogate);
    assert_eq!(record.subscores.respiratory, Subscore::Score(2));
    assert!(record.notes.starts_with("Respiratory: SpO2/FiO2 < 200"));
    assert_eq!(summary.surrogate_count, 1);
}

#[test]
fn vasopressor_dose_outranks_map() {
    let config = relaxed_config();
    let measurements = vec![
        m(1, 10, SofaParameter::Map, 50.0, 1),
        m(1, 10, SofaParameter::Dopamine, 10.0, 2),
    ];
    let (_, sink) = run(&config, &[stay(1, 10, 24)], measurements, &CohortMembership::default());
    let record = only_record(&sink);
    assert_eq!(record.subscores.cardiovascular, Subscore::Score(3));
    assert_eq!(
        record.notes,
        "Cardiovascular: moderate-dose vasopressors"
    );
}

#[test]
fn direct_values_are_never_flagged() {
    let config = relaxed_config();
    let mut measurements = vec![
        m(1, 10, SofaParameter::Platelets, 90.0, 20),
        m(1, 10, SofaParameter::Platelets, 200.0, 30),
    ];
    // Enough population data for a platelet median.
    for patient in 2..14 {
        measurements.push(m(patient, patient * 10, SofaParameter::Platelets, 300.0, 1));
    }
    let (_, sink) = run(&config, &[stay(1, 10, 48)], measurements, &CohortMembership::default());
    let second = sink
        .records()
        .find(|record| record.window_number == 2)
        .unwrap();
    assert_eq!(second.values[&SofaParameter::Platelets], 200.0);
    assert!(second.imputation.is_empty());
}

#[test]
fn locf_carries_values_within_the_same_stay() {
    let mut config = relaxed_config();
    config.imputation.population_median_enabled = false;
    let measurements = vec![
        m(1, 10, SofaParameter::Creatinine, 2.1, 20),
        m(1, 10, SofaParameter::Gcs, 14.0, 30),
        // Another stay of the same patient, later in time: never used.
        m(1, 11, SofaParameter::Bilirubin, 7.0, 23),
    ];
    let (_, sink) = run(&config, &[stay(1, 10, 48)], measurements, &CohortMembership::default());
    let second = sink
        .records()
        .find(|record| record.window_number == 2)
        .unwrap();
    assert_eq!(second.values[&SofaParameter::Creatinine], 2.1);
    assert_eq!(
        second.imputation[&SofaParameter::Creatinine],
        ImputationMethod::Locf
    );
    assert_eq!(second.subscores.renal, Subscore::Score(2));
    assert_eq!(second.subscores.liver, Subscore::Unknown);
    assert!(!second.imputation.contains_key(&SofaParameter::Gcs));
}

#[test]
fn locf_respects_lookback_limit() {
    let mut config = relaxed_config();
    config.imputation.population_median_enabled = false;
    config.imputation.locf_max_lookback_hours = 12;
    let measurements = vec![
        m(1, 10, SofaParameter::Creatinine, 2.1, 10),
        m(1, 10, SofaParameter::Gcs, 15.0, 30),
    ];
    let (_, sink) = run(&config, &[stay(1, 10, 48)], measurements, &CohortMembership::default());
    let second = sink
        .records()
        .find(|record| record.window_number == 2)
        .unwrap();
    assert!(!second.values.contains_key(&SofaParameter::Creatinine));
    assert_eq!(second.subscores.renal, Subscore::Unknown);
}

#[test]
fn treatments_are_not_imputed() {
    let config = relaxed_config();
    let measurements = vec![
        m(1, 10, SofaParameter::Norepinephrine, 0.3, 5),
        m(1, 10, SofaParameter::Map, 80.0, 30),
    ];
    let (_, sink) = run(&config, &[stay(1, 10, 48)], measurements, &CohortMembership::default());
    let second = sink
        .records()
        .find(|record| record.window_number == 2)
        .unwrap();
    assert!(!second.values.contains_key(&SofaParameter::Norepinephrine));
    assert_eq!(second.subscores.cardiovascular, Subscore::Score(0));
}

#[test]
fn population_median_uses_the_cohort_reference() {
    let mut config = relaxed_config();
    config.imputation.locf_enabled = false;
    let mut measurements = vec![m(1, 10, SofaParameter::Gcs, 15.0, 1)];
    // Ten cohort patients with low platelets, ten others with high ones.
    for patient in 100..110 {
        measurements.push(m(patient, patient, SofaParameter::Platelets, 40.0, 1));
    }
    for patient in 200..210 {
        measurements.push(m(patient, patient, SofaParameter::Platelets, 400.0, 1));
    }
    let cohort = CohortMembership::new(100..110);
    let (summary, sink) = run(&config, &[stay(1, 10, 24)], measurements, &cohort);
    let record = only_record(&sink);

    assert_eq!(record.values[&SofaParameter::Platelets], 40.0);
    assert_eq!(
        record.imputation[&SofaParameter::Platelets],
        ImputationMethod::PopulationMedian
    );
    assert_eq!(record.subscores.coagulation, Subscore::Score(3));
    assert_eq!(record.cohort, Cohort::Other);
    assert_eq!(summary.median_sample_sizes[&SofaParameter::Platelets], 10);
    assert_eq!(
        summary.imputation_counts[&SofaParameter::Platelets].population_median,
        1
    );
}

#[test]
fn population_median_requires_minimum_sample() {
    let mut config = relaxed_config();
    config.imputation.locf_enabled = false;
    let mut measurements = vec![m(1, 10, SofaParameter::Gcs, 15.0, 1)];
    for patient in 100..109 {
        measurements.push(m(patient, patient, SofaParameter::Platelets, 40.0, 1));
    }
    let no_cohort = CohortMembership::default();
    let (summary, sink) = run(&config, &[stay(1, 10, 24)], measurements, &no_cohort);
    let record = only_record(&sink);
    assert!(!record.values.contains_key(&SofaParameter::Platelets));
    assert_eq!(record.subscores.coagulation, Subscore::Unknown);
    assert!(
        summary
            .parameters_without_median()
            .contains(&SofaParameter::Bilirubin)
    );
}

#[test]
fn drop_rule_counts_reasons() {
    let config = GoldConfig::default();
    let stays = [stay(1, 10, 72)];
    let measurements = vec![
        // Window 1: respiratory known.
        m(1, 10, SofaParameter::Pao2, 300.0, 1),
        m(1, 10, SofaParameter::Fio2, 0.5, 1),
        // Window 2: only a dose of zero, so every subscore is unknown.
        m(1, 10, SofaParameter::Dopamine, 0.0, 30),
        // Window 3: a platelet count but no respiratory data.
        m(1, 10, SofaParameter::Platelets, 100.0, 50),
    ];
    let mut config_no_locf = config.clone();
    config_no_locf.imputation.locf_enabled = false;
    let (summary, sink) = run(&config_no_locf, &stays, measurements, &CohortMembership::default());

    assert_eq!(sink.len(), 1);
    assert_eq!(summary.windows_generated, 3);
    assert_eq!(summary.windows_scored, 3);
    assert_eq!(summary.dropped(DropReason::TooManyMissing), 1);
    assert_eq!(summary.dropped(DropReason::MissingRespiratory), 1);
}

#[test]
fn windows_without_measurements_are_insufficient() {
    let config = relaxed_config();
    let measurements = vec![m(1, 10, SofaParameter::Gcs, 15.0, 1)];
    let no_cohort = CohortMembership::default();
    let (summary, sink) = run(&config, &[stay(1, 10, 48)], measurements, &no_cohort);
    assert_eq!(sink.len(), 1);
    assert_eq!(summary.dropped(DropReason::InsufficientData), 1);
    assert_eq!(summary.windows_scored, 1);
}

#[test]
fn ineligible_stays_are_counted_not_scored() {
    let config = relaxed_config();
    let stays = [
        stay(1, 10, 5),
        IcuStay::new(2, 20, h(10), h(0)),
        stay(3, 30, 24 * 101),
        stay(4, 40, 24),
    ];
    let (summary, sink) = run(&config, &stays, full_window(4, 40, 0), &CohortMembership::default());
    assert_eq!(summary.stays_seen, 4);
    assert_eq!(summary.stays_too_short, 1);
    assert_eq!(summary.stays_invalid, 1);
    assert_eq!(summary.stays_too_long, 1);
    assert_eq!(summary.stays_processed, 1);
    assert_eq!(sink.len(), 1);
}

#[test]
fn malformed_window_is_skipped_and_run_continues() {
    let config = relaxed_config();
    let mut measurements = full_window(1, 10, 0);
    measurements.extend(full_window(1, 10, 24));
    measurements.push(Measurement {
        value: None,
        ..m(1, 10, SofaParameter::Map, 0.0, 3)
    });
    let no_cohort = CohortMembership::default();
    let (summary, sink) = run(&config, &[stay(1, 10, 48)], measurements, &no_cohort);
    assert_eq!(summary.windows_failed, 1);
    assert_eq!(summary.windows_written, 1);
    assert_eq!(sink.records().next().unwrap().window_number, 2);
}

#[test]
fn rerun_is_idempotent() {
    let config = GoldConfig::default();
    let stays = [stay(1, 10, 60), stay(2, 20, 30)];
    let mut measurements = full_window(1, 10, 0);
    measurements.extend(full_window(1, 10, 24));
    measurements.extend(full_window(2, 20, 0));
    let source = InMemoryMeasurementSource::new(measurements);
    let cohort = CohortMembership::new([2]);
    let pipeline = SofaPipeline::new(&config).unwrap();

    let mut sink = MemorySink::new();
    pipeline.run(&stays, &source, &cohort, &mut sink).unwrap();
    let first: Vec<SofaScoreRecord> = sink.records().cloned().collect();
    pipeline.run(&stays, &source, &cohort, &mut sink).unwrap();
    let second: Vec<SofaScoreRecord> = sink.records().cloned().collect();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    assert_eq!(sink.writes(), 2);
}

#[test]
fn writes_in_batches() {
    let mut config = relaxed_config();
    config.batch.batch_size = 1;
    config.batch.checkpoint_frequency = 2;
    let stays = [stay(1, 10, 24), stay(2, 20, 24), stay(3, 30, 24)];
    let mut measurements = full_window(1, 10, 0);
    measurements.extend(full_window(2, 20, 0));
    measurements.extend(full_window(3, 30, 0));
    let (summary, sink) = run(&config, &stays, measurements, &CohortMembership::default());
    assert_eq!(summary.batches_written, 3);
    assert_eq!(sink.writes(), 3);
    assert_eq!(sink.len(), 3);
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = GoldConfig::default();
    config.batch.batch_size = 0;
    assert!(matches!(
        SofaPipeline::new(&config),
        Err(PipelineError::Config(_))
    ));
}

struct UnreachableSource;

impl MeasurementSource for UnreachableSource {
    fn stay_measurements(
        &self,
        _stay: &IcuStay,
        _from: NaiveDateTime,
        _until: NaiveDateTime,
    ) -> Result<Vec<Measurement>, SourceError> {
        Err(SourceError::Unavailable("connection refused".to_string()))
    }

    fn population_measurements(
        &self,
        _parameter: SofaParameter,
        _patients: Option<&BTreeSet<PatientId>>,
    ) -> Result<Vec<Measurement>, SourceError> {
        Err(SourceError::Unavailable("connection refused".to_string()))
    }
}

#[test]
fn population_median_failure_is_fatal() {
    let config = GoldConfig::default();
    let mut sink = MemorySink::new();
    let err = SofaPipeline::new(&config)
        .unwrap()
        .run(&[stay(1, 10, 24)], &UnreachableSource, &CohortMembership::default(), &mut sink)
        .unwrap_err();
    assert!(matches!(err, PipelineError::PopulationMedian(_)));
    assert!(sink.is_empty());
}

/// Serves measurements from memory, except stay queries for `failing_stay`.
struct FailingStaySource {
    inner: InMemoryMeasurementSource,
    failing_stay: i64,
    unavailable: bool,
    stay_queries: Cell<usize>,
}

impl FailingStaySource {
    fn new(measurements: Vec<Measurement>, failing_stay: i64, unavailable: bool) -> Self {
        Self {
            inner: InMemoryMeasurementSource::new(measurements),
            failing_stay,
            unavailable,
            stay_queries: Cell::new(0),
        }
    }
}

impl MeasurementSource for FailingStaySource {
    fn stay_measurements(
        &self,
        stay: &IcuStay,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Measurement>, SourceError> {
        self.stay_queries.set(self.stay_queries.get() + 1);
        if stay.stay_id != self.failing_stay {
            return self.inner.stay_measurements(stay, from, until);
        }
        Err(if self.unavailable {
            SourceError::Unavailable("connection refused".to_string())
        } else {
            SourceError::Query {
                stay_id: stay.stay_id,
                message: "statement timeout".to_string(),
            }
        })
    }

    fn population_measurements(
        &self,
        parameter: SofaParameter,
        patients: Option<&BTreeSet<PatientId>>,
    ) -> Result<Vec<Measurement>, SourceError> {
        self.inner.population_measurements(parameter, patients)
    }
}

#[test]
fn unavailable_source_aborts_the_run() {
    let mut config = relaxed_config();
    config.imputation.population_median_enabled = false;
    let mut measurements = full_window(1, 10, 0);
    measurements.extend(full_window(2, 20, 0));
    let source = FailingStaySource::new(measurements, 10, true);
    let mut sink = MemorySink::new();

    let err = SofaPipeline::new(&config)
        .unwrap()
        .run(
            &[stay(1, 10, 24), stay(2, 20, 24)],
            &source,
            &CohortMembership::default(),
            &mut sink,
        )
        .unwrap_err();
    let PipelineError::Source { key, source: cause } = &err else {
        panic!("unexpected error: {err}");
    };
    assert!(matches!(cause, SourceError::Unavailable(_)));
    assert_eq!(key.stay_id, 10);
    assert_eq!(key.window_start, base());
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(source.stay_queries.get(), 1);
    assert!(sink.is_empty());
}

#[test]
fn failed_stay_query_only_skips_the_window() {
    let config = relaxed_config();
    let mut measurements = full_window(1, 10, 0);
    measurements.extend(full_window(2, 20, 0));
    let source = FailingStaySource::new(measurements, 10, false);
    let mut sink = MemorySink::new();

    let summary = SofaPipeline::new(&config)
        .unwrap()
        .run(
            &[stay(1, 10, 24), stay(2, 20, 24)],
            &source,
            &CohortMembership::default(),
            &mut sink,
        )
        .unwrap();
    assert_eq!(summary.windows_failed, 1);
    assert_eq!(summary.windows_written, 1);
    assert_eq!(only_record(&sink).stay_id, 20);
}

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
struct DiskFull;

struct FailingSink;

impl ScoreSink for FailingSink {
    type Error = DiskFull;

    fn replace(&mut self, _records: &[SofaScoreRecord]) -> Result<usize, DiskFull> {
        Err(DiskFull)
    }
}

#[test]
fn sink_failure_is_fatal() {
    let config = GoldConfig::default();
    let source = InMemoryMeasurementSource::new(full_window(1, 10, 0));
    let err = SofaPipeline::new(&config)
        .unwrap()
        .run(&[stay(1, 10, 24)], &source, &CohortMembership::default(), &mut FailingSink)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Sink { batch: 1, .. }));
    assert!(err.to_string().contains("disk full"));
}
