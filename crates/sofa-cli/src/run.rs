//! The `run` command, independent of argument parsing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use sofa_core::{InMemoryMeasurementSource, ScoreSink, SofaPipeline};
use sofa_ingest::{load_cohort, load_measurements, load_stays};
use sofa_model::{CohortMembership, GoldConfig, RecordKey, RunSummary, SofaScoreRecord};
use sofa_output::{CsvScoreSink, write_json_report};
use sofa_validate::{ValidationReport, validate_records};
use tracing::{info, info_span, warn};

/// Inputs and outputs of one scoring run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub measurements: PathBuf,
    pub stays: PathBuf,
    pub diagnoses: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub output: PathBuf,
    pub summary_json: Option<PathBuf>,
    pub validation_json: Option<PathBuf>,
    pub log_data: bool,
}

#[derive(Debug, Clone)]
pub struct GoldRunResult {
    pub output: PathBuf,
    pub summary: RunSummary,
    pub validation: ValidationReport,
    /// Measurement rows skipped because their concept is not a SOFA input.
    pub skipped_measurements: usize,
    pub summary_json: Option<PathBuf>,
    pub validation_json: Option<PathBuf>,
}

impl GoldRunResult {
    pub fn has_errors(&self) -> bool {
        self.validation.has_errors()
    }
}

/// Default configuration, or the validated contents of `path`.
pub fn load_config(path: Option<&Path>) -> Result<GoldConfig> {
    match path {
        Some(path) => GoldConfig::load(path)
            .with_context(|| format!("load configuration {}", path.display())),
        None => Ok(GoldConfig::default()),
    }
}

/// Keeps a copy of every record written so the run can be validated
/// without re-reading the table.
///
/// Memory grows with the whole output, not with `batch.batch_size`: the
/// duplicate, overlap and cohort checks need every record of the run.
struct RecordingSink<K> {
    inner: K,
    records: BTreeMap<RecordKey, SofaScoreRecord>,
}

impl<K> RecordingSink<K> {
    fn new(inner: K) -> Self {
        Self {
            inner,
            records: BTreeMap::new(),
        }
    }

    fn into_records(self) -> Vec<SofaScoreRecord> {
        self.records.into_values().collect()
    }
}

impl<K: ScoreSink> ScoreSink for RecordingSink<K> {
    type Error = K::Error;

    fn replace(&mut self, records: &[SofaScoreRecord]) -> Result<usize, Self::Error> {
        let written = self.inner.replace(records)?;
        for record in records {
            self.records.insert(record.key(), record.clone());
        }
        Ok(written)
    }
}

pub fn run_gold(options: &RunOptions) -> Result<GoldRunResult> {
    let span = info_span!("run", output = %options.output.display());
    let _guard = span.enter();
    let started = Instant::now();

    let config = load_config(options.config.as_deref())?;
    let stays = load_stays(&options.stays)
        .with_context(|| format!("load ICU stays {}", options.stays.display()))?;
    let load = load_measurements(&options.measurements).with_context(|| {
        format!("load measurements {}", options.measurements.display())
    })?;
    let skipped_measurements = load.skipped();
    for (concept, rows) in &load.unknown_concepts {
        warn!(concept = %concept, rows, "skipped measurements with unknown concept");
    }
    let cohort = match &options.diagnoses {
        Some(path) => load_cohort(path, &config.cohort)
            .with_context(|| format!("load diagnoses {}", path.display()))?,
        None => CohortMembership::default(),
    };
    info!(
        stays = stays.len(),
        measurements = load.measurements.len(),
        skipped_measurements,
        ari_patients = cohort.len(),
        duration_ms = started.elapsed().as_millis(),
        "inputs loaded"
    );

    let source = InMemoryMeasurementSource::new(load.measurements);
    let mut sink = RecordingSink::new(CsvScoreSink::new(&options.output));
    let summary = SofaPipeline::new(&config)
        .context("invalid configuration")?
        .with_log_values(options.log_data)
        .run(&stays, &source, &cohort, &mut sink)
        .context("score ICU stays")?;

    let records = sink.into_records();
    let validation = validate_records(&records, &config);
    if let Some(path) = &options.summary_json {
        write_json_report(path, &summary).context("write run summary")?;
    }
    if let Some(path) = &options.validation_json {
        write_json_report(path, &validation).context("write validation report")?;
    }

    Ok(GoldRunResult {
        output: options.output.clone(),
        summary,
        validation,
        skipped_measurements,
        summary_json: options.summary_json.clone(),
        validation_json: options.validation_json.clone(),
    })
}
