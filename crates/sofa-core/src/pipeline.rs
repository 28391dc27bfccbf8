//! Gold-layer orchestration.
//!
//! Drives window generation, aggregation, imputation and scoring across all
//! stays, applies the drop rule, writes records to the sink in batches and
//! folds everything into a [`RunSummary`].
//!
//! Failures inside one window are logged and the window is skipped. An
//! unreachable measurement source, a failed population median query or a
//! failed sink write aborts the run.

use std::time::Instant;

use sofa_model::{
    CohortMembership, DropReason, GoldConfig, IcuStay, MissingDataConfig, RunSummary,
    SofaScoreRecord, StayEligibility, Subscore, TimeWindow,
};
use tracing::{debug, debug_span, info, info_span, trace, warn};

use crate::aggregate::aggregate;
use crate::error::{PipelineError, SourceError, WindowError};
use crate::impute::{Imputer, PopulationMedians};
use crate::scoring::{ScoringContext, score_window};
use crate::sink::ScoreSink;
use crate::source::MeasurementSource;
use crate::windows::Windows;

/// Placeholder logged instead of clinical values unless value logging is on.
pub const REDACTED_VALUE: &str = "[REDACTED]";

/// Result of processing one window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    Kept(SofaScoreRecord),
    Dropped(DropReason),
}

/// Drop rule: too many unknown subscores, or a required respiratory
/// subscore that is unknown.
pub fn drop_reason(record: &SofaScoreRecord, policy: &MissingDataConfig) -> Option<DropReason> {
    if record.missing_count() > policy.max_missing_components {
        Some(DropReason::TooManyMissing)
    } else if policy.require_respiratory && record.subscores.respiratory == Subscore::Unknown {
        Some(DropReason::MissingRespiratory)
    } else {
        None
    }
}

/// Orchestrator for one configured run.
#[derive(Debug, Clone, Copy)]
pub struct SofaPipeline<'a> {
    config: &'a GoldConfig,
    log_values: bool,
}

impl<'a> SofaPipeline<'a> {
    /// Validates the configuration up front.
    pub fn new(config: &'a GoldConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            log_values: false,
        })
    }

    /// Include measurement values in trace logs.
    #[must_use]
    pub fn with_log_values(mut self, enable: bool) -> Self {
        self.log_values = enable;
        self
    }

    pub fn config(&self) -> &GoldConfig {
        self.config
    }

    /// Scores every eligible stay and writes the kept records to `sink`.
    pub fn run<S, K>(
        &self,
        stays: &[IcuStay],
        source: &S,
        cohort: &CohortMembership,
        sink: &mut K,
    ) -> Result<RunSummary, PipelineError>
    where
        S: MeasurementSource + ?Sized,
        K: ScoreSink,
    {
        let started = Instant::now();
        let span = info_span!("gold_run", stays = stays.len());
        let _guard = span.enter();

        let medians = PopulationMedians::compute(source, cohort, self.config)
            .map_err(PipelineError::PopulationMedian)?;
        let mut summary = RunSummary {
            median_sample_sizes: medians.sample_sizes().clone(),
            ..RunSummary::default()
        };
        let without_median = summary.parameters_without_median();
        if !without_median.is_empty() {
            let names: Vec<&str> = without_median.iter().map(|p| p.as_str()).collect();
            info!(
                parameters = %names.join(", "),
                "no population median candidates"
            );
        }
        let imputer = Imputer::new(self.config, &medians);

        let batch_size = self.config.batch.batch_size;
        let mut pending: Vec<SofaScoreRecord> = Vec::new();
        let mut stays_in_batch = 0usize;
        for stay in stays {
            let eligibility = stay.eligibility(&self.config.windowing);
            summary.record_stay(eligibility);
            if eligibility != StayEligibility::Eligible {
                debug!(
                    patient_id = stay.patient_id,
                    stay_id = stay.stay_id,
                    ?eligibility,
                    "stay not eligible for scoring"
                );
                continue;
            }
            pending.extend(self.score_stay(stay, source, cohort, &imputer, &mut summary)?);
            summary.stays_processed += 1;
            stays_in_batch += 1;
            if stays_in_batch == batch_size {
                self.flush(sink, &mut pending, &mut summary)?;
                stays_in_batch = 0;
            }
        }
        if !pending.is_empty() {
            self.flush(sink, &mut pending, &mut summary)?;
        }

        summary.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            stays_processed = summary.stays_processed,
            windows_generated = summary.windows_generated,
            windows_written = summary.windows_written,
            windows_dropped = summary.total_dropped(),
            windows_failed = summary.windows_failed,
            duration_ms = summary.elapsed_ms,
            "gold run complete"
        );
        Ok(summary)
    }

    /// Kept records of one stay, in window order. Stops at the first window
    /// whose source is unavailable.
    pub fn score_stay<S: MeasurementSource + ?Sized>(
        &self,
        stay: &IcuStay,
        source: &S,
        cohort: &CohortMembership,
        imputer: &Imputer<'_>,
        summary: &mut RunSummary,
    ) -> Result<Vec<SofaScoreRecord>, PipelineError> {
        let span = debug_span!("stay", patient_id = stay.patient_id, stay_id = stay.stay_id);
        let _guard = span.enter();

        let membership = cohort.cohort_of(stay.patient_id);
        let context = ScoringContext {
            cohort: membership,
            cohort_label: membership.label(&self.config.cohort),
            surrogate_enabled: self.config.imputation.spo2_surrogate_enabled,
        };

        let mut kept = Vec::new();
        for window in Windows::new(stay, &self.config.windowing) {
            summary.windows_generated += 1;
            match self.process_window(stay, &window, source, imputer, context) {
                Ok(WindowOutcome::Kept(record)) => {
                    summary.windows_scored += 1;
                    kept.push(record);
                }
                Ok(WindowOutcome::Dropped(reason)) => {
                    if reason != DropReason::InsufficientData {
                        summary.windows_scored += 1;
                    }
                    summary.record_drop(reason);
                    debug!(
                        window_number = window.window_number,
                        window_start = %window.start,
                        reason = %reason,
                        "window dropped"
                    );
                }
                Err(WindowError::Source {
                    key,
                    source: error @ SourceError::Unavailable(_),
                }) => {
                    return Err(PipelineError::Source { key, source: error });
                }
                Err(error) => {
                    summary.windows_failed += 1;
                    warn!(
                        patient_id = error.key().patient_id,
                        stay_id = error.key().stay_id,
                        window_start = %error.key().window_start,
                        %error,
                        "window skipped after failure"
                    );
                }
            }
        }
        Ok(kept)
    }

    /// Aggregate, impute, score and apply the drop rule to one window.
    pub fn process_window<S: MeasurementSource + ?Sized>(
        &self,
        stay: &IcuStay,
        window: &TimeWindow,
        source: &S,
        imputer: &Imputer<'_>,
        context: ScoringContext<'_>,
    ) -> Result<WindowOutcome, WindowError> {
        let measurements = source
            .stay_measurements(stay, window.start, window.end)
            .map_err(|source| WindowError::Source {
                key: window.key(),
                source,
            })?;
        let aggregated = aggregate(window, &measurements, &self.config.quality)?;
        let required = self.config.windowing.min_measurements_per_window as usize;
        if aggregated.total_measurements() < required {
            return Ok(WindowOutcome::Dropped(DropReason::InsufficientData));
        }

        let resolved = imputer.resolve(source, stay, window, &aggregated)?;
        for (parameter, value) in resolved.iter() {
            trace!(
                window_number = window.window_number,
                parameter = parameter.as_str(),
                value = %self.display_value(value.value),
                method = value.method.map_or("direct", |m| m.as_str()),
                "resolved parameter"
            );
        }

        let record = score_window(window, &resolved, context);
        if let Some(ratio) = record.pf_ratio {
            trace!(
                window_number = window.window_number,
                ratio = %self.display_value(ratio),
                surrogate = record.spo2_fio2_surrogate,
                "respiratory ratio"
            );
        }
        Ok(match drop_reason(&record, &self.config.missing_data) {
            Some(reason) => WindowOutcome::Dropped(reason),
            None => WindowOutcome::Kept(record),
        })
    }

    fn flush<K: ScoreSink>(
        &self,
        sink: &mut K,
        pending: &mut Vec<SofaScoreRecord>,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let batch = summary.batches_written + 1;
        let written = sink.replace(pending.as_slice()).map_err(|error| PipelineError::Sink {
            batch,
            source: Box::new(error),
        })?;
        for record in pending.iter() {
            summary.record_written(record);
        }
        summary.batches_written = batch;
        debug!(batch, records = written, "batch written");
        if batch % self.config.batch.checkpoint_frequency == 0 {
            info!(
                batch,
                stays_processed = summary.stays_processed,
                windows_written = summary.windows_written,
                "checkpoint"
            );
        }
        pending.clear();
        Ok(())
    }

    fn display_value(&self, value: f64) -> String {
        if self.log_values {
            value.to_string()
        } else {
            REDACTED_VALUE.to_string()
        }
    }
}
