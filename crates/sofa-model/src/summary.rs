//! Run-level counters emitted after every pipeline run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parameter::{OrganSystem, SofaParameter};
use crate::score::{SeverityCategory, SofaScoreRecord};
use crate::stay::StayEligibility;
use crate::value::ImputationMethod;

/// Why a scored (or unscored) window was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    TooManyMissing,
    MissingRespiratory,
    /// Fewer usable measurements than `min_measurements_per_window`.
    InsufficientData,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooManyMissing => "too_many_missing",
            Self::MissingRespiratory => "missing_respiratory",
            Self::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputationCounts {
    pub locf: usize,
    pub population_median: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub stays_seen: usize,
    pub stays_eligible: usize,
    pub stays_invalid: usize,
    pub stays_too_short: usize,
    pub stays_too_long: usize,
    pub stays_processed: usize,
    pub windows_generated: usize,
    /// Windows that reached the scorer.
    pub windows_scored: usize,
    pub windows_written: usize,
    pub windows_failed: usize,
    pub windows_dropped: BTreeMap<DropReason, usize>,
    /// Windows written with a known subscore, per system.
    pub system_availability: BTreeMap<OrganSystem, usize>,
    pub imputation_counts: BTreeMap<SofaParameter, ImputationCounts>,
    pub surrogate_count: usize,
    /// Reference sample size per parameter for population medians.
    pub median_sample_sizes: BTreeMap<SofaParameter, usize>,
    pub total_score_sum: u64,
    pub min_total: Option<u8>,
    pub max_total: Option<u8>,
    pub high_risk_count: usize,
    pub severity_distribution: BTreeMap<SeverityCategory, usize>,
    pub cohort_windows: BTreeMap<String, usize>,
    pub batches_written: usize,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn record_stay(&mut self, eligibility: StayEligibility) {
        self.stays_seen += 1;
        match eligibility {
            StayEligibility::Eligible => self.stays_eligible += 1,
            StayEligibility::InvalidTimes => self.stays_invalid += 1,
            StayEligibility::TooShort => self.stays_too_short += 1,
            StayEligibility::TooLong => self.stays_too_long += 1,
        }
    }

    pub fn record_drop(&mut self, reason: DropReason) {
        *self.windows_dropped.entry(reason).or_default() += 1;
    }

    pub fn dropped(&self, reason: DropReason) -> usize {
        self.windows_dropped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_dropped(&self) -> usize {
        self.windows_dropped.values().sum()
    }

    /// Fold a record that will be written into the counters.
    pub fn record_written(&mut self, record: &SofaScoreRecord) {
        self.windows_written += 1;
        for (system, subscore) in record.subscores.iter() {
            if subscore.is_known() {
                *self.system_availability.entry(system).or_default() += 1;
            }
        }
        for (parameter, method) in &record.imputation {
            let counts = self.imputation_counts.entry(*parameter).or_default();
            match method {
                ImputationMethod::Locf => counts.locf += 1,
                ImputationMethod::PopulationMedian => counts.population_median += 1,
            }
        }
        if record.spo2_fio2_surrogate {
            self.surrogate_count += 1;
        }
        self.total_score_sum += u64::from(record.total);
        self.min_total = Some(self.min_total.map_or(record.total, |min| min.min(record.total)));
        self.max_total = Some(self.max_total.map_or(record.total, |max| max.max(record.total)));
        if record.is_high_risk() {
            self.high_risk_count += 1;
        }
        *self.severity_distribution.entry(record.severity).or_default() += 1;
        *self
            .cohort_windows
            .entry(record.cohort_label.clone())
            .or_default() += 1;
    }

    pub fn average_total(&self) -> Option<f64> {
        (self.windows_written > 0)
            .then(|| self.total_score_sum as f64 / self.windows_written as f64)
    }

    /// Share of written windows with a known subscore for `system`, in percent.
    pub fn availability_pct(&self, system: OrganSystem) -> f64 {
        percentage(
            self.system_availability.get(&system).copied().unwrap_or(0),
            self.windows_written,
        )
    }

    pub fn drop_rate_pct(&self) -> f64 {
        percentage(self.total_dropped(), self.windows_generated)
    }

    /// Windows generated per second of wall time.
    pub fn processing_rate(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.windows_generated as f64 / (self.elapsed_ms as f64 / 1000.0)
    }

    /// Parameters with no population-median candidates this run.
    pub fn parameters_without_median(&self) -> Vec<SofaParameter> {
        self.median_sample_sizes
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(parameter, _)| *parameter)
            .collect()
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
