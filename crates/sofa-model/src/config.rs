//! Immutable run configuration for Gold-layer scoring.
//!
//! A [`GoldConfig`] is built once (defaults, or a TOML file), validated, and
//! then passed by reference into the pipeline. Every section tolerates
//! partial TOML: missing keys fall back to their defaults.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::parameter::{OrganSystem, SofaParameter};

/// Complete configuration for one Gold run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GoldConfig {
    pub windowing: WindowingConfig,
    pub imputation: ImputationConfig,
    pub missing_data: MissingDataConfig,
    pub quality: QualityConfig,
    pub batch: BatchConfig,
    pub cohort: CohortConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowingConfig {
    pub window_duration_hours: u32,
    pub max_windows_per_stay: u32,
    /// Stays shorter than this are not scored.
    pub min_stay_duration_hours: u32,
    /// Stays longer than this are treated as data errors and not scored.
    pub max_stay_duration_days: u32,
    /// Windows with fewer usable measurements are skipped as insufficient.
    pub min_measurements_per_window: u32,
}

/// Longest accepted window, one week.
pub const MAX_WINDOW_DURATION_HOURS: u32 = 7 * 24;
/// Longest accepted LOCF lookback, one year.
pub const MAX_LOCF_LOOKBACK_HOURS: u32 = 365 * 24;
/// Longest accepted stay cut-off, ten years.
pub const MAX_STAY_DURATION_DAYS: u32 = 3650;

impl Default for WindowingConfig {
    fn default() -> Self {
        Self {
            window_duration_hours: 24,
            max_windows_per_stay: 30,
            min_stay_duration_hours: 6,
            max_stay_duration_days: 100,
            min_measurements_per_window: 1,
        }
    }
}

impl WindowingConfig {
    pub fn window_duration(&self) -> Duration {
        Duration::hours(i64::from(self.window_duration_hours))
    }

    pub fn min_stay_duration(&self) -> Duration {
        Duration::hours(i64::from(self.min_stay_duration_hours))
    }

    pub fn max_stay_duration(&self) -> Duration {
        Duration::days(i64::from(self.max_stay_duration_days))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImputationConfig {
    pub locf_enabled: bool,
    pub locf_max_lookback_hours: u32,
    pub population_median_enabled: bool,
    pub population_median_min_sample_size: usize,
    pub spo2_surrogate_enabled: bool,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            locf_enabled: true,
            locf_max_lookback_hours: 48,
            population_median_enabled: true,
            population_median_min_sample_size: 10,
            spo2_surrogate_enabled: true,
        }
    }
}

impl ImputationConfig {
    pub fn locf_lookback(&self) -> Duration {
        Duration::hours(i64::from(self.locf_max_lookback_hours))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MissingDataConfig {
    /// Records with more unknown subscores than this are dropped.
    pub max_missing_components: usize,
    pub require_respiratory: bool,
}

impl Default for MissingDataConfig {
    fn default() -> Self {
        Self {
            max_missing_components: 5,
            require_respiratory: true,
        }
    }
}

/// Inclusive plausible range for a parameter. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlausibleRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PlausibleRange {
    pub const fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    pub exclude_outliers: bool,
    pub exclude_errors: bool,
    /// Keyed by canonical parameter name (`platelets`, `gcs_total`, ...).
    pub ranges: BTreeMap<String, PlausibleRange>,
    /// Plausible range of the derived PaO2/FiO2 ratio, checked by validation.
    pub pf_ratio_range: PlausibleRange,
}

impl Default for QualityConfig {
    fn default() -> Self {
        let ranges = [
            (SofaParameter::Map, PlausibleRange::new(Some(20.0), Some(200.0))),
            (SofaParameter::Platelets, PlausibleRange::new(Some(1.0), Some(1000.0))),
            (SofaParameter::Bilirubin, PlausibleRange::new(Some(0.1), Some(50.0))),
            (SofaParameter::Gcs, PlausibleRange::new(Some(3.0), Some(15.0))),
            (SofaParameter::Creatinine, PlausibleRange::new(Some(0.1), Some(15.0))),
            (SofaParameter::UrineOutput, PlausibleRange::new(Some(0.0), Some(5000.0))),
        ]
        .into_iter()
        .map(|(parameter, range)| (parameter.as_str().to_string(), range))
        .collect();
        Self {
            exclude_outliers: true,
            exclude_errors: true,
            ranges,
            pf_ratio_range: PlausibleRange::new(Some(10.0), Some(600.0)),
        }
    }
}

impl QualityConfig {
    pub fn range_for(&self, parameter: SofaParameter) -> Option<&PlausibleRange> {
        self.ranges.get(parameter.as_str())
    }

    /// Whether a value lies inside the configured range (no range means yes).
    pub fn is_plausible(&self, parameter: SofaParameter, value: f64) -> bool {
        self.range_for(parameter)
            .is_none_or(|range| range.contains(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Stays per sink write.
    pub batch_size: usize,
    /// Log a checkpoint every N batches.
    pub checkpoint_frequency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            checkpoint_frequency: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CohortConfig {
    /// ICD-9/ICD-10 codes defining the acute respiratory illness cohort.
    pub ari_icd_codes: Vec<String>,
    pub ari_label: String,
    pub other_label: String,
}

pub const DEFAULT_ARI_ICD_CODES: &[&str] = &[
    // ICD-10: respiratory failure, ARDS, COPD exacerbation
    "J9600", "J9601", "J9610", "J9621", "J9622", "J9690", "J9691", "J80", "J441", "J449",
    // ICD-9
    "51881", "51889", "5184", "5180", "5187", "51851", "41401",
];

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            ari_icd_codes: DEFAULT_ARI_ICD_CODES
                .iter()
                .map(|code| (*code).to_string())
                .collect(),
            ari_label: "ARI".to_string(),
            other_label: "OTHER".to_string(),
        }
    }
}

impl GoldConfig {
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read, parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let config = Self::from_toml_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the pipeline cannot operate on.
    pub fn validate(&self) -> Result<()> {
        let windowing = &self.windowing;
        if windowing.window_duration_hours == 0 {
            return Err(ConfigError::invalid(
                "windowing.window_duration_hours",
                "must be greater than zero",
            ));
        }
        if windowing.window_duration_hours > MAX_WINDOW_DURATION_HOURS {
            return Err(ConfigError::invalid(
                "windowing.window_duration_hours",
                format!("must be at most {MAX_WINDOW_DURATION_HOURS}"),
            ));
        }
        if windowing.max_windows_per_stay == 0 {
            return Err(ConfigError::invalid(
                "windowing.max_windows_per_stay",
                "must be greater than zero",
            ));
        }
        if windowing.max_stay_duration_days == 0 {
            return Err(ConfigError::invalid(
                "windowing.max_stay_duration_days",
                "must be greater than zero",
            ));
        }
        if windowing.max_stay_duration_days > MAX_STAY_DURATION_DAYS {
            return Err(ConfigError::invalid(
                "windowing.max_stay_duration_days",
                format!("must be at most {MAX_STAY_DURATION_DAYS}"),
            ));
        }
        if windowing.min_stay_duration() > windowing.max_stay_duration() {
            return Err(ConfigError::invalid(
                "windowing.min_stay_duration_hours",
                format!(
                    "{}h exceeds the maximum stay duration of {} days",
                    windowing.min_stay_duration_hours, windowing.max_stay_duration_days
                ),
            ));
        }
        if self.imputation.locf_max_lookback_hours > MAX_LOCF_LOOKBACK_HOURS {
            return Err(ConfigError::invalid(
                "imputation.locf_max_lookback_hours",
                format!("must be at most {MAX_LOCF_LOOKBACK_HOURS}"),
            ));
        }
        if self.missing_data.max_missing_components > OrganSystem::ALL.len() {
            return Err(ConfigError::invalid(
                "missing_data.max_missing_components",
                format!("must be at most {}", OrganSystem::ALL.len()),
            ));
        }
        if self.batch.batch_size == 0 {
            return Err(ConfigError::invalid(
                "batch.batch_size",
                "must be greater than zero",
            ));
        }
        if self.batch.checkpoint_frequency == 0 {
            return Err(ConfigError::invalid(
                "batch.checkpoint_frequency",
                "must be greater than zero",
            ));
        }
        for (name, range) in &self.quality.ranges {
            if SofaParameter::from_concept(name).is_none_or(|p| p.as_str() != name) {
                return Err(ConfigError::invalid(
                    "quality.ranges",
                    format!("unknown parameter '{name}'"),
                ));
            }
            check_range("quality.ranges", name, range)?;
        }
        check_range("quality.pf_ratio_range", "pf_ratio", &self.quality.pf_ratio_range)?;
        if self.cohort.ari_label.trim().is_empty() || self.cohort.other_label.trim().is_empty() {
            return Err(ConfigError::invalid(
                "cohort",
                "cohort labels must not be empty",
            ));
        }
        if self.cohort.ari_label == self.cohort.other_label {
            return Err(ConfigError::invalid(
                "cohort",
                "ARI and OTHER labels must differ",
            ));
        }
        Ok(())
    }
}

fn check_range(field: &'static str, name: &str, range: &PlausibleRange) -> Result<()> {
    if let (Some(min), Some(max)) = (range.min, range.max)
        && min > max
    {
        return Err(ConfigError::invalid(
            field,
            format!("{name}: min {min} is greater than max {max}"),
        ));
    }
    Ok(())
}
