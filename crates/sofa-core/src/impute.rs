//! Imputation of missing window parameters.
//!
//! Fallback order for an absent parameter: last observation carried forward
//! within the same stay, then the run's population median. The respiratory
//! ratio additionally falls back to SpO2/FiO2 when PaO2 stays missing.
//! Treatment parameters (vasopressors, ventilation) are never imputed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use sofa_model::{
    AggregatedParameterSet, CohortMembership, GoldConfig, IcuStay, ImputationMethod,
    ParameterValue, PatientId, ResolvedParameters, ResolvedValue, SofaParameter, TimeWindow,
};

use crate::aggregate::usable_value;
use crate::error::{SourceError, WindowError};
use crate::source::MeasurementSource;

/// Median of `values`, averaging the two middle values for even lengths.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Parameter medians over the reference population, computed once per run
/// and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationMedians {
    medians: BTreeMap<SofaParameter, f64>,
    sample_sizes: BTreeMap<SofaParameter, usize>,
}

impl PopulationMedians {
    /// Builds the table from raw samples. Parameters whose sample is smaller
    /// than `min_sample_size` get no median.
    pub fn from_samples(
        samples: impl IntoIterator<Item = (SofaParameter, Vec<f64>)>,
        min_sample_size: usize,
    ) -> Self {
        let mut table = Self::default();
        for (parameter, mut values) in samples {
            table.sample_sizes.insert(parameter, values.len());
            if values.len() >= min_sample_size.max(1)
                && let Some(value) = median(&mut values)
            {
                table.medians.insert(parameter, value);
            }
        }
        table
    }

    /// Reference set is the disease cohort, or every patient when the cohort
    /// is empty. Any source failure is fatal to the run.
    pub fn compute<S: MeasurementSource + ?Sized>(
        source: &S,
        cohort: &CohortMembership,
        config: &GoldConfig,
    ) -> Result<Self, SourceError> {
        if !config.imputation.population_median_enabled {
            return Ok(Self::default());
        }
        let reference: Option<BTreeSet<PatientId>> =
            (!cohort.is_empty()).then(|| cohort.patients().collect());
        let mut samples = Vec::new();
        for parameter in SofaParameter::ALL {
            if !parameter.is_imputable() {
                continue;
            }
            let values: Vec<f64> = source
                .population_measurements(parameter, reference.as_ref())?
                .iter()
                .filter_map(|m| usable_value(m, &config.quality))
                .collect();
            samples.push((parameter, values));
        }
        let table =
            Self::from_samples(samples, config.imputation.population_median_min_sample_size);
        tracing::info!(
            reference = if reference.is_some() { "cohort" } else { "all_patients" },
            parameters = table.medians.len(),
            "computed population medians"
        );
        Ok(table)
    }

    pub fn get(&self, parameter: SofaParameter) -> Option<f64> {
        self.medians.get(&parameter).copied()
    }

    pub fn sample_size(&self, parameter: SofaParameter) -> usize {
        self.sample_sizes.get(&parameter).copied().unwrap_or(0)
    }

    pub fn sample_sizes(&self) -> &BTreeMap<SofaParameter, usize> {
        &self.sample_sizes
    }

    pub fn len(&self) -> usize {
        self.medians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medians.is_empty()
    }
}

/// Applies the fallback chain for one run.
#[derive(Debug, Clone, Copy)]
pub struct Imputer<'a> {
    config: &'a GoldConfig,
    medians: &'a PopulationMedians,
}

impl<'a> Imputer<'a> {
    pub fn new(config: &'a GoldConfig, medians: &'a PopulationMedians) -> Self {
        Self { config, medians }
    }

    /// Resolves one parameter. A present aggregate is returned as-is with no
    /// imputation flag; `Ok(None)` means every fallback came up empty.
    pub fn impute<S: MeasurementSource + ?Sized>(
        &self,
        source: &S,
        stay: &IcuStay,
        window: &TimeWindow,
        parameter: SofaParameter,
        aggregated: ParameterValue,
    ) -> Result<Option<ResolvedValue>, WindowError> {
        if let ParameterValue::Present(value) = aggregated {
            return Ok(Some(ResolvedValue::direct(value)));
        }
        if !parameter.is_imputable() {
            return Ok(None);
        }
        if self.config.imputation.locf_enabled
            && let Some(value) = self.carried_forward(source, stay, window, parameter)?
        {
            return Ok(Some(ResolvedValue::imputed(value, ImputationMethod::Locf)));
        }
        if self.config.imputation.population_median_enabled
            && let Some(value) = self.medians.get(parameter)
        {
            return Ok(Some(ResolvedValue::imputed(
                value,
                ImputationMethod::PopulationMedian,
            )));
        }
        Ok(None)
    }

    /// Resolves every parameter of the window.
    pub fn resolve<S: MeasurementSource + ?Sized>(
        &self,
        source: &S,
        stay: &IcuStay,
        window: &TimeWindow,
        aggregated: &AggregatedParameterSet,
    ) -> Result<ResolvedParameters, WindowError> {
        let mut resolved = ResolvedParameters::default();
        for parameter in SofaParameter::ALL {
            if let Some(value) =
                self.impute(source, stay, window, parameter, aggregated.get(parameter))?
            {
                resolved.insert(parameter, value);
            }
        }
        Ok(resolved)
    }

    /// Most recent usable value of the same stay within the lookback.
    fn carried_forward<S: MeasurementSource + ?Sized>(
        &self,
        source: &S,
        stay: &IcuStay,
        window: &TimeWindow,
        parameter: SofaParameter,
    ) -> Result<Option<f64>, WindowError> {
        let from = window
            .start
            .checked_sub_signed(self.config.imputation.locf_lookback())
            .unwrap_or(NaiveDateTime::MIN);
        let history = source
            .parameter_history(stay, parameter, from, window.start)
            .map_err(|source| WindowError::Source {
                key: window.key(),
                source,
            })?;
        let mut candidates: Vec<_> = history
            .iter()
            .filter(|m| m.stay_id == stay.stay_id && m.timestamp < window.start)
            .filter_map(|m| usable_value(m, &self.config.quality).map(|v| (m.timestamp, v)))
            .collect();
        candidates.sort_by_key(|(timestamp, _)| *timestamp);
        Ok(candidates.last().map(|(_, value)| *value))
    }
}

/// FiO2 above 1 is a percentage.
pub fn fio2_fraction(fio2: f64) -> f64 {
    if fio2 > 1.0 { fio2 / 100.0 } else { fio2 }
}

/// Oxygenation ratio used for the respiratory subscore.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RespiratoryRatio {
    pub value: f64,
    /// SpO2/FiO2 standing in for PaO2/FiO2.
    pub surrogate: bool,
}

/// PaO2/FiO2 from resolved values, else SpO2/FiO2 when allowed. No ratio is
/// produced without a positive FiO2.
pub fn respiratory_ratio(
    resolved: &ResolvedParameters,
    surrogate_enabled: bool,
) -> Option<RespiratoryRatio> {
    let fio2 = fio2_fraction(resolved.value(SofaParameter::Fio2)?);
    if fio2 <= 0.0 {
        return None;
    }
    if let Some(pao2) = resolved.value(SofaParameter::Pao2) {
        return Some(RespiratoryRatio {
            value: pao2 / fio2,
            surrogate: false,
        });
    }
    if surrogate_enabled && let Some(spo2) = resolved.value(SofaParameter::Spo2) {
        return Some(RespiratoryRatio {
            value: spo2 / fio2,
            surrogate: true,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_and_even_samples() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn small_samples_yield_no_median() {
        let table = PopulationMedians::from_samples(
            [
                (SofaParameter::Platelets, (1..=10).map(f64::from).collect()),
                (SofaParameter::Bilirubin, vec![1.0; 9]),
            ],
            10,
        );
        assert_eq!(table.get(SofaParameter::Platelets), Some(5.5));
        assert_eq!(table.get(SofaParameter::Bilirubin), None);
        assert_eq!(table.sample_size(SofaParameter::Bilirubin), 9);
    }

    #[test]
    fn lookback_before_the_earliest_timestamp_is_clamped() {
        let start = NaiveDateTime::MIN + chrono::Duration::hours(2);
        let stay = IcuStay::new(1, 10, start, start + chrono::Duration::hours(24));
        let window = TimeWindow {
            patient_id: 1,
            stay_id: 10,
            start,
            end: stay.outtime,
            window_number: 1,
        };
        let source = crate::InMemoryMeasurementSource::new([sofa_model::Measurement::new(
            1,
            10,
            SofaParameter::Platelets,
            90.0,
            NaiveDateTime::MIN,
        )]);
        let config = GoldConfig::default();
        let medians = PopulationMedians::default();
        let imputer = Imputer::new(&config, &medians);

        let value = imputer
            .impute(
                &source,
                &stay,
                &window,
                SofaParameter::Platelets,
                ParameterValue::Absent,
            )
            .unwrap()
            .unwrap();
        assert_eq!(value.value, 90.0);
        assert_eq!(value.method, Some(ImputationMethod::Locf));
    }

    #[test]
    fn fio2_percentages_are_converted() {
        assert_eq!(fio2_fraction(50.0), 0.5);
        assert_eq!(fio2_fraction(0.4), 0.4);
        assert_eq!(fio2_fraction(1.0), 1.0);
    }

    #[test]
    fn ratio_prefers_pao2() {
        let mut resolved = ResolvedParameters::default();
        resolved.insert(SofaParameter::Fio2, ResolvedValue::direct(40.0));
        resolved.insert(SofaParameter::Spo2, ResolvedValue::direct(92.0));
        resolved.insert(SofaParameter::Pao2, ResolvedValue::direct(100.0));
        let ratio = respiratory_ratio(&resolved, true).unwrap();
        assert_eq!(ratio.value, 250.0);
        assert!(!ratio.surrogate);
    }

    #[test]
    fn zero_fio2_yields_no_ratio() {
        let mut resolved = ResolvedParameters::default();
        resolved.insert(SofaParameter::Fio2, ResolvedValue::direct(0.0));
        resolved.insert(SofaParameter::Pao2, ResolvedValue::direct(100.0));
        assert_eq!(respiratory_ratio(&resolved, true), None);
    }

    #[test]
    fn surrogate_can_be_disabled() {
        let mut resolved = ResolvedParameters::default();
        resolved.insert(SofaParameter::Fio2, ResolvedValue::direct(50.0));
        resolved.insert(SofaParameter::Spo2, ResolvedValue::direct(95.0));
        assert_eq!(respiratory_ratio(&resolved, false), None);
        let ratio = respiratory_ratio(&resolved, true).unwrap();
        assert!((ratio.value - 190.0).abs() < 1e-9);
        assert!(ratio.surrogate);
    }
}
