//! Tagged parameter values.
//!
//! "No data" is never encoded as zero: an aggregated parameter is either
//! [`ParameterValue::Present`] or [`ParameterValue::Absent`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parameter::SofaParameter;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum ParameterValue {
    Present(f64),
    Absent,
}

impl ParameterValue {
    pub fn from_option(value: Option<f64>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// How a missing parameter was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationMethod {
    /// Last observation carried forward within the same stay.
    Locf,
    PopulationMedian,
}

impl ImputationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Locf => "locf",
            Self::PopulationMedian => "population_median",
        }
    }
}

impl fmt::Display for ImputationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter value after the imputation chain. `method` is `None` for a
/// directly observed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedValue {
    pub value: f64,
    pub method: Option<ImputationMethod>,
}

impl ResolvedValue {
    pub fn direct(value: f64) -> Self {
        Self {
            value,
            method: None,
        }
    }

    pub fn imputed(value: f64, method: ImputationMethod) -> Self {
        Self {
            value,
            method: Some(method),
        }
    }

    pub fn is_imputed(&self) -> bool {
        self.method.is_some()
    }
}

/// Reduced value of one parameter plus how many measurements contributed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedValue {
    pub value: f64,
    pub measurement_count: usize,
}

/// Per-window reduction of every parameter that had usable measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedParameterSet {
    values: BTreeMap<SofaParameter, AggregatedValue>,
}

impl AggregatedParameterSet {
    pub fn insert(&mut self, parameter: SofaParameter, value: AggregatedValue) {
        self.values.insert(parameter, value);
    }

    pub fn get(&self, parameter: SofaParameter) -> ParameterValue {
        ParameterValue::from_option(self.values.get(&parameter).map(|agg| agg.value))
    }

    pub fn measurement_count(&self, parameter: SofaParameter) -> usize {
        self.values
            .get(&parameter)
            .map_or(0, |agg| agg.measurement_count)
    }

    /// Usable measurements across all parameters.
    pub fn total_measurements(&self) -> usize {
        self.values.values().map(|agg| agg.measurement_count).sum()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SofaParameter, &AggregatedValue)> {
        self.values.iter().map(|(parameter, value)| (*parameter, value))
    }
}

/// Parameter values after imputation, keyed by parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParameters {
    values: BTreeMap<SofaParameter, ResolvedValue>,
}

impl ResolvedParameters {
    pub fn insert(&mut self, parameter: SofaParameter, value: ResolvedValue) {
        self.values.insert(parameter, value);
    }

    pub fn get(&self, parameter: SofaParameter) -> Option<&ResolvedValue> {
        self.values.get(&parameter)
    }

    pub fn value(&self, parameter: SofaParameter) -> Option<f64> {
        self.values.get(&parameter).map(|resolved| resolved.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SofaParameter, &ResolvedValue)> {
        self.values.iter().map(|(parameter, value)| (*parameter, value))
    }

    /// Imputation method per imputed parameter.
    pub fn imputation_flags(&self) -> BTreeMap<SofaParameter, ImputationMethod> {
        self.values
            .iter()
            .filter_map(|(parameter, resolved)| resolved.method.map(|method| (*parameter, method)))
            .collect()
    }
}
