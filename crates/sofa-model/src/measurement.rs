use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::parameter::SofaParameter;

pub type PatientId = i64;
pub type StayId = i64;

/// One standardized observation from the measurement store.
///
/// `value` may only be `None` on rows flagged as errors; anything else is a
/// malformed measurement and is rejected by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub patient_id: PatientId,
    pub stay_id: StayId,
    pub parameter: SofaParameter,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub timestamp: NaiveDateTime,
    pub is_outlier: bool,
    pub is_error: bool,
}

impl Measurement {
    pub fn new(
        patient_id: PatientId,
        stay_id: StayId,
        parameter: SofaParameter,
        value: f64,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            patient_id,
            stay_id,
            parameter,
            value: Some(value),
            unit: None,
            timestamp,
            is_outlier: false,
            is_error: false,
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn outlier(mut self) -> Self {
        self.is_outlier = true;
        self
    }

    #[must_use]
    pub fn error(mut self) -> Self {
        self.is_error = true;
        self
    }

    pub fn is_flagged(&self) -> bool {
        self.is_outlier || self.is_error
    }
}
