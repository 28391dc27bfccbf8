use std::collections::BTreeSet;
use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::{CohortConfig, WindowingConfig};
use crate::measurement::{PatientId, StayId};

/// One continuous ICU admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcuStay {
    pub patient_id: PatientId,
    pub hadm_id: Option<i64>,
    pub stay_id: StayId,
    pub intime: NaiveDateTime,
    pub outtime: NaiveDateTime,
}

/// Why a stay is or is not scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StayEligibility {
    Eligible,
    /// Discharge is not after admission.
    InvalidTimes,
    TooShort,
    TooLong,
}

impl IcuStay {
    pub fn new(
        patient_id: PatientId,
        stay_id: StayId,
        intime: NaiveDateTime,
        outtime: NaiveDateTime,
    ) -> Self {
        Self {
            patient_id,
            hadm_id: None,
            stay_id,
            intime,
            outtime,
        }
    }

    pub fn duration(&self) -> Duration {
        self.outtime - self.intime
    }

    pub fn eligibility(&self, windowing: &WindowingConfig) -> StayEligibility {
        let duration = self.duration();
        if duration <= Duration::zero() {
            StayEligibility::InvalidTimes
        } else if duration < windowing.min_stay_duration() {
            StayEligibility::TooShort
        } else if duration > windowing.max_stay_duration() {
            StayEligibility::TooLong
        } else {
            StayEligibility::Eligible
        }
    }
}

/// Disease cohort of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cohort {
    /// Acute respiratory illness.
    Ari,
    Other,
}

impl Cohort {
    pub fn label(self, config: &CohortConfig) -> &str {
        match self {
            Self::Ari => &config.ari_label,
            Self::Other => &config.other_label,
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ari => f.write_str("ARI"),
            Self::Other => f.write_str("OTHER"),
        }
    }
}

/// Set of patients flagged as the disease cohort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortMembership {
    ari_patients: BTreeSet<PatientId>,
}

impl CohortMembership {
    pub fn new(ari_patients: impl IntoIterator<Item = PatientId>) -> Self {
        Self {
            ari_patients: ari_patients.into_iter().collect(),
        }
    }

    pub fn cohort_of(&self, patient_id: PatientId) -> Cohort {
        if self.ari_patients.contains(&patient_id) {
            Cohort::Ari
        } else {
            Cohort::Other
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ari_patients.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ari_patients.len()
    }

    pub fn patients(&self) -> impl Iterator<Item = PatientId> + '_ {
        self.ari_patients.iter().copied()
    }
}
