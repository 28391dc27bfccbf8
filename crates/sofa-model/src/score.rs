//! SOFA score records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::measurement::{PatientId, StayId};
use crate::parameter::{OrganSystem, SofaParameter};
use crate::stay::Cohort;
use crate::value::ImputationMethod;

pub const MAX_SUBSCORE: u8 = 4;
pub const MAX_TOTAL: u8 = MAX_SUBSCORE * OrganSystem::ALL.len() as u8;
/// Totals at or above this count as high risk in run summaries.
pub const HIGH_RISK_THRESHOLD: u8 = 10;

/// Organ subscore. `Unknown` means the inputs were missing, not healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Option<u8>", into = "Option<u8>")]
pub enum Subscore {
    Score(u8),
    Unknown,
}

impl Subscore {
    /// Build a known subscore, clamping to the 0..=4 band.
    pub fn score(points: u8) -> Self {
        Self::Score(points.min(MAX_SUBSCORE))
    }

    pub fn points(self) -> Option<u8> {
        match self {
            Self::Score(points) => Some(points),
            Self::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Self::Score(_))
    }
}

impl From<Subscore> for Option<u8> {
    fn from(value: Subscore) -> Self {
        value.points()
    }
}

impl TryFrom<Option<u8>> for Subscore {
    type Error = String;

    fn try_from(value: Option<u8>) -> Result<Self, Self::Error> {
        match value {
            Some(points) if points <= MAX_SUBSCORE => Ok(Self::Score(points)),
            Some(points) => Err(format!("subscore {points} outside 0..={MAX_SUBSCORE}")),
            None => Ok(Self::Unknown),
        }
    }
}

impl fmt::Display for Subscore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Score(points) => write!(f, "{points}"),
            Self::Unknown => f.write_str("-"),
        }
    }
}

/// The six organ subscores of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscores {
    pub respiratory: Subscore,
    pub cardiovascular: Subscore,
    pub coagulation: Subscore,
    pub liver: Subscore,
    pub cns: Subscore,
    pub renal: Subscore,
}

impl Default for Subscores {
    fn default() -> Self {
        Self {
            respiratory: Subscore::Unknown,
            cardiovascular: Subscore::Unknown,
            coagulation: Subscore::Unknown,
            liver: Subscore::Unknown,
            cns: Subscore::Unknown,
            renal: Subscore::Unknown,
        }
    }
}

impl Subscores {
    pub fn get(&self, system: OrganSystem) -> Subscore {
        match system {
            OrganSystem::Respiratory => self.respiratory,
            OrganSystem::Cardiovascular => self.cardiovascular,
            OrganSystem::Coagulation => self.coagulation,
            OrganSystem::Liver => self.liver,
            OrganSystem::Cns => self.cns,
            OrganSystem::Renal => self.renal,
        }
    }

    pub fn set(&mut self, system: OrganSystem, subscore: Subscore) {
        let slot = match system {
            OrganSystem::Respiratory => &mut self.respiratory,
            OrganSystem::Cardiovascular => &mut self.cardiovascular,
            OrganSystem::Coagulation => &mut self.coagulation,
            OrganSystem::Liver => &mut self.liver,
            OrganSystem::Cns => &mut self.cns,
            OrganSystem::Renal => &mut self.renal,
        };
        *slot = subscore;
    }

    pub fn iter(&self) -> impl Iterator<Item = (OrganSystem, Subscore)> + '_ {
        OrganSystem::ALL
            .into_iter()
            .map(|system| (system, self.get(system)))
    }

    /// Sum of known subscores.
    pub fn total(&self) -> u8 {
        self.iter().filter_map(|(_, subscore)| subscore.points()).sum()
    }

    pub fn missing(&self) -> Vec<OrganSystem> {
        self.iter()
            .filter(|(_, subscore)| !subscore.is_known())
            .map(|(system, _)| system)
            .collect()
    }

    pub fn known_count(&self) -> usize {
        self.iter().filter(|(_, subscore)| subscore.is_known()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityCategory {
    Normal,
    Mild,
    Moderate,
    Severe,
    Critical,
    /// No subscore could be computed.
    Unknown,
}

impl SeverityCategory {
    pub const ALL: [SeverityCategory; 6] = [
        SeverityCategory::Normal,
        SeverityCategory::Mild,
        SeverityCategory::Moderate,
        SeverityCategory::Severe,
        SeverityCategory::Critical,
        SeverityCategory::Unknown,
    ];

    pub fn from_total(total: u8) -> Self {
        match total {
            0 => Self::Normal,
            1..=6 => Self::Mild,
            7..=12 => Self::Moderate,
            13..=18 => Self::Severe,
            _ => Self::Critical,
        }
    }

    pub fn classify(subscores: &Subscores) -> Self {
        if subscores.known_count() == 0 {
            Self::Unknown
        } else {
            Self::from_total(subscores.total())
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Mild => "Mild",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
            Self::Critical => "Critical",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SeverityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink key: re-runs replace rows with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub patient_id: PatientId,
    pub stay_id: StayId,
    pub window_start: NaiveDateTime,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patient {} stay {} window {}",
            self.patient_id, self.stay_id, self.window_start
        )
    }
}

/// One scored window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SofaScoreRecord {
    pub patient_id: PatientId,
    pub stay_id: StayId,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub window_number: u32,
    pub icu_day: u32,
    pub subscores: Subscores,
    pub total: u8,
    pub severity: SeverityCategory,
    pub missing_components: Vec<OrganSystem>,
    pub cohort: Cohort,
    pub cohort_label: String,
    /// Values after imputation, including directly observed ones.
    pub values: BTreeMap<SofaParameter, f64>,
    pub pf_ratio: Option<f64>,
    pub ventilated: bool,
    pub imputation: BTreeMap<SofaParameter, ImputationMethod>,
    pub spo2_fio2_surrogate: bool,
    pub notes: String,
}

impl SofaScoreRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            patient_id: self.patient_id,
            stay_id: self.stay_id,
            window_start: self.window_start,
        }
    }

    pub fn missing_count(&self) -> usize {
        self.missing_components.len()
    }

    pub fn is_high_risk(&self) -> bool {
        self.total >= HIGH_RISK_THRESHOLD
    }
}
