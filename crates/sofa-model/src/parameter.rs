//! SOFA parameter mapping table.
//!
//! Every parameter the scorer consumes is declared once here together with
//! its organ system, its window reducer and the concept identifiers under
//! which upstream measurements arrive. The table is consulted in-process;
//! nothing is generated as query text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The six organ systems scored by SOFA, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganSystem {
    Respiratory,
    Cardiovascular,
    Coagulation,
    Liver,
    Cns,
    Renal,
}

impl OrganSystem {
    pub const ALL: [OrganSystem; 6] = [
        OrganSystem::Respiratory,
        OrganSystem::Cardiovascular,
        OrganSystem::Coagulation,
        OrganSystem::Liver,
        OrganSystem::Cns,
        OrganSystem::Renal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Respiratory => "respiratory",
            Self::Cardiovascular => "cardiovascular",
            Self::Coagulation => "coagulation",
            Self::Liver => "liver",
            Self::Cns => "cns",
            Self::Renal => "renal",
        }
    }

    /// Label used in calculation notes and summary tables.
    pub fn label(self) -> &'static str {
        match self {
            Self::Respiratory => "Respiratory",
            Self::Cardiovascular => "Cardiovascular",
            Self::Coagulation => "Coagulation",
            Self::Liver => "Liver",
            Self::Cns => "CNS",
            Self::Renal => "Renal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|system| system.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for OrganSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reducer applied to all usable measurements of a parameter in one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Worst case where low values are bad (ratios, pressures, counts).
    Min,
    /// Worst case where rising values are bad (bilirubin, creatinine, doses).
    Max,
    Mean,
    /// Cumulative quantity over the window (urine output).
    Sum,
}

impl Aggregation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Sum => "sum",
        }
    }

    /// Reduce a non-empty slice of values. Returns `None` for an empty slice.
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let reduced = match self {
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Self::Sum => values.iter().sum(),
        };
        Some(reduced)
    }
}

/// A SOFA input parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SofaParameter {
    Pao2,
    Spo2,
    Fio2,
    MechanicalVentilation,
    Map,
    Dopamine,
    Epinephrine,
    Norepinephrine,
    Dobutamine,
    Platelets,
    Bilirubin,
    Gcs,
    Creatinine,
    UrineOutput,
}

impl SofaParameter {
    pub const ALL: [SofaParameter; 14] = [
        SofaParameter::Pao2,
        SofaParameter::Spo2,
        SofaParameter::Fio2,
        SofaParameter::MechanicalVentilation,
        SofaParameter::Map,
        SofaParameter::Dopamine,
        SofaParameter::Epinephrine,
        SofaParameter::Norepinephrine,
        SofaParameter::Dobutamine,
        SofaParameter::Platelets,
        SofaParameter::Bilirubin,
        SofaParameter::Gcs,
        SofaParameter::Creatinine,
        SofaParameter::UrineOutput,
    ];

    /// Mapping table entry for this parameter.
    pub fn spec(self) -> &'static ParameterSpec {
        // PARAMETER_SPECS is declared in the same order as `ALL`.
        &PARAMETER_SPECS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    pub fn system(self) -> OrganSystem {
        self.spec().system
    }

    pub fn aggregation(self) -> Aggregation {
        self.spec().aggregation
    }

    /// Whether the imputation chain may fill this parameter.
    ///
    /// Treatment parameters are never imputed: absence means not given.
    pub fn is_imputable(self) -> bool {
        self.spec().imputable
    }

    /// Resolve a concept identifier (name, alias or numeric OMOP id).
    pub fn from_concept(concept: &str) -> Option<Self> {
        let trimmed = concept.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(id) = trimmed.parse::<i64>() {
            return Self::from_omop_concept(id);
        }
        PARAMETER_SPECS
            .iter()
            .find(|spec| {
                spec.name.eq_ignore_ascii_case(trimmed)
                    || spec
                        .concept_names
                        .iter()
                        .any(|alias| alias.eq_ignore_ascii_case(trimmed))
            })
            .map(|spec| spec.parameter)
    }

    pub fn from_omop_concept(id: i64) -> Option<Self> {
        PARAMETER_SPECS
            .iter()
            .find(|spec| spec.omop_concept == id)
            .map(|spec| spec.parameter)
    }

    /// Parameters declared for one organ system.
    pub fn for_system(system: OrganSystem) -> impl Iterator<Item = SofaParameter> {
        Self::ALL
            .into_iter()
            .filter(move |parameter| parameter.system() == system)
    }
}

impl fmt::Display for SofaParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the mapping table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub parameter: SofaParameter,
    /// Canonical snake_case name, also used as output column name.
    pub name: &'static str,
    pub system: OrganSystem,
    pub aggregation: Aggregation,
    pub omop_concept: i64,
    /// Concept names accepted from the measurement store.
    pub concept_names: &'static [&'static str],
    pub unit: &'static str,
    pub imputable: bool,
}

pub static PARAMETER_SPECS: [ParameterSpec; 14] = [
    ParameterSpec {
        parameter: SofaParameter::Pao2,
        name: "pao2",
        system: OrganSystem::Respiratory,
        aggregation: Aggregation::Min,
        omop_concept: 40762499,
        concept_names: &["PaO2", "Partial pressure of oxygen in arterial blood"],
        unit: "mmHg",
        imputable: true,
    },
    ParameterSpec {
        parameter: SofaParameter::Spo2,
        name: "spo2",
        system: OrganSystem::Respiratory,
        aggregation: Aggregation::Min,
        omop_concept: 40764520,
        concept_names: &["SpO2", "Oxygen saturation", "O2 saturation pulseoxymetry"],
        unit: "%",
        imputable: true,
    },
    ParameterSpec {
        parameter: SofaParameter::Fio2,
        name: "fio2",
        system: OrganSystem::Respiratory,
        aggregation: Aggregation::Mean,
        omop_concept: 4353936,
        concept_names: &["FiO2", "Inspired O2 Fraction", "Fraction of inspired oxygen"],
        unit: "%",
        imputable: true,
    },
    ParameterSpec {
        parameter: SofaParameter::MechanicalVentilation,
        name: "mechanical_ventilation",
        system: OrganSystem::Respiratory,
        aggregation: Aggregation::Max,
        omop_concept: 4298651,
        concept_names: &["Mechanical Ventilation", "Ventilation"],
        unit: "flag",
        imputable: false,
    },
    ParameterSpec {
        parameter: SofaParameter::Map,
        name: "map",
        system: OrganSystem::Cardiovascular,
        aggregation: Aggregation::Min,
        omop_concept: 3004249,
        concept_names: &["MAP", "Mean Arterial Pressure", "Mean_Arterial_Pressure"],
        unit: "mmHg",
        imputable: true,
    },
    ParameterSpec {
        parameter: SofaParameter::Dopamine,
        name: "dopamine",
        system: OrganSystem::Cardiovascular,
        aggregation: Aggregation::Max,
        omop_concept: 1307046,
        concept_names: &["Dopamine"],
        unit: "mcg/kg/min",
        imputable: false,
    },
    ParameterSpec {
        parameter: SofaParameter::Epinephrine,
        name: "epinephrine",
        system: OrganSystem::Cardiovascular,
        aggregation: Aggregation::Max,
        omop_concept: 1343916,
        concept_names: &["Epinephrine"],
        unit: "mcg/kg/min",
        imputable: false,
    },
    ParameterSpec {
        parameter: SofaParameter::Norepinephrine,
        name: "norepinephrine",
        system: OrganSystem::Cardiovascular,
        aggregation: Aggregation::Max,
        omop_concept: 1344965,
        concept_names: &["Norepinephrine"],
        unit: "mcg/kg/min",
        imputable: false,
    },
    ParameterSpec {
        parameter: SofaParameter::Dobutamine,
        name: "dobutamine",
        system: OrganSystem::Cardiovascular,
        aggregation: Aggregation::Max,
        omop_concept: 1307863,
        concept_names: &["Dobutamine"],
        unit: "mcg/kg/min",
        imputable: false,
    },
    ParameterSpec {
        parameter: SofaParameter::Platelets,
        name: "platelets",
        system: OrganSystem::Coagulation,
        aggregation: Aggregation::Min,
        omop_concept: 3013650,
        concept_names: &["Platelets", "Platelet Count"],
        unit: "10^3/uL",
        imputable: true,
    },
    ParameterSpec {
        parameter: SofaParameter::Bilirubin,
        name: "bilirubin",
        system: OrganSystem::Liver,
        aggregation: Aggregation::Max,
        omop_concept: 3017044,
        concept_names: &["Bilirubin", "Bilirubin, Total", "Bilirubin total"],
        unit: "mg/dL",
        imputable: true,
    },
    ParameterSpec {
        parameter: SofaParameter::Gcs,
        name: "gcs_total",
        system: OrganSystem::Cns,
        aggregation: Aggregation::Min,
        omop_concept: 3012386,
        concept_names: &["GCS", "Glasgow Coma Scale", "Glasgow_Coma_Scale", "GCS Total"],
        unit: "points",
        imputable: true,
    },
    ParameterSpec {
        parameter: SofaParameter::Creatinine,
        name: "creatinine",
        system: OrganSystem::Renal,
        aggregation: Aggregation::Max,
        omop_concept: 3016723,
        concept_names: &["Creatinine"],
        unit: "mg/dL",
        imputable: true,
    },
    ParameterSpec {
        parameter: SofaParameter::UrineOutput,
        name: "urine_output",
        system: OrganSystem::Renal,
        aggregation: Aggregation::Sum,
        omop_concept: 3012110,
        concept_names: &["Urine Output", "Urine_Output"],
        unit: "mL",
        imputable: true,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_matches_enum() {
        for parameter in SofaParameter::ALL {
            assert_eq!(parameter.spec().parameter, parameter);
        }
    }

    #[test]
    fn concept_lookup_accepts_names_aliases_and_ids() {
        assert_eq!(
            SofaParameter::from_concept("Platelets"),
            Some(SofaParameter::Platelets)
        );
        assert_eq!(
            SofaParameter::from_concept("glasgow coma scale"),
            Some(SofaParameter::Gcs)
        );
        assert_eq!(
            SofaParameter::from_concept("3016723"),
            Some(SofaParameter::Creatinine)
        );
        assert_eq!(SofaParameter::from_concept("Heart Rate"), None);
        assert_eq!(SofaParameter::from_concept("  "), None);
    }

    #[test]
    fn aggregation_reducers() {
        let values = [3.0, 1.0, 2.0];
        assert_eq!(Aggregation::Min.apply(&values), Some(1.0));
        assert_eq!(Aggregation::Max.apply(&values), Some(3.0));
        assert_eq!(Aggregation::Mean.apply(&values), Some(2.0));
        assert_eq!(Aggregation::Sum.apply(&values), Some(6.0));
        assert_eq!(Aggregation::Sum.apply(&[]), None);
    }

    #[test]
    fn every_system_has_parameters() {
        for system in OrganSystem::ALL {
            assert!(SofaParameter::for_system(system).count() > 0, "{system}");
        }
    }
}
