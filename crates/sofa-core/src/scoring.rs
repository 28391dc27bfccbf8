//! SOFA organ subscores.
//!
//! Each organ system maps its (possibly imputed) inputs onto a 0-4 band. A
//! system with no inputs at all scores [`Subscore::Unknown`], never zero.
//! Thresholds are continuous so imputed medians such as GCS 14.5 band
//! predictably.

use sofa_model::{
    Cohort, OrganSystem, ResolvedParameters, SeverityCategory, SofaParameter, SofaScoreRecord,
    Subscore, Subscores, TimeWindow,
};

use crate::impute::{RespiratoryRatio, respiratory_ratio};

/// A band a value fell into, with the note describing it.
#[derive(Debug, Clone, PartialEq)]
struct Band {
    points: u8,
    note: String,
}

impl Band {
    fn new(points: u8, note: impl Into<String>) -> Self {
        Self {
            points,
            note: note.into(),
        }
    }
}

fn respiratory_band(ratio: f64, ventilated: bool, label: &str) -> Band {
    let (points, range) = if ratio >= 400.0 {
        (0, ">= 400")
    } else if ratio >= 300.0 {
        (1, "< 400")
    } else if ratio >= 200.0 {
        (2, "< 300")
    } else if ratio >= 100.0 {
        if ventilated { (3, "< 200 with ventilation") } else { (2, "< 200") }
    } else if ventilated {
        (4, "< 100 with ventilation")
    } else {
        (3, "< 100")
    };
    Band::new(points, format!("Respiratory: {label} {range}"))
}

/// Respiratory points for a PaO2/FiO2 (or surrogate) ratio.
pub fn respiratory_score(ratio: f64, ventilated: bool) -> u8 {
    respiratory_band(ratio, ventilated, "PaO2/FiO2").points
}

/// Vasopressor doses in mcg/kg/min. `None` means not administered.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VasopressorDoses {
    pub dopamine: Option<f64>,
    pub epinephrine: Option<f64>,
    pub norepinephrine: Option<f64>,
    pub dobutamine: Option<f64>,
}

impl VasopressorDoses {
    pub fn from_resolved(resolved: &ResolvedParameters) -> Self {
        Self {
            dopamine: resolved.value(SofaParameter::Dopamine),
            epinephrine: resolved.value(SofaParameter::Epinephrine),
            norepinephrine: resolved.value(SofaParameter::Norepinephrine),
            dobutamine: resolved.value(SofaParameter::Dobutamine),
        }
    }

    fn dose(value: Option<f64>) -> f64 {
        value.unwrap_or(0.0)
    }
}

fn cardiovascular_band(map: Option<f64>, doses: VasopressorDoses) -> Option<Band> {
    let dopamine = VasopressorDoses::dose(doses.dopamine);
    let epinephrine = VasopressorDoses::dose(doses.epinephrine);
    let norepinephrine = VasopressorDoses::dose(doses.norepinephrine);
    let dobutamine = VasopressorDoses::dose(doses.dobutamine);

    if dopamine > 15.0 || epinephrine > 0.1 || norepinephrine > 0.1 {
        return Some(Band::new(4, "Cardiovascular: high-dose vasopressors"));
    }
    if dopamine > 5.0 || epinephrine > 0.0 || norepinephrine > 0.0 {
        return Some(Band::new(3, "Cardiovascular: moderate-dose vasopressors"));
    }
    if dopamine > 0.0 || dobutamine > 0.0 {
        return Some(Band::new(2, "Cardiovascular: low-dose dopamine or dobutamine"));
    }
    map.map(|map| {
        if map >= 70.0 {
            Band::new(0, "Cardiovascular: MAP >= 70")
        } else {
            Band::new(1, "Cardiovascular: MAP < 70")
        }
    })
}

/// Vasopressor dose takes priority over MAP.
pub fn cardiovascular_score(map: Option<f64>, doses: VasopressorDoses) -> Subscore {
    to_subscore(cardiovascular_band(map, doses).as_ref())
}

fn coagulation_band(platelets: f64) -> Band {
    let (points, range) = if platelets >= 150.0 {
        (0, ">= 150")
    } else if platelets >= 100.0 {
        (1, "< 150")
    } else if platelets >= 50.0 {
        (2, "< 100")
    } else if platelets >= 20.0 {
        (3, "< 50")
    } else {
        (4, "< 20")
    };
    Band::new(points, format!("Coagulation: platelets {range}"))
}

pub fn coagulation_score(platelets: f64) -> u8 {
    coagulation_band(platelets).points
}

fn liver_band(bilirubin: f64) -> Band {
    let (points, range) = if bilirubin < 1.2 {
        (0, "< 1.2")
    } else if bilirubin < 2.0 {
        (1, ">= 1.2")
    } else if bilirubin < 6.0 {
        (2, ">= 2.0")
    } else if bilirubin < 12.0 {
        (3, ">= 6.0")
    } else {
        (4, ">= 12.0")
    };
    Band::new(points, format!("Liver: bilirubin {range}"))
}

pub fn liver_score(bilirubin: f64) -> u8 {
    liver_band(bilirubin).points
}

fn cns_band(gcs: f64) -> Band {
    let (points, range) = if gcs >= 15.0 {
        (0, "15")
    } else if gcs >= 13.0 {
        (1, "< 15")
    } else if gcs >= 10.0 {
        (2, "< 13")
    } else if gcs >= 6.0 {
        (3, "< 10")
    } else {
        (4, "< 6")
    };
    Band::new(points, format!("CNS: GCS {range}"))
}

pub fn cns_score(gcs: f64) -> u8 {
    cns_band(gcs).points
}

fn creatinine_band(creatinine: f64) -> Band {
    let (points, range) = if creatinine < 1.2 {
        (0, "< 1.2")
    } else if creatinine < 2.0 {
        (1, ">= 1.2")
    } else if creatinine < 3.5 {
        (2, ">= 2.0")
    } else if creatinine < 5.0 {
        (3, ">= 3.5")
    } else {
        (4, ">= 5.0")
    };
    Band::new(points, format!("Renal: creatinine {range}"))
}

fn urine_band(urine_output: f64) -> Band {
    let (points, range) = if urine_output >= 500.0 {
        (0, ">= 500 mL")
    } else if urine_output >= 200.0 {
        (3, "< 500 mL")
    } else {
        (4, "< 200 mL")
    };
    Band::new(points, format!("Renal: urine output {range}"))
}

fn renal_band(creatinine: Option<f64>, urine_output: Option<f64>) -> Option<Band> {
    match (creatinine.map(creatinine_band), urine_output.map(urine_band)) {
        (Some(creatinine), Some(urine)) => {
            Some(if urine.points > creatinine.points { urine } else { creatinine })
        }
        (Some(band), None) | (None, Some(band)) => Some(band),
        (None, None) => None,
    }
}

/// Worse of the creatinine and urine output scores.
pub fn renal_score(creatinine: Option<f64>, urine_output: Option<f64>) -> Subscore {
    to_subscore(renal_band(creatinine, urine_output).as_ref())
}

fn to_subscore(band: Option<&Band>) -> Subscore {
    band.map_or(Subscore::Unknown, |band| Subscore::score(band.points))
}

/// Context attached to every record of a window.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub cohort: Cohort,
    pub cohort_label: &'a str,
    pub surrogate_enabled: bool,
}

/// Scores one window from its resolved parameters.
pub fn score_window(
    window: &TimeWindow,
    resolved: &ResolvedParameters,
    context: ScoringContext<'_>,
) -> SofaScoreRecord {
    let ventilated = resolved
        .value(SofaParameter::MechanicalVentilation)
        .is_some_and(|flag| flag > 0.0);
    let ratio = respiratory_ratio(resolved, context.surrogate_enabled);

    let bands = [
        (
            OrganSystem::Respiratory,
            ratio.map(|RespiratoryRatio { value, surrogate }| {
                let label = if surrogate { "SpO2/FiO2" } else { "PaO2/FiO2" };
                respiratory_band(value, ventilated, label)
            }),
        ),
        (
            OrganSystem::Cardiovascular,
            cardiovascular_band(
                resolved.value(SofaParameter::Map),
                VasopressorDoses::from_resolved(resolved),
            ),
        ),
        (
            OrganSystem::Coagulation,
            resolved.value(SofaParameter::Platelets).map(coagulation_band),
        ),
        (
            OrganSystem::Liver,
            resolved.value(SofaParameter::Bilirubin).map(liver_band),
        ),
        (OrganSystem::Cns, resolved.value(SofaParameter::Gcs).map(cns_band)),
        (
            OrganSystem::Renal,
            renal_band(
                resolved.value(SofaParameter::Creatinine),
                resolved.value(SofaParameter::UrineOutput),
            ),
        ),
    ];

    let mut subscores = Subscores::default();
    let mut notes = Vec::new();
    for (system, band) in &bands {
        subscores.set(*system, to_subscore(band.as_ref()));
        if let Some(band) = band {
            notes.push(band.note.as_str());
        }
    }

    SofaScoreRecord {
        patient_id: window.patient_id,
        stay_id: window.stay_id,
        window_start: window.start,
        window_end: window.end,
        window_number: window.window_number,
        icu_day: window.icu_day(),
        total: subscores.total(),
        severity: SeverityCategory::classify(&subscores),
        missing_components: subscores.missing(),
        subscores,
        cohort: context.cohort,
        cohort_label: context.cohort_label.to_string(),
        values: resolved
            .iter()
            .map(|(parameter, value)| (parameter, value.value))
            .collect(),
        pf_ratio: ratio.map(|ratio| ratio.value),
        ventilated,
        imputation: resolved.imputation_flags(),
        spo2_fio2_surrogate: ratio.is_some_and(|ratio| ratio.surrogate),
        notes: notes.join("; "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respiratory_bands() {
        assert_eq!(respiratory_score(400.0, false), 0);
        assert_eq!(respiratory_score(399.9, false), 1);
        assert_eq!(respiratory_score(250.0, false), 2);
        assert_eq!(respiratory_score(150.0, false), 2);
        assert_eq!(respiratory_score(150.0, true), 3);
        assert_eq!(respiratory_score(80.0, false), 3);
        assert_eq!(respiratory_score(80.0, true), 4);
    }

    #[test]
    fn cardiovascular_priority() {
        let none = VasopressorDoses::default();
        assert_eq!(cardiovascular_score(Some(50.0), none), Subscore::Score(1));
        assert_eq!(cardiovascular_score(Some(70.0), none), Subscore::Score(0));
        assert_eq!(cardiovascular_score(None, none), Subscore::Unknown);

        let dopamine = |dose| VasopressorDoses {
            dopamine: Some(dose),
            ..VasopressorDoses::default()
        };
        assert_eq!(cardiovascular_score(Some(50.0), dopamine(10.0)), Subscore::Score(3));
        assert_eq!(cardiovascular_score(Some(50.0), dopamine(4.0)), Subscore::Score(2));
        assert_eq!(cardiovascular_score(None, dopamine(16.0)), Subscore::Score(4));
        assert_eq!(cardiovascular_score(Some(90.0), dopamine(0.0)), Subscore::Score(0));

        let norepinephrine = VasopressorDoses {
            norepinephrine: Some(0.05),
            ..VasopressorDoses::default()
        };
        assert_eq!(cardiovascular_score(Some(80.0), norepinephrine), Subscore::Score(3));
        let epinephrine = VasopressorDoses {
            epinephrine: Some(0.2),
            ..VasopressorDoses::default()
        };
        assert_eq!(cardiovascular_score(None, epinephrine), Subscore::Score(4));
        let dobutamine = VasopressorDoses {
            dobutamine: Some(2.5),
            ..VasopressorDoses::default()
        };
        assert_eq!(cardiovascular_score(Some(80.0), dobutamine), Subscore::Score(2));
    }

    #[test]
    fn laboratory_bands() {
        assert_eq!(coagulation_score(150.0), 0);
        assert_eq!(coagulation_score(149.0), 1);
        assert_eq!(coagulation_score(50.0), 2);
        assert_eq!(coagulation_score(20.0), 3);
        assert_eq!(coagulation_score(19.9), 4);

        assert_eq!(liver_score(1.1), 0);
        assert_eq!(liver_score(1.2), 1);
        assert_eq!(liver_score(5.9), 2);
        assert_eq!(liver_score(6.0), 3);
        assert_eq!(liver_score(12.0), 4);

        assert_eq!(cns_score(15.0), 0);
        assert_eq!(cns_score(14.5), 1);
        assert_eq!(cns_score(10.0), 2);
        assert_eq!(cns_score(6.0), 3);
        assert_eq!(cns_score(3.0), 4);
    }

    #[test]
    fn renal_takes_the_worse_component() {
        assert_eq!(renal_score(Some(4.0), Some(150.0)), Subscore::Score(4));
        assert_eq!(renal_score(Some(5.5), Some(600.0)), Subscore::Score(4));
        assert_eq!(renal_score(Some(1.0), Some(300.0)), Subscore::Score(3));
        assert_eq!(renal_score(None, Some(600.0)), Subscore::Score(0));
        assert_eq!(renal_score(Some(2.0), None), Subscore::Score(2));
        assert_eq!(renal_score(None, None), Subscore::Unknown);
    }
}
