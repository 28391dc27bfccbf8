//! The measurement store seam.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use sofa_model::{IcuStay, Measurement, PatientId, SofaParameter, StayId};

use crate::error::SourceError;

/// Supplies standardized measurements to the engine.
///
/// Range queries are half-open, `[from, until)`, and confined to one stay.
pub trait MeasurementSource {
    /// Every measurement of `stay` in `[from, until)`.
    fn stay_measurements(
        &self,
        stay: &IcuStay,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Measurement>, SourceError>;

    /// Measurements of one parameter of `stay` in `[from, until)`, used for
    /// carrying values forward.
    fn parameter_history(
        &self,
        stay: &IcuStay,
        parameter: SofaParameter,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Measurement>, SourceError> {
        let mut measurements = self.stay_measurements(stay, from, until)?;
        measurements.retain(|m| m.parameter == parameter);
        Ok(measurements)
    }

    /// All measurements of `parameter` for the given patients, or for every
    /// patient when `patients` is `None`.
    fn population_measurements(
        &self,
        parameter: SofaParameter,
        patients: Option<&BTreeSet<PatientId>>,
    ) -> Result<Vec<Measurement>, SourceError>;
}

/// Measurements held in memory, indexed by stay and ordered by time.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMeasurementSource {
    by_stay: BTreeMap<StayId, Vec<Measurement>>,
}

impl InMemoryMeasurementSource {
    pub fn new(measurements: impl IntoIterator<Item = Measurement>) -> Self {
        let mut by_stay: BTreeMap<StayId, Vec<Measurement>> = BTreeMap::new();
        for measurement in measurements {
            by_stay
                .entry(measurement.stay_id)
                .or_default()
                .push(measurement);
        }
        for rows in by_stay.values_mut() {
            rows.sort_by_key(|m| m.timestamp);
        }
        Self { by_stay }
    }

    pub fn len(&self) -> usize {
        self.by_stay.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_stay.is_empty()
    }

    fn range(&self, stay: &IcuStay, from: NaiveDateTime, until: NaiveDateTime) -> &[Measurement] {
        let Some(rows) = self.by_stay.get(&stay.stay_id) else {
            return &[];
        };
        let lo = rows.partition_point(|m| m.timestamp < from);
        let hi = rows.partition_point(|m| m.timestamp < until);
        &rows[lo..hi.max(lo)]
    }
}

impl MeasurementSource for InMemoryMeasurementSource {
    fn stay_measurements(
        &self,
        stay: &IcuStay,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Measurement>, SourceError> {
        Ok(self
            .range(stay, from, until)
            .iter()
            .filter(|m| m.patient_id == stay.patient_id)
            .cloned()
            .collect())
    }

    fn parameter_history(
        &self,
        stay: &IcuStay,
        parameter: SofaParameter,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Measurement>, SourceError> {
        Ok(self
            .range(stay, from, until)
            .iter()
            .filter(|m| m.patient_id == stay.patient_id && m.parameter == parameter)
            .cloned()
            .collect())
    }

    fn population_measurements(
        &self,
        parameter: SofaParameter,
        patients: Option<&BTreeSet<PatientId>>,
    ) -> Result<Vec<Measurement>, SourceError> {
        Ok(self
            .by_stay
            .values()
            .flatten()
            .filter(|m| m.parameter == parameter)
            .filter(|m| patients.is_none_or(|set| set.contains(&m.patient_id)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2180, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn range_queries_are_half_open_and_stay_scoped() {
        let source = InMemoryMeasurementSource::new([
            Measurement::new(1, 10, SofaParameter::Map, 65.0, at(5)),
            Measurement::new(1, 10, SofaParameter::Map, 70.0, at(2)),
            Measurement::new(1, 10, SofaParameter::Gcs, 14.0, at(3)),
            Measurement::new(1, 11, SofaParameter::Map, 80.0, at(3)),
        ]);
        let stay = IcuStay::new(1, 10, at(0), at(10));

        let rows = source.stay_measurements(&stay, at(2), at(5)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, at(2));

        let history = source
            .parameter_history(&stay, SofaParameter::Map, at(0), at(6))
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].value, Some(65.0));
    }

    #[test]
    fn population_query_filters_patients() {
        let source = InMemoryMeasurementSource::new([
            Measurement::new(1, 10, SofaParameter::Platelets, 100.0, at(1)),
            Measurement::new(2, 20, SofaParameter::Platelets, 200.0, at(1)),
        ]);
        let cohort = BTreeSet::from([2]);
        let rows = source
            .population_measurements(SofaParameter::Platelets, Some(&cohort))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, Some(200.0));
        assert_eq!(
            source
                .population_measurements(SofaParameter::Platelets, None)
                .unwrap()
                .len(),
            2
        );
    }
}
