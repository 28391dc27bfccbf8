//! Per-window parameter aggregation.

use std::collections::BTreeMap;

use sofa_model::{
    AggregatedParameterSet, AggregatedValue, Measurement, QualityConfig, SofaParameter,
    TimeWindow,
};

use crate::error::WindowError;

/// Value of a measurement if it may contribute to any statistic: not
/// excluded by its quality flags, finite, and inside the plausible range.
pub fn usable_value(measurement: &Measurement, quality: &QualityConfig) -> Option<f64> {
    if measurement.is_error && quality.exclude_errors {
        return None;
    }
    if measurement.is_outlier && quality.exclude_outliers {
        return None;
    }
    measurement
        .value
        .filter(|value| value.is_finite())
        .filter(|value| quality.is_plausible(measurement.parameter, *value))
}

/// Reduces the in-window measurements of every parameter with its declared
/// aggregation. Parameters without usable measurements are left absent.
///
/// A measurement that is not flagged as an error but carries no finite value
/// violates the store's contract and fails the window.
pub fn aggregate(
    window: &TimeWindow,
    measurements: &[Measurement],
    quality: &QualityConfig,
) -> Result<AggregatedParameterSet, WindowError> {
    let mut grouped: BTreeMap<SofaParameter, Vec<f64>> = BTreeMap::new();
    for measurement in measurements {
        if measurement.stay_id != window.stay_id || !window.contains(measurement.timestamp) {
            continue;
        }
        if !measurement.is_error && !measurement.value.is_some_and(f64::is_finite) {
            return Err(WindowError::MalformedMeasurement {
                key: window.key(),
                parameter: measurement.parameter,
                timestamp: measurement.timestamp,
            });
        }
        if let Some(value) = usable_value(measurement, quality) {
            grouped.entry(measurement.parameter).or_default().push(value);
        }
    }

    let mut set = AggregatedParameterSet::default();
    for (parameter, values) in grouped {
        if let Some(value) = parameter.aggregation().apply(&values) {
            set.insert(
                parameter,
                AggregatedValue {
                    value,
                    measurement_count: values.len(),
                },
            );
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use sofa_model::ParameterValue;

    use super::*;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2180, 7, 23)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow {
            patient_id: 1,
            stay_id: 10,
            start: start(),
            end: start() + Duration::hours(24),
            window_number: 1,
        }
    }

    fn m(parameter: SofaParameter, value: f64, hour: i64) -> Measurement {
        Measurement::new(1, 10, parameter, value, start() + Duration::hours(hour))
    }

    #[test]
    fn applies_declared_reducers() {
        let rows = vec![
            m(SofaParameter::Platelets, 140.0, 1),
            m(SofaParameter::Platelets, 90.0, 5),
            m(SofaParameter::Bilirubin, 1.0, 2),
            m(SofaParameter::Bilirubin, 2.5, 3),
            m(SofaParameter::Fio2, 40.0, 1),
            m(SofaParameter::Fio2, 60.0, 2),
            m(SofaParameter::UrineOutput, 150.0, 4),
            m(SofaParameter::UrineOutput, 200.0, 8),
        ];
        let set = aggregate(&window(), &rows, &QualityConfig::default()).unwrap();
        assert_eq!(set.get(SofaParameter::Platelets), ParameterValue::Present(90.0));
        assert_eq!(set.get(SofaParameter::Bilirubin), ParameterValue::Present(2.5));
        assert_eq!(set.get(SofaParameter::Fio2), ParameterValue::Present(50.0));
        assert_eq!(set.get(SofaParameter::UrineOutput), ParameterValue::Present(350.0));
        assert_eq!(set.measurement_count(SofaParameter::Platelets), 2);
        assert_eq!(set.get(SofaParameter::Gcs), ParameterValue::Absent);
    }

    #[test]
    fn window_end_is_exclusive() {
        let rows = vec![
            m(SofaParameter::Map, 60.0, 24),
            m(SofaParameter::Map, 75.0, 0),
            m(SofaParameter::Map, 50.0, -1),
        ];
        let set = aggregate(&window(), &rows, &QualityConfig::default()).unwrap();
        assert_eq!(set.get(SofaParameter::Map), ParameterValue::Present(75.0));
    }

    #[test]
    fn flagged_and_implausible_values_never_contribute() {
        let rows = vec![
            m(SofaParameter::Gcs, 3.0, 1).outlier(),
            Measurement {
                value: None,
                ..m(SofaParameter::Gcs, 0.0, 2)
            }
            .error(),
            m(SofaParameter::Gcs, 40.0, 3),
            m(SofaParameter::Creatinine, 6.0, 1).outlier(),
        ];
        let set = aggregate(&window(), &rows, &QualityConfig::default()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn unflagged_missing_value_is_malformed() {
        let rows = vec![Measurement {
            value: None,
            ..m(SofaParameter::Map, 0.0, 1)
        }];
        let err = aggregate(&window(), &rows, &QualityConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            WindowError::MalformedMeasurement {
                parameter: SofaParameter::Map,
                ..
            }
        ));
    }
}
