//! Record-level and run-level checks over produced Gold records.

use std::collections::{BTreeMap, BTreeSet};

use sofa_model::{
    GoldConfig, MAX_SUBSCORE, MAX_TOTAL, OrganSystem, RecordKey, SeverityCategory, SofaParameter,
    SofaScoreRecord, StayId,
};

use crate::report::{IssueSeverity, ValidationIssue, ValidationReport};

/// Imputation rates above this percentage raise a warning.
pub const HIGH_IMPUTATION_RATE_PCT: f64 = 50.0;

/// Accumulates matches for one check code.
struct Tally {
    code: &'static str,
    message: &'static str,
    severity: IssueSeverity,
    count: u64,
    example: Option<RecordKey>,
}

impl Tally {
    fn new(code: &'static str, severity: IssueSeverity, message: &'static str) -> Self {
        Self {
            code,
            message,
            severity,
            count: 0,
            example: None,
        }
    }

    fn hit(&mut self, key: RecordKey) {
        self.count += 1;
        self.example.get_or_insert(key);
    }

    fn into_issue(self) -> Option<ValidationIssue> {
        (self.count > 0).then(|| ValidationIssue {
            code: self.code.to_string(),
            message: self.message.to_string(),
            severity: self.severity,
            count: self.count,
            example: self.example,
        })
    }
}

/// Validates records of one run.
pub fn validate_records(records: &[SofaScoreRecord], config: &GoldConfig) -> ValidationReport {
    let mut total_range = Tally::new("GOLD001", IssueSeverity::Error, "total SOFA outside 0-24");
    let mut subscore_range =
        Tally::new("GOLD002", IssueSeverity::Error, "organ subscore outside 0-4");
    let mut total_sum = Tally::new(
        "GOLD003",
        IssueSeverity::Error,
        "total SOFA differs from the sum of known subscores",
    );
    let mut window_order = Tally::new(
        "GOLD004",
        IssueSeverity::Error,
        "window start is not before window end",
    );
    let mut icu_day = Tally::new(
        "GOLD005",
        IssueSeverity::Error,
        "ICU day differs from window number",
    );
    let mut severity = Tally::new(
        "GOLD006",
        IssueSeverity::Error,
        "severity category inconsistent with total",
    );
    let mut missing = Tally::new(
        "GOLD007",
        IssueSeverity::Error,
        "missing-component list inconsistent with subscores",
    );
    let mut duplicate = Tally::new(
        "GOLD008",
        IssueSeverity::Error,
        "duplicate (patient, stay, window_start) key",
    );
    let mut overlap = Tally::new(
        "GOLD009",
        IssueSeverity::Error,
        "windows of one stay overlap",
    );
    let mut ratio = Tally::new(
        "GOLD010",
        IssueSeverity::Warning,
        "PaO2/FiO2 ratio outside plausible range",
    );
    let mut drop_rule = Tally::new(
        "GOLD011",
        IssueSeverity::Error,
        "record violates the missing-component drop rule",
    );

    let mut report = ValidationReport {
        records_checked: records.len(),
        ..ValidationReport::default()
    };
    let mut keys = BTreeSet::new();
    let mut by_stay: BTreeMap<StayId, Vec<&SofaScoreRecord>> = BTreeMap::new();
    let mut imputed: BTreeMap<SofaParameter, usize> = BTreeMap::new();

    for record in records {
        let key = record.key();
        if record.total > MAX_TOTAL {
            total_range.hit(key);
        }
        if record
            .subscores
            .iter()
            .any(|(_, subscore)| subscore.points().is_some_and(|points| points > MAX_SUBSCORE))
        {
            subscore_range.hit(key);
        }
        if u32::from(record.total)
            != record
                .subscores
                .iter()
                .filter_map(|(_, subscore)| subscore.points())
                .map(u32::from)
                .sum::<u32>()
        {
            total_sum.hit(key);
        }
        if record.window_start >= record.window_end {
            window_order.hit(key);
        }
        if record.icu_day != record.window_number {
            icu_day.hit(key);
        }
        if record.severity != SeverityCategory::classify(&record.subscores) {
            severity.hit(key);
        }
        if record.missing_components != record.subscores.missing() {
            missing.hit(key);
        }
        if !keys.insert(key) {
            duplicate.hit(key);
        }
        if record
            .pf_ratio
            .is_some_and(|value| !config.quality.pf_ratio_range.contains(value))
        {
            ratio.hit(key);
        }
        let policy = &config.missing_data;
        if record.missing_count() > policy.max_missing_components
            || (policy.require_respiratory && !record.subscores.respiratory.is_known())
        {
            drop_rule.hit(key);
        }

        for system in &record.missing_components {
            *report.missing_components.entry(*system).or_default() += 1;
        }
        for parameter in record.imputation.keys() {
            *imputed.entry(*parameter).or_default() += 1;
        }
        *report
            .cohort_distribution
            .entry(record.cohort_label.clone())
            .or_default() += 1;
        by_stay.entry(record.stay_id).or_default().push(record);
    }

    for stay_records in by_stay.values_mut() {
        stay_records.sort_by_key(|record| record.window_start);
        for pair in stay_records.windows(2) {
            if pair[1].window_start < pair[0].window_end {
                overlap.hit(pair[1].key());
            }
        }
    }

    report.issues.extend(
        [
            total_range,
            subscore_range,
            total_sum,
            window_order,
            icu_day,
            severity,
            missing,
            duplicate,
            overlap,
            ratio,
            drop_rule,
        ]
        .into_iter()
        .filter_map(Tally::into_issue),
    );

    if !records.is_empty() {
        for (parameter, count) in imputed {
            let rate = count as f64 * 100.0 / records.len() as f64;
            report.imputation_rates.insert(parameter, rate);
            if rate > HIGH_IMPUTATION_RATE_PCT {
                report.issues.push(ValidationIssue {
                    code: "GOLD012".to_string(),
                    message: format!("{parameter} imputed in {rate:.1}% of records"),
                    severity: IssueSeverity::Warning,
                    count: count as u64,
                    example: None,
                });
            }
        }
    }

    for system in OrganSystem::ALL {
        let count = report.missing_components.get(&system).copied().unwrap_or(0);
        if count > 0 {
            report.issues.push(ValidationIssue {
                code: "GOLD013".to_string(),
                message: format!("{} subscore unknown", system.label()),
                severity: IssueSeverity::Info,
                count: count as u64,
                example: None,
            });
        }
    }

    if report.cohort_distribution.len() < 2 && !records.is_empty() {
        report.issues.push(ValidationIssue {
            code: "GOLD014".to_string(),
            message: "records cover a single cohort".to_string(),
            severity: IssueSeverity::Info,
            count: records.len() as u64,
            example: None,
        });
    }

    tracing::info!(
        records = report.records_checked,
        errors = report.error_count(),
        warnings = report.warning_count(),
        "gold validation complete"
    );
    report
}
