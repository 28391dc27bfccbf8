use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sofa_model::{OrganSystem, RecordKey, SofaParameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

impl IssueSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// One finding, aggregated over every record it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Stable check code, e.g. `GOLD003`.
    pub code: String,
    pub message: String,
    pub severity: IssueSeverity,
    /// Records affected.
    pub count: u64,
    /// First affected record, when the check is per record.
    pub example: Option<RecordKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub records_checked: usize,
    pub issues: Vec<ValidationIssue>,
    /// Share of records with an imputed value, per parameter, in percent.
    pub imputation_rates: BTreeMap<SofaParameter, f64>,
    /// Records with an unknown subscore, per system.
    pub missing_components: BTreeMap<OrganSystem, usize>,
    pub cohort_distribution: BTreeMap<String, usize>,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.count(IssueSeverity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(IssueSeverity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn issue(&self, code: &str) -> Option<&ValidationIssue> {
        self.issues.iter().find(|issue| issue.code == code)
    }

    fn count(&self, severity: IssueSeverity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }
}
