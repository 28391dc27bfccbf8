//! Validation of Gold-layer SOFA records after a run.

mod checks;
mod report;

pub use checks::{HIGH_IMPUTATION_RATE_PCT, validate_records};
pub use report::{IssueSeverity, ValidationIssue, ValidationReport};
