//! Loading of the external collaborators the Gold pipeline consumes:
//! standardized measurements, ICU stays and the disease cohort.

pub mod cohort;
pub mod error;
pub mod frame;
pub mod measurements;
pub mod stays;

pub use cohort::{
    Diagnosis, diagnoses_from_frame, load_cohort, load_diagnoses, normalize_icd_code,
    resolve_cohort,
};
pub use error::{IngestError, Result};
pub use frame::read_frame;
pub use measurements::{MeasurementLoad, load_measurements, measurements_from_frame};
pub use stays::{load_stays, stays_from_frame};
