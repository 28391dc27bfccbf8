//! SOFA scoring engine for the Gold layer.
//!
//! Data flows stay → [`windows`] → [`aggregate`] → [`impute`] → [`scoring`],
//! driven by [`pipeline::SofaPipeline`]. Measurements arrive through the
//! [`MeasurementSource`] trait and records leave through [`ScoreSink`], so the
//! engine itself performs no I/O.

pub mod aggregate;
pub mod error;
pub mod impute;
pub mod pipeline;
pub mod scoring;
pub mod sink;
pub mod source;
pub mod windows;

pub use aggregate::{aggregate, usable_value};
pub use error::{PipelineError, SourceError, WindowError};
pub use impute::{
    Imputer, PopulationMedians, RespiratoryRatio, fio2_fraction, median, respiratory_ratio,
};
pub use pipeline::{REDACTED_VALUE, SofaPipeline, WindowOutcome, drop_reason};
pub use scoring::{
    ScoringContext, VasopressorDoses, cardiovascular_score, cns_score, coagulation_score,
    liver_score, renal_score, respiratory_score, score_window,
};
pub use sink::{MemorySink, ScoreSink};
pub use source::{InMemoryMeasurementSource, MeasurementSource};
pub use windows::{Windows, generate_windows};
