use chrono::NaiveDateTime;
use sofa_model::{RecordKey, SofaParameter, StayId};

/// Failure reported by a [`crate::MeasurementSource`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("measurement source unavailable: {0}")]
    Unavailable(String),

    #[error("measurement query failed for stay {stay_id}: {message}")]
    Query { stay_id: StayId, message: String },
}

/// Failure while processing one window. The window is skipped, except for
/// [`SourceError::Unavailable`], which [`crate::SofaPipeline::run`] turns into
/// [`PipelineError::Source`].
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("{key}: {parameter} measurement at {timestamp} has no usable value")]
    MalformedMeasurement {
        key: RecordKey,
        parameter: SofaParameter,
        timestamp: NaiveDateTime,
    },

    #[error("{key}: {source}")]
    Source {
        key: RecordKey,
        #[source]
        source: SourceError,
    },
}

impl WindowError {
    pub fn key(&self) -> &RecordKey {
        match self {
            Self::MalformedMeasurement { key, .. } | Self::Source { key, .. } => key,
        }
    }
}

/// Fatal failure that aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("population median computation failed: {0}")]
    PopulationMedian(#[source] SourceError),

    #[error("{key}: {source}")]
    Source {
        key: RecordKey,
        #[source]
        source: SourceError,
    },

    #[error("failed to write batch {batch} to the sink: {source}")]
    Sink {
        batch: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] sofa_model::ConfigError),
}
