pub mod config;
pub mod error;
pub mod measurement;
pub mod parameter;
pub mod score;
pub mod stay;
pub mod summary;
pub mod value;
pub mod window;

pub use config::{
    BatchConfig, CohortConfig, GoldConfig, ImputationConfig, MissingDataConfig, PlausibleRange,
    QualityConfig, WindowingConfig,
};
pub use error::{ConfigError, Result};
pub use measurement::{Measurement, PatientId, StayId};
pub use parameter::{Aggregation, OrganSystem, PARAMETER_SPECS, ParameterSpec, SofaParameter};
pub use score::{
    HIGH_RISK_THRESHOLD, MAX_SUBSCORE, MAX_TOTAL, RecordKey, SeverityCategory, SofaScoreRecord,
    Subscore, Subscores,
};
pub use stay::{Cohort, CohortMembership, IcuStay, StayEligibility};
pub use summary::{DropReason, ImputationCounts, RunSummary};
pub use value::{
    AggregatedParameterSet, AggregatedValue, ImputationMethod, ParameterValue,
    ResolvedParameters, ResolvedValue,
};
pub use window::TimeWindow;
