//! Gold-layer outputs.
//!
//! - [`CsvScoreSink`]: the score table, keyed by (patient, stay,
//!   window_start) so re-runs replace rather than duplicate rows
//! - [`write_json_report`]: run summaries and validation reports

mod error;
mod frame;
mod report;
mod table;

pub use error::{Result, SinkError};
pub use frame::{KEY_COLUMNS, records_to_frame, row_key, score_columns};
pub use report::write_json_report;
pub use table::CsvScoreSink;
