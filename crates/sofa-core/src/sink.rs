//! The persistence seam.

use std::collections::BTreeMap;
use std::convert::Infallible;

use sofa_model::{RecordKey, SofaScoreRecord};

/// Receives scored records in batches.
///
/// `replace` must delete any stored row sharing a key with `records` before
/// inserting them, so repeated runs over the same input leave one row per
/// (patient, stay, window_start).
pub trait ScoreSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the number of rows written.
    fn replace(&mut self, records: &[SofaScoreRecord]) -> Result<usize, Self::Error>;
}

/// Keyed in-memory sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    rows: BTreeMap<RecordKey, SofaScoreRecord>,
    writes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of `replace` calls received.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn get(&self, key: &RecordKey) -> Option<&SofaScoreRecord> {
        self.rows.get(key)
    }

    /// Stored records in key order.
    pub fn records(&self) -> impl Iterator<Item = &SofaScoreRecord> {
        self.rows.values()
    }

    pub fn into_records(self) -> Vec<SofaScoreRecord> {
        self.rows.into_values().collect()
    }
}

impl ScoreSink for MemorySink {
    type Error = Infallible;

    fn replace(&mut self, records: &[SofaScoreRecord]) -> Result<usize, Self::Error> {
        for record in records {
            self.rows.remove(&record.key());
        }
        for record in records {
            self.rows.insert(record.key(), record.clone());
        }
        self.writes += 1;
        Ok(records.len())
    }
}
