use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::measurement::{PatientId, StayId};
use crate::score::RecordKey;

/// A slice `[start, end)` of one ICU stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub patient_id: PatientId,
    pub stay_id: StayId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// 1-based, gapless within a stay.
    pub window_number: u32,
}

impl TimeWindow {
    /// ICU day is the window number.
    pub fn icu_day(&self) -> u32 {
        self.window_number
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            patient_id: self.patient_id,
            stay_id: self.stay_id,
            window_start: self.start,
        }
    }
}
