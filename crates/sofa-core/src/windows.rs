//! Window generation.

use chrono::NaiveDateTime;
use sofa_model::{IcuStay, TimeWindow, WindowingConfig};

/// Sequential windows over one stay, starting at admission.
///
/// Each window spans the configured duration, the last one is clipped to
/// discharge, and generation stops at `max_windows_per_stay`. The iterator is
/// a pure function of the stay and config, so it can be recreated at will.
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    stay: &'a IcuStay,
    config: &'a WindowingConfig,
    next_start: NaiveDateTime,
    next_number: u32,
}

impl<'a> Windows<'a> {
    pub fn new(stay: &'a IcuStay, config: &'a WindowingConfig) -> Self {
        Self {
            stay,
            config,
            next_start: stay.intime,
            next_number: 1,
        }
    }
}

impl Iterator for Windows<'_> {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        if self.next_number > self.config.max_windows_per_stay
            || self.next_start >= self.stay.outtime
        {
            return None;
        }
        let start = self.next_start;
        let end = start
            .checked_add_signed(self.config.window_duration())
            .map_or(self.stay.outtime, |end| end.min(self.stay.outtime));
        let window = TimeWindow {
            patient_id: self.stay.patient_id,
            stay_id: self.stay.stay_id,
            start,
            end,
            window_number: self.next_number,
        };
        self.next_start = end;
        self.next_number += 1;
        Some(window)
    }
}

pub fn generate_windows(stay: &IcuStay, config: &WindowingConfig) -> Vec<TimeWindow> {
    Windows::new(stay, config).collect()
}
