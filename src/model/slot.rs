use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// One bookable (date, hour) combination on the league calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub hour: u32,
}

impl TimeSlot {
    pub fn start(&self) -> NaiveDateTime {
        // Hours come from the fixed evening window, always < 24
        let time = NaiveTime::from_hms_opt(self.hour, 0, 0).unwrap_or_default();
        self.date.and_time(time)
    }
}
