use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::model::slot::TimeSlot;

/// Weekdays on which matches may be played.
pub const MATCH_DAYS: [Weekday; 4] = [Weekday::Mon, Weekday::Tue, Weekday::Thu, Weekday::Fri];
pub const FIRST_HOUR: u32 = 19;
pub const LAST_HOUR: u32 = 23;
pub const SLOTS_PER_WEEK: usize = MATCH_DAYS.len() * (LAST_HOUR - FIRST_HOUR + 1) as usize;
/// Extra weeks appended to a schedule to leave room for rescheduling.
pub const DEFAULT_BUFFER_WEEKS: u32 = 2;
/// Longest buffer honoured; larger values are clamped.
pub const MAX_BUFFER_WEEKS: u32 = 52;

pub fn is_match_day(date: NaiveDate) -> bool {
    MATCH_DAYS.contains(&date.weekday())
}

/// Lazy, chronological walk over every eligible slot between two dates (both inclusive).
/// Clone it to restart from the beginning.
#[derive(Debug, Clone)]
pub struct TimeSlots {
    next: Option<TimeSlot>,
    end: NaiveDate,
}

impl TimeSlots {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        let next = first_match_day(start, end).map(|date| TimeSlot { date, hour: FIRST_HOUR });
        Self { next, end }
    }
}

impl Iterator for TimeSlots {
    type Item = TimeSlot;

    fn next(&mut self) -> Option<TimeSlot> {
        let current = self.next?;
        self.next = if current.hour < LAST_HOUR {
            Some(TimeSlot { date: current.date, hour: current.hour + 1 })
        } else {
            current
                .date
                .succ_opt()
                .and_then(|d| first_match_day(d, self.end))
                .map(|date| TimeSlot { date, hour: FIRST_HOUR })
        };
        Some(current)
    }
}

fn first_match_day(from: NaiveDate, end: NaiveDate) -> Option<NaiveDate> {
    from.iter_days().take_while(|d| *d <= end).find(|d| is_match_day(*d))
}

/// Number of round-robin matches needed for two cycles of the given sizes.
pub fn required_matches(cycle_a: usize, cycle_b: usize) -> usize {
    pairs(cycle_a) + pairs(cycle_b)
}

fn pairs(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Last day of a schedule that has to fit `required` matches starting at `start`.
///
/// Enough whole weeks for the matches plus `buffer_weeks`, then pushed forward to the
/// following Friday (or kept if it already is one). The buffer is capped at
/// [`MAX_BUFFER_WEEKS`] and the result saturates at the last representable date.
pub fn schedule_end_date(start: NaiveDate, required: usize, buffer_weeks: u32) -> NaiveDate {
    let weeks_needed = i64::try_from(required.div_ceil(SLOTS_PER_WEEK)).unwrap_or(i64::MAX);
    let total_weeks = weeks_needed.saturating_add(i64::from(buffer_weeks.min(MAX_BUFFER_WEEKS)));
    let Some(end) = Duration::try_weeks(total_weeks).and_then(|span| start.checked_add_signed(span)) else {
        return NaiveDate::MAX;
    };
    let to_friday = (4 + 7 - i64::from(end.weekday().num_days_from_monday())) % 7;
    end.checked_add_signed(Duration::days(to_friday)).unwrap_or(NaiveDate::MAX)
}
