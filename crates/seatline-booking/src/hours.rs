//! Business hours and bookable time slots.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// First bookable hour (inclusive).
pub const OPEN_HOUR: u32 = 10;
/// Closing hour (exclusive): the last slot starts half an hour before.
pub const CLOSE_HOUR: u32 = 22;
pub const SLOT_MINUTES: u32 = 30;
/// Minimum notice for a reservation made through the assistant.
pub const MIN_NOTICE_MINUTES: i64 = 30;

const QUICK_PICKS: usize = 5;
const SUMMARY_SLOTS: usize = 12;

/// Whether a start time falls inside business hours.
pub fn is_open(time: NaiveTime) -> bool {
    (OPEN_HOUR..CLOSE_HOUR).contains(&time.hour())
}

/// Whether `start` is far enough ahead of `now` to be booked.
pub fn has_notice(start: NaiveDateTime, now: NaiveDateTime) -> bool {
    start > now + Duration::minutes(MIN_NOTICE_MINUTES)
}

/// "7:30 PM"
pub fn format_clock(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// "Saturday, Mar 14"
pub fn format_day(date: NaiveDate) -> String {
    date.format("%A, %b %-d").to_string()
}

/// Half-hour slots offered for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlots {
    slots: Vec<NaiveTime>,
}

impl TimeSlots {
    /// All slots for `date`, dropping those without enough notice when the
    /// date is today. Past dates have no slots.
    pub fn for_date(date: NaiveDate, now: NaiveDateTime) -> Self {
        if date < now.date() {
            return Self { slots: Vec::new() };
        }

        let slots = (OPEN_HOUR..CLOSE_HOUR)
            .flat_map(|hour| (0..60).step_by(SLOT_MINUTES as usize).map(move |m| (hour, m)))
            .filter_map(|(hour, minute)| NaiveTime::from_hms_opt(hour, minute, 0))
            .filter(|time| date != now.date() || has_notice(date.and_time(*time), now))
            .collect();

        Self { slots }
    }

    pub fn slots(&self) -> &[NaiveTime] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Up to five evenly spaced slots, followed by "Cancel".
    pub fn quick_replies(&self) -> Vec<String> {
        let step = (self.slots.len() / QUICK_PICKS).max(1);
        let mut replies: Vec<String> = self
            .slots
            .iter()
            .step_by(step)
            .take(QUICK_PICKS)
            .map(|t| format_clock(*t))
            .collect();
        replies.push("Cancel".to_string());
        replies
    }

    /// The first dozen slots on one line, with a count of the rest.
    pub fn summary(&self) -> String {
        let shown: Vec<String> = self
            .slots
            .iter()
            .take(SUMMARY_SLOTS)
            .map(|t| format_clock(*t))
            .collect();
        let mut text = shown.join(" • ");
        if self.slots.len() > SUMMARY_SLOTS {
            text.push_str(&format!(
                "\n...and {} more slots",
                self.slots.len() - SUMMARY_SLOTS
            ));
        }
        text
    }
}
