//! Slot extractors: pure functions pulling structured values out of free text.
//!
//! Each extractor is independent of session state and returns `None` when the
//! value is absent. Range checks (party size, business hours) belong to the
//! caller.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use regex::Regex;

use seatline_core::types::TableType;

/// Phrases that abandon the active flow from any step.
pub const GLOBAL_CANCEL_PHRASES: [&str; 9] = [
    "cancel",
    "stop",
    "exit",
    "start over",
    "reset",
    "quit",
    "nevermind",
    "never mind",
    "abort",
];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("sunday", Weekday::Sun),
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
];

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("Invalid number regex"))
}

fn table_number_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"(?i)table\s*#?\s*(\d+)").expect("Invalid table regex"),
            Regex::new(r"#(\d+)").expect("Invalid hash regex"),
            Regex::new(r"^(\d+)$").expect("Invalid bare number regex"),
        ]
    })
}

fn time_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"(?i)(\d{1,2}):(\d{2})\s*(am|pm)").expect("Invalid h:mm am/pm regex"),
            Regex::new(r"(?i)(\d{1,2})\s*(am|pm)").expect("Invalid h am/pm regex"),
            Regex::new(r"(\d{1,2}):(\d{2})").expect("Invalid 24h regex"),
        ]
    })
}

/// First integer literal in the text.
///
/// Literals too large for `u32` saturate, so callers still see them as out of
/// range rather than absent.
pub fn extract_capacity(text: &str) -> Option<u32> {
    number_re()
        .find(text)
        .map(|m| m.as_str().parse().unwrap_or(u32::MAX))
}

/// Table number from "table 3", "table #3", "#3" or a bare "3", in that order.
pub fn extract_table_number(text: &str) -> Option<u32> {
    let [table, hash, bare] = table_number_res();
    table
        .captures(text)
        .or_else(|| hash.captures(text))
        .or_else(|| bare.captures(text.trim()))
        .and_then(|caps| caps[1].parse().ok())
}

/// "vip" wins over "regular" when both appear.
pub fn extract_table_type(text: &str) -> Option<TableType> {
    let lower = text.to_lowercase();
    if lower.contains("vip") {
        Some(TableType::Vip)
    } else if lower.contains("regular") {
        Some(TableType::Regular)
    } else {
        None
    }
}

/// Time of day from `H:MM am/pm`, `H am/pm` or 24-hour `H:MM`, in that priority.
///
/// 12pm is noon and 12am is midnight. Values that are not a real clock time
/// (e.g. "25:00") are treated as absent.
pub fn extract_time(text: &str) -> Option<NaiveTime> {
    let [hm_ampm, h_ampm, hm] = time_res();

    let (hour, minute, meridiem) = if let Some(c) = hm_ampm.captures(text) {
        (c[1].parse::<u32>().ok()?, c[2].parse::<u32>().ok()?, Some(c[3].to_lowercase()))
    } else if let Some(c) = h_ampm.captures(text) {
        (c[1].parse::<u32>().ok()?, 0, Some(c[2].to_lowercase()))
    } else if let Some(c) = hm.captures(text) {
        (c[1].parse::<u32>().ok()?, c[2].parse::<u32>().ok()?, None)
    } else {
        return None;
    };

    let hour = match meridiem.as_deref() {
        Some("pm") if hour < 12 => hour + 12,
        Some("am") if hour == 12 => 0,
        _ => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Calendar date from "today", "tomorrow", "day after tomorrow" or a weekday.
///
/// Weekdays always resolve to the next occurrence: naming today's weekday
/// yields the date seven days out, never today.
pub fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = text.to_lowercase();

    if lower.contains("today") {
        return Some(today);
    }
    if lower.contains("day after tomorrow") {
        return Some(today + Duration::days(2));
    }
    if lower.contains("tomorrow") {
        return Some(today + Duration::days(1));
    }

    WEEKDAYS
        .iter()
        .find(|(name, _)| lower.contains(name))
        .map(|(_, target)| {
            let current = i64::from(today.weekday().num_days_from_sunday());
            let target = i64::from(target.num_days_from_sunday());
            let mut days_until = target - current;
            if days_until <= 0 {
                days_until += 7;
            }
            today + Duration::days(days_until)
        })
}

/// Whether the text abandons the active flow.
pub fn is_global_cancel(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    GLOBAL_CANCEL_PHRASES
        .iter()
        .any(|phrase| lower == *phrase || lower.contains(phrase))
}
