//! Epoch-millisecond helpers.
//!
//! Timestamps are stored as milliseconds since the Unix epoch. Calendar
//! questions (same day, "Today") are answered in a caller-supplied time zone
//! so the viewer's local zone can be used in production and a fixed one in
//! tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_datetime<Tz: TimeZone>(millis: i64, tz: &Tz) -> Option<DateTime<Tz>> {
    tz.timestamp_millis_opt(millis).single()
}

/// Calendar day of `millis` in `tz`.
pub fn calendar_day<Tz: TimeZone>(millis: i64, tz: &Tz) -> Option<NaiveDate> {
    to_datetime(millis, tz).map(|dt| dt.date_naive())
}

/// Whether two timestamps fall on the same calendar day in `tz`.
///
/// A zero timestamp means "no previous message" and never matches.
pub fn is_same_day<Tz: TimeZone>(t1: i64, t2: i64, tz: &Tz) -> bool {
    if t1 == 0 || t2 == 0 {
        return false;
    }
    match (calendar_day(t1, tz), calendar_day(t2, tz)) {
        (Some(d1), Some(d2)) => d1 == d2,
        _ => false,
    }
}

/// `HH:mm`
pub fn format_time<Tz: TimeZone>(millis: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    to_datetime(millis, tz)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}

/// `dd/MM/yyyy`
pub fn format_date<Tz: TimeZone>(millis: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    to_datetime(millis, tz)
        .map(|dt| dt.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

/// Label of a date header: "Today" or the date.
pub fn date_header_label<Tz: TimeZone>(millis: i64, now: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    if is_same_day(millis, now, tz) {
        "Today".to_string()
    } else {
        format_date(millis, tz)
    }
}

/// Time shown next to a conversation preview: the time for today, the date
/// otherwise.
pub fn preview_time_label<Tz: TimeZone>(millis: i64, now: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    if is_same_day(millis, now, tz) {
        format_time(millis, tz)
    } else {
        format_date(millis, tz)
    }
}

/// Presence text for a user last seen at `last_seen`.
pub fn active_ago<Tz: TimeZone>(last_seen: i64, now: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    const MINUTE: i64 = 60 * 1000;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    let diff = now - last_seen;
    if diff < MINUTE {
        "Active now".to_string()
    } else if diff < HOUR {
        format!("Active {}m ago", diff / MINUTE)
    } else if diff < DAY {
        format!("Active {}h ago", diff / HOUR)
    } else {
        format!("Active on {}", format_date(last_seen, tz))
    }
}
