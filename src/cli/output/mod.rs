//! Plain-text rendering of the views. Everything writes into an `impl Write` so commands print to
//! stdout and tests render into a buffer.

pub mod calendar;
pub mod views;

use chrono::{DateTime, Duration, TimeZone, Utc};

pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!("{}h{:02}m", v.num_hours(), v.num_minutes() % 60)
    } else if v.num_minutes() > 0 {
        format!("{}m{:02}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

pub fn format_instant<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string()
}

pub fn format_time<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.with_timezone(tz).format("%H:%M").to_string()
}

/// Shortened id shown in listings. Any unambiguous prefix is accepted back as a reference.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
