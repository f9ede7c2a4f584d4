use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use crate::utils::time::key_to_date;

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

pub const DATE_HELP: &str =
    "Examples are \"yesterday\", \"9:00\", \"1 hour ago\", \"15/03/2025\", \"12:00 16/03/2025\"";

fn invalid(what: &str, input: &str, reason: impl Display) -> anyhow::Error {
    Args::command()
        .error(
            clap::error::ErrorKind::ValueValidation,
            format!("Failed to validate {what} \"{input}\": {reason}"),
        )
        .into()
}

/// Parses RFC 3339 or natural-language input relative to `now`.
pub fn parse_instant<Tz>(
    what: &str,
    input: &str,
    now: DateTime<Tz>,
    style: DateStyle,
) -> Result<DateTime<Utc>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    if let Ok(instant) = DateTime::parse_from_rfc3339(input.trim()) {
        return Ok(instant.with_timezone(&Utc));
    }
    parse_date_string(input, now, style.into())
        .map(|v| v.with_timezone(&Utc))
        .map_err(|e| invalid(what, input, e))
}

/// A calendar day: a `YYYY-MM-DD` key or anything [parse_instant] accepts.
pub fn parse_day<Tz>(
    what: &str,
    input: &str,
    now: DateTime<Tz>,
    style: DateStyle,
) -> Result<NaiveDate>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    if let Some(date) = key_to_date(input.trim()) {
        return Ok(date);
    }
    let tz = now.timezone();
    parse_date_string(input, now, style.into())
        .map(|v| v.with_timezone(&tz).date_naive())
        .map_err(|e| invalid(what, input, e))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{parse_day, parse_instant, DateStyle};

    #[test]
    fn keys_and_natural_language() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(
            parse_day("date", "2024-01-03", now, DateStyle::Uk).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
        assert_eq!(
            parse_day("date", "yesterday", now, DateStyle::Uk).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 14).unwrap()
        );
        assert_eq!(
            parse_day("date", "03/02/2024", now, DateStyle::Uk).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 3).unwrap()
        );
        assert_eq!(
            parse_instant("clock-in", "1 hour ago", now, DateStyle::Uk).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap()
        );
        assert_eq!(
            parse_instant("clock-in", "2024-01-15T08:00:00+02:00", now, DateStyle::Uk).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap()
        );
        assert!(parse_instant("clock-in", "not a date", now, DateStyle::Uk).is_err());
    }
}
