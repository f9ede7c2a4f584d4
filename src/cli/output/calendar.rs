use std::io::{self, Write};

use chrono::{Datelike, Duration, NaiveDate};

use crate::aggregation::MonthCalendar;

use super::format_duration;

const HEADER: &str = "  Mo  Tu  We  Th  Fr  Sa  Su";

/// Monday-first month grid. A `*` marks days with tracked time, `+` days with a running entry and
/// the selected day is bracketed. Each row ends with the week's total.
pub fn write_calendar(
    out: &mut impl Write,
    calendar: &MonthCalendar,
    selected: Option<NaiveDate>,
) -> io::Result<()> {
    let title = calendar
        .month
        .first_day()
        .map(|v| v.format("%B %Y").to_string())
        .unwrap_or_else(|| calendar.month.to_string());
    writeln!(out, "{title:^28}")?;
    writeln!(out, "{HEADER}")?;

    for week in &calendar.weeks {
        let mut week_total = Duration::zero();
        for cell in week {
            let Some(day) = cell else {
                write!(out, "    ")?;
                continue;
            };
            week_total += day.total;
            let mark = if day.has_open {
                '+'
            } else if day.total > Duration::zero() {
                '*'
            } else {
                ' '
            };
            if Some(day.date) == selected {
                write!(out, "[{:>2}]", day.date.day())?;
            } else {
                write!(out, " {:>2}{mark}", day.date.day())?;
            }
        }
        if week_total > Duration::zero() {
            write!(out, "  {}", format_duration(week_total))?;
        }
        writeln!(out)?;
    }
    writeln!(out, "Month total: {}", format_duration(calendar.total()))
}
