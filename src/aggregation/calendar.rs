use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, TimeZone};

use crate::{
    model::TimeEntry,
    utils::time::{local_date, next_month_start, week_start},
};

use super::{daily_totals, YearMonth};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub total: Duration,
    pub has_open: bool,
}

/// One month laid out Monday first. Cells outside the month are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthCalendar {
    pub month: YearMonth,
    pub weeks: Vec<[Option<CalendarDay>; 7]>,
}

impl MonthCalendar {
    pub fn total(&self) -> Duration {
        self.days()
            .fold(Duration::zero(), |sum, day| sum + day.total)
    }

    pub fn days(&self) -> impl Iterator<Item = &CalendarDay> {
        self.weeks.iter().flatten().flatten()
    }
}

/// Returns `None` for a month that doesn't exist.
pub fn month_calendar<'a, Tz: TimeZone>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    month: YearMonth,
    tz: &Tz,
) -> Option<MonthCalendar> {
    let first = month.first_day()?;
    let next = next_month_start(first);

    let daily = daily_totals(
        entries
            .into_iter()
            .filter(|entry| YearMonth::of(local_date(entry.clock_in_time, tz)) == month),
        tz,
    )
    .into_iter()
    .map(|v| (v.key, v))
    .collect::<HashMap<_, _>>();

    let mut weeks = Vec::new();
    let mut monday = week_start(first);
    while monday < next {
        let mut week = [None; 7];
        for (offset, cell) in week.iter_mut().enumerate() {
            let date = monday + Duration::days(offset as i64);
            if date.month() != month.month || date.year() != month.year {
                continue;
            }
            let total = daily.get(&date);
            *cell = Some(CalendarDay {
                date,
                total: total.map_or_else(Duration::zero, |v| v.duration),
                has_open: total.is_some_and(|v| v.open > 0),
            });
        }
        weeks.push(week);
        monday += Duration::days(7);
    }

    Some(MonthCalendar { month, weeks })
}
