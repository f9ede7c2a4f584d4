//! Pure computations over a user's time entries: per-day, per-week and per-month totals, range
//! totals for the selected week/month, and the open entry that defines clock state. Nothing here
//! touches the store. Every local-time computation takes the viewer's zone explicitly.

pub mod calendar;

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::{
    model::TimeEntry,
    utils::time::{date_to_key, local_date, local_midnight, month_start, next_month_start, week_start},
};

pub use calendar::{month_calendar, CalendarDay, MonthCalendar};

/// Elapsed time of a closed entry, zero while it's open.
pub fn duration(entry: &TimeEntry) -> Duration {
    entry.duration()
}

/// The one and only way an instant becomes a grouping key.
pub fn local_date_key<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String {
    date_to_key(local_date(instant, tz))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Total for one period. `open` counts entries in the period that are still running; they add
/// nothing to `duration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodTotal<K> {
    pub key: K,
    pub duration: Duration,
    pub entries: usize,
    pub open: usize,
}

impl<K> PeriodTotal<K> {
    fn new(key: K) -> Self {
        Self {
            key,
            duration: Duration::zero(),
            entries: 0,
            open: 0,
        }
    }
}

/// Buckets entries by `key` of their local clock-in date, latest bucket first.
fn totals_by<'a, K, Tz>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    tz: &Tz,
    key: impl Fn(NaiveDate) -> K,
) -> Vec<PeriodTotal<K>>
where
    K: Ord + Clone,
    Tz: TimeZone,
{
    let mut buckets = BTreeMap::<K, PeriodTotal<K>>::new();
    for entry in entries {
        let k = key(local_date(entry.clock_in_time, tz));
        let total = buckets
            .entry(k.clone())
            .or_insert_with(|| PeriodTotal::new(k));
        total.duration += duration(entry);
        total.entries += 1;
        if entry.is_open() {
            total.open += 1;
        }
    }
    buckets.into_values().rev().collect()
}

pub fn group_by_local_date<'a, Tz: TimeZone>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    tz: &Tz,
) -> BTreeMap<String, Vec<&'a TimeEntry>> {
    let mut groups = BTreeMap::<String, Vec<&TimeEntry>>::new();
    for entry in entries {
        groups
            .entry(local_date_key(entry.clock_in_time, tz))
            .or_default()
            .push(entry);
    }
    groups
}

pub fn daily_totals<'a, Tz: TimeZone>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    tz: &Tz,
) -> Vec<PeriodTotal<NaiveDate>> {
    totals_by(entries, tz, |date| date)
}

/// Keyed by the Monday at or before each local clock-in date.
pub fn weekly_totals<'a, Tz: TimeZone>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    tz: &Tz,
) -> Vec<PeriodTotal<NaiveDate>> {
    totals_by(entries, tz, week_start)
}

pub fn monthly_totals<'a, Tz: TimeZone>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    tz: &Tz,
) -> Vec<PeriodTotal<YearMonth>> {
    totals_by(entries, tz, YearMonth::of)
}

/// First open entry of `project_id` in collection order.
pub fn current_open_entry<'a>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    project_id: &str,
) -> Option<&'a TimeEntry> {
    entries
        .into_iter()
        .find(|entry| entry.project_id == project_id && entry.is_open())
}

pub fn filter_by_date<'a, Tz: TimeZone>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    date_key: &str,
    tz: &Tz,
) -> Vec<&'a TimeEntry> {
    entries
        .into_iter()
        .filter(|entry| local_date_key(entry.clock_in_time, tz) == date_key)
        .collect()
}

/// Sum of the project's durations whose clock-in lies in `[start, end)`.
pub fn range_total<'a>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    project_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Duration {
    entries
        .into_iter()
        .filter(|entry| entry.project_id == project_id)
        .filter(|entry| entry.clock_in_time >= start && entry.clock_in_time < end)
        .map(duration)
        .fold(Duration::zero(), |sum, v| sum + v)
}

/// Monday 00:00 local of the week containing `anchor` up to the following Monday, in UTC.
pub fn week_range<Tz: TimeZone>(anchor: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = week_start(anchor);
    (
        local_midnight(start, tz),
        local_midnight(start + Duration::days(7), tz),
    )
}

pub fn month_range<Tz: TimeZone>(anchor: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        local_midnight(month_start(anchor), tz),
        local_midnight(next_month_start(anchor), tz),
    )
}

/// Anchor used for the selected week/month totals: the selected date, or the first day of the
/// month `today` falls in when nothing is selected.
pub fn selection_anchor(selected: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    selected.unwrap_or_else(|| month_start(today))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTotals {
    pub anchor: NaiveDate,
    pub week: Duration,
    pub month: Duration,
}

pub fn selection_totals<Tz: TimeZone>(
    entries: &[TimeEntry],
    project_id: &str,
    selected: Option<NaiveDate>,
    today: NaiveDate,
    tz: &Tz,
) -> SelectionTotals {
    let anchor = selection_anchor(selected, today);
    let (week_start, week_end) = week_range(anchor, tz);
    let (month_start, month_end) = month_range(anchor, tz);
    SelectionTotals {
        anchor,
        week: range_total(entries, project_id, week_start, week_end),
        month: range_total(entries, project_id, month_start, month_end),
    }
}

/// Completed time per project id, largest first. Ties keep a stable order by id.
pub fn project_totals<'a>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
) -> Vec<(String, Duration)> {
    let mut map = HashMap::<&str, Duration>::new();
    for entry in entries {
        *map.entry(entry.project_id.as_str()).or_insert_with(Duration::zero) += duration(entry);
    }
    let mut totals = map
        .into_iter()
        .map(|(id, total)| (id.to_string(), total))
        .collect::<Vec<_>>();
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    totals
}

pub fn sum<'a, K: 'a>(totals: impl IntoIterator<Item = &'a PeriodTotal<K>>) -> Duration {
    totals
        .into_iter()
        .fold(Duration::zero(), |sum, v| sum + v.duration)
}
