use std::{
    collections::HashMap,
    fmt::Display,
    io::{self, Write},
};

use ansi_term::{Colour, Style};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::{
    aggregation::{
        filter_by_date, local_date_key, month_calendar, selection_totals, MonthCalendar,
        PeriodTotal, SelectionTotals, YearMonth,
    },
    model::{Profile, Project, TimeEntry},
    tracking::clock_state::ClockState,
    utils::time::{date_to_key, local_date},
};

use super::{calendar::write_calendar, format_duration, format_instant, format_time, short_id};

fn status<Tz: TimeZone>(state: &ClockState, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    match state {
        ClockState::ClockedIn { since, .. } => Colour::Green
            .paint(format!("clocked in since {}", format_time(*since, tz)))
            .to_string(),
        ClockState::ClockedOut => Style::new().dimmed().paint("clocked out").to_string(),
    }
}

pub struct ProjectRow {
    pub project: Project,
    pub state: ClockState,
    pub total: Duration,
}

pub fn write_projects<Tz: TimeZone>(
    out: &mut impl Write,
    rows: &[ProjectRow],
    tz: &Tz,
) -> io::Result<()>
where
    Tz::Offset: Display,
{
    if rows.is_empty() {
        return writeln!(out, "No projects yet. Add one with `clockbook projects add <name>`.");
    }
    for row in rows {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            short_id(&row.project.id),
            row.project.name,
            format_duration(row.total),
            status(&row.state, tz)
        )?;
    }
    Ok(())
}

/// Entries latest first. Open entries show as running and add nothing to totals.
pub fn write_entries<Tz: TimeZone>(
    out: &mut impl Write,
    entries: &[&TimeEntry],
    project_names: &HashMap<String, String>,
    tz: &Tz,
) -> io::Result<()>
where
    Tz::Offset: Display,
{
    if entries.is_empty() {
        return writeln!(out, "No entries.");
    }
    let mut entries = entries.to_vec();
    entries.sort_by(|a, b| b.clock_in_time.cmp(&a.clock_in_time));

    for entry in entries {
        let project = project_names
            .get(&entry.project_id)
            .map(String::as_str)
            .unwrap_or(entry.project_id.as_str());
        let (clock_out, duration) = match entry.clock_out_time {
            Some(clock_out) => (format_time(clock_out, tz), format_duration(entry.duration())),
            None => (
                Colour::Yellow.paint("open").to_string(),
                "running".to_string(),
            ),
        };
        write!(
            out,
            "{}\t{}\t{} - {}\t{}\t{}",
            short_id(&entry.id),
            entry.date,
            format_time(entry.clock_in_time, tz),
            clock_out,
            duration,
            project
        )?;
        if !entry.notes.is_empty() {
            write!(out, "\t{}", entry.notes)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_totals<K: Display>(
    out: &mut impl Write,
    title: &str,
    totals: &[PeriodTotal<K>],
) -> io::Result<()> {
    writeln!(out, "{title}")?;
    if totals.is_empty() {
        return writeln!(out, "  nothing tracked");
    }
    for total in totals {
        write!(out, "  {}\t{}", total.key, format_duration(total.duration))?;
        if total.open > 0 {
            write!(out, "\t(+{} open)", total.open)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_project_totals(
    out: &mut impl Write,
    totals: &[(String, Duration)],
    project_names: &HashMap<String, String>,
) -> io::Result<()> {
    writeln!(out, "By project")?;
    for (id, total) in totals {
        let name = project_names.get(id).map(String::as_str).unwrap_or(id);
        writeln!(out, "  {name}\t{}", format_duration(*total))?;
    }
    Ok(())
}

pub fn write_profile(out: &mut impl Write, profile: &Profile) -> io::Result<()> {
    writeln!(out, "Name:\t{}", profile.display_name())?;
    writeln!(out, "Email:\t{}", profile.email)?;
    if let Some(photo) = &profile.photo_url {
        writeln!(out, "Photo:\t{photo}")?;
    }
    Ok(())
}

/// Everything the project page shows, computed from the project's entries alone.
pub struct ProjectDetail {
    pub project: Project,
    pub state: ClockState,
    pub entries: Vec<TimeEntry>,
    pub selected: Option<NaiveDate>,
    pub selection: SelectionTotals,
    pub calendar: Option<MonthCalendar>,
    pub today_key: String,
}

pub fn project_detail<Tz: TimeZone>(
    project: Project,
    entries: Vec<TimeEntry>,
    selected: Option<NaiveDate>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> ProjectDetail {
    let today = local_date(now, tz);
    let state = ClockState::derive(&entries, &project.id);
    let selection = selection_totals(&entries, &project.id, selected, today, tz);
    let calendar = month_calendar(&entries, YearMonth::of(selected.unwrap_or(today)), tz);
    ProjectDetail {
        project,
        state,
        entries,
        selected,
        selection,
        calendar,
        today_key: date_to_key(today),
    }
}

pub fn write_project_detail<Tz: TimeZone>(
    out: &mut impl Write,
    detail: &ProjectDetail,
    tz: &Tz,
) -> io::Result<()>
where
    Tz::Offset: Display,
{
    let project = &detail.project;
    writeln!(
        out,
        "{} ({})",
        Style::new().bold().paint(project.name.as_str()),
        short_id(&project.id)
    )?;
    writeln!(out, "Created {}", format_instant(project.created_at, tz))?;
    writeln!(out, "Status: {}", status(&detail.state, tz))?;
    writeln!(out)?;

    if let Some(calendar) = &detail.calendar {
        write_calendar(out, calendar, detail.selected)?;
        writeln!(out)?;
    }

    let anchor = date_to_key(detail.selection.anchor);
    writeln!(
        out,
        "Week of {anchor}: {}",
        format_duration(detail.selection.week)
    )?;
    writeln!(
        out,
        "Month of {anchor}: {}",
        format_duration(detail.selection.month)
    )?;
    writeln!(out)?;

    let key = detail
        .selected
        .map(date_to_key)
        .unwrap_or_else(|| detail.today_key.clone());
    let day = filter_by_date(&detail.entries, &key, tz);
    let day_total = day
        .iter()
        .fold(Duration::zero(), |sum, v| sum + v.duration());
    writeln!(out, "Entries on {key}: {}", format_duration(day_total))?;
    let names = HashMap::from([(project.id.clone(), project.name.clone())]);
    write_entries(out, &day, &names, tz)?;

    let earlier = detail
        .entries
        .iter()
        .filter(|v| local_date_key(v.clock_in_time, tz) != key)
        .count();
    if earlier > 0 {
        writeln!(out, "({earlier} entries on other days, see `clockbook entries list`)")?;
    }
    Ok(())
}
