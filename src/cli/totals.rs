use std::{fmt::Display, io::Write};

use anyhow::Result;
use chrono::{Duration, TimeZone};
use clap::{Args as ClapArgs, ValueEnum};

use crate::{
    aggregation::{
        daily_totals, filter_by_date, local_date_key, monthly_totals, project_totals,
        selection_anchor, selection_totals, sum, weekly_totals,
    },
    tracking::Tracker,
    utils::time::{date_to_key, local_date},
};

use super::{
    dates::{parse_day, DateStyle, DATE_HELP},
    output::{
        format_duration,
        views::{write_project_totals, write_totals},
    },
    projects::project_names,
};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::Day => write!(f, "day"),
            Period::Week => write!(f, "week"),
            Period::Month => write!(f, "month"),
        }
    }
}

#[derive(Debug, ClapArgs)]
pub struct TotalsCommand {
    #[arg(long, help = "Project id, id prefix or name. All projects when omitted")]
    project: Option<String>,
    #[arg(long, default_value_t = Period::Day)]
    by: Period,
    #[arg(
        long,
        help = "Anchor of the selected week and month totals, the first day of the current month by default"
    )]
    date: Option<String>,
}

pub async fn run<Tz>(
    TotalsCommand { project, by, date }: TotalsCommand,
    tracker: &Tracker<Tz>,
    out: &mut impl Write,
    style: DateStyle,
) -> Result<()>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: Send + Sync + Display + Copy,
{
    let zone = tracker.zone();
    let now = tracker.now();
    let selected = date
        .map(|v| parse_day("date", &v, now.with_timezone(zone), style))
        .transpose()?;

    let projects = tracker.projects().await?;
    let project = match project {
        Some(reference) => Some(tracker.resolve_project(&reference).await?),
        None => None,
    };
    let entries = match &project {
        Some(project) => tracker.project_entries(&project.id).await?,
        None => tracker.entries().await?,
    };

    let title = match &project {
        Some(project) => format!("{} per {by}", project.name),
        None => format!("All projects per {by}"),
    };
    let total = match by {
        Period::Day => {
            let totals = daily_totals(&entries, zone);
            write_totals(out, &title, &totals)?;
            sum(&totals)
        }
        Period::Week => {
            let totals = weekly_totals(&entries, zone);
            write_totals(out, &title, &totals)?;
            sum(&totals)
        }
        Period::Month => {
            let totals = monthly_totals(&entries, zone);
            write_totals(out, &title, &totals)?;
            sum(&totals)
        }
    };
    writeln!(out, "Total: {}", format_duration(total))?;
    writeln!(out)?;

    let today = local_date(now, zone);
    let ids = match &project {
        Some(project) => vec![project.id.as_str()],
        None => projects.iter().map(|v| v.id.as_str()).collect(),
    };
    let (week, month) = ids
        .into_iter()
        .map(|id| selection_totals(&entries, id, selected, today, zone))
        .fold((Duration::zero(), Duration::zero()), |(week, month), v| {
            (week + v.week, month + v.month)
        });
    let anchor = date_to_key(selection_anchor(selected, today));
    writeln!(out, "Week of {anchor}: {}", format_duration(week))?;
    writeln!(out, "Month of {anchor}: {}", format_duration(month))?;

    if project.is_none() {
        writeln!(out)?;
        write_project_totals(out, &project_totals(&entries), &project_names(&projects))?;
        let key = local_date_key(now, zone);
        let today_total = filter_by_date(&entries, &key, zone)
            .into_iter()
            .fold(Duration::zero(), |sum, v| sum + v.duration());
        writeln!(out, "Today ({key}): {}", format_duration(today_total))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        cli::dates::DateStyle, identity::Identity, store::file_store::FileStore,
        tracking::Tracker, utils::clock::FixedClock,
    };

    use super::{run, Period, TotalsCommand};

    fn tracker_at(dir: &std::path::Path, day: u32, hour: u32) -> Tracker<Utc> {
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()));
        let store = FileStore::new(dir.to_path_buf(), clock.clone(), Duration::from_millis(20)).unwrap();
        Tracker::new(
            Arc::new(store),
            Identity {
                uid: "uid-1".into(),
                email: "ada@example.com".into(),
            },
            clock,
            Utc,
        )
    }

    #[tokio::test]
    async fn per_project_weekly_and_selection() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let project = tracker_at(dir.path(), 1, 8).create_project("Thesis").await?;
        for (day, from, to) in [(15, 9, 10), (15, 14, 15), (17, 9, 12)] {
            tracker_at(dir.path(), day, from).clock_in(&project.id, "").await?;
            tracker_at(dir.path(), day, to).clock_out(&project.id).await?;
        }

        let tracker = tracker_at(dir.path(), 20, 12);
        let mut out = Vec::new();
        run(
            TotalsCommand {
                project: Some("Thesis".into()),
                by: Period::Week,
                date: Some("2024-01-16".into()),
            },
            &tracker,
            &mut out,
            DateStyle::Uk,
        )
        .await?;
        let text = String::from_utf8(out)?;
        assert!(text.contains("Thesis per week"));
        assert!(text.contains("  2024-01-15\t5h00m"));
        assert!(text.contains("Total: 5h00m"));
        assert!(text.contains("Week of 2024-01-16: 5h00m"));

        let mut out = Vec::new();
        run(
            TotalsCommand {
                project: None,
                by: Period::Day,
                date: None,
            },
            &tracker,
            &mut out,
            DateStyle::Uk,
        )
        .await?;
        let text = String::from_utf8(out)?;
        assert!(text.contains("  2024-01-15\t2h00m"));
        assert!(text.contains("  2024-01-17\t3h00m"));
        assert!(text.contains("  Thesis\t5h00m"));
        assert!(text.contains("Today (2024-01-20): 0s"));
        Ok(())
    }
}
