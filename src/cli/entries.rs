use std::{fmt::Display, io::Write};

use anyhow::Result;
use chrono::TimeZone;
use clap::Subcommand;

use crate::{
    aggregation::{current_open_entry, filter_by_date},
    tracking::{
        validation::{ClockOutEdit, EntryEdit},
        Tracker,
    },
    utils::time::date_to_key,
};

use super::{
    dates::{parse_day, parse_instant, DateStyle, DATE_HELP},
    output::{format_duration, format_time, short_id, views::write_entries},
    projects::project_names,
    prompt::{confirm_destructive, Notice, Prompt},
};

#[derive(Subcommand, Debug)]
pub enum ClockCommand {
    #[command(about = "Start tracking a project")]
    In {
        #[arg(help = "Project id, id prefix or name")]
        project: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    #[command(about = "Stop tracking a project")]
    Out {
        #[arg(help = "Project id, id prefix or name")]
        project: String,
    },
    #[command(about = "Show which projects are clocked in")]
    Status,
}

#[derive(Subcommand, Debug)]
pub enum EntriesCommand {
    #[command(about = "List time entries, latest first")]
    List {
        #[arg(long, help = "Project id, id prefix or name")]
        project: Option<String>,
        #[arg(long, help = DATE_HELP)]
        date: Option<String>,
    },
    #[command(about = "Correct an entry's clock-in, clock-out or notes")]
    Edit {
        #[arg(help = "Entry id or id prefix")]
        entry: String,
        #[arg(long = "in", help = DATE_HELP)]
        clock_in: Option<String>,
        #[arg(long = "out", help = DATE_HELP, conflicts_with = "reopen")]
        clock_out: Option<String>,
        #[arg(long, help = "Clear clock-out so the entry is running again")]
        reopen: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    #[command(about = "Delete a single entry")]
    Delete {
        #[arg(help = "Entry id or id prefix")]
        entry: String,
        #[arg(long, short, help = "Don't ask for confirmation")]
        yes: bool,
    },
}

pub async fn clock<Tz>(
    command: ClockCommand,
    tracker: &Tracker<Tz>,
    prompt: &dyn Prompt,
    out: &mut impl Write,
) -> Result<()>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: Send + Sync + Display,
{
    match command {
        ClockCommand::In { project, notes } => {
            let project = tracker.resolve_project(&project).await?;
            let entry = tracker.clock_in(&project.id, &notes).await?;
            prompt.notify(
                Notice::Success,
                &format!(
                    "Clocked in to {} at {}.",
                    project.name,
                    format_time(entry.clock_in_time, tracker.zone())
                ),
            );
        }
        ClockCommand::Out { project } => {
            let project = tracker.resolve_project(&project).await?;
            let entry = tracker.clock_out(&project.id).await?;
            prompt.notify(
                Notice::Success,
                &format!(
                    "Clocked out of {} after {}.",
                    project.name,
                    format_duration(entry.duration())
                ),
            );
        }
        ClockCommand::Status => {
            let projects = tracker.projects().await?;
            let entries = tracker.entries().await?;
            let mut any = false;
            for project in &projects {
                if let Some(entry) = current_open_entry(&entries, &project.id) {
                    any = true;
                    writeln!(
                        out,
                        "{}\tsince {}\t{}",
                        project.name,
                        format_time(entry.clock_in_time, tracker.zone()),
                        format_duration(tracker.now() - entry.clock_in_time)
                    )?;
                }
            }
            if !any {
                writeln!(out, "Not clocked in to any project.")?;
            }
        }
    }
    Ok(())
}

pub async fn entries<Tz>(
    command: EntriesCommand,
    tracker: &Tracker<Tz>,
    prompt: &dyn Prompt,
    out: &mut impl Write,
    style: DateStyle,
) -> Result<()>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: Send + Sync + Display + Copy,
{
    let now = tracker.now().with_timezone(tracker.zone());
    match command {
        EntriesCommand::List { project, date } => {
            let projects = tracker.projects().await?;
            let entries = match project {
                Some(reference) => {
                    let project = tracker.resolve_project(&reference).await?;
                    tracker.project_entries(&project.id).await?
                }
                None => tracker.entries().await?,
            };
            let shown = match date {
                Some(date) => {
                    let key = date_to_key(parse_day("date", &date, now, style)?);
                    filter_by_date(&entries, &key, tracker.zone())
                }
                None => entries.iter().collect(),
            };
            write_entries(out, &shown, &project_names(&projects), tracker.zone())?;
        }
        EntriesCommand::Edit {
            entry,
            clock_in,
            clock_out,
            reopen,
            notes,
        } => {
            let clock_in = clock_in
                .map(|v| parse_instant("clock-in", &v, now.clone(), style))
                .transpose()?;
            let clock_out = match (clock_out, reopen) {
                (_, true) => Some(ClockOutEdit::Reopen),
                (Some(v), false) => Some(ClockOutEdit::At(parse_instant(
                    "clock-out",
                    &v,
                    now.clone(),
                    style,
                )?)),
                (None, false) => None,
            };
            let edit = EntryEdit {
                clock_in,
                clock_out,
                notes,
            };

            let entry = tracker.resolve_entry(&entry).await?;
            let edited = tracker.edit_entry(&entry.id, edit).await?;
            prompt.notify(
                Notice::Success,
                &format!("Updated entry {}.", short_id(&edited.id)),
            );
            let projects = tracker.projects().await?;
            write_entries(out, &[&edited], &project_names(&projects), tracker.zone())?;
        }
        EntriesCommand::Delete { entry, yes } => {
            let entry = tracker.resolve_entry(&entry).await?;
            let question = format!(
                "Delete the entry from {} ({})?",
                format_time(entry.clock_in_time, tracker.zone()),
                entry.date
            );
            if !confirm_destructive(prompt, yes, &question) {
                return Ok(());
            }
            tracker.delete_entry(&entry.id).await?;
            prompt.notify(
                Notice::Success,
                &format!("Deleted entry {}.", short_id(&entry.id)),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use chrono::{TimeZone, Utc};
    use mockall::predicate::{always, eq};
    use tempfile::tempdir;

    use crate::{
        cli::{
            dates::DateStyle,
            prompt::{MockPrompt, Notice},
        },
        error::{AppError, ValidationError},
        identity::Identity,
        store::file_store::FileStore,
        tracking::{clock_state::TransitionError, Tracker},
        utils::clock::FixedClock,
    };

    use super::{clock, entries, ClockCommand, EntriesCommand};

    fn tracker_at(dir: &std::path::Path, hour: u32) -> Tracker<Utc> {
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap()));
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

    fn notifying(level: Notice, times: usize) -> MockPrompt {
        let mut prompt = MockPrompt::new();
        prompt
            .expect_notify()
            .with(eq(level), always())
            .times(times)
            .return_const(());
        prompt
    }

    #[tokio::test]
    async fn clock_in_twice_is_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tracker = tracker_at(dir.path(), 9);
        tracker.create_project("Thesis").await?;
        let prompt = notifying(Notice::Success, 1);
        let mut out = Vec::new();

        let command = || ClockCommand::In {
            project: "Thesis".into(),
            notes: String::new(),
        };
        clock(command(), &tracker, &prompt, &mut out).await?;
        let error = clock(command(), &tracker, &prompt, &mut out)
            .await
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<AppError>(),
            Some(AppError::Rejected(TransitionError::AlreadyClockedIn { .. }))
        ));
        assert_eq!(tracker.entries().await?.len(), 1);

        clock(ClockCommand::Status, &tracker, &prompt, &mut out).await?;
        assert!(String::from_utf8(out)?.contains("Thesis\tsince 09:00"));
        Ok(())
    }

    #[tokio::test]
    async fn edit_out_before_in_is_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let morning = tracker_at(dir.path(), 9);
        let project = morning.create_project("Thesis").await?;
        morning.clock_in(&project.id, "").await?;
        let closed = tracker_at(dir.path(), 11).clock_out(&project.id).await?;

        let prompt = MockPrompt::new();
        let mut out = Vec::new();
        let error = entries(
            EntriesCommand::Edit {
                entry: closed.id[..8].to_string(),
                clock_in: None,
                clock_out: Some("2024-01-15T08:00:00Z".into()),
                reopen: false,
                notes: None,
            },
            &morning,
            &prompt,
            &mut out,
            DateStyle::Uk,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<AppError>(),
            Some(AppError::Validation(ValidationError::ClockOutBeforeClockIn { .. }))
        ));
        assert_eq!(morning.entry(&closed.id).await?, closed);
        Ok(())
    }

    #[tokio::test]
    async fn list_filters_by_day() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tracker = tracker_at(dir.path(), 9);
        let project = tracker.create_project("Thesis").await?;
        tracker.clock_in(&project.id, "today").await?;

        let prompt = MockPrompt::new();
        let mut out = Vec::new();
        entries(
            EntriesCommand::List {
                project: None,
                date: Some("2024-01-15".into()),
            },
            &tracker,
            &prompt,
            &mut out,
            DateStyle::Uk,
        )
        .await?;
        entries(
            EntriesCommand::List {
                project: Some("Thesis".into()),
                date: Some("yesterday".into()),
            },
            &tracker,
            &prompt,
            &mut out,
            DateStyle::Uk,
        )
        .await?;
        let text = String::from_utf8(out)?;
        let lines = text.lines().collect::<Vec<_>>();
        assert!(lines[0].contains("Thesis\ttoday"));
        assert_eq!(lines[1], "No entries.");
        Ok(())
    }
}
