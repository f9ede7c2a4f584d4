use std::{collections::HashMap, fmt::Display, io::Write};

use anyhow::Result;
use chrono::{Duration, TimeZone};
use clap::Subcommand;

use crate::{
    model::{Project, TimeEntry},
    tracking::{clock_state::ClockState, Tracker},
};

use super::{
    dates::{parse_day, DateStyle, DATE_HELP},
    output::{
        short_id,
        views::{project_detail, write_project_detail, write_projects, ProjectRow},
    },
    prompt::{confirm_destructive, Notice, Prompt},
};

#[derive(Subcommand, Debug)]
pub enum ProjectsCommand {
    #[command(about = "List projects, newest first, with their total time and clock status")]
    List,
    #[command(about = "Create a project")]
    Add { name: String },
    #[command(about = "Rename a project")]
    Rename {
        #[arg(help = "Project id, id prefix or name")]
        project: String,
        name: String,
    },
    #[command(about = "Delete a project together with all of its entries")]
    Delete {
        #[arg(help = "Project id, id prefix or name")]
        project: String,
        #[arg(long, short, help = "Don't ask for confirmation")]
        yes: bool,
    },
    #[command(about = "Show a project: status, calendar, selected week and month totals, entries")]
    Show {
        #[arg(help = "Project id, id prefix or name")]
        project: String,
        #[arg(long, help = DATE_HELP)]
        date: Option<String>,
    },
}

/// Names by id, for listings that show entries of several projects.
pub fn project_names<'a>(projects: impl IntoIterator<Item = &'a Project>) -> HashMap<String, String> {
    projects
        .into_iter()
        .map(|v| (v.id.clone(), v.name.clone()))
        .collect()
}

pub fn project_rows(projects: Vec<Project>, entries: &[TimeEntry]) -> Vec<ProjectRow> {
    projects
        .into_iter()
        .map(|project| {
            let state = ClockState::derive(entries, &project.id);
            let total = entries
                .iter()
                .filter(|v| v.project_id == project.id)
                .fold(Duration::zero(), |sum, v| sum + v.duration());
            ProjectRow {
                project,
                state,
                total,
            }
        })
        .collect()
}

pub async fn run<Tz>(
    command: ProjectsCommand,
    tracker: &Tracker<Tz>,
    prompt: &dyn Prompt,
    out: &mut impl Write,
    style: DateStyle,
) -> Result<()>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: Send + Sync + Display + Copy,
{
    match command {
        ProjectsCommand::List => {
            let projects = tracker.projects().await?;
            let entries = tracker.entries().await?;
            write_projects(out, &project_rows(projects, &entries), tracker.zone())?;
        }
        ProjectsCommand::Add { name } => {
            let project = tracker.create_project(&name).await?;
            prompt.notify(
                Notice::Success,
                &format!("Created project {} ({}).", project.name, short_id(&project.id)),
            );
        }
        ProjectsCommand::Rename { project, name } => {
            let project = tracker.resolve_project(&project).await?;
            let renamed = tracker.rename_project(&project.id, &name).await?;
            prompt.notify(
                Notice::Success,
                &format!("Renamed {} to {}.", project.name, renamed.name),
            );
        }
        ProjectsCommand::Delete { project, yes } => {
            let project = tracker.resolve_project(&project).await?;
            let entries = tracker.project_entries(&project.id).await?.len();
            let question = format!(
                "Delete project {} and its {entries} time entries? This can't be undone.",
                project.name
            );
            if !confirm_destructive(prompt, yes, &question) {
                return Ok(());
            }
            let removed = tracker.delete_project(&project.id).await?;
            prompt.notify(
                Notice::Success,
                &format!("Deleted project {} and {removed} entries.", project.name),
            );
        }
        ProjectsCommand::Show { project, date } => {
            let project = tracker.resolve_project(&project).await?;
            let now = tracker.now();
            let selected = date
                .map(|v| parse_day("date", &v, now.with_timezone(tracker.zone()), style))
                .transpose()?;
            let entries = tracker.project_entries(&project.id).await?;
            let detail = project_detail(project, entries, selected, now, tracker.zone());
            write_project_detail(out, &detail, tracker.zone())?;
        }
    }
    Ok(())
}
