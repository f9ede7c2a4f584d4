//! Data access bound to one signed-in user: projects, entries and the profile, plus the clock-in
//! and clock-out transitions. Every rule about what may be written lives here so the views only
//! decide what to show.

pub mod clock_state;
pub mod validation;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use futures::stream::BoxStream;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::{
    aggregation::current_open_entry,
    error::{AppError, Result, ValidationError},
    identity::Identity,
    model::{
        time_entry::{CLOCK_OUT_FIELD, PROJECT_ID_FIELD},
        Profile, Project, TimeEntry,
    },
    store::{typed::Collection, DocumentStore, Fields, Query, StoreError},
    utils::clock::Clock,
};

use clock_state::{ClockState, TransitionError};
use validation::{validate_interval, validate_name, ClockOutEdit, EntryEdit};

pub const PROJECT_NAME: &str = "Project name";

/// Changes to the profile. `photo_url: Some(None)` removes the photo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<Option<String>>,
}

pub struct Tracker<Tz: TimeZone> {
    identity: Identity,
    profiles: Collection<Profile>,
    projects: Collection<Project>,
    entries: Collection<TimeEntry>,
    clock: Arc<dyn Clock>,
    zone: Tz,
}

/// Picks the single project matching `reference` by id, then by name, then by id prefix.
fn resolve<'a>(projects: &'a [Project], reference: &str) -> Result<&'a Project> {
    let reference = reference.trim();
    if let Some(project) = projects.iter().find(|v| v.id == reference) {
        return Ok(project);
    }

    let by_name = projects
        .iter()
        .filter(|v| v.name.eq_ignore_ascii_case(reference))
        .collect::<Vec<_>>();
    let candidates = if by_name.is_empty() && !reference.is_empty() {
        projects
            .iter()
            .filter(|v| v.id.starts_with(reference))
            .collect::<Vec<_>>()
    } else {
        by_name
    };

    match candidates.as_slice() {
        [project] => Ok(*project),
        [] => Err(AppError::not_found("project", reference)),
        _ => Err(AppError::Ambiguous {
            kind: "project",
            reference: reference.to_string(),
        }),
    }
}

impl<Tz> Tracker<Tz>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: Send + Sync,
{
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Identity,
        clock: Arc<dyn Clock>,
        zone: Tz,
    ) -> Self {
        Self {
            profiles: Collection::new(store.clone(), &identity.uid),
            projects: Collection::new(store.clone(), &identity.uid),
            entries: Collection::new(store, &identity.uid),
            identity,
            clock,
            zone,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn zone(&self) -> &Tz {
        &self.zone
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.time()
    }

    /// Profile of the signed-in user, created from the identity on first use.
    #[instrument(skip(self))]
    pub async fn ensure_profile(&self) -> Result<Profile> {
        if let Some(profile) = self.profiles.get(&self.identity.uid).await? {
            return Ok(profile);
        }
        info!("Creating profile for {}", self.identity.email);
        let profile = Profile::new(self.identity.uid.clone(), self.identity.email.clone());
        Ok(self.profiles.put(profile, &self.identity.uid).await?)
    }

    #[instrument(skip(self))]
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile> {
        let mut fields = Fields::new();
        if let Some(first_name) = update.first_name {
            fields.insert("firstName".into(), json!(first_name.trim()));
        }
        if let Some(last_name) = update.last_name {
            fields.insert("lastName".into(), json!(last_name.trim()));
        }
        if let Some(photo_url) = update.photo_url {
            fields.insert(
                "photoURL".into(),
                photo_url.map_or(Value::Null, |v| json!(v.trim())),
            );
        }
        if fields.is_empty() {
            return Err(ValidationError::NoChanges.into());
        }

        self.ensure_profile().await?;
        self.profiles.update(&self.identity.uid, fields).await?;
        self.ensure_profile().await
    }

    /// Projects, newest first.
    pub async fn projects(&self) -> Result<Vec<Project>> {
        let mut projects = self.projects.all().await?;
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    pub async fn project(&self, id: &str) -> Result<Project> {
        self.projects
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("project", id))
    }

    /// Finds a project by id, name or unambiguous id prefix.
    pub async fn resolve_project(&self, reference: &str) -> Result<Project> {
        let projects = self.projects().await?;
        resolve(&projects, reference).cloned()
    }

    #[instrument(skip(self))]
    pub async fn create_project(&self, name: &str) -> Result<Project> {
        let name = validate_name(PROJECT_NAME, name)?;
        let project = self.projects.add(Project::new(name, self.now())).await?;
        info!("Created project {} ({})", project.name, project.id);
        Ok(project)
    }

    #[instrument(skip(self))]
    pub async fn rename_project(&self, id: &str, name: &str) -> Result<Project> {
        let name = validate_name(PROJECT_NAME, name)?;
        let mut project = self.project(id).await?;

        let mut fields = Fields::new();
        fields.insert("name".into(), json!(name));
        self.projects.update(id, fields).await?;

        project.name = name;
        Ok(project)
    }

    /// Deletes the project and every entry referencing it. Returns the number of entries removed.
    #[instrument(skip(self))]
    pub async fn delete_project(&self, id: &str) -> Result<usize> {
        let project = self.project(id).await?;
        let removed = self
            .entries
            .delete_where(&self.entries_of_query(id))
            .await?;
        self.projects.delete(id).await?;
        info!("Deleted project {} with {removed} entries", project.name);
        Ok(removed)
    }

    fn entries_of_query(&self, project_id: &str) -> Query {
        self.entries.query().where_eq(PROJECT_ID_FIELD, project_id)
    }

    pub async fn entries(&self) -> Result<Vec<TimeEntry>> {
        Ok(self.entries.all().await?)
    }

    pub async fn project_entries(&self, project_id: &str) -> Result<Vec<TimeEntry>> {
        Ok(self.entries.list(&self.entries_of_query(project_id)).await?)
    }

    pub async fn entry(&self, id: &str) -> Result<TimeEntry> {
        self.entries
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("entry", id))
    }

    pub async fn clock_state(&self, project_id: &str) -> Result<ClockState> {
        Ok(ClockState::derive(
            &self.project_entries(project_id).await?,
            project_id,
        ))
    }

    /// Opens a new entry unless the project already has one. The store repeats the open entry
    /// check atomically with the write, which covers clock-ins racing from another process.
    #[instrument(skip(self))]
    pub async fn clock_in(&self, project_id: &str, notes: &str) -> Result<TimeEntry> {
        let project = self.project(project_id).await?;
        self.clock_state(&project.id)
            .await?
            .can_clock_in(&project.name)?;

        let entry = TimeEntry::open(&project.id, self.now(), notes.trim(), &self.zone);

        let guard = self.entries_of_query(&project.id).where_null(CLOCK_OUT_FIELD);
        match self.entries.add_unless(&guard, entry).await? {
            Some(entry) => {
                info!("Clocked in to {} ({})", project.name, entry.id);
                Ok(entry)
            }
            None => {
                debug!("Open entry appeared while clocking in to {}", project.name);
                Err(TransitionError::AlreadyClockedIn {
                    project: project.name,
                }
                .into())
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn clock_out(&self, project_id: &str) -> Result<TimeEntry> {
        let project = self.project(project_id).await?;
        let entries = self.project_entries(&project.id).await?;
        let state = ClockState::derive(&entries, &project.id);
        let entry_id = state.can_clock_out(&project.name)?;

        let Some(mut entry) = current_open_entry(&entries, &project.id).cloned() else {
            return Err(TransitionError::NotClockedIn {
                project: project.name,
            }
            .into());
        };
        let now = self.now();
        validate_interval(entry.clock_in_time, now)?;

        let mut fields = Fields::new();
        fields.insert(CLOCK_OUT_FIELD.into(), json!(now));
        self.entries.update(entry_id, fields).await?;

        entry.clock_out_time = Some(now);
        info!("Clocked out of {} after {}", project.name, entry.duration());
        Ok(entry)
    }

    /// Applies a manual correction. Nothing is written when the resulting interval is inverted, or
    /// when reopening would leave two open entries for the project.
    #[instrument(skip(self))]
    pub async fn edit_entry(&self, id: &str, edit: EntryEdit) -> Result<TimeEntry> {
        if edit.is_empty() {
            return Err(ValidationError::NoChanges.into());
        }
        let mut entry = self.entry(id).await?;
        let (clock_in, clock_out) =
            edit.resulting_interval(entry.clock_in_time, entry.clock_out_time)?;

        if edit.clock_out == Some(ClockOutEdit::Reopen) && !entry.is_open() {
            let siblings = self.project_entries(&entry.project_id).await?;
            if current_open_entry(siblings.iter().filter(|v| v.id != entry.id), &entry.project_id)
                .is_some()
            {
                let project = self
                    .project(&entry.project_id)
                    .await
                    .map(|v| v.name)
                    .unwrap_or_else(|_| entry.project_id.clone());
                return Err(TransitionError::AlreadyClockedIn { project }.into());
            }
        }

        let mut fields = Fields::new();
        if clock_in != entry.clock_in_time {
            entry.set_clock_in(clock_in, &self.zone);
            fields.insert("clockInTime".into(), json!(entry.clock_in_time));
            fields.insert("date".into(), json!(entry.date));
        }
        if clock_out != entry.clock_out_time {
            entry.clock_out_time = clock_out;
            fields.insert(
                CLOCK_OUT_FIELD.into(),
                clock_out.map_or(Value::Null, |v| json!(v)),
            );
        }
        if let Some(notes) = edit.notes {
            entry.notes = notes.trim().to_string();
            fields.insert("notes".into(), json!(entry.notes));
        }

        if fields.is_empty() {
            debug!("Edit of {id} changes nothing");
            return Ok(entry);
        }
        self.entries.update(id, fields).await?;
        Ok(entry)
    }

    #[instrument(skip(self))]
    pub async fn delete_entry(&self, id: &str) -> Result<TimeEntry> {
        let entry = self.entry(id).await?;
        self.entries.delete(id).await?;
        Ok(entry)
    }

    /// Finds an entry by id or unambiguous id prefix.
    pub async fn resolve_entry(&self, reference: &str) -> Result<TimeEntry> {
        let reference = reference.trim();
        if let Some(entry) = self.entries.get(reference).await? {
            return Ok(entry);
        }
        let mut candidates = self
            .entries()
            .await?
            .into_iter()
            .filter(|v| !reference.is_empty() && v.id.starts_with(reference))
            .collect::<Vec<_>>();
        match candidates.len() {
            1 => Ok(candidates.remove(0)),
            0 => Err(AppError::not_found("entry", reference)),
            _ => Err(AppError::Ambiguous {
                kind: "entry",
                reference: reference.to_string(),
            }),
        }
    }

    pub fn watch_projects(&self) -> BoxStream<'static, Result<Vec<Project>, StoreError>> {
        self.projects.watch(self.projects.query())
    }

    pub fn watch_project_entries(
        &self,
        project_id: &str,
    ) -> BoxStream<'static, Result<Vec<TimeEntry>, StoreError>> {
        self.entries.watch(self.entries_of_query(project_id))
    }
}
