use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{aggregation::current_open_entry, model::TimeEntry};

/// Whether a project is being tracked right now. Always derived from the entries, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockState {
    ClockedOut,
    ClockedIn {
        entry_id: String,
        since: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("project {project} is already clocked in")]
    AlreadyClockedIn { project: String },
    #[error("project {project} is not clocked in")]
    NotClockedIn { project: String },
}

impl TransitionError {
    pub fn user_message(&self) -> String {
        match self {
            TransitionError::AlreadyClockedIn { project } => {
                format!("You're already clocked in to {project}. Clock out first.")
            }
            TransitionError::NotClockedIn { project } => {
                format!("You're not clocked in to {project}.")
            }
        }
    }
}

impl ClockState {
    pub fn derive<'a>(
        entries: impl IntoIterator<Item = &'a TimeEntry>,
        project_id: &str,
    ) -> Self {
        match current_open_entry(entries, project_id) {
            Some(entry) => ClockState::ClockedIn {
                entry_id: entry.id.clone(),
                since: entry.clock_in_time,
            },
            None => ClockState::ClockedOut,
        }
    }

    /// Checks ClockedOut → ClockedIn.
    pub fn can_clock_in(&self, project: &str) -> Result<(), TransitionError> {
        match self {
            ClockState::ClockedOut => Ok(()),
            ClockState::ClockedIn { .. } => Err(TransitionError::AlreadyClockedIn {
                project: project.to_string(),
            }),
        }
    }

    /// Checks ClockedIn → ClockedOut and yields the entry to close.
    pub fn can_clock_out(&self, project: &str) -> Result<&str, TransitionError> {
        match self {
            ClockState::ClockedIn { entry_id, .. } => Ok(entry_id.as_str()),
            ClockState::ClockedOut => Err(TransitionError::NotClockedIn {
                project: project.to_string(),
            }),
        }
    }
}
