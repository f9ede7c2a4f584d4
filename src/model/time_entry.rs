use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    store::typed::Document,
    utils::time::{date_to_key, local_date},
};

use super::TIME_ENTRIES;

pub const PROJECT_ID_FIELD: &str = "projectId";
pub const CLOCK_OUT_FIELD: &str = "clockOutTime";

/// One tracked session. `clock_out_time` being `None` means the session is still open. `date` is
/// derived from `clock_in_time` in the viewer's zone and must be recomputed whenever clock-in
/// changes, see [TimeEntry::set_clock_in].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    #[serde(skip)]
    pub id: String,
    pub project_id: String,
    pub clock_in_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_out_time: Option<DateTime<Utc>>,
    pub date: String,
    #[serde(default)]
    pub notes: String,
}

impl TimeEntry {
    pub fn open<Tz: TimeZone>(
        project_id: impl Into<String>,
        clock_in_time: DateTime<Utc>,
        notes: impl Into<String>,
        zone: &Tz,
    ) -> Self {
        Self {
            id: String::new(),
            project_id: project_id.into(),
            clock_in_time,
            clock_out_time: None,
            date: date_to_key(local_date(clock_in_time, zone)),
            notes: notes.into(),
        }
    }

    pub fn closed<Tz: TimeZone>(
        project_id: impl Into<String>,
        clock_in_time: DateTime<Utc>,
        clock_out_time: DateTime<Utc>,
        zone: &Tz,
    ) -> Self {
        Self {
            clock_out_time: Some(clock_out_time),
            ..Self::open(project_id, clock_in_time, "", zone)
        }
    }

    pub fn is_open(&self) -> bool {
        self.clock_out_time.is_none()
    }

    pub fn set_clock_in<Tz: TimeZone>(&mut self, clock_in_time: DateTime<Utc>, zone: &Tz) {
        self.clock_in_time = clock_in_time;
        self.date = date_to_key(local_date(clock_in_time, zone));
    }

    /// Completed duration. Open entries and (unreachable) inverted intervals count as zero.
    pub fn duration(&self) -> Duration {
        match self.clock_out_time {
            Some(out) if out >= self.clock_in_time => out - self.clock_in_time,
            _ => Duration::zero(),
        }
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self
        }
    }
}

impl Document for TimeEntry {
    const COLLECTION: &'static str = TIME_ENTRIES;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
