//! Records kept per user in the document store. Ids live next to the data in memory but are never
//! written into the document body; the store owns them.

pub mod profile;
pub mod project;
pub mod time_entry;

pub use profile::Profile;
pub use project::Project;
pub use time_entry::TimeEntry;

pub const PROFILES: &str = "profile";
pub const PROJECTS: &str = "projects";
pub const TIME_ENTRIES: &str = "timeEntries";
