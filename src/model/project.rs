use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::typed::Document;

use super::PROJECTS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            created_at,
        }
    }
}

impl Document for Project {
    const COLLECTION: &'static str = PROJECTS;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
