//! Document storage behind [DocumentStore].
//!
//! - Documents are JSON objects grouped into collections scoped per user (`users/<uid>/<name>`).
//! - Every write bumps the collection's revision. Subscribers always receive the whole filtered
//!   collection at a revision, never partial changes.
//! - [file_store::FileStore] is the local realization: one append-only JSON-lines journal per
//!   collection, guarded by file locks.

pub mod file_store;
pub mod subscription;
pub mod typed;

use std::{fmt::Display, sync::Arc};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

pub type Fields = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("document {id} not found in {path}")]
    NotFound { path: String, id: String },

    #[error("documents in {path} must be JSON objects")]
    NotAnObject { path: String },

    #[error("invalid collection path {0}")]
    InvalidPath(String),
}

/// Location of a collection. Every collection belongs to exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    owner: Arc<str>,
    collection: Arc<str>,
}

impl CollectionPath {
    pub fn user(owner: &str, collection: &str) -> Self {
        Self {
            owner: owner.into(),
            collection: collection.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "users/{}/{}", self.owner, self.collection)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equals { field: String, value: Value },
    /// Matches documents where the field is `null` or missing.
    IsNull { field: String },
}

impl Filter {
    fn matches(&self, data: &Value) -> bool {
        match self {
            Filter::Equals { field, value } => data.get(field) == Some(value),
            Filter::IsNull { field } => data.get(field).map_or(true, Value::is_null),
        }
    }
}

/// A collection plus conjunctive equality filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub path: CollectionPath,
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn all(path: CollectionPath) -> Self {
        Self {
            path,
            filters: vec![],
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Equals {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn where_null(mut self, field: &str) -> Self {
        self.filters.push(Filter::IsNull {
            field: field.to_string(),
        });
        self
    }

    pub fn matches(&self, data: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub data: Value,
}

/// Full contents of a query's collection at one revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub revision: u64,
    pub documents: Vec<RawDocument>,
}

/// Contract the application speaks to persist profiles, projects and entries. Writes are
/// serialized by the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Stores `data` under a freshly generated id and returns it.
    async fn create(&self, path: &CollectionPath, data: Value) -> Result<String, StoreError>;

    /// Creates or replaces the document with a known id.
    async fn set(&self, path: &CollectionPath, id: &str, data: Value) -> Result<(), StoreError>;

    /// Creates `data` in `guard.path` only when no document matches `guard`. The check and the
    /// write happen atomically. Returns the new id, or `None` when the guard matched.
    async fn create_unless(&self, guard: &Query, data: Value)
        -> Result<Option<String>, StoreError>;

    async fn read_one(&self, path: &CollectionPath, id: &str) -> Result<Option<Value>, StoreError>;

    /// Merges top-level `partial` fields into an existing document. A `null` value clears the
    /// field. Fails with [StoreError::NotFound] when the document doesn't exist.
    async fn update(&self, path: &CollectionPath, id: &str, partial: Fields)
        -> Result<(), StoreError>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError>;

    /// Deletes every document matching `query` in one write and returns how many were removed.
    async fn delete_where(&self, query: &Query) -> Result<usize, StoreError>;

    async fn query(&self, query: &Query) -> Result<Snapshot, StoreError>;

    /// Live sequence of snapshots for `query`. Nothing happens until the stream is polled; the
    /// first item is the current state, later items arrive whenever the collection's revision
    /// moves. The stream ends after yielding an error. Calling it again starts over.
    fn snapshots(&self, query: Query) -> BoxStream<'static, Result<Snapshot, StoreError>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CollectionPath, Query};

    #[test]
    fn query_filters_are_conjunctive() {
        let query = Query::all(CollectionPath::user("u", "timeEntries"))
            .where_eq("projectId", "p1")
            .where_null("clockOutTime");

        assert!(query.matches(&json!({"projectId": "p1"})));
        assert!(query.matches(&json!({"projectId": "p1", "clockOutTime": null})));
        assert!(!query.matches(&json!({"projectId": "p1", "clockOutTime": "2024-01-01T00:00:00Z"})));
        assert!(!query.matches(&json!({"projectId": "p2"})));
    }

    #[test]
    fn path_display() {
        assert_eq!(
            CollectionPath::user("abc", "projects").to_string(),
            "users/abc/projects"
        );
    }
}
