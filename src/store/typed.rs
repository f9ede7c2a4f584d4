use std::{marker::PhantomData, sync::Arc};

use futures::{stream::BoxStream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use super::{CollectionPath, DocumentStore, Fields, Query, RawDocument, StoreError};

/// A record type living in its own per-user collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);
}

/// Typed view of one user's collection of `T`. Documents that don't decode are skipped with a
/// warning so one bad record doesn't hide the rest.
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    path: CollectionPath,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

fn decode<T: Document>(raw: RawDocument) -> Result<T, StoreError> {
    let mut document: T = serde_json::from_value(raw.data)?;
    document.set_id(raw.id);
    Ok(document)
}

fn decode_all<T: Document>(path: &CollectionPath, documents: Vec<RawDocument>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|raw| {
            let id = raw.id.clone();
            decode(raw)
                .inspect_err(|e| warn!("Skipping malformed document {id} in {path}: {e}"))
                .ok()
        })
        .collect()
}

impl<T: Document> Collection<T> {
    pub fn new(store: Arc<dyn DocumentStore>, owner: &str) -> Self {
        Self {
            store,
            path: CollectionPath::user(owner, T::COLLECTION),
            _marker: PhantomData,
        }
    }

    pub fn query(&self) -> Query {
        Query::all(self.path.clone())
    }

    pub async fn add(&self, mut document: T) -> Result<T, StoreError> {
        let id = self
            .store
            .create(&self.path, serde_json::to_value(&document)?)
            .await?;
        document.set_id(id);
        Ok(document)
    }

    pub async fn put(&self, mut document: T, id: &str) -> Result<T, StoreError> {
        self.store
            .set(&self.path, id, serde_json::to_value(&document)?)
            .await?;
        document.set_id(id.to_string());
        Ok(document)
    }

    /// Adds `document` only if nothing matches `guard`, see [DocumentStore::create_unless].
    pub async fn add_unless(&self, guard: &Query, mut document: T) -> Result<Option<T>, StoreError> {
        let created = self
            .store
            .create_unless(guard, serde_json::to_value(&document)?)
            .await?;
        Ok(created.map(|id| {
            document.set_id(id);
            document
        }))
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.store
            .read_one(&self.path, id)
            .await?
            .map(|data| {
                decode(RawDocument {
                    id: id.to_string(),
                    data,
                })
            })
            .transpose()
    }

    pub async fn update(&self, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.store.update(&self.path, id, fields).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(&self.path, id).await
    }

    pub async fn delete_where(&self, query: &Query) -> Result<usize, StoreError> {
        self.store.delete_where(query).await
    }

    pub async fn list(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        let snapshot = self.store.query(query).await?;
        Ok(decode_all(&self.path, snapshot.documents))
    }

    pub async fn all(&self) -> Result<Vec<T>, StoreError> {
        self.list(&self.query()).await
    }

    /// Live, decoded snapshots of `query`.
    pub fn watch(&self, query: Query) -> BoxStream<'static, Result<Vec<T>, StoreError>> {
        let path = self.path.clone();
        self.store
            .snapshots(query)
            .map(move |snapshot| snapshot.map(|s| decode_all(&path, s.documents)))
            .boxed()
    }
}
