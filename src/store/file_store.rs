use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
    sync::{broadcast, RwLock},
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{fs::operations::read_last_line, utils::clock::Clock};

use super::{CollectionPath, DocumentStore, Fields, Query, RawDocument, Snapshot, StoreError};

const JOURNAL_EXTENSION: &str = "jsonl";
const LOCK_EXTENSION: &str = "lock";
const COMPACTION_EXTENSION: &str = "jsonl.compact";
const CHANGE_CHANNEL_CAPACITY: usize = 64;
/// A journal is rewritten once it carries this many lines more than 4 per live document.
const COMPACTION_SLACK: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Operation {
    Put { id: String, data: Value },
    Patch { id: String, fields: Fields },
    Delete { id: String },
    /// Written after compaction so the revision survives even when no documents are left.
    Checkpoint,
}

/// One line of a collection journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct JournalLine {
    rev: u64,
    at: DateTime<Utc>,
    op: Operation,
}

/// Collection contents rebuilt by replaying a journal.
#[derive(Debug, Default)]
struct CollectionState {
    revision: u64,
    documents: Vec<RawDocument>,
    lines: usize,
}

impl CollectionState {
    fn apply(&mut self, line: JournalLine) {
        self.revision = line.rev;
        self.lines += 1;
        match line.op {
            Operation::Put { id, data } => match self.position(&id) {
                Some(index) => self.documents[index].data = data,
                None => self.documents.push(RawDocument { id, data }),
            },
            Operation::Patch { id, fields } => {
                if let Some(index) = self.position(&id) {
                    if let Value::Object(current) = &mut self.documents[index].data {
                        current.extend(fields);
                    }
                }
            }
            Operation::Delete { id } => self.documents.retain(|doc| doc.id != id),
            Operation::Checkpoint => {}
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.documents.iter().position(|doc| doc.id == id)
    }

    fn get(&self, id: &str) -> Option<&RawDocument> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    fn snapshot(&self, query: &Query) -> Snapshot {
        Snapshot {
            revision: self.revision,
            documents: self
                .documents
                .iter()
                .filter(|doc| query.matches(&doc.data))
                .cloned()
                .collect(),
        }
    }

    fn needs_compaction(&self) -> bool {
        self.lines > self.documents.len() * 4 + COMPACTION_SLACK
    }
}

struct Inner {
    root: PathBuf,
    changes: broadcast::Sender<CollectionPath>,
    /// Serializes access inside this process. File locks alone would block the only runtime
    /// thread when two tasks touch the same journal.
    access: RwLock<()>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

/// The main realization of [DocumentStore]. Layout:
///  - `<root>/<owner>/<collection>.jsonl` holds one journal per collection.
///  - Every line is a [JournalLine]; replaying the lines in order rebuilds the collection.
///  - Writers append under an exclusive lock, readers replay under a shared lock. The locks are
///    taken on `<collection>.lock` so compaction can swap the journal file underneath.
///
/// Other processes writing the same directory are noticed by polling the journal's last revision.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<Inner>,
}

impl FileStore {
    pub fn new(
        root: PathBuf,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                root,
                changes,
                access: RwLock::new(()),
                clock,
                poll_interval,
            }),
        })
    }
}

fn valid_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(&['/', '\\', '\0'][..])
}

fn ensure_object(path: &CollectionPath, data: &Value) -> Result<(), StoreError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(StoreError::NotAnObject {
            path: path.to_string(),
        })
    }
}

async fn read_journal<R: AsyncBufRead + Unpin>(
    reader: R,
    origin: &Path,
) -> Result<CollectionState, std::io::Error> {
    let mut lines = reader.lines();
    let mut state = CollectionState::default();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalLine>(&line) {
            Ok(v) => state.apply(v),
            Err(e) => {
                // A write cut short by a crash leaves a partial last line behind.
                warn!("Skipping illegal journal line in {:?} {}: {e}", origin, &line)
            }
        }
    }
    Ok(state)
}

fn encode_lines(lines: &[JournalLine]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buffer = Vec::<u8>::new();
    for line in lines {
        serde_json::to_writer(&mut buffer, line)?;
        buffer.push(b'\n');
    }
    Ok(buffer)
}

/// What a mutation wants written, plus the value handed back to the caller.
type Plan<R> = (Vec<Operation>, R);

impl Inner {
    fn journal_path(&self, path: &CollectionPath) -> Result<PathBuf, StoreError> {
        if !valid_component(path.owner()) || !valid_component(path.collection()) {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(self
            .root
            .join(path.owner())
            .join(format!("{}.{JOURNAL_EXTENSION}", path.collection())))
    }

    /// Opens the lock file guarding `file_path`. Locks live in a sibling file so a compacted
    /// journal can be renamed into place while the lock is held.
    async fn open_lock(file_path: &Path) -> Result<Option<File>, std::io::Error> {
        match File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(file_path.with_extension(LOCK_EXTENSION))
            .await
        {
            Ok(file) => Ok(Some(file)),
            // No owner directory yet, so nothing was ever written.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn load(&self, path: &CollectionPath) -> Result<CollectionState, StoreError> {
        let file_path = self.journal_path(path)?;
        let _access = self.access.read().await;

        let Some(lock) = Self::open_lock(&file_path).await? else {
            return Ok(CollectionState::default());
        };
        lock.lock_shared()?;
        let state = Self::replay(&file_path).await;
        lock.unlock_async().await?;

        Ok(state?)
    }

    async fn replay(file_path: &Path) -> Result<CollectionState, std::io::Error> {
        match File::open(file_path).await {
            Ok(file) => read_journal(BufReader::new(file), file_path).await,
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(CollectionState::default()),
            Err(e) => Err(e),
        }
    }

    /// Latest revision of a collection, read from the journal's last line only.
    async fn revision(&self, path: &CollectionPath) -> Result<u64, StoreError> {
        let file_path = self.journal_path(path)?;
        let last_line = {
            let _access = self.access.read().await;
            let Some(lock) = Self::open_lock(&file_path).await? else {
                return Ok(0);
            };
            lock.lock_shared()?;
            let line = match File::open(&file_path).await {
                Ok(mut file) => read_last_line(&mut file, &mut [0; 1024]).await,
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            };
            lock.unlock_async().await?;
            line?
        };

        match last_line.map(|line| serde_json::from_str::<JournalLine>(&line)) {
            None => Ok(0),
            Some(Ok(line)) => Ok(line.rev),
            // Partial trailing line, fall back to replaying everything.
            Some(Err(_)) => Ok(self.load(path).await?.revision),
        }
    }

    async fn query(&self, query: &Query) -> Result<Snapshot, StoreError> {
        Ok(self.load(&query.path).await?.snapshot(query))
    }

    /// Runs `plan` against the current collection state while holding the journal's exclusive
    /// lock and appends whatever operations it returns.
    async fn mutate<R>(
        &self,
        path: &CollectionPath,
        plan: impl FnOnce(&CollectionState) -> Result<Plan<R>, StoreError>,
    ) -> Result<R, StoreError> {
        let file_path = self.journal_path(path)?;
        let _access = self.access.write().await;

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let lock = Self::open_lock(&file_path)
            .await?
            .ok_or_else(|| std::io::Error::from(ErrorKind::NotFound))?;

        // Semi-safe acquire-release for a file
        lock.lock_exclusive()?;
        let result = self.mutate_locked(&file_path, plan).await;
        lock.unlock_async().await?;

        let (written, value) = result?;
        if written {
            debug!("Journal {path} moved forward");
            // Nobody listening is fine.
            let _ = self.changes.send(path.clone());
        }
        Ok(value)
    }

    async fn mutate_locked<R>(
        &self,
        file_path: &Path,
        plan: impl FnOnce(&CollectionState) -> Result<Plan<R>, StoreError>,
    ) -> Result<(bool, R), StoreError> {
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(file_path)
            .await?;
        let mut state = read_journal(BufReader::new(&mut file), file_path).await?;

        let (operations, value) = plan(&state)?;
        if operations.is_empty() {
            return Ok((false, value));
        }

        let at = self.clock.time();
        let mut lines = Vec::with_capacity(operations.len());
        for (offset, op) in operations.into_iter().enumerate() {
            lines.push(JournalLine {
                rev: state.revision + 1 + offset as u64,
                at,
                op,
            });
        }

        let mut buffer = Vec::new();
        let length = file.seek(std::io::SeekFrom::End(0)).await?;
        if length > 0 {
            file.seek(std::io::SeekFrom::End(-1)).await?;
            let last = file.read_u8().await?;
            if last != b'\n' {
                buffer.push(b'\n');
            }
        }
        buffer.extend(encode_lines(&lines)?);

        file.seek(std::io::SeekFrom::End(0)).await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        drop(file);

        for line in lines {
            state.apply(line);
        }
        if state.needs_compaction() {
            // The appended lines already landed, a failed rewrite only leaves the journal long.
            if let Err(e) = Self::compact(file_path, &state, at).await {
                warn!("Failed to compact {:?} {e}", file_path);
            }
        }

        Ok((true, value))
    }

    /// Rewrites the journal as one `put` per live document, keeping the revision. The new
    /// content goes to a temporary file that replaces the journal only once it is fully on disk.
    async fn compact(
        file_path: &Path,
        state: &CollectionState,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut lines: Vec<JournalLine> = state
            .documents
            .iter()
            .map(|doc| JournalLine {
                rev: state.revision,
                at,
                op: Operation::Put {
                    id: doc.id.clone(),
                    data: doc.data.clone(),
                },
            })
            .collect();
        lines.push(JournalLine {
            rev: state.revision,
            at,
            op: Operation::Checkpoint,
        });
        let buffer = encode_lines(&lines)?;

        let temp_path = file_path.with_extension(COMPACTION_EXTENSION);
        let written = async {
            let mut temp = File::create(&temp_path).await?;
            temp.write_all(&buffer).await?;
            temp.flush().await?;
            temp.sync_all().await?;
            tokio::fs::rename(&temp_path, file_path).await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        info!(
            "Compacted {:?} from {} lines to {}",
            file_path,
            state.lines,
            lines.len()
        );
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    #[instrument(skip(self, data), fields(path = %path))]
    async fn create(&self, path: &CollectionPath, data: Value) -> Result<String, StoreError> {
        ensure_object(path, &data)?;
        let id = Uuid::new_v4().to_string();
        self.inner
            .mutate(path, |_| {
                Ok((
                    vec![Operation::Put {
                        id: id.clone(),
                        data,
                    }],
                    id,
                ))
            })
            .await
    }

    #[instrument(skip(self, data), fields(path = %path))]
    async fn set(&self, path: &CollectionPath, id: &str, data: Value) -> Result<(), StoreError> {
        ensure_object(path, &data)?;
        self.inner
            .mutate(path, |_| {
                Ok((
                    vec![Operation::Put {
                        id: id.to_string(),
                        data,
                    }],
                    (),
                ))
            })
            .await
    }

    #[instrument(skip(self, guard, data), fields(path = %guard.path))]
    async fn create_unless(
        &self,
        guard: &Query,
        data: Value,
    ) -> Result<Option<String>, StoreError> {
        ensure_object(&guard.path, &data)?;
        self.inner
            .mutate(&guard.path, |state| {
                if state.documents.iter().any(|doc| guard.matches(&doc.data)) {
                    debug!("Guard matched, nothing created");
                    return Ok((vec![], None));
                }
                let id = Uuid::new_v4().to_string();
                Ok((
                    vec![Operation::Put {
                        id: id.clone(),
                        data,
                    }],
                    Some(id),
                ))
            })
            .await
    }

    async fn read_one(&self, path: &CollectionPath, id: &str) -> Result<Option<Value>, StoreError> {
        let state = self.inner.load(path).await?;
        Ok(state.get(id).map(|doc| doc.data.clone()))
    }

    #[instrument(skip(self, partial), fields(path = %path))]
    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        partial: Fields,
    ) -> Result<(), StoreError> {
        self.inner
            .mutate(path, |state| match state.get(id) {
                Some(_) => Ok((
                    vec![Operation::Patch {
                        id: id.to_string(),
                        fields: partial,
                    }],
                    (),
                )),
                None => Err(StoreError::NotFound {
                    path: path.to_string(),
                    id: id.to_string(),
                }),
            })
            .await
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        self.inner
            .mutate(path, |state| {
                let operations = match state.get(id) {
                    Some(_) => vec![Operation::Delete { id: id.to_string() }],
                    None => vec![],
                };
                Ok((operations, ()))
            })
            .await
    }

    #[instrument(skip(self, query), fields(path = %query.path))]
    async fn delete_where(&self, query: &Query) -> Result<usize, StoreError> {
        self.inner
            .mutate(&query.path, |state| {
                let operations = state
                    .documents
                    .iter()
                    .filter(|doc| query.matches(&doc.data))
                    .map(|doc| Operation::Delete { id: doc.id.clone() })
                    .collect::<Vec<_>>();
                let removed = operations.len();
                Ok((operations, removed))
            })
            .await
    }

    async fn query(&self, query: &Query) -> Result<Snapshot, StoreError> {
        self.inner.query(query).await
    }

    fn snapshots(&self, query: Query) -> BoxStream<'static, Result<Snapshot, StoreError>> {
        let watch = SnapshotWatch {
            inner: self.inner.clone(),
            query,
            changes: None,
            changes_closed: false,
            last_revision: None,
            finished: false,
        };

        stream::unfold(watch, |mut watch| async move {
            if watch.finished {
                return None;
            }
            let next = watch.next_snapshot().await;
            if next.is_err() {
                watch.finished = true;
            }
            Some((next, watch))
        })
        .boxed()
    }
}

/// State behind one [FileStore::snapshots] stream.
struct SnapshotWatch {
    inner: Arc<Inner>,
    query: Query,
    /// Subscribed on first poll, which keeps the stream lazy.
    changes: Option<broadcast::Receiver<CollectionPath>>,
    changes_closed: bool,
    last_revision: Option<u64>,
    finished: bool,
}

impl SnapshotWatch {
    async fn next_snapshot(&mut self) -> Result<Snapshot, StoreError> {
        if self.changes.is_none() {
            self.changes = Some(self.inner.changes.subscribe());
            let snapshot = self.inner.query(&self.query).await?;
            self.last_revision = Some(snapshot.revision);
            return Ok(snapshot);
        }

        loop {
            self.wait_for_change().await?;
            let snapshot = self.inner.query(&self.query).await?;
            if Some(snapshot.revision) != self.last_revision {
                self.last_revision = Some(snapshot.revision);
                return Ok(snapshot);
            }
        }
    }

    /// Resolves when this process wrote the collection or when polling sees another revision.
    async fn wait_for_change(&mut self) -> Result<(), StoreError> {
        let Some(changes) = self.changes.as_mut() else {
            return Ok(());
        };
        let last_revision = self.last_revision.unwrap_or_default();

        loop {
            tokio::select! {
                change = changes.recv(), if !self.changes_closed => match change {
                    Ok(path) if path == self.query.path => return Ok(()),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Change listener lagged by {skipped}");
                        return Ok(());
                    }
                    Err(broadcast::error::RecvError::Closed) => self.changes_closed = true,
                },
                _ = self.inner.clock.sleep(self.inner.poll_interval) => {
                    if self.inner.revision(&self.query.path).await? != last_revision {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use futures::StreamExt;
    use serde_json::{json, Map};
    use tempfile::tempdir;

    use crate::{
        store::{CollectionPath, DocumentStore, Query, StoreError},
        utils::{clock::DefaultClock, logging::TEST_LOGGING},
    };

    use super::FileStore;

    fn store_in(dir: &std::path::Path) -> Result<FileStore> {
        Ok(FileStore::new(
            dir.to_path_buf(),
            Arc::new(DefaultClock),
            Duration::from_millis(20),
        )?)
    }

    fn projects() -> CollectionPath {
        CollectionPath::user("user-1", "projects")
    }

    #[tokio::test]
    async fn create_read_update_delete() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = store_in(dir.path())?;

        let id = store.create(&projects(), json!({"name": "Thesis"})).await?;
        assert_eq!(
            store.read_one(&projects(), &id).await?,
            Some(json!({"name": "Thesis"}))
        );

        let mut partial = Map::new();
        partial.insert("name".into(), json!("Dissertation"));
        store.update(&projects(), &id, partial).await?;
        assert_eq!(
            store.read_one(&projects(), &id).await?,
            Some(json!({"name": "Dissertation"}))
        );

        store.delete(&projects(), &id).await?;
        assert_eq!(store.read_one(&projects(), &id).await?, None);
        // deleting twice is fine
        store.delete(&projects(), &id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() -> Result<()> {
        let dir = tempdir()?;
        let store = store_in(dir.path())?;

        let result = store.update(&projects(), "missing", Map::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn non_object_documents_are_rejected() -> Result<()> {
        let dir = tempdir()?;
        let store = store_in(dir.path())?;

        let result = store.create(&projects(), json!("just a string")).await;
        assert!(matches!(result, Err(StoreError::NotAnObject { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn path_components_are_validated() -> Result<()> {
        let dir = tempdir()?;
        let store = store_in(dir.path())?;

        let result = store
            .create(&CollectionPath::user("..", "projects"), json!({}))
            .await;
        assert!(matches!(result, Err(StoreError::InvalidPath(_))));
        Ok(())
    }

    #[tokio::test]
    async fn create_unless_respects_guard() -> Result<()> {
        let dir = tempdir()?;
        let store = store_in(dir.path())?;
        let entries = CollectionPath::user("user-1", "timeEntries");
        let guard = Query::all(entries.clone())
            .where_eq("projectId", "p1")
            .where_null("clockOutTime");

        let first = store
            .create_unless(&guard, json!({"projectId": "p1", "clockOutTime": null}))
            .await?;
        assert!(first.is_some());

        let second = store
            .create_unless(&guard, json!({"projectId": "p1", "clockOutTime": null}))
            .await?;
        assert_eq!(second, None);

        // another project isn't affected by the guard
        let other_guard = Query::all(entries.clone()).where_eq("projectId", "p2");
        let other = store
            .create_unless(&other_guard, json!({"projectId": "p2"}))
            .await?;
        assert!(other.is_some());

        assert_eq!(store.query(&Query::all(entries)).await?.documents.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn delete_where_removes_only_matches() -> Result<()> {
        let dir = tempdir()?;
        let store = store_in(dir.path())?;
        let entries = CollectionPath::user("user-1", "timeEntries");

        for project in ["p1", "p1", "p2"] {
            store
                .create(&entries, json!({ "projectId": project }))
                .await?;
        }

        let removed = store
            .delete_where(&Query::all(entries.clone()).where_eq("projectId", "p1"))
            .await?;
        assert_eq!(removed, 2);

        let left = store.query(&Query::all(entries)).await?;
        assert_eq!(left.documents.len(), 1);
        assert_eq!(left.documents[0].data, json!({"projectId": "p2"}));
        Ok(())
    }

    #[tokio::test]
    async fn journal_survives_reopen_and_partial_lines() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let first_id = {
            let store = store_in(dir.path())?;
            store.create(&projects(), json!({"name": "A"})).await?
        };

        // Simulate a write interrupted half way
        let journal = dir.path().join("user-1").join("projects.jsonl");
        let mut content = std::fs::read_to_string(&journal)?;
        content.push_str("{\"rev\":2,\"at\":");
        std::fs::write(&journal, content)?;

        let store = store_in(dir.path())?;
        let second_id = store.create(&projects(), json!({"name": "B"})).await?;

        let snapshot = store.query(&Query::all(projects())).await?;
        let ids = snapshot
            .documents
            .iter()
            .map(|doc| doc.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![first_id.as_str(), second_id.as_str()]);
        assert_eq!(snapshot.revision, 2);
        Ok(())
    }

    #[tokio::test]
    async fn compaction_keeps_contents_and_revision() -> Result<()> {
        let dir = tempdir()?;
        let store = store_in(dir.path())?;

        let id = store.create(&projects(), json!({"name": "v0"})).await?;
        for version in 1..=100 {
            let mut partial = Map::new();
            partial.insert("name".into(), json!(format!("v{version}")));
            store.update(&projects(), &id, partial).await?;
        }

        let journal = dir.path().join("user-1").join("projects.jsonl");
        let lines = std::fs::read_to_string(&journal)?.lines().count();
        assert!(lines < 101, "journal was never compacted: {lines} lines");

        let snapshot = store.query(&Query::all(projects())).await?;
        assert_eq!(snapshot.revision, 101);
        assert_eq!(snapshot.documents[0].data, json!({"name": "v100"}));
        Ok(())
    }

    #[tokio::test]
    async fn failed_compaction_keeps_every_write() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = store_in(dir.path())?;
        let id = store.create(&projects(), json!({"name": "v0"})).await?;

        // A directory where the rewrite goes makes every compaction attempt fail
        let blocker = dir.path().join("user-1").join("projects.jsonl.compact");
        std::fs::create_dir(&blocker)?;

        for version in 1..=100 {
            let mut partial = Map::new();
            partial.insert("name".into(), json!(format!("v{version}")));
            store.update(&projects(), &id, partial).await?;
        }

        let journal = dir.path().join("user-1").join("projects.jsonl");
        assert_eq!(std::fs::read_to_string(&journal)?.lines().count(), 101);

        let reopened = store_in(dir.path())?;
        let snapshot = reopened.query(&Query::all(projects())).await?;
        assert_eq!(snapshot.revision, 101);
        assert_eq!(snapshot.documents[0].data, json!({"name": "v100"}));

        // Once the rewrite can land again the journal shrinks without losing anything
        std::fs::remove_dir(&blocker)?;
        let mut partial = Map::new();
        partial.insert("name".into(), json!("final"));
        reopened.update(&projects(), &id, partial).await?;

        assert!(std::fs::read_to_string(&journal)?.lines().count() < 101);
        assert!(!blocker.exists());
        let snapshot = reopened.query(&Query::all(projects())).await?;
        assert_eq!(snapshot.revision, 102);
        assert_eq!(snapshot.documents.len(), 1);
        assert_eq!(snapshot.documents[0].data, json!({"name": "final"}));
        Ok(())
    }

    #[tokio::test]
    async fn snapshots_follow_local_writes() -> Result<()> {
        let dir = tempdir()?;
        let store = store_in(dir.path())?;
        let mut snapshots = store.snapshots(Query::all(projects()));

        let first = snapshots.next().await.unwrap()?;
        assert!(first.documents.is_empty());

        store.create(&projects(), json!({"name": "A"})).await?;
        let second = snapshots.next().await.unwrap()?;
        assert_eq!(second.documents.len(), 1);
        assert!(second.revision > first.revision);
        Ok(())
    }

    #[tokio::test]
    async fn snapshots_notice_other_writers() -> Result<()> {
        let dir = tempdir()?;
        let watcher = store_in(dir.path())?;
        // A second store has its own change channel, like another process would.
        let writer = store_in(dir.path())?;

        let mut snapshots = watcher.snapshots(Query::all(projects()).where_eq("name", "B"));
        assert!(snapshots.next().await.unwrap()?.documents.is_empty());

        writer.create(&projects(), json!({"name": "B"})).await?;
        let next = tokio::time::timeout(Duration::from_secs(5), snapshots.next())
            .await?
            .unwrap()?;
        assert_eq!(next.documents.len(), 1);
        Ok(())
    }
}
