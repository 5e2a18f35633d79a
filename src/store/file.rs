use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::tables::Tables;
use super::{OutboxStore, RequestRepository, UnitOfWork};
use crate::error::StorageError;
use crate::outbox::{NewOutboxEntry, OutboxEntry};
use crate::request::RequestRecord;

/// Store persisted as a single JSON document.
///
/// The file is the only copy of the tables. Every operation takes an OS lock
/// on a `<name>.lock` sidecar (shared for reads, exclusive for writes) and
/// loads the tables from disk under it, so any number of handles and
/// processes can open the same path without losing each other's commits.
///
/// A write transaction applies to the loaded tables, writes them to a
/// temporary file, syncs it, renames it over the live file and syncs the
/// directory. A failed write leaves the live file untouched.
///
/// Cloning creates another handle sharing the same lock file descriptor.
#[derive(Clone)]
pub struct JsonFileStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    // OS file locks are per descriptor; the mutex serializes this process's
    // users of it.
    lock: Mutex<File>,
}

/// Releases the OS lock on drop.
struct FileLock<'a> {
    file: MutexGuard<'a, File>,
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable or corrupt one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(sibling(&path, ".lock"))
            .map_err(|err| StorageError::io("opening store lock file", err))?;

        let store = Self {
            inner: Arc::new(Inner {
                path,
                lock: Mutex::new(lock),
            }),
        };
        store.read(|_| ())?;

        tracing::debug!(path = %store.path().display(), "opened request store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn lock(&self, exclusive: bool) -> Result<FileLock<'_>, StorageError> {
        let file = self
            .inner
            .lock
            .lock()
            .map_err(|_| StorageError::lock_poisoned("store file"))?;
        let locked = if exclusive {
            file.lock()
        } else {
            file.lock_shared()
        };
        locked.map_err(|err| StorageError::io("locking store file", err))?;
        Ok(FileLock { file })
    }

    fn read<T>(&self, apply: impl FnOnce(&Tables) -> T) -> Result<T, StorageError> {
        let _lock = self.lock(false)?;
        let tables = load(&self.inner.path)?;
        Ok(apply(&tables))
    }

    /// Run `apply` against the current tables and persist them when `dirty`
    /// says the result changed anything.
    fn transact<T>(
        &self,
        apply: impl FnOnce(&mut Tables) -> Result<T, StorageError>,
        dirty: impl FnOnce(&T) -> bool,
    ) -> Result<T, StorageError> {
        let _lock = self.lock(true)?;
        let mut tables = load(&self.inner.path)?;
        let output = apply(&mut tables)?;
        if dirty(&output) {
            persist(&self.inner.path, &tables)?;
        }
        Ok(output)
    }
}

fn load(path: &Path) -> Result<Tables, StorageError> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(StorageError::serialization),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Tables::default()),
        Err(err) => Err(StorageError::io("reading store file", err)),
    }
}

fn persist(path: &Path, tables: &Tables) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(tables).map_err(StorageError::serialization)?;
    let staging = sibling(path, ".tmp");

    let mut file =
        File::create(&staging).map_err(|err| StorageError::io("creating staging file", err))?;
    file.write_all(&bytes)
        .and_then(|()| file.sync_all())
        .map_err(|err| StorageError::io("writing staging file", err))?;
    fs::rename(&staging, path).map_err(|err| StorageError::io("replacing store file", err))?;
    sync_parent(path)
}

/// Make the rename itself durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<(), StorageError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|err| StorageError::io("syncing store directory", err))
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

impl UnitOfWork for JsonFileStore {
    fn execute(
        &self,
        record: RequestRecord,
        staged: NewOutboxEntry,
    ) -> Result<OutboxEntry, StorageError> {
        self.transact(
            |tables| tables.insert_pair(record, staged, Utc::now()),
            |_| true,
        )
    }
}

impl RequestRepository for JsonFileStore {
    fn find_request(&self, identifier: &str) -> Result<Option<RequestRecord>, StorageError> {
        self.read(|tables| tables.record(identifier).cloned())
    }

    fn request_count(&self) -> Result<usize, StorageError> {
        self.read(Tables::record_count)
    }
}

impl OutboxStore for JsonFileStore {
    fn claim_due(
        &self,
        worker_id: &str,
        max: usize,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxEntry>, StorageError> {
        self.transact(
            |tables| Ok(tables.claim_due(worker_id, max, lease, now)),
            |claimed| !claimed.is_empty(),
        )
    }

    fn renew_lease(
        &self,
        sequence: u64,
        worker_id: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        self.transact(
            |tables| Ok(tables.renew_lease(sequence, worker_id, lease, now)),
            |renewed| *renewed,
        )
    }

    fn mark_delivered(
        &self,
        sequence: u64,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        self.transact(
            |tables| Ok(tables.mark_delivered(sequence, worker_id, now)),
            |updated| *updated,
        )
    }

    fn mark_failed(
        &self,
        sequence: u64,
        worker_id: &str,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        self.transact(
            |tables| Ok(tables.mark_failed(sequence, worker_id, error, retry_at)),
            |updated| *updated,
        )
    }

    fn outbox_entries(&self) -> Result<Vec<OutboxEntry>, StorageError> {
        self.read(|tables| tables.entries().to_vec())
    }

    fn outbox_entry(&self, sequence: u64) -> Result<Option<OutboxEntry>, StorageError> {
        self.read(|tables| tables.entry(sequence).cloned())
    }

    fn purge_delivered(&self, older_than: DateTime<Utc>) -> Result<usize, StorageError> {
        self.transact(
            |tables| Ok(tables.purge_delivered(older_than)),
            |removed| *removed > 0,
        )
    }
}
