use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::tables::Tables;
use super::{OutboxStore, RequestRepository, UnitOfWork};
use crate::error::StorageError;
use crate::outbox::{NewOutboxEntry, OutboxEntry};
use crate::request::RequestRecord;

/// In-memory store. Both tables sit behind one lock, so a reader sees a
/// record and its outbox entry together or neither.
///
/// Cloning creates another handle to the same tables.
#[derive(Clone, Default)]
pub struct HashMapStore {
    tables: Arc<RwLock<Tables>>,
}

impl HashMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables
            .read()
            .map_err(|_| StorageError::lock_poisoned("read"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables
            .write()
            .map_err(|_| StorageError::lock_poisoned("write"))
    }
}

impl UnitOfWork for HashMapStore {
    fn execute(
        &self,
        record: RequestRecord,
        staged: NewOutboxEntry,
    ) -> Result<OutboxEntry, StorageError> {
        self.write()?.insert_pair(record, staged, Utc::now())
    }
}

impl RequestRepository for HashMapStore {
    fn find_request(&self, identifier: &str) -> Result<Option<RequestRecord>, StorageError> {
        Ok(self.read()?.record(identifier).cloned())
    }

    fn request_count(&self) -> Result<usize, StorageError> {
        Ok(self.read()?.record_count())
    }
}

impl OutboxStore for HashMapStore {
    fn claim_due(
        &self,
        worker_id: &str,
        max: usize,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxEntry>, StorageError> {
        Ok(self.write()?.claim_due(worker_id, max, lease, now))
    }

    fn renew_lease(
        &self,
        sequence: u64,
        worker_id: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        Ok(self.write()?.renew_lease(sequence, worker_id, lease, now))
    }

    fn mark_delivered(
        &self,
        sequence: u64,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        Ok(self.write()?.mark_delivered(sequence, worker_id, now))
    }

    fn mark_failed(
        &self,
        sequence: u64,
        worker_id: &str,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        Ok(self
            .write()?
            .mark_failed(sequence, worker_id, error, retry_at))
    }

    fn outbox_entries(&self) -> Result<Vec<OutboxEntry>, StorageError> {
        Ok(self.read()?.entries().to_vec())
    }

    fn outbox_entry(&self, sequence: u64) -> Result<Option<OutboxEntry>, StorageError> {
        Ok(self.read()?.entry(sequence).cloned())
    }

    fn purge_delivered(&self, older_than: DateTime<Utc>) -> Result<usize, StorageError> {
        Ok(self.write()?.purge_delivered(older_than))
    }
}
