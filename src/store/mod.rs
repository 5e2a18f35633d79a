//! Stores - the request table and the outbox, written together.
//!
//! - [`UnitOfWork`] - the only way to create a record, always with its outbox entry
//! - [`RequestRepository`] - read access to records for the query side
//! - [`OutboxStore`] - claim / deliver / fail operations for the dispatcher
//!
//! [`HashMapStore`] keeps both tables in memory; [`JsonFileStore`] persists
//! them to a JSON document so committed work survives a restart.

mod file;
mod hashmap;
mod tables;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::outbox::{NewOutboxEntry, OutboxEntry};
use crate::request::RequestRecord;

pub use file::JsonFileStore;
pub use hashmap::HashMapStore;
pub(crate) use tables::add_duration;

/// Transactional boundary for a submission: the record and its outbox entry
/// become visible together or not at all.
pub trait UnitOfWork: Send + Sync {
    /// Commit `record` and `staged`, returning the sequenced outbox entry.
    fn execute(
        &self,
        record: RequestRecord,
        staged: NewOutboxEntry,
    ) -> Result<OutboxEntry, StorageError>;
}

pub trait RequestRepository: Send + Sync {
    fn find_request(&self, identifier: &str) -> Result<Option<RequestRecord>, StorageError>;

    fn request_count(&self) -> Result<usize, StorageError>;
}

/// Outbox operations used by the dispatcher.
pub trait OutboxStore: Send + Sync {
    /// Lease up to `max` due entries (pending, or failed with backoff
    /// elapsed, and not leased by anyone) in ascending sequence order.
    fn claim_due(
        &self,
        worker_id: &str,
        max: usize,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxEntry>, StorageError>;

    /// Extend the lease on an entry to `now + lease`. Returns `false` if
    /// `worker_id` no longer holds an unexpired lease on an undelivered entry.
    fn renew_lease(
        &self,
        sequence: u64,
        worker_id: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Mark an entry delivered. Returns `false` if `worker_id` no longer
    /// holds its lease or the entry was already delivered.
    fn mark_delivered(
        &self,
        sequence: u64,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Record a failed attempt and schedule the next one at `retry_at`.
    /// Returns `false` if `worker_id` no longer holds the lease.
    fn mark_failed(
        &self,
        sequence: u64,
        worker_id: &str,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    fn outbox_entries(&self) -> Result<Vec<OutboxEntry>, StorageError>;

    fn outbox_entry(&self, sequence: u64) -> Result<Option<OutboxEntry>, StorageError>;

    /// Remove entries delivered before `older_than`. Undelivered entries are
    /// never removed.
    fn purge_delivered(&self, older_than: DateTime<Utc>) -> Result<usize, StorageError>;

    fn undelivered_count(&self) -> Result<usize, StorageError> {
        Ok(self
            .outbox_entries()?
            .iter()
            .filter(|entry| !entry.is_delivered())
            .count())
    }
}
