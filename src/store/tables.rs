use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::outbox::{NewOutboxEntry, OutboxEntry};
use crate::request::RequestRecord;

/// The two tables every store keeps. Each method is one transaction: it
/// either applies completely or returns an error having changed nothing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Tables {
    next_sequence: u64,
    records: HashMap<String, RequestRecord>,
    outbox: Vec<OutboxEntry>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            next_sequence: 1,
            records: HashMap::new(),
            outbox: Vec::new(),
        }
    }
}

impl Tables {
    pub(crate) fn insert_pair(
        &mut self,
        record: RequestRecord,
        staged: NewOutboxEntry,
        now: DateTime<Utc>,
    ) -> Result<OutboxEntry, StorageError> {
        if self.records.contains_key(record.id()) {
            return Err(StorageError::conflict(record.id()));
        }

        let entry = OutboxEntry::new(self.next_sequence, staged, now);
        self.next_sequence += 1;
        self.records.insert(record.identifier.clone(), record);
        self.outbox.push(entry.clone());
        Ok(entry)
    }

    pub(crate) fn record(&self, identifier: &str) -> Option<&RequestRecord> {
        self.records.get(identifier)
    }

    pub(crate) fn record_count(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn entries(&self) -> &[OutboxEntry] {
        &self.outbox
    }

    pub(crate) fn entry(&self, sequence: u64) -> Option<&OutboxEntry> {
        self.outbox.iter().find(|entry| entry.sequence == sequence)
    }

    /// Lease up to `max` due entries to `worker_id`, lowest sequence first.
    pub(crate) fn claim_due(
        &mut self,
        worker_id: &str,
        max: usize,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Vec<OutboxEntry> {
        let until = add_duration(now, lease);
        // The outbox is appended in sequence order and never reordered.
        self.outbox
            .iter_mut()
            .filter(|entry| entry.is_due(now))
            .take(max)
            .map(|entry| {
                entry.claim(worker_id, until, now);
                entry.clone()
            })
            .collect()
    }

    pub(crate) fn renew_lease(
        &mut self,
        sequence: u64,
        worker_id: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let until = add_duration(now, lease);
        self.entry_mut(sequence)
            .is_some_and(|entry| entry.renew(worker_id, until, now))
    }

    pub(crate) fn mark_delivered(
        &mut self,
        sequence: u64,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> bool {
        self.entry_mut(sequence)
            .is_some_and(|entry| entry.deliver(worker_id, now))
    }

    pub(crate) fn mark_failed(
        &mut self,
        sequence: u64,
        worker_id: &str,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> bool {
        self.entry_mut(sequence)
            .is_some_and(|entry| entry.fail(worker_id, error, retry_at))
    }

    pub(crate) fn purge_delivered(&mut self, older_than: DateTime<Utc>) -> usize {
        let before = self.outbox.len();
        self.outbox.retain(|entry| {
            !(entry.is_delivered() && entry.delivered_at.is_some_and(|at| at < older_than))
        });
        before - self.outbox.len()
    }

    fn entry_mut(&mut self, sequence: u64) -> Option<&mut OutboxEntry> {
        self.outbox
            .iter_mut()
            .find(|entry| entry.sequence == sequence)
    }
}

/// `now + duration`, saturating at the latest representable instant.
pub(crate) fn add_duration(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
