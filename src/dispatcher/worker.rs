use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::bus::{Event, PublishError, Publisher};
use crate::config::DispatcherConfig;
use crate::error::StorageError;
use crate::outbox::{Backoff, OutboxEntry};
use crate::store::{add_duration, OutboxStore};

/// Result of one dispatch cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub claimed: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Entries this worker no longer held when it went to publish them or
    /// record the outcome.
    pub lease_lost: usize,
}

impl DispatchReport {
    pub fn is_idle(&self) -> bool {
        self.claimed == 0
    }
}

/// Drains the outbox to a publisher.
///
/// Each cycle claims a batch of due entries under a lease, publishes them in
/// sequence order and records the outcome. A worker that dies between the
/// bus acknowledgment and the state update leaves the lease to expire, after
/// which the entry is claimed and published again.
pub struct OutboxDispatcher<S, P> {
    store: S,
    publisher: P,
    worker_id: String,
    batch_size: usize,
    lease: Duration,
    publish_timeout: Duration,
    backoff: Backoff,
}

impl<S, P> OutboxDispatcher<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self::from_config(store, publisher, &DispatcherConfig::default())
    }

    pub fn from_config(store: S, publisher: P, config: &DispatcherConfig) -> Self {
        Self {
            store,
            publisher,
            worker_id: config.worker_id.clone(),
            batch_size: config.batch_size.max(1),
            lease: config.lease,
            publish_timeout: config.publish_timeout,
            backoff: config.backoff(),
        }
    }

    /// Set the worker ID (used for lease tracking).
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    /// Set the batch size (max entries claimed per cycle, at least 1).
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the lease duration for claimed entries.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

impl<S: OutboxStore, P: Publisher> OutboxDispatcher<S, P> {
    /// Run one cycle against the current time.
    pub fn dispatch_once(&self) -> Result<DispatchReport, StorageError> {
        self.dispatch_at(Utc::now())
    }

    /// Run one cycle as of `now`.
    ///
    /// The cycle clock starts at `now` and advances with wall time. Before
    /// each publish the worker renews its lease on the entry; an entry whose
    /// lease expired, moved to another worker or was delivered meanwhile is
    /// skipped and counted in `lease_lost`.
    pub fn dispatch_at(&self, now: DateTime<Utc>) -> Result<DispatchReport, StorageError> {
        let batch = self
            .store
            .claim_due(&self.worker_id, self.batch_size, self.lease, now)?;

        let mut report = DispatchReport {
            claimed: batch.len(),
            ..Default::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        tracing::debug!(worker_id = %self.worker_id, claimed = batch.len(), "claimed outbox batch");

        let started = Instant::now();
        let clock = || add_duration(now, started.elapsed());

        for entry in &batch {
            if !self
                .store
                .renew_lease(entry.sequence, &self.worker_id, self.lease, clock())?
            {
                report.lease_lost += 1;
                tracing::warn!(
                    sequence = entry.sequence,
                    worker_id = %self.worker_id,
                    "lease lost before publish, skipping entry"
                );
                continue;
            }

            match self.publish(entry) {
                Ok(()) => {
                    if self
                        .store
                        .mark_delivered(entry.sequence, &self.worker_id, clock())?
                    {
                        report.delivered += 1;
                    } else {
                        report.lease_lost += 1;
                        tracing::warn!(
                            sequence = entry.sequence,
                            worker_id = %self.worker_id,
                            "lease lost before delivery was recorded"
                        );
                    }
                }
                Err(err) => {
                    let failures = entry.attempts.saturating_add(1);
                    let delay = self.backoff.delay_for(failures);
                    let retry_at = add_duration(clock(), delay);
                    tracing::warn!(
                        sequence = entry.sequence,
                        event_id = %entry.event_id,
                        attempts = failures,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %err,
                        "outbox publish failed"
                    );

                    if self.store.mark_failed(
                        entry.sequence,
                        &self.worker_id,
                        &err.to_string(),
                        retry_at,
                    )? {
                        report.failed += 1;
                    } else {
                        report.lease_lost += 1;
                        tracing::warn!(
                            sequence = entry.sequence,
                            worker_id = %self.worker_id,
                            "lease lost before failure was recorded"
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    /// Publish one entry, bounded by the publish timeout. An acknowledgment
    /// that still arrives late counts as a failure; the entry will be
    /// published again.
    fn publish(&self, entry: &OutboxEntry) -> Result<(), PublishError> {
        let event = Event::from_entry(entry);
        let started = Instant::now();
        self.publisher.publish(&event, self.publish_timeout)?;

        if started.elapsed() > self.publish_timeout {
            return Err(PublishError::Timeout(self.publish_timeout));
        }
        Ok(())
    }

    /// Keep dispatching until a cycle claims nothing.
    pub fn drain(&self) -> Result<DispatchReport, StorageError> {
        let mut total = DispatchReport::default();
        loop {
            let report = self.dispatch_once()?;
            if report.is_idle() {
                return Ok(total);
            }
            total.claimed += report.claimed;
            total.delivered += report.delivered;
            total.failed += report.failed;
            total.lease_lost += report.lease_lost;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::outbox::{IntegrationEvent, NewOutboxEntry};
    use crate::request::sample_record;
    use crate::store::{HashMapStore, UnitOfWork};

    fn seeded(ids: &[&str]) -> HashMapStore {
        let store = HashMapStore::new();
        for id in ids {
            let record = sample_record(id);
            let staged =
                NewOutboxEntry::from_event(&IntegrationEvent::RequestSubmitted(record.clone()))
                    .unwrap();
            store.execute(record, staged).unwrap();
        }
        store
    }

    #[test]
    fn dispatcher_builder() {
        let dispatcher = OutboxDispatcher::new(HashMapStore::new(), InMemoryBus::new())
            .with_worker_id("test-worker")
            .with_batch_size(5)
            .with_lease(Duration::from_secs(30));

        assert_eq!(dispatcher.worker_id(), "test-worker");
        assert_eq!(dispatcher.batch_size(), 5);
        assert_eq!(dispatcher.lease, Duration::from_secs(30));
    }

    #[test]
    fn delivers_pending_entries() {
        let bus = InMemoryBus::new();
        let dispatcher = OutboxDispatcher::new(seeded(&["a", "b"]), bus.clone());

        let report = dispatcher.dispatch_once().unwrap();
        assert_eq!(report.claimed, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(bus.len(), 2);
        assert_eq!(dispatcher.store().undelivered_count().unwrap(), 0);
    }

    #[test]
    fn failure_schedules_backoff() {
        let bus = InMemoryBus::new();
        bus.fail_next(1);
        let dispatcher = OutboxDispatcher::new(seeded(&["a"]), bus.clone()).with_backoff(
            Backoff::new(Duration::from_secs(1), Duration::from_secs(60)),
        );
        let now = Utc::now();

        let report = dispatcher.dispatch_at(now).unwrap();
        assert_eq!(report.failed, 1);

        let entry = dispatcher.store().outbox_entry(1).unwrap().unwrap();
        assert!(entry.is_failed());
        assert_eq!(entry.attempts, 1);
        let next = entry.next_attempt_at.unwrap();
        assert!(next >= now + chrono::Duration::seconds(1));
        assert!(next < now + chrono::Duration::seconds(2));

        assert!(dispatcher.dispatch_at(now).unwrap().is_idle());

        let retry = dispatcher
            .dispatch_at(now + chrono::Duration::seconds(2))
            .unwrap();
        assert_eq!(retry.delivered, 1);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn zero_batch_size_is_raised_to_one() {
        let dispatcher =
            OutboxDispatcher::new(seeded(&["a", "b"]), InMemoryBus::new()).with_batch_size(0);
        assert_eq!(dispatcher.batch_size(), 1);

        let config = DispatcherConfig::default().with_batch_size(0);
        let dispatcher =
            OutboxDispatcher::from_config(seeded(&["a"]), InMemoryBus::new(), &config);
        assert_eq!(dispatcher.batch_size(), 1);
        assert_eq!(dispatcher.dispatch_once().unwrap().claimed, 1);
    }

    #[test]
    fn slow_acknowledgment_counts_as_failure() {
        let bus = InMemoryBus::new();
        bus.set_latency(Some(Duration::from_secs(2)));
        let dispatcher = OutboxDispatcher::new(seeded(&["a"]), bus.clone())
            .with_publish_timeout(Duration::from_millis(10));

        let started = Instant::now();
        let report = dispatcher.dispatch_once().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(report.failed, 1);
        assert!(bus.is_empty());

        let entry = dispatcher.store().outbox_entry(1).unwrap().unwrap();
        assert!(entry.is_failed());
        assert!(entry
            .last_error
            .as_deref()
            .is_some_and(|error| error.contains("no acknowledgment")));
    }
}
