use chrono::Utc;
use uuid::Uuid;

use super::command::SubmitRequest;
use crate::dispatcher::CommitSignal;
use crate::error::{StorageError, SubmitError};
use crate::outbox::{IntegrationEvent, NewOutboxEntry};
use crate::store::UnitOfWork;

/// Accepts request submissions.
///
/// A submission is validated before anything is written, then the record and
/// its `RequestSubmitted` outbox entry are committed in one unit of work.
/// Once that commit returns the submission has succeeded; publication is the
/// dispatcher's job and its failures never reach the submitter.
pub struct CommandHandler<S> {
    store: S,
    signal: Option<CommitSignal>,
}

impl<S> CommandHandler<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            signal: None,
        }
    }

    /// Wake a dispatcher after every successful commit.
    pub fn with_signal(mut self, signal: CommitSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: UnitOfWork> CommandHandler<S> {
    /// Submit a request, returning the identifier assigned to it.
    pub fn submit(&self, command: SubmitRequest) -> Result<String, SubmitError> {
        let validated = command.validate().map_err(|err| {
            tracing::warn!(field = err.field, reason = %err.reason, "rejected request submission");
            err
        })?;

        let identifier = Uuid::new_v4().to_string();
        let reference = validated.reference_identifier().to_string();
        let record = validated.into_record(identifier.clone(), Utc::now());

        let event = IntegrationEvent::RequestSubmitted(record);
        let staged = NewOutboxEntry::from_event(&event).map_err(StorageError::serialization)?;
        let IntegrationEvent::RequestSubmitted(record) = event;

        let entry = self.store.execute(record, staged).map_err(|err| {
            tracing::error!(error = %err, reference = %reference, "request submission not committed");
            err
        })?;

        tracing::info!(
            identifier = %identifier,
            reference = %reference,
            sequence = entry.sequence,
            "request submitted"
        );

        if let Some(signal) = &self.signal {
            signal.notify();
        }

        Ok(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageErrorKind;
    use crate::outbox::OutboxEntry;
    use crate::request::RequestRecord;
    use crate::store::{HashMapStore, OutboxStore, RequestRepository};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn command() -> SubmitRequest {
        SubmitRequest {
            collection_code: "TST".into(),
            shelfmark: "tstMark".into(),
            identifier: "GHJ456".into(),
            reader_type: "1".into(),
            ..Default::default()
        }
    }

    /// Unit of work that refuses every commit and counts the attempts.
    #[derive(Default)]
    struct RefusingStore {
        calls: AtomicUsize,
    }

    impl UnitOfWork for RefusingStore {
        fn execute(
            &self,
            _record: RequestRecord,
            _staged: NewOutboxEntry,
        ) -> Result<OutboxEntry, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::transient("lock timeout"))
        }
    }

    #[test]
    fn submit_assigns_a_fresh_identifier() {
        let handler = CommandHandler::new(HashMapStore::new());

        let first = handler.submit(command()).unwrap();
        let second = handler.submit(command()).unwrap();

        assert_ne!(first, "GHJ456");
        assert_ne!(first, second);
        assert_eq!(handler.store().request_count().unwrap(), 2);
    }

    #[test]
    fn outbox_entry_carries_the_record() {
        let handler = CommandHandler::new(HashMapStore::new());
        let identifier = handler.submit(command()).unwrap();

        let entries = handler.store().outbox_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "RequestSubmitted");
        assert_eq!(entries[0].aggregate_id, identifier);

        let event =
            IntegrationEvent::decode(&entries[0].event_type, entries[0].payload.as_bytes())
                .unwrap();
        let IntegrationEvent::RequestSubmitted(record) = event;
        assert_eq!(record.reference_identifier, "GHJ456");
    }

    #[test]
    fn validation_failure_never_reaches_the_store() {
        let handler = CommandHandler::new(RefusingStore::default());
        let mut invalid = command();
        invalid.shelfmark = String::new();

        let err = handler.submit(invalid).unwrap_err();
        assert!(matches!(err, SubmitError::Validation(ref e) if e.field == "shelfmark"));
        assert_eq!(handler.store().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn storage_failure_is_surfaced_unchanged() {
        let handler = CommandHandler::new(RefusingStore::default());

        let err = handler.submit(command()).unwrap_err();
        assert_eq!(
            err,
            SubmitError::Storage(StorageError {
                kind: StorageErrorKind::Transient,
                message: "lock timeout".into(),
            })
        );
    }
}
