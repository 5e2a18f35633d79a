mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use gateway_request::{
    CommandHandler, DeliveryState, EventType, HashMapStore, IntegrationEvent, JsonFileStore,
    OutboxStore, QueryError, ReaderType, RequestQueries, RequestRepository, SubmitError,
    SubmitRequest,
};
use support::{ghj456, request};

#[test]
fn submission_stores_record_and_pending_event() {
    let handler = CommandHandler::new(HashMapStore::new());

    let identifier = handler.submit(ghj456()).unwrap();
    assert_ne!(identifier, "GHJ456");
    assert!(uuid::Uuid::parse_str(&identifier).is_ok());

    let store = handler.store();
    let record = store.find_request(&identifier).unwrap().unwrap();
    assert_eq!(record.collection_code, "TST");
    assert_eq!(record.shelfmark, "tstMark");
    assert_eq!(record.reference_identifier, "GHJ456");
    assert_eq!(record.reader_type, ReaderType::Standard);
    assert!(!record.reading_room_staff_area);

    let entries = store.outbox_entries().unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.state, DeliveryState::Pending);
    assert_eq!(entry.event_type, EventType::RequestSubmitted.as_str());
    assert_eq!(entry.aggregate_id, identifier);
    assert_eq!(entry.attempts, 0);

    let IntegrationEvent::RequestSubmitted(payload) =
        IntegrationEvent::decode(&entry.event_type, entry.payload.as_bytes()).unwrap();
    assert_eq!(payload, record);
}

#[test]
fn identifiers_are_fresh_per_submission() {
    let handler = CommandHandler::new(HashMapStore::new());
    let first = handler.submit(ghj456()).unwrap();
    let second = handler.submit(ghj456()).unwrap();

    assert_ne!(first, second);
    assert_eq!(handler.store().request_count().unwrap(), 2);
}

#[test]
fn empty_shelfmark_is_rejected_without_writes() {
    let handler = CommandHandler::new(HashMapStore::new());

    let err = handler
        .submit(SubmitRequest {
            shelfmark: String::new(),
            ..ghj456()
        })
        .unwrap_err();

    match err {
        SubmitError::Validation(err) => assert_eq!(err.field, "shelfmark"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(handler.store().request_count().unwrap(), 0);
    assert!(handler.store().outbox_entries().unwrap().is_empty());
}

#[test]
fn first_invalid_field_is_reported() {
    let handler = CommandHandler::new(HashMapStore::new());

    let err = handler
        .submit(SubmitRequest {
            publication_date: "31-02-2024".into(),
            reader_type: "9".into(),
            ..ghj456()
        })
        .unwrap_err();

    let SubmitError::Validation(err) = err else {
        panic!("expected validation error");
    };
    assert_eq!(err.field, "publicationDate");
}

#[test]
fn unknown_reader_type_is_rejected() {
    let handler = CommandHandler::new(HashMapStore::new());
    let err = handler
        .submit(SubmitRequest {
            reader_type: "9".into(),
            ..ghj456()
        })
        .unwrap_err();

    let SubmitError::Validation(err) = err else {
        panic!("expected validation error");
    };
    assert_eq!(err.field, "readerType");
    assert_eq!(handler.store().request_count().unwrap(), 0);
}

#[test]
fn readers_never_see_a_record_without_its_entry() {
    let store = HashMapStore::new();
    let handler = Arc::new(CommandHandler::new(store.clone()));
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let store = store.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut checks = 0;
            while !done.load(Ordering::SeqCst) {
                let entries = store.outbox_entries().unwrap();
                let records = store.request_count().unwrap();
                // Entries first: a commit landing between the two reads can
                // only make records run ahead.
                assert!(records >= entries.len());
                for entry in &entries {
                    assert!(store.find_request(&entry.aggregate_id).unwrap().is_some());
                }
                checks += 1;
            }
            checks
        })
    };

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                for n in 0..25 {
                    handler.submit(request(&format!("W{w}-{n}"))).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);

    assert!(reader.join().unwrap() > 0);
    assert_eq!(store.request_count().unwrap(), 100);
    assert_eq!(store.outbox_entries().unwrap().len(), 100);
}

#[test]
fn failed_commit_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.json");
    let store = JsonFileStore::open(&path).unwrap();
    let handler = CommandHandler::new(store.clone());

    // The directory is gone, so the staging write fails.
    dir.close().unwrap();
    let err = handler.submit(ghj456()).unwrap_err();
    let SubmitError::Storage(err) = err else {
        panic!("expected storage error");
    };
    assert!(err.is_transient());

    assert_eq!(store.request_count().unwrap(), 0);
    assert!(store.outbox_entries().unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn query_returns_read_model() {
    let handler = CommandHandler::new(HashMapStore::new());
    let identifier = handler.submit(ghj456()).unwrap();
    let queries = RequestQueries::new(handler.store().clone());

    let view = queries.get_request(&identifier).unwrap();
    assert_eq!(view.identifier, identifier);
    assert_eq!(view.reference_identifier, "GHJ456");
    assert_eq!(view.reader_type, 1);
    assert_eq!(view.reading_room_staff_area, "false");

    assert!(matches!(
        queries.get_request("missing"),
        Err(QueryError::NotFound(id)) if id == "missing"
    ));
}
