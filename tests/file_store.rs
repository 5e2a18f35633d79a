mod support;

use chrono::Utc;
use gateway_request::{
    CommandHandler, InMemoryBus, JsonFileStore, OutboxDispatcher, OutboxStore, RequestRepository,
};
use support::{ghj456, request, test_config};

#[test]
fn reopened_store_resumes_pending_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.json");

    let identifier = {
        let handler = CommandHandler::new(JsonFileStore::open(&path).unwrap());
        handler.submit(ghj456()).unwrap()
    };

    let store = JsonFileStore::open(&path).unwrap();
    assert!(store.find_request(&identifier).unwrap().is_some());
    assert_eq!(store.undelivered_count().unwrap(), 1);

    let bus = InMemoryBus::new();
    let dispatcher =
        OutboxDispatcher::from_config(store.clone(), bus.clone(), &test_config("restarted"));
    assert_eq!(dispatcher.dispatch_once().unwrap().delivered, 1);
    assert_eq!(bus.events()[0].meta("aggregate_id"), Some(identifier.as_str()));

    let reopened = JsonFileStore::open(&path).unwrap();
    assert_eq!(reopened.undelivered_count().unwrap(), 0);
}

#[test]
fn sequences_continue_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.json");

    CommandHandler::new(JsonFileStore::open(&path).unwrap())
        .submit(request("REF1"))
        .unwrap();
    CommandHandler::new(JsonFileStore::open(&path).unwrap())
        .submit(request("REF2"))
        .unwrap();

    let sequences: Vec<_> = JsonFileStore::open(&path)
        .unwrap()
        .outbox_entries()
        .unwrap()
        .iter()
        .map(|entry| entry.sequence)
        .collect();
    assert_eq!(sequences, vec![1, 2]);
}

#[test]
fn purge_removes_only_delivered_entries() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("requests.json")).unwrap();
    let handler = CommandHandler::new(store.clone());
    handler.submit(request("REF1")).unwrap();
    handler.submit(request("REF2")).unwrap();

    let now = Utc::now();
    let claimed = store
        .claim_due("worker-a", 1, std::time::Duration::from_secs(30), now)
        .unwrap();
    assert!(store
        .mark_delivered(claimed[0].sequence, "worker-a", now)
        .unwrap());

    let removed = store
        .purge_delivered(now + chrono::Duration::seconds(1))
        .unwrap();
    assert_eq!(removed, 1);

    let remaining = store.outbox_entries().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].sequence, 2);
    assert!(remaining[0].is_pending());
    assert_eq!(store.request_count().unwrap(), 2);
}
