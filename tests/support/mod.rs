//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::time::Duration;

use gateway_request::{
    CommandHandler, DispatcherConfig, HashMapStore, InMemoryBus, OutboxDispatcher,
    SubmitEnvelope, SubmitRequest,
};

/// The reading-room submission used throughout the suites, as it arrives on
/// the wire.
pub const GHJ456_ENVELOPE: &str = r#"{
    "message": {
        "collectionCode": "TST",
        "shelfmark": "tstMark",
        "volumeNumber": "123",
        "storageLocationCode": "33",
        "author": "Christopher James",
        "title": "A History of Yesterday",
        "publicationDate": "23-04-2024",
        "periodicalDate": "",
        "articleLine1": "",
        "articleLine2": "",
        "catalogueRecordUrl": "",
        "furtherDetailsUrl": "",
        "dtRequired": "23-04-2024",
        "route": "",
        "readingRoomStaffArea": "false",
        "seatNumber": "15",
        "readingCategory": "fiction",
        "identifier": "GHJ456",
        "readerName": "Herod Antipas",
        "readerType": "1",
        "operatorInformation": "",
        "itemIdentity": ""
    }
}"#;

pub fn ghj456() -> SubmitRequest {
    let envelope: SubmitEnvelope =
        serde_json::from_str(GHJ456_ENVELOPE).expect("fixture envelope parses");
    envelope.message
}

/// A valid submission with its own reference identifier.
pub fn request(reference: &str) -> SubmitRequest {
    SubmitRequest {
        identifier: reference.to_string(),
        ..ghj456()
    }
}

/// Submit `count` requests through a handler and return the store.
pub fn store_with(count: usize) -> HashMapStore {
    let handler = CommandHandler::new(HashMapStore::new());
    for n in 0..count {
        handler
            .submit(request(&format!("REF{n}")))
            .expect("fixture submission commits");
    }
    handler.store().clone()
}

pub fn dispatcher(
    store: HashMapStore,
    bus: InMemoryBus,
    worker_id: &str,
) -> OutboxDispatcher<HashMapStore, InMemoryBus> {
    OutboxDispatcher::from_config(store, bus, &test_config(worker_id))
}

pub fn test_config(worker_id: &str) -> DispatcherConfig {
    DispatcherConfig::default()
        .with_worker_id(worker_id)
        .with_batch_size(10)
        .with_lease(Duration::from_secs(30))
        .with_poll_interval(Duration::from_millis(20))
        .with_publish_timeout(Duration::from_secs(1))
        .with_backoff(Duration::from_millis(100), Duration::from_millis(250))
        .with_shutdown_grace(Duration::from_secs(2))
}
