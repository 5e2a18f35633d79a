//! Reading-room request submission with a transactional outbox.
//!
//! A submitted request is validated, stored together with a
//! `RequestSubmitted` outbox entry in one unit of work, and later published
//! to the integration bus by a background dispatcher. Delivery is
//! at-least-once.

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod outbox;
pub mod request;
pub mod store;

pub use bus::{Event, IdempotentConsumer, InMemoryBus, LogPublisher, PublishError, Publisher};
pub use config::{AppConfig, ConfigError, DispatcherConfig};
pub use dispatcher::{CommitSignal, DispatchReport, DispatcherThread, OutboxDispatcher, WorkerStats};
pub use error::{QueryError, StorageError, StorageErrorKind, SubmitError, ValidationError};
pub use outbox::{
    Backoff, DecodeError, DeliveryState, EventType, IntegrationEvent, NewOutboxEntry, OutboxEntry,
};
pub use request::{
    CommandHandler, ReaderType, RequestQueries, RequestRecord, RequestView, SubmitEnvelope,
    SubmitRequest,
};
pub use store::{HashMapStore, JsonFileStore, OutboxStore, RequestRepository, UnitOfWork};
