//! Core publisher trait for the integration bus.

use std::time::Duration;

use thiserror::Error;

use crate::outbox::{DecodeError, IntegrationEvent, OutboxEntry};

/// An integration event as handed to the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Stable across redeliveries of the same outbox entry; consumers
    /// deduplicate on it.
    pub id: String,
    /// Event type tag (e.g. "RequestSubmitted")
    pub event_type: String,
    /// JSON payload
    pub payload: Vec<u8>,
    /// Headers: aggregate id, outbox sequence, attempt
    pub metadata: Vec<(String, String)>,
}

impl Event {
    pub fn new(id: impl Into<String>, event_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            payload,
            metadata: Vec::new(),
        }
    }

    pub fn from_entry(entry: &OutboxEntry) -> Self {
        Self::new(
            entry.event_id.to_string(),
            &entry.event_type,
            entry.payload.clone().into_bytes(),
        )
        .with_metadata("aggregate_id", &entry.aggregate_id)
        .with_metadata("sequence", entry.sequence.to_string())
        .with_metadata("attempt", entry.attempts.saturating_add(1).to_string())
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Rebuild the typed integration event.
    pub fn decode(&self) -> Result<IntegrationEvent, DecodeError> {
        IntegrationEvent::decode(&self.event_type, &self.payload)
    }
}

/// Error returned by a bus publish. Never surfaced to submitters.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("event rejected: {0}")]
    Rejected(String),
    #[error("no acknowledgment within {0:?}")]
    Timeout(Duration),
}

/// Publishes events to a message bus.
///
/// Returning `Ok(())` means the bus acknowledged the event. An
/// implementation must give up waiting for the acknowledgment once `timeout`
/// has passed and return [`PublishError::Timeout`]; the dispatcher also
/// treats an acknowledgment that arrives later than that as a failure.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: &Event, timeout: Duration) -> Result<(), PublishError>;
}

impl<P: Publisher + ?Sized> Publisher for std::sync::Arc<P> {
    fn publish(&self, event: &Event, timeout: Duration) -> Result<(), PublishError> {
        (**self).publish(event, timeout)
    }
}
