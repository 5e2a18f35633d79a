use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::request::RequestRecord;

/// Tag identifying which integration event an outbox entry carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    RequestSubmitted,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::RequestSubmitted => "RequestSubmitted",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "RequestSubmitted" => Ok(EventType::RequestSubmitted),
            other => Err(DecodeError::UnknownEventType(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event type {0}")]
    UnknownEventType(String),
    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// An event published to downstream subscribers.
///
/// The outbox stores the tag and the JSON of the variant's body separately;
/// consumers rebuild the variant with [`IntegrationEvent::decode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrationEvent {
    RequestSubmitted(RequestRecord),
}

impl IntegrationEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            IntegrationEvent::RequestSubmitted(_) => EventType::RequestSubmitted,
        }
    }

    /// Identifier of the entity the event describes.
    pub fn aggregate_id(&self) -> &str {
        match self {
            IntegrationEvent::RequestSubmitted(record) => record.id(),
        }
    }

    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            IntegrationEvent::RequestSubmitted(record) => serde_json::to_string(record),
        }
    }

    pub fn decode(event_type: &str, payload: &[u8]) -> Result<Self, DecodeError> {
        match event_type.parse::<EventType>()? {
            EventType::RequestSubmitted => Ok(IntegrationEvent::RequestSubmitted(
                serde_json::from_slice(payload)?,
            )),
        }
    }
}
