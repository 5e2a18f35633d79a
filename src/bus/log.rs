use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Event, PublishError, Publisher};

/// Publisher that records each event as a tracing event and optionally in a
/// buffer. Useful for local runs without a broker.
#[derive(Clone, Default)]
pub struct LogPublisher {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            buffer: Some(buffer),
        }
    }
}

impl Publisher for LogPublisher {
    fn publish(&self, event: &Event, _timeout: Duration) -> Result<(), PublishError> {
        let payload = String::from_utf8_lossy(&event.payload);
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            aggregate_id = event.meta("aggregate_id").unwrap_or_default(),
            "published integration event"
        );

        if let Some(buffer) = &self.buffer {
            buffer
                .lock()
                .map_err(|_| PublishError::Rejected("log publisher buffer poisoned".into()))?
                .push(format!("[OUTBOX] {} {} {}", event.event_type, event.id, payload));
        }
        Ok(())
    }
}
