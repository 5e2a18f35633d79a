use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::IntegrationEvent;

/// Delivery state of an outbox entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryState {
    #[default]
    Pending,
    Delivered,
    Failed,
}

/// An outbox write staged alongside a record, before a sequence is assigned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOutboxEntry {
    pub event_id: Uuid,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
}

impl NewOutboxEntry {
    pub fn from_event(event: &IntegrationEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_id: Uuid::new_v4(),
            aggregate_id: event.aggregate_id().to_string(),
            event_type: event.event_type().to_string(),
            payload: event.payload_json()?,
        })
    }
}

/// Durable notification of a domain event, drained by the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub sequence: u64,
    pub event_id: Uuid,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub state: DeliveryState,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub leased_by: Option<String>,
    pub leased_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    pub fn new(sequence: u64, staged: NewOutboxEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            sequence,
            event_id: staged.event_id,
            aggregate_id: staged.aggregate_id,
            event_type: staged.event_type,
            payload: staged.payload,
            created_at,
            state: DeliveryState::Pending,
            attempts: 0,
            last_attempt_at: None,
            next_attempt_at: None,
            leased_by: None,
            leased_until: None,
            last_error: None,
            delivered_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == DeliveryState::Pending
    }

    pub fn is_delivered(&self) -> bool {
        self.state == DeliveryState::Delivered
    }

    pub fn is_failed(&self) -> bool {
        self.state == DeliveryState::Failed
    }

    pub fn is_leased(&self, now: DateTime<Utc>) -> bool {
        self.leased_until.is_some_and(|until| until > now)
    }

    /// Whether a worker may claim this entry at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let ready = match self.state {
            DeliveryState::Pending => true,
            DeliveryState::Failed => self.next_attempt_at.map_or(true, |at| at <= now),
            DeliveryState::Delivered => false,
        };
        ready && !self.is_leased(now)
    }

    pub(crate) fn claim(&mut self, worker_id: &str, until: DateTime<Utc>, now: DateTime<Utc>) {
        self.leased_by = Some(worker_id.to_string());
        self.leased_until = Some(until);
        self.last_attempt_at = Some(now);
    }

    fn held_by(&self, worker_id: &str) -> bool {
        self.leased_by.as_deref() == Some(worker_id)
    }

    /// Extend a lease this worker still holds. Returns false when the lease
    /// has expired or passed to another worker, or the entry was delivered.
    pub(crate) fn renew(&mut self, worker_id: &str, until: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if self.is_delivered() || !self.held_by(worker_id) || !self.is_leased(now) {
            return false;
        }
        self.leased_until = Some(until);
        true
    }

    /// Returns false when the lease has passed to another worker or the
    /// entry was already delivered.
    pub(crate) fn deliver(&mut self, worker_id: &str, now: DateTime<Utc>) -> bool {
        if self.is_delivered() || !self.held_by(worker_id) {
            return false;
        }
        self.state = DeliveryState::Delivered;
        self.delivered_at = Some(now);
        self.next_attempt_at = None;
        self.last_error = None;
        self.release_lease();
        true
    }

    /// Returns false when the lease has passed to another worker or the
    /// entry was already delivered.
    pub(crate) fn fail(&mut self, worker_id: &str, error: &str, retry_at: DateTime<Utc>) -> bool {
        if self.is_delivered() || !self.held_by(worker_id) {
            return false;
        }
        self.state = DeliveryState::Failed;
        self.attempts = self.attempts.saturating_add(1);
        self.next_attempt_at = Some(retry_at);
        self.last_error = if error.is_empty() {
            None
        } else {
            Some(error.to_string())
        };
        self.release_lease();
        true
    }

    fn release_lease(&mut self) {
        self.leased_by = None;
        self.leased_until = None;
    }
}
