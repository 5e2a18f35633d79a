//! Outbox - durable integration events awaiting publication.
//!
//! An [`OutboxEntry`] is written in the same store transaction as the
//! [`RequestRecord`](crate::RequestRecord) it describes, then drained by the
//! [`OutboxDispatcher`](crate::OutboxDispatcher):
//!
//! ```text
//!   Pending ──publish ok──▶ Delivered ──purge──▶ (removed)
//!      │                        ▲
//!  publish failed               │
//!      ▼                        │
//!    Failed ──backoff elapsed, re-claimed──┘
//! ```

mod backoff;
mod entry;
mod event;

pub use backoff::Backoff;
pub use entry::{DeliveryState, NewOutboxEntry, OutboxEntry};
pub use event::{DecodeError, EventType, IntegrationEvent};
