//! In-memory bus for testing and single-process deployments.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use super::{Event, PublishError, Publisher};

/// Thread-safe in-memory bus.
///
/// Acknowledged events are appended to a shared log. Failures and latency
/// can be injected to exercise the dispatcher's retry path. A latency longer
/// than the publish timeout gives up at the timeout without recording the
/// event:
///
/// ```
/// use std::time::Duration;
/// use gateway_request::bus::{Event, InMemoryBus, Publisher};
///
/// let bus = InMemoryBus::new();
/// bus.fail_next(1);
///
/// let event = Event::new("evt-1", "RequestSubmitted", b"{}".to_vec());
/// let timeout = Duration::from_secs(1);
/// assert!(bus.publish(&event, timeout).is_err());
/// assert!(bus.publish(&event, timeout).is_ok());
/// assert_eq!(bus.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBus {
    log: Arc<RwLock<Vec<Event>>>,
    failures_remaining: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` publishes with a connection failure.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Delay every acknowledgment by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Acknowledged events, in publish order.
    pub fn events(&self) -> Vec<Event> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn event_ids(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.id).collect()
    }

    pub fn len(&self) -> usize {
        self.log.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publish calls seen, including rejected ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

impl Publisher for InMemoryBus {
    fn publish(&self, event: &Event, timeout: Duration) -> Result<(), PublishError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.take_failure() {
            return Err(PublishError::ConnectionFailed("injected bus failure".into()));
        }

        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            if latency > timeout {
                thread::sleep(timeout);
                return Err(PublishError::Timeout(timeout));
            }
            thread::sleep(latency);
        }

        self.log
            .write()
            .map_err(|_| PublishError::Rejected("bus log poisoned".into()))?
            .push(event.clone());
        Ok(())
    }
}
