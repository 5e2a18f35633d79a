use std::collections::HashSet;

use super::Event;

/// Consumer-side guard for at-least-once delivery: hands each event id to
/// the wrapped handler once and drops redeliveries.
pub struct IdempotentConsumer<F> {
    handler: F,
    seen: HashSet<String>,
}

impl<F: FnMut(&Event)> IdempotentConsumer<F> {
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            seen: HashSet::new(),
        }
    }

    /// Returns `true` if the handler ran, `false` for a duplicate.
    pub fn handle(&mut self, event: &Event) -> bool {
        if !self.seen.insert(event.id.clone()) {
            tracing::debug!(event_id = %event.id, "dropping duplicate delivery");
            return false;
        }
        (self.handler)(event);
        true
    }

    pub fn processed(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_dropped() {
        let mut handled = Vec::new();
        let mut consumer = IdempotentConsumer::new(|event: &Event| handled.push(event.id.clone()));

        let event = Event::new("evt-1", "RequestSubmitted", b"{}".to_vec());
        assert!(consumer.handle(&event));
        assert!(!consumer.handle(&event));
        assert!(consumer.handle(&Event::new("evt-2", "RequestSubmitted", b"{}".to_vec())));
        assert_eq!(consumer.processed(), 2);

        drop(consumer);
        assert_eq!(handled, vec!["evt-1", "evt-2"]);
    }
}
