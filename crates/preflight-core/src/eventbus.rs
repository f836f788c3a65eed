//! Broadcast of [`ReadinessEvent`]s to read-only subscribers.

use crate::event::ReadinessEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events a slow subscriber may fall behind by before it sees `Lagged`.
const EVENT_CAPACITY: usize = 256;

/// Fan-out of readiness events. Publishing never blocks and never fails;
/// with no subscribers the event is dropped.
pub struct EventBus {
    sender: broadcast::Sender<ReadinessEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: ReadinessEvent) {
        tracing::trace!(
            "Event {} for session {}",
            event.event_name(),
            event.session_id()
        );
        let _ = self.sender.send(event);
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ReadinessEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CloseReason;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    fn closed(n: usize) -> ReadinessEvent {
        ReadinessEvent::SessionClosed {
            session_id: format!("s-{}", n),
            reason: CloseReason::Cancelled,
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::default();
        bus.publish(closed(0));

        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        bus.publish(closed(1));
        assert_eq!(rx.try_recv(), Ok(closed(1)));
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for n in 0..3 {
            bus.publish(closed(n));
        }
        assert_eq!(rx.recv().await, Err(RecvError::Lagged(1)));
        assert_eq!(rx.recv().await, Ok(closed(1)));
    }
}
