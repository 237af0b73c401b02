//! Event source for live channel lists.
//!
//! Domain events fan out to every live view through a broadcast bus. A view
//! that falls too far behind is told how many events it lost and recovers
//! with a refresh.

use chanlist_types::DomainEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A subscription point delivering events in receipt order.
pub trait EventSource: Send + Sync {
    /// Returns a receiver that sees every event published after this call.
    fn subscribe(&self) -> broadcast::Receiver<DomainEvent>;
}

/// In-process event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event. Returns the number of subscribers that will see it.
    pub fn publish(&self, event: DomainEvent) -> usize {
        let kind = event.kind();
        let delivered = self.tx.send(event).unwrap_or(0);
        debug!("Published {} to {} subscribers", kind, delivered);
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSource for EventBus {
    fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}
