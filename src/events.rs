//! Session-wide notifications.
//!
//! Components that can observe a session ending (a gateway call answered
//! with 401/403, an explicit logout) publish on an [`EventBus`]; everything
//! that must react holds a [`Subscription`] taken when it starts and dropped
//! when it stops. The bus is injected, never global.

use tokio::sync::broadcast;
use tracing::{debug, warn};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credentials are no longer valid; every session user must stop.
    Logout,
}

/// Cloneable publisher side.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Deliver `event` to every live subscription. Returns how many got it.
    pub fn publish(&self, event: SessionEvent) -> usize {
        let delivered = self.tx.send(event).unwrap_or(0);
        debug!(?event, delivered, "session event published");
        delivered
    }

    /// Only events published after this call are received.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving side. Unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl Subscription {
    /// Next event, or `None` once every publisher is gone.
    ///
    /// A subscriber that fell behind still sees a logout: lagging is
    /// reported as one.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "session events lagged");
                Some(SessionEvent::Logout)
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => Some(SessionEvent::Logout),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscription() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.clone().subscribe();
        assert_eq!(bus.subscribers(), 2);

        assert_eq!(bus.publish(SessionEvent::Logout), 2);
        assert_eq!(first.recv().await, Some(SessionEvent::Logout));
        assert_eq!(second.try_recv(), Some(SessionEvent::Logout));
        assert_eq!(second.try_recv(), None);
    }

    #[tokio::test]
    async fn test_unsubscribe_on_drop() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        drop(sub);
        assert_eq!(bus.subscribers(), 0);
        assert_eq!(bus.publish(SessionEvent::Logout), 0);
    }

    #[tokio::test]
    async fn test_closed_bus_ends_subscription() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }
}
