//! Session invalidation events delivered by platform glue.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// External invalidation events reported by the platform session layer.
///
/// Delivered in the order the platform reports them; the controller performs
/// no reordering or coalescing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    InterruptionBegan,
    InterruptionEnded,
    RouteChanged,
    ServiceReset,
}

/// Cloneable push endpoint handed to platform glue.
///
/// Publishing is fire-and-forget: events published while nobody is
/// subscribed are dropped, matching platform notification semantics.
#[derive(Clone)]
pub struct SessionEventPublisher {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEventPublisher {
    pub(crate) fn new(tx: broadcast::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publisher_is_fire_and_forget_without_subscribers() {
        let (tx, _) = broadcast::channel(4);
        let publisher = SessionEventPublisher::new(tx);

        // No subscribers; must not panic or block.
        publisher.publish(SessionEvent::RouteChanged);
    }

    #[test]
    fn subscribers_receive_published_events_in_order() {
        let (tx, mut rx) = broadcast::channel(4);
        let publisher = SessionEventPublisher::new(tx);

        publisher.publish(SessionEvent::InterruptionBegan);
        publisher.publish(SessionEvent::InterruptionEnded);

        assert_eq!(rx.try_recv(), Ok(SessionEvent::InterruptionBegan));
        assert_eq!(rx.try_recv(), Ok(SessionEvent::InterruptionEnded));
    }

    #[test]
    fn event_serialization_uses_snake_case() {
        let json = serde_json::to_string(&SessionEvent::RouteChanged).unwrap();
        assert_eq!(json, "\"route_changed\"");
    }
}
