//! Event fan-out to UI subscribers.
//!
//! The bus stamps each event with the daemon clock and broadcasts it. Every
//! subscriber holds its own backlog of [`EVENT_BUFFER`] events; one that
//! falls further behind loses the oldest events and keeps going.

use std::sync::Arc;

use refnet_types::clock::Clock;
use refnet_types::events::{Event, EventType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Per-subscriber backlog.
pub const EVENT_BUFFER: usize = 1000;

/// Which events a subscription wants. Empty means everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// "session", "dashboard", "pool" or "system".
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub event_types: Option<Vec<EventType>>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        let category = event.event_type.category();
        let category_ok = self
            .categories
            .as_ref()
            .is_none_or(|cs| cs.iter().any(|c| c == category));
        let type_ok = self
            .event_types
            .as_ref()
            .is_none_or(|ts| ts.contains(&event.event_type));
        category_ok && type_ok
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    clock: Arc<dyn Clock>,
}

impl EventBus {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender, clock }
    }

    /// Stamp and broadcast. Returns how many subscribers received it.
    pub fn emit(&self, event_type: EventType, payload: Value) -> usize {
        let event = Event::new(event_type, self.clock.now_utc().timestamp(), payload);
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// A filtered subscription identified by `id`.
    pub fn subscription(&self, id: String, filter: EventFilter) -> Subscription {
        Subscription {
            id,
            filter,
            rx: self.sender.subscribe(),
        }
    }
}

pub struct Subscription {
    pub id: String,
    filter: EventFilter,
    rx: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Next matching event, or `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(subscription = %self.id, skipped, "subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refnet_types::clock::ManualClock;
    use serde_json::json;

    fn bus() -> EventBus {
        let clock = ManualClock::at("2026-03-11T15:00:00+00:00").expect("clock");
        EventBus::new(Arc::new(clock))
    }

    fn event(event_type: EventType) -> Event {
        Event::new(event_type, 1000, json!({}))
    }

    #[test]
    fn test_emit_stamps_with_clock() {
        let bus = bus();
        let mut rx = bus.subscribe();
        assert_eq!(bus.emit(EventType::DaemonStatus, json!({"status": "started"})), 1);

        let received = rx.try_recv().expect("receive event");
        assert_eq!(received.event_type, EventType::DaemonStatus);
        assert_eq!(received.timestamp, 1_773_241_200);
    }

    #[test]
    fn test_emit_without_subscribers() {
        assert_eq!(bus().emit(EventType::PoolExpired, json!({})), 0);
    }

    #[test]
    fn test_filter_categories_and_types() {
        let pool_only = EventFilter {
            categories: Some(vec!["pool".to_string()]),
            event_types: None,
        };
        assert!(pool_only.matches(&event(EventType::PoolCountdownTick)));
        assert!(!pool_only.matches(&event(EventType::SessionChanged)));

        let narrow = EventFilter {
            categories: Some(vec!["pool".to_string()]),
            event_types: Some(vec![EventType::PoolExpired]),
        };
        assert!(narrow.matches(&event(EventType::PoolExpired)));
        assert!(!narrow.matches(&event(EventType::PoolCountdownTick)));
        assert!(EventFilter::default().matches(&event(EventType::ErrorOccurred)));
    }

    #[tokio::test]
    async fn test_subscription_skips_unwanted_events() {
        let bus = bus();
        let filter = EventFilter {
            categories: None,
            event_types: Some(vec![EventType::RankChanged]),
        };
        let mut sub = bus.subscription("s1".to_string(), filter);

        bus.emit(EventType::PoolCountdownTick, json!({}));
        bus.emit(EventType::RankChanged, json!({"rank": "Gold"}));

        let got = sub.next().await.expect("event");
        assert_eq!(got.event_type, EventType::RankChanged);
        assert_eq!(got.payload["rank"], "Gold");
    }

    #[tokio::test]
    async fn test_lagging_subscription_keeps_going() {
        let bus = bus();
        let mut sub = bus.subscription("slow".to_string(), EventFilter::default());
        for _ in 0..EVENT_BUFFER + 5 {
            bus.emit(EventType::PoolCountdownTick, json!({}));
        }
        bus.emit(EventType::PoolExpired, json!({}));

        let mut last = None;
        while let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_millis(50), sub.next()).await
        {
            last = Some(event.event_type);
        }
        assert_eq!(last, Some(EventType::PoolExpired));
    }

    #[tokio::test]
    async fn test_subscription_ends_with_bus() {
        let bus = bus();
        let mut sub = bus.subscription("s1".to_string(), EventFilter::default());
        drop(bus);
        assert!(sub.next().await.is_none());
    }
}
