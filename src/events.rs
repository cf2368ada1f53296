// =============================================================================
// Event Bus — in-process pub/sub for observability and decoupling
// =============================================================================
//
// Handlers are registered during startup wiring; emission iterates a stable
// snapshot under the read lock and swallows handler panics so one bad
// subscriber cannot break the chain. Components publish, they never hold
// references to each other.
// =============================================================================

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

/// Every topic the engine publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    CandleReceived,
    TrendDetected,
    EntrySignal,
    ExitSignal,
    AiAdvisory,
    RiskValidation,
    TradeExecuted,
    TradeRejected,
    PositionOpened,
    PositionClosed,
    CircuitBreakerTripped,
    CircuitBreakerReset,
    ErrorOccurred,
}

/// A published event with its JSON payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub source: &'static str,
}

pub type EventHandler = Box<dyn Fn(&Event) + Send + Sync>;

/// In-memory pub/sub bus.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventType, Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one topic. Intended for startup wiring only.
    pub fn subscribe(&self, event_type: EventType, handler: EventHandler) {
        self.handlers.write().entry(event_type).or_default().push(handler);
    }

    /// Publish an event to all subscribers of its topic. Handler panics are
    /// swallowed and logged.
    pub fn emit(&self, event: Event) {
        let handlers = self.handlers.read();
        let Some(list) = handlers.get(&event.event_type) else {
            return;
        };
        for handler in list {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                warn!(event_type = ?event.event_type, "event handler panicked; swallowed");
            }
        }
    }

    /// Build and publish an event stamped with the current time.
    pub fn publish(&self, event_type: EventType, payload: serde_json::Value, source: &'static str) {
        self.emit(Event {
            event_type,
            timestamp: Utc::now(),
            payload,
            source,
        });
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<EventType, usize> = self
            .handlers
            .read()
            .iter()
            .map(|(t, v)| (*t, v.len()))
            .collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscribers_receive_matching_topic_only() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        bus.subscribe(
            EventType::TradeExecuted,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish(EventType::TradeExecuted, serde_json::json!({"id": 1}), "test");
        bus.publish(EventType::TradeRejected, serde_json::json!({}), "test");

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_break_the_chain() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.subscribe(
            EventType::ErrorOccurred,
            Box::new(|_| panic!("bad handler")),
        );
        let counter = hits.clone();
        bus.subscribe(
            EventType::ErrorOccurred,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish(EventType::ErrorOccurred, serde_json::json!({}), "test");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emit_without_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.publish(EventType::CandleReceived, serde_json::json!({}), "test");
    }

    #[test]
    fn event_payload_reaches_handler() {
        let bus = EventBus::new();
        let seen = Arc::new(RwLock::new(None));

        let sink = seen.clone();
        bus.subscribe(
            EventType::AiAdvisory,
            Box::new(move |event| {
                *sink.write() = Some(event.payload.clone());
            }),
        );

        bus.publish(
            EventType::AiAdvisory,
            serde_json::json!({"recommendation": "HALT"}),
            "committee",
        );

        let payload = seen.read().clone().unwrap();
        assert_eq!(payload["recommendation"], "HALT");
    }
}
