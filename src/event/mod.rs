//! Event system for observers of the gateway.
//!
//! Connection changes, raw frames and decoded readings are broadcast to any
//! number of subscribers. Nothing in the gateway depends on a subscriber
//! being present.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::types::Reading;

/// Default capacity of the broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Transport opened.
    Connected,
    /// Transport lost.
    Disconnected,
    /// Non-fatal error.
    Error { message: String },
    /// A raw line from the transceiver.
    Frame { raw: String },
    /// A decoded reading.
    Reading(Box<Reading>),
}

/// Discriminant of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Error,
    Frame,
    Reading,
}

impl Event {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::Error { .. } => EventKind::Error,
            Self::Frame { .. } => EventKind::Frame,
            Self::Reading(_) => EventKind::Reading,
        }
    }
}

/// Subscription filter for specific event types.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by event kinds.
    pub kinds: Option<Vec<EventKind>>,
    /// Filter readings by protocol id.
    pub protocol: Option<String>,
}

impl EventFilter {
    /// Creates a filter for specific event kinds.
    #[must_use]
    pub const fn kinds(kinds: Vec<EventKind>) -> Self {
        Self {
            kinds: Some(kinds),
            protocol: None,
        }
    }

    /// Creates a filter for readings of one protocol.
    #[must_use]
    pub fn readings(protocol: impl Into<String>) -> Self {
        Self {
            kinds: Some(vec![EventKind::Reading]),
            protocol: Some(protocol.into()),
        }
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }

        if let Some(ref protocol) = self.protocol {
            match event {
                Event::Reading(reading) => reading.protocol_id == *protocol,
                _ => false,
            }
        } else {
            true
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
    filter: Option<EventFilter>,
}

impl Subscription {
    /// Receives the next matching event.
    ///
    /// Returns `None` once the dispatcher is gone. Events missed while
    /// lagging are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.as_ref().is_none_or(|f| f.matches(&event)) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("subscriber lagged, {skipped} events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: Arc<broadcast::Sender<Event>>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to events with an optional filter.
    #[must_use]
    pub fn subscribe(&self, filter: Option<EventFilter>) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Returns `None` if the timeout expires or the channel is closed.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        let mut subscription = self.subscribe(Some(filter));

        tokio::select! {
            biased;
            result = subscription.recv() => result,
            () = tokio::time::sleep(timeout) => None,
        }
    }
}
