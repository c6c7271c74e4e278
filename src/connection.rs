//! Connection lifecycle of the transport.
//!
//! ```text
//! Idle ──connect──▶ Probing ──ok──▶ Connected ──Closed──▶ Closed
//!   ▲                  │                                    │
//!   │                fail (initial: Idle)                   ▼
//!   └──shutdown──── Backoff ◀───────── fail (reconnect) ── Backoff
//!                      │                                    │
//!                      └────────── ReconnectDue ──▶ Probing ◀┘
//! ```
//!
//! Exactly one reconnect timer exists while in `Backoff`. It is a spawned
//! sleep that posts [`TransportEvent::ReconnectDue`] into the same channel
//! the transport uses, and is aborted whenever `Backoff` is left.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher};
use crate::transport::{EVENT_CHANNEL_CAPACITY, Transport, TransportEvent};

/// Default delay before reopening a lost transport.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Idle,
    Probing,
    Connected,
    Closed,
    Backoff,
}

/// Connection change reported to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionChange {
    Connected,
    Disconnected,
}

/// Owns the transport and drives the reconnect state machine.
pub struct ConnectionManager<T> {
    transport: T,
    state: ConnectionState,
    reconnect_delay: Duration,
    events_tx: mpsc::Sender<TransportEvent>,
    reconnect: Option<JoinHandle<()>>,
    dispatcher: EventDispatcher,
}

impl<T: Transport> ConnectionManager<T> {
    /// Creates a manager and the receiver all transport events arrive on.
    #[must_use]
    pub fn new(
        transport: T,
        reconnect_delay: Duration,
        dispatcher: EventDispatcher,
    ) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let manager = Self {
            transport,
            state: ConnectionState::Idle,
            reconnect_delay,
            events_tx,
            reconnect: None,
            dispatcher,
        };
        (manager, events_rx)
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Checks that the transceiver is reachable before the first open.
    pub async fn preflight(&mut self) -> Result<()> {
        self.transport.probe().await.map_err(|e| match e {
            Error::ConfigurationMissing { .. } => e,
            other => Error::TransportOpen {
                message: other.to_string(),
            },
        })
    }

    /// Opens the transport for the first time.
    ///
    /// A failure is returned to the caller and not retried.
    pub async fn connect(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Probing);
        match self.transport.open(self.events_tx.clone()).await {
            Ok(()) => {
                self.on_open();
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Idle);
                tracing::error!("cannot open transport: {}", e);
                Err(match e {
                    Error::ConfigurationMissing { .. } => e,
                    other => Error::TransportOpen {
                        message: other.to_string(),
                    },
                })
            }
        }
    }

    /// Applies a transport event to the state machine.
    ///
    /// `Data` events are not connection events and are ignored here.
    pub async fn handle(&mut self, event: TransportEvent) -> Option<ConnectionChange> {
        match event {
            TransportEvent::Closed if self.state == ConnectionState::Connected => {
                tracing::warn!("transport closed, reconnecting in {:?}", self.reconnect_delay);
                self.set_state(ConnectionState::Closed);
                self.dispatcher.dispatch(Event::Disconnected);
                if let Err(e) = self.transport.close().await {
                    tracing::debug!("close after loss failed: {}", e);
                }
                self.schedule_reconnect();
                Some(ConnectionChange::Disconnected)
            }
            TransportEvent::ReconnectDue if self.state == ConnectionState::Backoff => {
                self.reconnect = None;
                self.set_state(ConnectionState::Probing);
                match self.transport.open(self.events_tx.clone()).await {
                    Ok(()) => {
                        self.on_open();
                        Some(ConnectionChange::Connected)
                    }
                    Err(e) => {
                        tracing::warn!("reconnect failed: {}", e);
                        self.dispatcher.dispatch(Event::Error {
                            message: format!("reconnect failed: {e}"),
                        });
                        self.schedule_reconnect();
                        None
                    }
                }
            }
            TransportEvent::Error(message) => {
                tracing::warn!("transport error: {}", message);
                self.dispatcher.dispatch(Event::Error { message });
                None
            }
            TransportEvent::Closed | TransportEvent::ReconnectDue | TransportEvent::Data { .. } => {
                tracing::trace!(state = ?self.state, "event ignored");
                None
            }
        }
    }

    /// Cancels any pending reconnect and closes the transport.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Idle);
        self.transport.close().await
    }

    fn on_open(&mut self) {
        self.set_state(ConnectionState::Connected);
        tracing::info!("transport connected");
        self.dispatcher.dispatch(Event::Connected);
    }

    fn schedule_reconnect(&mut self) {
        self.set_state(ConnectionState::Backoff);
        let events = self.events_tx.clone();
        let delay = self.reconnect_delay;
        self.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(TransportEvent::ReconnectDue).await;
        }));
    }

    fn set_state(&mut self, state: ConnectionState) {
        if let Some(timer) = self.reconnect.take() {
            timer.abort();
        }
        tracing::debug!(from = ?self.state, to = ?state, "connection state");
        self.state = state;
    }
}

impl<T> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.reconnect.take() {
            timer.abort();
        }
    }
}
