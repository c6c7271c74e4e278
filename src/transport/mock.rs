//! Scriptable in-process transport for tests.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent};

#[derive(Debug, Default)]
struct State {
    opens: usize,
    failing_opens: usize,
    probe_fails: bool,
    connected: bool,
    writes: Vec<Bytes>,
    events: Option<mpsc::Sender<TransportEvent>>,
}

/// Transport whose clones share one recorded state.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Makes the next `count` opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.lock().failing_opens = count;
    }

    pub fn fail_probe(&self) {
        self.lock().probe_fails = true;
    }

    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    pub fn writes(&self) -> Vec<Bytes> {
        self.lock().writes.clone()
    }

    /// Simulates the peer dropping the connection.
    pub async fn drop_connection(&self) {
        let events = {
            let mut state = self.lock();
            state.connected = false;
            state.events.take()
        };
        if let Some(events) = events {
            events.send(TransportEvent::Closed).await.unwrap();
        }
    }

    /// Simulates a received line.
    pub async fn receive(&self, line: &'static [u8]) {
        let events = self.lock().events.clone().unwrap();
        let raw = Bytes::from_static(line);
        let envelope = crate::protocol::parse_envelope(&raw);
        events
            .send(TransportEvent::Data { raw, envelope })
            .await
            .unwrap();
    }
}

impl Transport for MockTransport {
    fn open(&mut self, events: mpsc::Sender<TransportEvent>) -> BoxFuture<'_, Result<()>> {
        let result = {
            let mut state = self.lock();
            state.opens += 1;
            if state.failing_opens > 0 {
                state.failing_opens -= 1;
                Err(Error::Io(std::io::ErrorKind::ConnectionRefused.into()))
            } else {
                state.connected = true;
                state.events = Some(events);
                Ok(())
            }
        };
        futures::future::ready(result).boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        let mut state = self.lock();
        state.connected = false;
        state.events = None;
        futures::future::ready(Ok(())).boxed()
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        let mut state = self.lock();
        let result = if state.connected {
            state.writes.push(data);
            Ok(())
        } else {
            Err(Error::NotConnected)
        };
        futures::future::ready(result).boxed()
    }

    fn probe(&mut self) -> BoxFuture<'_, Result<()>> {
        let result = if self.lock().probe_fails {
            Err(Error::Timeout { timeout_ms: 10_000 })
        } else {
            Ok(())
        };
        futures::future::ready(result).boxed()
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}
