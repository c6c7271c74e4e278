//! Transport layer for transceiver communication.
//!
//! This module provides the abstraction over the byte stream to the
//! transceiver. Serial (USB sticks) and telnet (network attached) are
//! implemented; both speak the same line protocol.

#[cfg(test)]
pub(crate) mod mock;
pub mod serial;
pub mod telnet;

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::protocol::{DeviceCommand, LineDecoder, parse_envelope};
use crate::types::Envelope;

/// Default timeout of the liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the transport event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events posted by a transport (and by the connection manager's timer).
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A line was received.
    Data { raw: Bytes, envelope: Envelope },
    /// The stream was closed by the peer or failed.
    Closed,
    /// A non-fatal transport error.
    Error(String),
    /// The reconnect delay has elapsed.
    ReconnectDue,
}

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Opens the stream; received lines are posted to `events`.
    fn open(&mut self, events: mpsc::Sender<TransportEvent>) -> BoxFuture<'_, Result<()>>;

    /// Closes the stream. No `Closed` event is posted for a deliberate close.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Writes raw bytes.
    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Sends a structured device command.
    fn send_command(&mut self, command: &DeviceCommand) -> BoxFuture<'_, Result<()>> {
        match command.encode() {
            Ok(line) => self.write(line),
            Err(e) => futures::future::ready(Err(e)).boxed(),
        }
    }

    /// Checks that the transceiver is reachable without keeping a connection.
    fn probe(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, events: mpsc::Sender<TransportEvent>) -> BoxFuture<'_, Result<()>> {
        (**self).open(events)
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        (**self).close()
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        (**self).write(data)
    }

    fn send_command(&mut self, command: &DeviceCommand) -> BoxFuture<'_, Result<()>> {
        (**self).send_command(command)
    }

    fn probe(&mut self) -> BoxFuture<'_, Result<()>> {
        (**self).probe()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Opens and drops a TCP connection to `host:port`.
///
/// Fails with [`Error::Timeout`] if neither success nor an error arrives
/// within `timeout`.
pub async fn check_connection(host: &str, port: u16, timeout: Duration) -> Result<()> {
    tracing::debug!("probing {host}:{port}");
    let stream = connect_within(timeout, TcpStream::connect((host, port))).await?;
    drop(stream);
    Ok(())
}

/// Awaits an I/O future for at most `timeout`.
pub(crate) async fn connect_within<F, T>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Spawns the read loop for `reader`.
pub(crate) fn spawn_reader<R>(reader: R, events: mpsc::Sender<TransportEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let closed = events.clone();
        if let Err(e) = run_read_loop(reader, events).await {
            tracing::error!("read loop error: {}", e);
            let _ = closed.send(TransportEvent::Error(e.to_string())).await;
        }
        let _ = closed.send(TransportEvent::Closed).await;
    })
}

/// Reads lines until the stream ends, posting one `Data` event per line.
async fn run_read_loop<R>(mut reader: R, events: mpsc::Sender<TransportEvent>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = LineDecoder::new();
    let mut buf = [0u8; 1024];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            tracing::debug!("transport stream closed");
            return Ok(());
        }

        tracing::trace!("received {} bytes", n);
        decoder.feed(&buf[..n]);

        loop {
            match decoder.decode() {
                Ok(Some(raw)) => {
                    let envelope = parse_envelope(&raw);
                    if events
                        .send(TransportEvent::Data { raw, envelope })
                        .await
                        .is_err()
                    {
                        tracing::debug!("event receiver dropped");
                        return Ok(());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let e = Error::from(e);
                    tracing::warn!("{}", e);
                    if events.send(TransportEvent::Error(e.to_string())).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

pub use serial::{SerialConfig, SerialTransport, list_ports};
pub use telnet::{TelnetConfig, TelnetTransport};
