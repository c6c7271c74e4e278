//! Telnet transport for network attached transceivers (CUNO, COC via ser2net).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::protocol::{Mode, encode_line};
use crate::transport::{
    DEFAULT_PROBE_TIMEOUT, Transport, TransportEvent, check_connection, connect_within,
    spawn_reader,
};

/// Default telnet port of CUNO devices.
pub const DEFAULT_TELNET_PORT: u16 = 2323;

/// Configuration for telnet transport.
#[derive(Debug, Clone)]
pub struct TelnetConfig {
    pub host: String,
    pub port: u16,
    /// Receive mode selected after connecting.
    pub mode: Mode,
    /// Timeout of the connect attempt and the liveness probe.
    pub timeout: Duration,
}

impl TelnetConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            mode: Mode::default(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Sets the receive mode.
    #[must_use]
    pub const fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the connect and probe timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn check_host(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::ConfigurationMissing {
                what: "transceiver host".into(),
            });
        }
        Ok(())
    }
}

/// Telnet transport.
pub struct TelnetTransport {
    config: TelnetConfig,
    writer: Option<Arc<Mutex<OwnedWriteHalf>>>,
    reader: Option<JoinHandle<()>>,
}

impl TelnetTransport {
    #[must_use]
    pub const fn new(config: TelnetConfig) -> Self {
        Self {
            config,
            writer: None,
            reader: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TelnetConfig {
        &self.config
    }
}

impl Transport for TelnetTransport {
    fn open(&mut self, events: mpsc::Sender<TransportEvent>) -> BoxFuture<'_, Result<()>> {
        async move {
            if self.writer.is_some() {
                return Ok(());
            }
            self.config.check_host()?;

            let TelnetConfig {
                host,
                port,
                mode,
                timeout,
            } = &self.config;
            tracing::info!("connecting to {host}:{port}");

            let stream =
                connect_within(*timeout, TcpStream::connect((host.as_str(), *port))).await?;
            stream.set_nodelay(true)?;

            let (reader, mut writer) = stream.into_split();
            writer
                .write_all(&encode_line(mode.init_command().as_bytes()))
                .await?;
            writer.flush().await?;
            tracing::debug!(?mode, "receive mode selected");

            self.reader = Some(spawn_reader(reader, events));
            self.writer = Some(Arc::new(Mutex::new(writer)));

            tracing::info!("connected to {host}:{port}");
            Ok(())
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            if let Some(reader) = self.reader.take() {
                reader.abort();
            }
            if let Some(writer) = self.writer.take() {
                tracing::info!("closing connection to {}", self.config.host);
                let _ = writer.lock().await.shutdown().await;
            }
            Ok(())
        }
        .boxed()
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        let writer = self.writer.clone();
        async move {
            let writer = writer.ok_or(Error::NotConnected)?;
            let mut writer = writer.lock().await;

            tracing::trace!("sending {} bytes", data.len());
            writer.write_all(&data).await?;
            writer.flush().await?;
            Ok(())
        }
        .boxed()
    }

    fn probe(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            self.config.check_host()?;
            check_connection(&self.config.host, self.config.port, self.config.timeout).await
        }
        .boxed()
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }
}

impl Drop for TelnetTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn test_open_sends_mode_and_reads_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut transport = TelnetTransport::new(TelnetConfig::new("127.0.0.1", port));

        let (tx, mut rx) = mpsc::channel(8);
        let (open, accepted) = tokio::join!(transport.open(tx), listener.accept());
        open.unwrap();
        let (mut peer, _) = accepted.unwrap();
        assert!(transport.is_connected());

        let mut buf = [0u8; 5];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"X21\r\n");

        peer.write_all(b"F12340111\r\n").await.unwrap();
        let Some(TransportEvent::Data { raw, envelope }) = rx.recv().await else {
            panic!("expected data");
        };
        assert_eq!(raw, Bytes::from_static(b"F12340111"));
        assert_eq!(envelope.protocol.as_deref(), Some("FS20"));

        transport
            .write(Bytes::from_static(b"F12340100\r\n"))
            .await
            .unwrap();
        let mut buf = [0u8; 11];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"F12340100\r\n");

        drop(peer);
        assert_eq!(rx.recv().await, Some(TransportEvent::Closed));
    }

    #[tokio::test]
    async fn test_close_posts_no_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut transport = TelnetTransport::new(TelnetConfig::new("127.0.0.1", port));

        let (tx, mut rx) = mpsc::channel(8);
        let (open, _accepted) = tokio::join!(transport.open(tx), listener.accept());
        open.unwrap();

        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        drop(transport);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_missing_host() {
        let mut transport = TelnetTransport::new(TelnetConfig::new(" ", DEFAULT_TELNET_PORT));
        assert!(matches!(
            transport.probe().await,
            Err(Error::ConfigurationMissing { .. })
        ));
    }
}
