//! Serial/USB transport implementation.
//!
//! This module provides serial port communication for transceivers
//! connected via USB (CUL sticks).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::{Error, Result};
use crate::protocol::{Mode, encode_line};
use crate::transport::{Transport, TransportEvent, spawn_reader};

/// Default baud rate of CUL sticks.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default connection delay.
pub const DEFAULT_CONNECTION_DELAY: Duration = Duration::from_millis(300);

/// Configuration for serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyACM0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Receive mode selected after opening.
    pub mode: Mode,
    /// Delay after opening before sending the mode command.
    pub connection_delay: Duration,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            mode: Mode::default(),
            connection_delay: DEFAULT_CONNECTION_DELAY,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the receive mode.
    #[must_use]
    pub const fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the connection delay.
    #[must_use]
    pub const fn connection_delay(mut self, delay: Duration) -> Self {
        self.connection_delay = delay;
        self
    }

    fn check_port(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(Error::ConfigurationMissing {
                what: "serial port".into(),
            });
        }
        Ok(())
    }
}

/// Serial transport for CUL sticks.
///
/// Uses split read/write halves; the read half is owned by a spawned task.
pub struct SerialTransport {
    config: SerialConfig,
    writer: Option<Arc<Mutex<WriteHalf<SerialStream>>>>,
    reader: Option<JoinHandle<()>>,
}

impl SerialTransport {
    /// Creates a new serial transport with the given configuration.
    #[must_use]
    pub const fn new(config: SerialConfig) -> Self {
        Self {
            config,
            writer: None,
            reader: None,
        }
    }

    /// Creates a new serial transport for the given port with default settings.
    #[must_use]
    pub fn with_port(port: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(port))
    }

    #[must_use]
    pub const fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, events: mpsc::Sender<TransportEvent>) -> BoxFuture<'_, Result<()>> {
        async move {
            if self.writer.is_some() {
                return Ok(());
            }
            self.config.check_port()?;

            tracing::info!("opening serial port: {}", self.config.port);

            let stream = tokio_serial::new(&self.config.port, self.config.baud_rate)
                .open_native_async()
                .map_err(Error::Serial)?;

            // Wait for the stick to be ready
            tokio::time::sleep(self.config.connection_delay).await;

            let (reader, mut writer) = tokio::io::split(stream);
            let init = encode_line(self.config.mode.init_command().as_bytes());
            writer.write_all(&init).await?;
            writer.flush().await?;
            tracing::debug!(mode = ?self.config.mode, "receive mode selected");

            self.reader = Some(spawn_reader(reader, events));
            self.writer = Some(Arc::new(Mutex::new(writer)));

            tracing::info!("serial port open");
            Ok(())
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            if let Some(reader) = self.reader.take() {
                reader.abort();
            }
            if self.writer.take().is_some() {
                tracing::info!("closing serial port");
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
            self.config.check_port()?;
            if self.writer.is_some() {
                return Ok(());
            }
            let stream = tokio_serial::new(&self.config.port, self.config.baud_rate)
                .open_native_async()
                .map_err(Error::Serial)?;
            drop(stream);
            tracing::debug!("serial port {} is available", self.config.port);
            Ok(())
        }
        .boxed()
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
