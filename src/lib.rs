//! # culgate
//!
//! A gateway between CUL/CUNO radio transceivers and a device/state store.
//!
//! Frames received from home-automation sensors and actuators (weather
//! stations, FS20 switches) are decoded into readings, each physical device
//! is mapped to a stable tree of named states, and every update is written
//! through a strictly serialized queue.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Serial (CUL, SCC, COC) and telnet (CUNO) transports with automatic
//!   reconnection
//! - Weather frame decoding with dew point and absolute humidity
//! - Devices and states created once and reused thereafter
//! - Event broadcast of frames, readings and connection changes
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use culgate::{Gateway, GatewayConfig, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), culgate::Error> {
//!     let config = GatewayConfig::serial("/dev/ttyACM0");
//!     let transport = config.transport();
//!     let store = Arc::new(MemoryStore::new());
//!
//!     let (mut gateway, mut events) = Gateway::start(config, transport, store).await?;
//!     gateway
//!         .run_until(&mut events, tokio::time::sleep(Duration::from_secs(3600)))
//!         .await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Line framing, frame decoding, psychrometrics, FS20 commands
//! - [`types`] - Readings, envelopes, device/state records, value coercion
//! - [`transport`] - Serial and telnet transports
//! - [`connection`] - Connection state machine with reconnect timer
//! - [`cache`] - In-memory view of known records
//! - [`queue`] - Serialized store task queue
//! - [`store`] - Store abstraction and an in-memory store
//! - [`event`] - Event broadcast for observers
//! - [`gateway`] - The [`Gateway`] orchestrator

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod gateway;
pub mod protocol;
pub mod queue;
pub mod store;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use cache::ObjectCache;
pub use config::{ConnectionType, GatewayConfig};
pub use connection::{ConnectionChange, ConnectionManager, ConnectionState};
pub use error::{Error, FrameError, Result};
pub use event::{Event, EventDispatcher, EventFilter, EventKind, Subscription};
pub use gateway::Gateway;
pub use protocol::{DeviceCommand, Mode, RawCommand};
pub use queue::{ReconciliationQueue, Task};
pub use store::{MemoryStore, Store};
pub use transport::{
    SerialConfig, SerialTransport, TelnetConfig, TelnetTransport, Transport, TransportEvent,
    check_connection, list_ports,
};
pub use types::{
    DeviceRecord, Envelope, Identifier, ObjectKind, ObjectRecord, Reading, RoleTable,
    StateCommon, StateRecord, ValueType,
};
