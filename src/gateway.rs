//! The gateway between the transceiver and the store.
//!
//! [`Gateway`] combines the connection manager, the frame decoder, the
//! object cache and the reconciliation queue. It owns no background task of
//! its own: [`Gateway::run_until`] drives it from the transport event
//! channel, and every store write goes through the queue.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::cache::ObjectCache;
use crate::config::GatewayConfig;
use crate::connection::{ConnectionChange, ConnectionManager, ConnectionState};
use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher, EventFilter, Subscription};
use crate::protocol::{DeviceCommand, RawCommand, decode_frame, fs20};
use crate::queue::{ReconciliationQueue, Task};
use crate::store::Store;
use crate::transport::{Transport, TransportEvent};
use crate::types::{DeviceRecord, Envelope, ObjectRecord, Reading, RoleTable, StateRecord, coerce};

/// The only state accepted from outside.
const WRITABLE_STATE: &str = "cmdRaw";

/// Gateway for one transceiver.
pub struct Gateway<T> {
    config: GatewayConfig,
    connection: ConnectionManager<T>,
    cache: ObjectCache,
    roles: RoleTable,
    queue: ReconciliationQueue,
    dispatcher: EventDispatcher,
}

impl<T: Transport> Gateway<T> {
    /// Loads the role table, seeds the cache and opens the transport.
    ///
    /// Returns the gateway and the receiver to pass to [`Gateway::run_until`].
    ///
    /// # Errors
    ///
    /// [`Error::ConfigurationMissing`] if the role table or the port is
    /// missing, [`Error::TransportOpen`] if the transceiver cannot be reached.
    pub async fn start(
        config: GatewayConfig,
        transport: T,
        store: Arc<dyn Store>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        Self::start_with_dispatcher(config, transport, store, EventDispatcher::default()).await
    }

    /// Like [`Gateway::start`], dispatching to an existing dispatcher so
    /// that subscribers see the startup events.
    pub async fn start_with_dispatcher(
        config: GatewayConfig,
        transport: T,
        store: Arc<dyn Store>,
        dispatcher: EventDispatcher,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let roles = load_roles(store.as_ref(), &config.roles_object_id).await?;
        tracing::debug!("loaded {} role entries", roles.len());

        let cache = ObjectCache::load(store.as_ref(), &config.namespace).await?;
        tracing::info!("{} known objects below {}", cache.len(), config.namespace);

        let queue = ReconciliationQueue::spawn(store);
        let (connection, events) =
            ConnectionManager::new(transport, config.reconnect_delay_duration(), dispatcher.clone());

        let mut gateway = Self {
            config,
            connection,
            cache,
            roles,
            queue,
            dispatcher,
        };
        gateway.write_connection(false);

        gateway.connection.preflight().await?;
        gateway.connection.connect().await?;
        gateway.write_connection(true);

        Ok((gateway, events))
    }

    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub const fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    #[must_use]
    pub const fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        self.connection.transport()
    }

    /// Number of store tasks enqueued so far.
    #[must_use]
    pub const fn enqueued(&self) -> u64 {
        self.queue.enqueued()
    }

    /// Subscribes to gateway events.
    #[must_use]
    pub fn subscribe(&self, filter: Option<EventFilter>) -> Subscription {
        self.dispatcher.subscribe(filter)
    }

    /// Resolves once every store task enqueued so far has completed.
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Processes transport events until `shutdown` resolves, then shuts down.
    pub async fn run_until<F>(
        &mut self,
        events: &mut mpsc::Receiver<TransportEvent>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
            }
        }

        self.shutdown().await
    }

    /// Applies one transport event.
    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Data { raw, envelope } => self.handle_frame(&raw, envelope),
            other => match self.connection.handle(other).await {
                Some(ConnectionChange::Connected) => self.write_connection(true),
                Some(ConnectionChange::Disconnected) => self.write_connection(false),
                None => {}
            },
        }
    }

    /// Reconciles one received line with the store.
    ///
    /// For a device seen for the first time the device record is enqueued
    /// before its state records, and both before any value write.
    pub fn handle_frame(&mut self, raw: &[u8], mut envelope: Envelope) {
        let line = String::from_utf8_lossy(raw).into_owned();
        tracing::debug!("received {line}");
        self.dispatcher.dispatch(Event::Frame { raw: line });

        if let Some(reading) = decode_frame(raw) {
            envelope.merge(reading);
        }
        let Some(identifier) = envelope.identifier() else {
            tracing::trace!("frame without protocol or address ignored");
            return;
        };
        let namespace = self.config.namespace.as_str();
        let kind = envelope.device.as_deref();

        let device = DeviceRecord::from_envelope(namespace, &identifier, &envelope);
        let update = match self.cache.get(&device.id) {
            None => {
                tracing::info!("new device {identifier}");
                Some(ObjectRecord::from(device.clone()))
            }
            Some(cached) if cached.native() != &device.native => {
                let mut updated = cached.clone();
                updated.set_native(device.native.clone());
                Some(updated)
            }
            Some(_) => None,
        };
        if let Some(record) = update {
            self.cache.put(device.id.clone(), record);
            self.queue.enqueue(Task::CreateOrUpdateObject {
                id: device.id.clone(),
                record: device.into(),
            });
        }

        for name in envelope.data.keys() {
            let state_id = identifier.state_id(namespace, name);
            if self.cache.has(&state_id) {
                continue;
            }
            let state = StateRecord::for_field(namespace, &identifier, kind, name, &self.roles);
            self.cache.put(state_id.clone(), state.clone().into());
            self.queue.enqueue(Task::CreateOrUpdateObject {
                id: state_id,
                record: state.into(),
            });
        }

        for (name, value) in &envelope.data {
            let id = identifier.state_id(namespace, name);
            let value_type = self
                .cache
                .get(&id)
                .and_then(ObjectRecord::value_type)
                .cloned()
                .unwrap_or_default();
            self.queue.enqueue(Task::WriteState {
                value: coerce(value, &value_type),
                id,
            });
        }

        let reading = Reading {
            protocol_id: identifier.protocol().to_string(),
            device_address: identifier.address().to_string(),
            device_kind: envelope.device,
            fields: envelope.data,
        };
        self.dispatcher.dispatch(Event::Reading(Box::new(reading)));
    }

    /// Sends a device command. No response is awaited.
    pub async fn send_command(&mut self, command: &DeviceCommand) -> Result<()> {
        tracing::info!(
            "send {} {}{} {}",
            command.protocol,
            command.housecode,
            command.address,
            command.command
        );
        self.connection.transport_mut().send_command(command).await
    }

    /// Sends an opaque command line unmodified. No response is awaited.
    pub async fn send_raw(&mut self, command: &str) -> Result<()> {
        tracing::info!("send raw {command}");
        let line = RawCommand::new(command).encode();
        self.connection.transport_mut().write(line).await
    }

    /// Routes an unacknowledged state change to the transceiver.
    ///
    /// Only `<ns>.<inst>.<PROTO>.<HHHHAA>.cmdRaw` is writable, and only for
    /// FS20 unless the config enables experimental protocols.
    pub async fn handle_state_change(&mut self, id: &str, value: &Value, ack: bool) -> Result<()> {
        if ack {
            return Ok(());
        }
        tracing::debug!("state change {id}: {value}");

        let parts: Vec<&str> = id.split('.').collect();
        if parts.len() < 5 {
            return Err(Error::InvalidId { id: id.to_string() });
        }
        let (protocol, device, state) = (parts[2], parts[3], parts[4]);

        if protocol != fs20::PROTOCOL_ID && !self.config.experimental {
            return Err(Error::Unsupported {
                what: format!("writes to {protocol} devices"),
            });
        }
        if state != WRITABLE_STATE {
            return Err(Error::Unsupported {
                what: format!("writes to state {state}"),
            });
        }

        let (Some(housecode), Some(address)) = (device.get(..4), device.get(4..6)) else {
            return Err(Error::InvalidId { id: id.to_string() });
        };
        let command = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.send_command(&DeviceCommand::new(protocol, housecode, address, command))
            .await
    }

    /// Cancels the reconnect timer, closes the transport and drains the queue.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down");
        let closed = self.connection.shutdown().await;
        self.write_connection(false);
        self.queue.flush().await;
        closed
    }

    fn write_connection(&mut self, connected: bool) {
        self.queue.enqueue(Task::WriteState {
            id: self.config.connection_state_id(),
            value: Value::Bool(connected),
        });
    }
}

async fn load_roles(store: &dyn Store, id: &str) -> Result<RoleTable> {
    match store.get_object(id).await? {
        Some(record) => RoleTable::from_native(record.native()),
        None => Err(Error::ConfigurationMissing {
            what: format!("role table {id}"),
        }),
    }
}
