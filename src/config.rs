//! Gateway configuration.
//!
//! Can be built in code with the setter methods or deserialized from the
//! adapter's JSON settings, where every field is optional.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::connection::DEFAULT_RECONNECT_DELAY;
use crate::error::Result;
use crate::protocol::Mode;
use crate::transport::serial::DEFAULT_BAUD_RATE;
use crate::transport::telnet::DEFAULT_TELNET_PORT;
use crate::transport::{
    DEFAULT_PROBE_TIMEOUT, SerialConfig, SerialTransport, TelnetConfig, TelnetTransport, Transport,
};

/// Baud rate the CC1101 based SCC and COC boards are fixed to.
pub const COC_BAUD_RATE: u32 = 38_400;

/// Kind of transceiver attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// CUL stick on a serial/USB port.
    #[default]
    Serial,
    /// Network attached CUNO, reached over telnet.
    Cuno,
    /// Stackable CC1101 board on a serial port.
    Scc,
    /// CC1101 board for the Raspberry Pi on a serial port.
    Coc,
}

impl ConnectionType {
    #[must_use]
    pub const fn is_network(self) -> bool {
        matches!(self, Self::Cuno)
    }
}

/// Configuration of one gateway instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Id prefix of every record this gateway owns (e.g. `cul.0`).
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default, rename = "type")]
    pub connection_type: ConnectionType,

    /// Serial port path.
    #[serde(default, rename = "serialport")]
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baudrate: u32,

    #[serde(default)]
    pub mode: Mode,

    /// Host of a network attached transceiver.
    #[serde(default, rename = "ip")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Accept outbound writes for protocols other than FS20.
    #[serde(default, deserialize_with = "flag")]
    pub experimental: bool,

    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Store object whose native payload is the role table.
    #[serde(default = "default_roles_object_id")]
    pub roles_object_id: String,
}

fn default_namespace() -> String {
    "cul.0".to_string()
}

const fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

const fn default_port() -> u16 {
    DEFAULT_TELNET_PORT
}

const fn default_reconnect_delay_secs() -> u64 {
    DEFAULT_RECONNECT_DELAY.as_secs()
}

fn default_probe_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_PROBE_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

fn default_roles_object_id() -> String {
    "cul.meta.roles".to_string()
}

/// Accepts `true`/`false` as well as the strings `"true"`/`"false"`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s == "true",
    })
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            connection_type: ConnectionType::default(),
            serial_port: String::new(),
            baudrate: default_baud_rate(),
            mode: Mode::default(),
            host: String::new(),
            port: default_port(),
            experimental: false,
            reconnect_delay_secs: default_reconnect_delay_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            roles_object_id: default_roles_object_id(),
        }
    }
}

impl GatewayConfig {
    /// Configuration for a serial transceiver.
    #[must_use]
    pub fn serial(port: impl Into<String>) -> Self {
        Self {
            serial_port: port.into(),
            ..Self::default()
        }
    }

    /// Configuration for a network transceiver.
    #[must_use]
    pub fn cuno(host: impl Into<String>, port: u16) -> Self {
        Self {
            connection_type: ConnectionType::Cuno,
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Parses the JSON settings form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub const fn connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    #[must_use]
    pub const fn baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate = baudrate;
        self
    }

    #[must_use]
    pub const fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn experimental(mut self, experimental: bool) -> Self {
        self.experimental = experimental;
        self
    }

    #[must_use]
    pub const fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_secs = delay.as_secs();
        self
    }

    #[must_use]
    pub fn roles_object_id(mut self, id: impl Into<String>) -> Self {
        self.roles_object_id = id.into();
        self
    }

    #[must_use]
    pub const fn reconnect_delay_duration(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Id of the `info.connection` state.
    #[must_use]
    pub fn connection_state_id(&self) -> String {
        format!("{}.info.connection", self.namespace)
    }

    /// Serial settings; SCC and COC boards always run at 38400 baud.
    #[must_use]
    pub fn serial_config(&self) -> SerialConfig {
        let baud_rate = match self.connection_type {
            ConnectionType::Scc | ConnectionType::Coc => COC_BAUD_RATE,
            ConnectionType::Serial | ConnectionType::Cuno => self.baudrate,
        };
        SerialConfig::new(self.serial_port.clone())
            .baud_rate(baud_rate)
            .mode(self.mode)
    }

    #[must_use]
    pub fn telnet_config(&self) -> TelnetConfig {
        TelnetConfig::new(self.host.clone(), self.port)
            .mode(self.mode)
            .timeout(self.probe_timeout())
    }

    /// Builds the transport for the configured connection type.
    #[must_use]
    pub fn transport(&self) -> Box<dyn Transport> {
        if self.connection_type.is_network() {
            Box::new(TelnetTransport::new(self.telnet_config()))
        } else {
            Box::new(SerialTransport::new(self.serial_config()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.namespace, "cul.0");
        assert_eq!(config.connection_type, ConnectionType::Serial);
        assert_eq!(config.baudrate, 9600);
        assert_eq!(config.mode, Mode::SlowRf);
        assert_eq!(config.reconnect_delay_duration(), Duration::from_secs(10));
        assert_eq!(config.probe_timeout(), Duration::from_secs(10));
        assert_eq!(config.roles_object_id, "cul.meta.roles");
        assert!(!config.experimental);
        assert_eq!(config.connection_state_id(), "cul.0.info.connection");
    }

    #[test]
    fn test_empty_json_equals_default() {
        let config = GatewayConfig::from_json("{}").unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_adapter_settings_json() {
        let config = GatewayConfig::from_json(
            r#"{
                "namespace": "cul.1",
                "type": "cuno",
                "ip": "192.168.1.50",
                "port": 2323,
                "mode": "AskSin",
                "experimental": "true"
            }"#,
        )
        .unwrap();

        assert_eq!(config.namespace, "cul.1");
        assert!(config.connection_type.is_network());
        assert_eq!(config.host, "192.168.1.50");
        assert_eq!(config.mode, Mode::AskSin);
        assert!(config.experimental);

        let telnet = config.telnet_config();
        assert_eq!(telnet.host, "192.168.1.50");
        assert_eq!(telnet.port, 2323);
    }

    #[test]
    fn test_invalid_json() {
        assert!(GatewayConfig::from_json(r#"{"type": "usb"}"#).is_err());
    }

    #[test]
    fn test_coc_baud_rate() {
        let config = GatewayConfig::serial("/dev/ttyAMA0").connection_type(ConnectionType::Coc);
        assert_eq!(config.serial_config().baud_rate, COC_BAUD_RATE);

        let config = GatewayConfig::serial("/dev/ttyACM0").baudrate(57_600);
        assert_eq!(config.serial_config().baud_rate, 57_600);
    }

    #[test]
    fn test_builder() {
        let config = GatewayConfig::cuno("cuno.local", 2323)
            .namespace("cul.2")
            .experimental(true)
            .reconnect_delay(Duration::from_secs(30))
            .roles_object_id("cul.meta.custom");

        assert_eq!(config.namespace, "cul.2");
        assert!(config.experimental);
        assert_eq!(config.reconnect_delay_duration(), Duration::from_secs(30));
        assert_eq!(config.roles_object_id, "cul.meta.custom");
    }
}
