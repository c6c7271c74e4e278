//! Decoded readings, transport envelopes and device identifiers.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// A decoded telemetry unit produced by the frame decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Protocol id (e.g. `NS_WC`).
    pub protocol_id: String,
    /// Device address as found on the wire.
    pub device_address: String,
    /// Device model tag, if known.
    pub device_kind: Option<String>,
    /// Measurement fields keyed by state name.
    pub fields: BTreeMap<String, Value>,
}

impl Reading {
    /// Creates a reading without fields.
    #[must_use]
    pub fn new(protocol_id: impl Into<String>, device_address: impl Into<String>) -> Self {
        Self {
            protocol_id: protocol_id.into(),
            device_address: device_address.into(),
            device_kind: None,
            fields: BTreeMap::new(),
        }
    }

    /// Sets the device kind.
    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.device_kind = Some(kind.into());
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// The transport's own parse of a received line.
///
/// Serializes without its data map; that form is stored as the device's
/// native payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<f64>,
    #[serde(skip)]
    pub data: BTreeMap<String, Value>,
}

impl Envelope {
    /// Merges a decoded reading, which wins over what the transport parsed.
    pub fn merge(&mut self, reading: Reading) {
        self.protocol = Some(reading.protocol_id);
        self.address = Some(reading.device_address);
        if reading.device_kind.is_some() {
            self.device = reading.device_kind;
        }
        self.data.extend(reading.fields);
    }

    /// Returns the identifier, or `None` if protocol or address is missing.
    #[must_use]
    pub fn identifier(&self) -> Option<Identifier> {
        match (&self.protocol, &self.address) {
            (Some(protocol), Some(address)) if !protocol.is_empty() && !address.is_empty() => {
                Some(Identifier::new(protocol.clone(), address.clone()))
            }
            _ => None,
        }
    }

    /// The envelope minus its data map, as JSON.
    #[must_use]
    pub fn native(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Stable `protocol.address` key naming a device's state tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    protocol: String,
    address: String,
}

impl Identifier {
    /// Creates an identifier.
    #[must_use]
    pub fn new(protocol: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            address: address.into(),
        }
    }

    /// Protocol part.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Address part.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Full store id of the device record.
    #[must_use]
    pub fn device_id(&self, namespace: &str) -> String {
        format!("{namespace}.{self}")
    }

    /// Full store id of one state of the device.
    #[must_use]
    pub fn state_id(&self, namespace: &str, state: &str) -> String {
        format!("{namespace}.{self}.{state}")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.protocol, self.address)
    }
}
