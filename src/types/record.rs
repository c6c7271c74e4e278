//! Device and state metadata records as kept in the store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::reading::{Envelope, Identifier};
use crate::types::value::ValueType;

/// Role table key used when nothing more specific matches.
pub const FALLBACK_ROLE_KEY: &str = "undefined";

fn default_role() -> String {
    "state".to_string()
}

fn default_read() -> bool {
    true
}

/// Classification of a state: type, role, unit and access flags.
///
/// Entries of the role table have the same shape with an empty name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCommon {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default = "default_read")]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl Default for StateCommon {
    fn default() -> Self {
        Self {
            name: String::new(),
            value_type: ValueType::Mixed,
            role: default_role(),
            unit: None,
            read: true,
            write: false,
            min: None,
            max: None,
            desc: None,
        }
    }
}

/// Display metadata of a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommon {
    pub name: String,
}

/// Metadata of a physical device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub common: DeviceCommon,
    /// The last decoded envelope minus its field values.
    #[serde(default)]
    pub native: Value,
}

impl DeviceRecord {
    /// Builds the record for a device first seen in `envelope`.
    #[must_use]
    pub fn from_envelope(namespace: &str, identifier: &Identifier, envelope: &Envelope) -> Self {
        let name = match &envelope.device {
            Some(kind) => format!("{kind} {}", identifier.address()),
            None => identifier.address().to_string(),
        };
        Self {
            id: identifier.device_id(namespace),
            common: DeviceCommon { name },
            native: envelope.native(),
        }
    }
}

/// Metadata of one measurable or controllable point of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub common: StateCommon,
    #[serde(default)]
    pub native: Value,
}

impl StateRecord {
    /// Builds the record for `state` of the device, classified by `roles`.
    #[must_use]
    pub fn for_field(
        namespace: &str,
        identifier: &Identifier,
        kind: Option<&str>,
        state: &str,
        roles: &RoleTable,
    ) -> Self {
        let mut common = roles.resolve(kind, state);
        common.name = match kind {
            Some(kind) => format!("{state} {kind} {identifier}"),
            None => format!("{state} {identifier}"),
        };
        Self {
            id: identifier.state_id(namespace, state),
            common,
            native: Value::Object(serde_json::Map::new()),
        }
    }
}

/// Auxiliary object holding only a native payload, such as the role table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub native: Value,
}

/// Kind of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Device,
    State,
    Meta,
}

/// A device or state record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectRecord {
    Device(DeviceRecord),
    State(StateRecord),
    Meta(MetaRecord),
}

impl ObjectRecord {
    /// Full store id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Device(device) => &device.id,
            Self::State(state) => &state.id,
            Self::Meta(meta) => &meta.id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        match self {
            Self::Device(_) => ObjectKind::Device,
            Self::State(_) => ObjectKind::State,
            Self::Meta(_) => ObjectKind::Meta,
        }
    }

    /// Native payload.
    #[must_use]
    pub const fn native(&self) -> &Value {
        match self {
            Self::Device(device) => &device.native,
            Self::State(state) => &state.native,
            Self::Meta(meta) => &meta.native,
        }
    }

    /// Replaces the native payload.
    pub fn set_native(&mut self, native: Value) {
        match self {
            Self::Device(device) => device.native = native,
            Self::State(state) => state.native = native,
            Self::Meta(meta) => meta.native = native,
        }
    }

    /// Declared value type, for state records.
    #[must_use]
    pub const fn value_type(&self) -> Option<&ValueType> {
        match self {
            Self::Device(_) | Self::Meta(_) => None,
            Self::State(state) => Some(&state.common.value_type),
        }
    }
}

impl From<DeviceRecord> for ObjectRecord {
    fn from(record: DeviceRecord) -> Self {
        Self::Device(record)
    }
}

impl From<StateRecord> for ObjectRecord {
    fn from(record: StateRecord) -> Self {
        Self::State(record)
    }
}

impl From<MetaRecord> for ObjectRecord {
    fn from(record: MetaRecord) -> Self {
        Self::Meta(record)
    }
}

/// Read-only mapping from state classification keys to state templates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleTable {
    roles: HashMap<String, StateCommon>,
}

impl RoleTable {
    /// Creates a role table from entries.
    #[must_use]
    pub const fn new(roles: HashMap<String, StateCommon>) -> Self {
        Self { roles }
    }

    /// Loads the table from the native payload of the roles object.
    pub fn from_native(native: &Value) -> Result<Self> {
        let roles = serde_json::from_value(native.clone())?;
        Ok(Self { roles })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Looks up `kind_state`, then `state`, then the fallback entry, then a
    /// generic default.
    #[must_use]
    pub fn resolve(&self, kind: Option<&str>, state: &str) -> StateCommon {
        kind.and_then(|kind| self.roles.get(&format!("{kind}_{state}")))
            .or_else(|| self.roles.get(state))
            .or_else(|| self.roles.get(FALLBACK_ROLE_KEY))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn roles() -> RoleTable {
        RoleTable::from_native(&json!({
            "TCM79001_temperature": {"type": "number", "role": "value.temperature", "unit": "°C"},
            "temperature": {"type": "number", "role": "value.temperature"},
            "battery": {"type": "boolean", "role": "indicator.lowbat"},
            "undefined": {"type": "string", "role": "state"}
        }))
        .unwrap()
    }

    #[test]
    fn test_role_lookup_order() {
        let roles = roles();
        assert_eq!(
            roles.resolve(Some("TCM79001"), "temperature").unit.as_deref(),
            Some("°C")
        );
        assert_eq!(roles.resolve(Some("S300TH"), "temperature").unit, None);
        assert_eq!(
            roles.resolve(Some("TCM79001"), "battery").value_type,
            ValueType::Boolean
        );
        assert_eq!(
            roles.resolve(None, "trivia").value_type,
            ValueType::String
        );
    }

    #[test]
    fn test_generic_default_without_fallback_entry() {
        let common = RoleTable::default().resolve(None, "cmd");
        assert_eq!(common.value_type, ValueType::Mixed);
        assert_eq!(common.role, "state");
        assert!(common.read);
    }

    #[test]
    fn test_state_record_name() {
        let id = Identifier::new("NS_WC", "E5");
        let record = StateRecord::for_field("cul.0", &id, Some("TCM79001"), "humidity", &roles());
        assert_eq!(record.id, "cul.0.NS_WC.E5.humidity");
        assert_eq!(record.common.name, "humidity TCM79001 NS_WC.E5");
    }

    #[test]
    fn test_device_record_from_envelope() {
        let id = Identifier::new("NS_WC", "E5");
        let envelope = Envelope {
            protocol: Some("NS_WC".into()),
            address: Some("E5".into()),
            device: Some("TCM79001".into()),
            ..Envelope::default()
        };
        let record = DeviceRecord::from_envelope("cul.0", &id, &envelope);
        assert_eq!(record.id, "cul.0.NS_WC.E5");
        assert_eq!(record.common.name, "TCM79001 E5");
        assert_eq!(record.native["device"], json!("TCM79001"));
    }

    #[test]
    fn test_object_record_serde() {
        let value = json!({
            "_id": "cul.0.FS20.123401",
            "type": "device",
            "common": {"name": "123401"},
            "native": {"protocol": "FS20"}
        });
        let record: ObjectRecord = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(record.kind(), ObjectKind::Device);
        assert_eq!(record.id(), "cul.0.FS20.123401");
        assert_eq!(serde_json::to_value(&record).unwrap(), value);
    }
}
