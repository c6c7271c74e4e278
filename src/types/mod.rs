//! Data types for the gateway.
//!
//! - Decoded readings, transport envelopes and identifiers
//! - Device and state records, and the role table that classifies states
//! - Declared value types and wire value coercion

pub mod reading;
pub mod record;
pub mod value;

pub use reading::{Envelope, Identifier, Reading};
pub use record::{
    DeviceCommon, DeviceRecord, MetaRecord, ObjectKind, ObjectRecord, RoleTable, StateCommon,
    StateRecord,
};
pub use value::{ValueType, coerce};
