//! Persistent object/state store abstraction.
//!
//! The gateway only ever calls the store from the reconciliation queue's
//! worker (and once at startup to load the role table and seed the cache).

pub mod memory;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::Result;
use crate::types::{ObjectKind, ObjectRecord};

/// Trait for store implementations.
pub trait Store: Send + Sync {
    /// Reads an object record.
    fn get_object<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<ObjectRecord>>>;

    /// Creates or overwrites an object record.
    fn set_object<'a>(&'a self, id: &'a str, record: ObjectRecord) -> BoxFuture<'a, Result<()>>;

    /// Writes a state value.
    fn set_state<'a>(&'a self, id: &'a str, value: Value, ack: bool) -> BoxFuture<'a, Result<()>>;

    /// Lists all records of `kind` whose id starts with `prefix`.
    fn query_objects<'a>(
        &'a self,
        prefix: &'a str,
        kind: ObjectKind,
    ) -> BoxFuture<'a, Result<Vec<ObjectRecord>>>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get_object<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<ObjectRecord>>> {
        (**self).get_object(id)
    }

    fn set_object<'a>(&'a self, id: &'a str, record: ObjectRecord) -> BoxFuture<'a, Result<()>> {
        (**self).set_object(id, record)
    }

    fn set_state<'a>(&'a self, id: &'a str, value: Value, ack: bool) -> BoxFuture<'a, Result<()>> {
        (**self).set_state(id, value, ack)
    }

    fn query_objects<'a>(
        &'a self,
        prefix: &'a str,
        kind: ObjectKind,
    ) -> BoxFuture<'a, Result<Vec<ObjectRecord>>> {
        (**self).query_objects(prefix, kind)
    }
}

pub use memory::{MemoryStore, StoreOp, StoredState};
