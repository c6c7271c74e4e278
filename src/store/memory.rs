//! In-memory store.
//!
//! Keeps objects and states in ordered maps and records every call, which
//! makes it usable both for embedders without persistence and in tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{ObjectKind, ObjectRecord};

/// A stored state value.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredState {
    pub value: Value,
    pub ack: bool,
}

/// A recorded store call.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    GetObject(String),
    SetObject(String),
    SetState(String, Value),
    Query(String),
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, ObjectRecord>,
    states: BTreeMap<String, StoredState>,
    log: Vec<StoreOp>,
    failing: HashSet<String>,
}

/// Store backed by in-process maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `records`.
    #[must_use]
    pub fn with_objects(records: impl IntoIterator<Item = ObjectRecord>) -> Self {
        let objects = records
            .into_iter()
            .map(|record| (record.id().to_string(), record))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                objects,
                ..Inner::default()
            }),
            ..Self::default()
        }
    }

    /// Makes every call touching `id` fail.
    pub async fn fail_on(&self, id: impl Into<String>) {
        self.inner.lock().await.failing.insert(id.into());
    }

    /// Returns a stored object.
    pub async fn object(&self, id: &str) -> Option<ObjectRecord> {
        self.inner.lock().await.objects.get(id).cloned()
    }

    /// Returns a stored state.
    pub async fn state(&self, id: &str) -> Option<StoredState> {
        self.inner.lock().await.states.get(id).cloned()
    }

    /// Returns all recorded calls in order.
    pub async fn operations(&self) -> Vec<StoreOp> {
        self.inner.lock().await.log.clone()
    }

    /// Highest number of calls observed running at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn call<T>(&self, op: StoreOp, id: &str, f: impl FnOnce(&mut Inner) -> T) -> Result<T> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Give concurrent callers a chance to overlap.
        tokio::task::yield_now().await;

        let result = {
            let mut inner = self.inner.lock().await;
            inner.log.push(op);
            if inner.failing.contains(id) {
                Err(Error::store(id, "injected failure"))
            } else {
                Ok(f(&mut inner))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl Store for MemoryStore {
    fn get_object<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<ObjectRecord>>> {
        self.call(StoreOp::GetObject(id.to_string()), id, move |inner| {
            inner.objects.get(id).cloned()
        })
        .boxed()
    }

    fn set_object<'a>(&'a self, id: &'a str, record: ObjectRecord) -> BoxFuture<'a, Result<()>> {
        self.call(StoreOp::SetObject(id.to_string()), id, move |inner| {
            inner.objects.insert(id.to_string(), record);
        })
        .boxed()
    }

    fn set_state<'a>(&'a self, id: &'a str, value: Value, ack: bool) -> BoxFuture<'a, Result<()>> {
        self.call(
            StoreOp::SetState(id.to_string(), value.clone()),
            id,
            move |inner| {
                inner.states.insert(id.to_string(), StoredState { value, ack });
            },
        )
        .boxed()
    }

    fn query_objects<'a>(
        &'a self,
        prefix: &'a str,
        kind: ObjectKind,
    ) -> BoxFuture<'a, Result<Vec<ObjectRecord>>> {
        self.call(StoreOp::Query(prefix.to_string()), prefix, move |inner| {
            inner
                .objects
                .range(prefix.to_string()..)
                .take_while(|(id, _)| id.starts_with(prefix))
                .map(|(_, record)| record)
                .filter(|record| record.kind() == kind)
                .cloned()
                .collect()
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{DeviceCommon, DeviceRecord, StateCommon, StateRecord};

    fn device(id: &str) -> ObjectRecord {
        DeviceRecord {
            id: id.into(),
            common: DeviceCommon { name: id.into() },
            native: json!({}),
        }
        .into()
    }

    fn state(id: &str) -> ObjectRecord {
        StateRecord {
            id: id.into(),
            common: StateCommon::default(),
            native: json!({}),
        }
        .into()
    }

    #[tokio::test]
    async fn test_query_by_prefix_and_kind() {
        let store = MemoryStore::with_objects([
            device("cul.0.FS20.123401"),
            state("cul.0.FS20.123401.cmd"),
            device("cul.1.FS20.999901"),
            device("cul.0.NS_WC.E5"),
        ]);

        let devices = store.query_objects("cul.0.", ObjectKind::Device).await.unwrap();
        let ids: Vec<_> = devices.iter().map(ObjectRecord::id).collect();
        assert_eq!(ids, ["cul.0.FS20.123401", "cul.0.NS_WC.E5"]);

        let states = store.query_objects("cul.0.", ObjectKind::State).await.unwrap();
        assert_eq!(states.len(), 1);
    }

    #[tokio::test]
    async fn test_state_roundtrip_and_log() {
        let store = MemoryStore::new();
        store.set_state("cul.0.info.connection", json!(true), true).await.unwrap();

        let stored = store.state("cul.0.info.connection").await.unwrap();
        assert_eq!(stored.value, json!(true));
        assert!(stored.ack);
        assert_eq!(
            store.operations().await,
            [StoreOp::SetState("cul.0.info.connection".into(), json!(true))]
        );
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.fail_on("cul.0.bad").await;
        assert!(matches!(
            store.set_state("cul.0.bad", json!(1), true).await,
            Err(Error::Store { .. })
        ));
        assert!(store.state("cul.0.bad").await.is_none());
    }
}
