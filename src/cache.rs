//! In-memory view of the device and state records known to the store.
//!
//! The gateway consults this cache instead of the store for every reading.
//! Entries are written when the gateway decides to create a record, before
//! the matching queue task has drained.

use std::collections::HashMap;

use crate::error::Result;
use crate::store::Store;
use crate::types::{ObjectKind, ObjectRecord};

/// Last-known records keyed by full id.
#[derive(Debug, Default)]
pub struct ObjectCache {
    records: HashMap<String, ObjectRecord>,
}

impl ObjectCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerates the devices and then the states below `namespace`.
    pub async fn load<S: Store + ?Sized>(store: &S, namespace: &str) -> Result<Self> {
        let prefix = format!("{namespace}.");
        let mut cache = Self::new();
        for kind in [ObjectKind::Device, ObjectKind::State] {
            let records = store.query_objects(&prefix, kind).await?;
            tracing::debug!(?kind, count = records.len(), "seeding object cache");
            cache.seed(records);
        }
        Ok(cache)
    }

    /// Inserts records under their own ids.
    pub fn seed(&mut self, records: impl IntoIterator<Item = ObjectRecord>) {
        for record in records {
            self.records.insert(record.id().to_string(), record);
        }
    }

    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ObjectRecord> {
        self.records.get(id)
    }

    /// Inserts or replaces a record.
    pub fn put(&mut self, id: impl Into<String>, record: ObjectRecord) {
        self.records.insert(id.into(), record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{DeviceCommon, DeviceRecord, StateCommon, StateRecord};

    #[tokio::test]
    async fn test_load_seeds_namespace_only() {
        let store = MemoryStore::with_objects([
            ObjectRecord::from(DeviceRecord {
                id: "cul.0.FS20.123401".into(),
                common: DeviceCommon::default(),
                native: json!({"protocol": "FS20"}),
            }),
            ObjectRecord::from(StateRecord {
                id: "cul.0.FS20.123401.cmd".into(),
                common: StateCommon::default(),
                native: json!({}),
            }),
            ObjectRecord::from(DeviceRecord {
                id: "cul.10.FS20.000000".into(),
                common: DeviceCommon::default(),
                native: json!({}),
            }),
        ]);

        let cache = ObjectCache::load(&store, "cul.0").await.unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.has("cul.0.FS20.123401"));
        assert!(cache.has("cul.0.FS20.123401.cmd"));
        assert!(!cache.has("cul.10.FS20.000000"));
        assert_eq!(
            cache.get("cul.0.FS20.123401").map(ObjectRecord::kind),
            Some(ObjectKind::Device)
        );
    }

    #[test]
    fn test_put_replaces() {
        let mut cache = ObjectCache::new();
        let record = ObjectRecord::from(DeviceRecord {
            id: "cul.0.NS_WC.E5".into(),
            common: DeviceCommon::default(),
            native: json!({"rssi": -70}),
        });
        cache.put("cul.0.NS_WC.E5", record.clone());

        let mut updated = record;
        updated.set_native(json!({"rssi": -60}));
        cache.put("cul.0.NS_WC.E5", updated);

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("cul.0.NS_WC.E5").map(ObjectRecord::native),
            Some(&json!({"rssi": -60}))
        );
    }
}
