//! In-memory document store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use crate::domain::document::{self, Document};
use crate::domain::ports::{DocStore, StoreError};
use crate::domain::timestamp;

/// Process-local document store keyed by collection and primary key.
///
/// `Utc::now()` plays the role of the store's server-assigned clock:
/// `set` stamps `created_at` and `updated_at` unless the caller supplied
/// them, `update` stamps `updated_at` likewise.
#[derive(Default)]
pub struct MemoryDocStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryDocStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection; test and diagnostics helper.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// `true` when the collection holds no documents.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocStore for MemoryDocStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        mut record: Document,
    ) -> Result<Document, StoreError> {
        let now = timestamp::to_value(Utc::now());
        record
            .entry("created_at".to_string())
            .or_insert_with(|| now.clone());
        record.entry("updated_at".to_string()).or_insert(now);
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        mut patch: Document,
    ) -> Result<Document, StoreError> {
        patch
            .entry("updated_at".to_string())
            .or_insert_with(|| timestamp::to_value(Utc::now()));
        let mut collections = self.collections.write();
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or(StoreError::NotFound)?;
        for (key, value) in patch {
            existing.insert(key, value);
        }
        Ok(existing.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        if let Some(docs) = self.collections.write().get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn where_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| document::value_equals(doc.get(field), Some(value)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }
}
