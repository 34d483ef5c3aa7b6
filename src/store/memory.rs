use crate::core::store::{Document, DocumentStore};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory document store, used for tests and `memory:` URIs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        let store = self.inner.lock().await;
        let docs: Vec<Document> = store
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default();
        debug!(collection, count = docs.len(), "Memory FIND ALL");
        Ok(docs)
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let store = self.inner.lock().await;
        Ok(store.get(collection).and_then(|c| c.get(key)).cloned())
    }

    async fn insert_many(&self, collection: &str, docs: Vec<(String, Document)>) -> Result<usize> {
        let mut store = self.inner.lock().await;
        let target = store.entry(collection.to_string()).or_default();
        let count = docs.len();
        target.extend(docs);
        debug!(collection, count, "Memory INSERT MANY");
        Ok(count)
    }

    async fn insert_if_absent(&self, collection: &str, key: &str, doc: Document) -> Result<bool> {
        let mut store = self.inner.lock().await;
        let target = store.entry(collection.to_string()).or_default();
        if target.contains_key(key) {
            debug!(collection, key, "Memory SKIP existing");
            return Ok(false);
        }
        target.insert(key.to_string(), doc);
        debug!(collection, key, "Memory INSERT");
        Ok(true)
    }

    async fn upsert(&self, collection: &str, key: &str, doc: Document) -> Result<()> {
        let mut store = self.inner.lock().await;
        store
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), doc);
        debug!(collection, key, "Memory UPSERT");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_memory_store_insert_if_absent() {
        let store = MemoryStore::new();

        // Initially, the collection is empty
        assert!(store.find_all("prices").await.unwrap().is_empty());

        let first = doc(json!({"date": "2024-01-01", "value": "70.5"}));
        assert!(store.insert_if_absent("prices", "k1", first.clone()).await.unwrap());
        assert!(!store.insert_if_absent("prices", "k1", first).await.unwrap());

        let docs = store.find_all("prices").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["value"], "70.5");
    }

    #[tokio::test]
    async fn test_memory_store_upsert_replaces() {
        let store = MemoryStore::new();

        store
            .upsert("forex", "EUR", doc(json!({"device": "EUR", "exchange_rate": "1.1"})))
            .await
            .unwrap();
        store
            .upsert("forex", "EUR", doc(json!({"device": "EUR", "exchange_rate": "1.2"})))
            .await
            .unwrap();

        let docs = store.find_all("forex").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["exchange_rate"], "1.2");

        let stored = store.get("forex", "EUR").await.unwrap().unwrap();
        assert_eq!(stored["exchange_rate"], "1.2");
        assert!(store.get("forex", "CAD").await.unwrap().is_none());
        assert!(store.get("weather", "EUR").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_collections_are_separate() {
        let store = MemoryStore::new();

        let written = store
            .insert_many(
                "weather",
                vec![
                    ("b".to_string(), doc(json!({"region": "West"}))),
                    ("a".to_string(), doc(json!({"region": "Midwest"}))),
                ],
            )
            .await
            .unwrap();
        assert_eq!(written, 2);

        let docs = store.find_all("weather").await.unwrap();
        assert_eq!(docs[0]["region"], "Midwest");
        assert!(store.find_all("prices").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_latest_per_group() {
        let store = MemoryStore::new();
        for (key, device, refreshed) in [
            ("1", "EUR", "2024-01-01 10:00:00"),
            ("2", "EUR", "2024-01-03 10:00:00"),
            ("3", "CAD", "2024-01-02 10:00:00"),
        ] {
            store
                .upsert(
                    "forex",
                    key,
                    doc(json!({"device": device, "last_refreshed": refreshed})),
                )
                .await
                .unwrap();
        }

        let latest = store
            .latest_per_group("forex", "device", "last_refreshed")
            .await
            .unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[1]["last_refreshed"], "2024-01-03 10:00:00");
    }
}
