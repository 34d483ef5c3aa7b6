//! Document store abstraction shared by ingestion and the dashboard.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A JSON object as held by the store.
pub type Document = Map<String, Value>;

const KEY_SEPARATOR: char = '\u{1f}';

/// Builds a store key from the JSON representation of each part.
///
/// Using the JSON text keeps `"70.5"` and `70.5` distinct, matching how the
/// feeds deliver them.
pub fn document_key(parts: &[&Value]) -> String {
    parts
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(&KEY_SEPARATOR.to_string())
}

/// Named collections of JSON documents addressed by string keys.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns every document of a collection, in key order.
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>>;

    /// Returns the document stored under `key`, if any.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>>;

    /// Writes all documents, replacing any existing ones with the same key.
    /// Returns the number of documents written.
    async fn insert_many(&self, collection: &str, docs: Vec<(String, Document)>) -> Result<usize>;

    /// Inserts the document unless the key already exists.
    /// Returns `true` when it was inserted.
    async fn insert_if_absent(&self, collection: &str, key: &str, doc: Document) -> Result<bool>;

    /// Inserts or replaces the document stored under `key`.
    async fn upsert(&self, collection: &str, key: &str, doc: Document) -> Result<()>;

    /// Makes previous writes durable. Stores without durability do nothing.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Returns, for every distinct value of `group_field`, the document with
    /// the greatest `sort_field`. Groups come back ordered by group value.
    async fn latest_per_group(
        &self,
        collection: &str,
        group_field: &str,
        sort_field: &str,
    ) -> Result<Vec<Document>> {
        let docs = self.find_all(collection).await?;
        Ok(latest_by_group(docs, group_field, sort_field))
    }
}

fn field_text(doc: &Document, field: &str) -> Option<String> {
    match doc.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Keeps the document with the greatest `sort_field` per `group_field`.
/// Documents missing the group field are ignored.
pub(crate) fn latest_by_group(
    docs: Vec<Document>,
    group_field: &str,
    sort_field: &str,
) -> Vec<Document> {
    let mut latest: BTreeMap<String, (Option<String>, Document)> = BTreeMap::new();
    for doc in docs {
        let Some(group) = field_text(&doc, group_field) else {
            continue;
        };
        let sort_key = field_text(&doc, sort_field);
        match latest.get(&group) {
            Some((current, _)) if *current >= sort_key => {}
            _ => {
                latest.insert(group, (sort_key, doc));
            }
        }
    }
    latest.into_values().map(|(_, doc)| doc).collect()
}
