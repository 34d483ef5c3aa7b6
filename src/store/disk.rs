use crate::core::store::{Document, DocumentStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

/// Document store on a fjall keyspace, one partition per collection.
///
/// Documents are stored as JSON under their string key.
pub struct FjallStore {
    keyspace: Keyspace,
    partitions: RwLock<HashMap<String, PartitionHandle>>,
}

impl FjallStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create store directory: {}", path.display()))?;

        let keyspace = Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        debug!("Opened fjall keyspace at {}", path.display());

        Ok(Self {
            keyspace,
            partitions: RwLock::new(HashMap::new()),
        })
    }

    fn partition(&self, name: &str) -> Result<PartitionHandle> {
        if let Some(partition) = self
            .partitions
            .read()
            .map_err(|_| anyhow::anyhow!("Partition registry lock poisoned"))?
            .get(name)
        {
            return Ok(partition.clone());
        }

        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| anyhow::anyhow!("Partition registry lock poisoned"))?;
        if let Some(partition) = partitions.get(name) {
            return Ok(partition.clone());
        }
        let partition = self
            .keyspace
            .open_partition(name, PartitionCreateOptions::default())
            .with_context(|| format!("Failed to open collection '{name}'"))?;
        partitions.insert(name.to_string(), partition.clone());
        Ok(partition)
    }
}

#[async_trait]
impl DocumentStore for FjallStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        let partition = self.partition(collection)?;
        let mut docs = Vec::new();
        for item in partition.iter() {
            let (key, value) = item?;
            match serde_json::from_slice::<Document>(&value) {
                Ok(doc) => docs.push(doc),
                Err(e) => debug!(
                    collection,
                    key = %String::from_utf8_lossy(&key),
                    "Skipping undecodable document: {e}"
                ),
            }
        }
        debug!(collection, count = docs.len(), "Fjall FIND ALL");
        Ok(docs)
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let partition = self.partition(collection)?;
        let Some(value) = partition.get(key.as_bytes())? else {
            return Ok(None);
        };
        let doc = serde_json::from_slice::<Document>(&value)
            .with_context(|| format!("Failed to decode '{key}' in '{collection}'"))?;
        Ok(Some(doc))
    }

    async fn insert_many(&self, collection: &str, docs: Vec<(String, Document)>) -> Result<usize> {
        let partition = self.partition(collection)?;
        let mut batch = self.keyspace.batch();
        let count = docs.len();
        for (key, doc) in docs {
            batch.insert(&partition, key.as_bytes(), serde_json::to_vec(&doc)?);
        }
        batch
            .commit()
            .with_context(|| format!("Failed to write batch to '{collection}'"))?;
        debug!(collection, count, "Fjall INSERT MANY");
        Ok(count)
    }

    async fn insert_if_absent(&self, collection: &str, key: &str, doc: Document) -> Result<bool> {
        let partition = self.partition(collection)?;
        if partition.contains_key(key.as_bytes())? {
            debug!(collection, key, "Fjall SKIP existing");
            return Ok(false);
        }
        partition.insert(key.as_bytes(), serde_json::to_vec(&doc)?)?;
        debug!(collection, key, "Fjall INSERT");
        Ok(true)
    }

    async fn upsert(&self, collection: &str, key: &str, doc: Document) -> Result<()> {
        let partition = self.partition(collection)?;
        partition.insert(key.as_bytes(), serde_json::to_vec(&doc)?)?;
        debug!(collection, key, "Fjall UPSERT");
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist store")?;
        Ok(())
    }
}
