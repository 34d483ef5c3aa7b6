pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::store::DocumentStore;
use anyhow::{Result, bail};
use disk::FjallStore;
use memory::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where a store URI points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    Disk(PathBuf),
}

impl StoreLocation {
    /// Accepts `memory:`, `fjall://<path>`, `file://<path>` or a bare path.
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri == "memory:" || uri == "memory://" {
            return Ok(StoreLocation::Memory);
        }

        let path = uri
            .strip_prefix("fjall://")
            .or_else(|| uri.strip_prefix("file://"))
            .unwrap_or(uri);
        if path.is_empty() {
            bail!("Store URI '{uri}' has no path");
        }
        if path.contains("://") {
            bail!("Unsupported store URI scheme in '{uri}'");
        }
        Ok(StoreLocation::Disk(PathBuf::from(path)))
    }

    /// Whether data written here outlives the process.
    pub fn is_persistent(&self) -> bool {
        matches!(self, StoreLocation::Disk(_))
    }
}

/// A notice for store URIs whose data is lost when the process exits.
/// `None` for persistent stores and for URIs that do not parse.
pub fn ephemeral_store_notice(config: &AppConfig) -> Option<String> {
    let location = StoreLocation::parse(&config.store_uri).ok()?;
    (!location.is_persistent()).then(|| {
        format!(
            "Store URI '{}' keeps data in memory only; nothing is saved for later runs",
            config.store_uri.trim()
        )
    })
}

/// Opens the store named by the configuration. Disk stores keep each
/// database in its own directory under the URI path.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    match StoreLocation::parse(&config.store_uri)? {
        StoreLocation::Memory => {
            debug!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreLocation::Disk(root) => {
            let path = root.join(&config.db_name);
            debug!("Using fjall store at {}", path.display());
            Ok(Arc::new(FjallStore::open(&path)?))
        }
    }
}
