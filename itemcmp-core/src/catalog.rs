//! Item catalog lookup.
//!
//! The catalog is held as an immutable [`CatalogSnapshot`] behind an
//! `ArcSwap`. Readers load the current snapshot without locking; a reload
//! builds a fresh snapshot and publishes it in a single atomic store, so an
//! in-flight lookup always sees one complete catalog.

use crate::error::CatalogError;
use crate::types::Item;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a lookup by ids. Both lists follow the requested order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogLookupResult {
    pub found: Vec<Item>,
    pub missing: Vec<String>,
}

/// Lookup-by-id capability consumed by the comparison engine.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Resolve `ids`, splitting them into found items and missing ids.
    async fn get_by_ids(&self, ids: &[String]) -> CatalogLookupResult;

    /// Number of items in the catalog.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An immutable id → item index.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    items: HashMap<String, Item>,
}

impl CatalogSnapshot {
    /// Build a snapshot from scratch. Later duplicates replace earlier ones.
    pub fn build(items: Vec<Item>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(items.len());
        for item in items {
            if item.price.is_nan() || item.price < 0.0 {
                return Err(CatalogError::InvalidItem {
                    id: item.id,
                    reason: "price must be a non-negative number".into(),
                });
            }
            if item.id.is_empty() {
                return Err(CatalogError::InvalidItem {
                    id: item.id,
                    reason: "id must not be empty".into(),
                });
            }
            if let Some(previous) = index.insert(item.id.clone(), item) {
                warn!(id = %previous.id, "duplicate catalog id, keeping last definition");
            }
        }
        Ok(Self { items: index })
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn lookup(&self, ids: &[String]) -> CatalogLookupResult {
        let mut result = CatalogLookupResult {
            found: Vec::with_capacity(ids.len()),
            missing: Vec::new(),
        };
        for id in ids {
            match self.items.get(id) {
                Some(item) => result.found.push(item.clone()),
                None => result.missing.push(id.clone()),
            }
        }
        result
    }
}

/// Catalog backed by a JSON file holding an array of items.
pub struct FileCatalog {
    path: Option<PathBuf>,
    snapshot: ArcSwap<CatalogSnapshot>,
}

impl std::fmt::Debug for FileCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCatalog")
            .field("path", &self.path)
            .field("items", &self.snapshot.load().len())
            .finish()
    }
}

impl FileCatalog {
    /// Load the catalog from `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let snapshot = read_snapshot(&path)?;
        info!(file = %path.display(), items = snapshot.len(), "catalog loaded");
        Ok(Self {
            path: Some(path),
            snapshot: ArcSwap::from_pointee(snapshot),
        })
    }

    /// Build an in-memory catalog with no backing file.
    pub fn from_items(items: Vec<Item>) -> Result<Self, CatalogError> {
        Ok(Self {
            path: None,
            snapshot: ArcSwap::from_pointee(CatalogSnapshot::build(items)?),
        })
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.load_full()
    }

    /// Replace the catalog contents with `items`.
    pub fn publish(&self, items: Vec<Item>) -> Result<(), CatalogError> {
        let snapshot = CatalogSnapshot::build(items)?;
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }

    /// Re-read the backing file and publish it. On failure the previous
    /// snapshot stays in place. Returns the new item count.
    pub fn reload(&self) -> Result<usize, CatalogError> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot.load().len());
        };
        let snapshot = read_snapshot(path)?;
        let count = snapshot.len();
        self.snapshot.store(Arc::new(snapshot));
        info!(file = %path.display(), items = count, "catalog reloaded");
        Ok(count)
    }
}

fn read_snapshot(path: &Path) -> Result<CatalogSnapshot, CatalogError> {
    let data = std::fs::read(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let items: Vec<Item> = serde_json::from_slice(&data).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    CatalogSnapshot::build(items)
}

#[async_trait]
impl CatalogLookup for FileCatalog {
    async fn get_by_ids(&self, ids: &[String]) -> CatalogLookupResult {
        self.snapshot.load().lookup(ids)
    }

    fn len(&self) -> usize {
        self.snapshot.load().len()
    }
}
