//!
//! timecard storage module
//! -----------------------
//! This module implements the on-disk document store for timecard using a flat
//! directory layout: one JSON snapshot file per named collection under the
//! configured root folder (`<root>/<collection>.json`). Each collection is an
//! in-memory map from document id to a JSON document, guarded by a
//! `parking_lot::RwLock` and persisted atomically (write to `.tmp`, then
//! rename) after every mutation.
//!
//! Key responsibilities:
//! - Exact-key reads and full scans with caller-supplied predicates.
//! - Atomic single-document upsert/insert/remove under the collection lock.
//! - Snapshot persistence that survives process restart.
//!
//! The public API centers around the `Store` type, which is usually wrapped in
//! the cheaply-clonable `SharedStore` handle elsewhere in the codebase.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

/// Failures surfaced by the storage layer.
///
/// Callers above the storage boundary treat every variant as an opaque
/// collaborator failure; the variants exist so logs can tell IO problems
/// apart from snapshot corruption.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt snapshot {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot encode failure for {collection}: {source}")]
    Encode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A single named document collection.
///
/// Documents are arbitrary JSON objects keyed by a caller-chosen id string.
/// All mutations persist the full collection snapshot before returning, so a
/// successful call means the change is on disk.
#[derive(Clone)]
pub struct Collection {
    name: String,
    path: PathBuf,
    map: Arc<RwLock<HashMap<String, JsonValue>>>,
}

impl Collection {
    fn load(dir: &Path, name: &str) -> Result<Self, StoreError> {
        let path = dir.join(format!("{}.json", name));
        let mut map = HashMap::new();
        if path.exists() {
            let bytes = fs::read(&path)?;
            map = serde_json::from_slice::<HashMap<String, JsonValue>>(&bytes).map_err(|e| {
                StoreError::Corrupt { path: path.display().to_string(), source: e }
            })?;
            debug!(target: "timecard::storage", "loaded collection '{}' ({} documents)", name, map.len());
        }
        Ok(Self { name: name.to_string(), path, map: Arc::new(RwLock::new(map)) })
    }

    /// Fetch a document by exact id.
    pub fn get(&self, id: &str) -> Option<JsonValue> {
        self.map.read().get(id).cloned()
    }

    /// Insert a document only if the id is not already taken.
    /// Returns false (and leaves the collection untouched) when the id exists.
    pub fn insert_new(&self, id: &str, doc: JsonValue) -> Result<bool, StoreError> {
        let mut w = self.map.write();
        if w.contains_key(id) {
            return Ok(false);
        }
        w.insert(id.to_string(), doc);
        self.persist_locked(&w)?;
        Ok(true)
    }

    /// Insert or replace a document under the given id.
    pub fn upsert(&self, id: &str, doc: JsonValue) -> Result<(), StoreError> {
        let mut w = self.map.write();
        w.insert(id.to_string(), doc);
        self.persist_locked(&w)
    }

    /// Remove a document. Returns true if the id existed.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut w = self.map.write();
        if w.remove(id).is_none() {
            return Ok(false);
        }
        self.persist_locked(&w)?;
        Ok(true)
    }

    /// Scan all documents, returning clones of those matching the predicate.
    pub fn scan<F>(&self, mut pred: F) -> Vec<JsonValue>
    where
        F: FnMut(&JsonValue) -> bool,
    {
        self.map.read().values().filter(|d| pred(d)).cloned().collect()
    }

    /// Return every document in the collection. Iteration order is unspecified.
    pub fn all(&self) -> Vec<JsonValue> {
        self.map.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Persist the current contents to the snapshot path.
    pub fn flush(&self) -> Result<(), StoreError> {
        let r = self.map.read();
        self.persist_locked(&r)
    }

    // Write the snapshot under the caller-held lock so concurrent mutations
    // cannot interleave a stale snapshot after a newer one.
    fn persist_locked(&self, map: &HashMap<String, JsonValue>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(map).map_err(|e| StoreError::Encode {
            collection: self.name.clone(),
            source: e,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Core on-disk storage handle for a timecard data folder.
///
/// Store opens collections lazily by name and keeps them cached for the
/// lifetime of the process. It operates under a configured root folder that is
/// created on open if missing.
pub struct Store {
    root: PathBuf,
    collections: RwLock<HashMap<String, Collection>>,
}

impl Store {
    /// Open a Store rooted at the given filesystem path.
    /// The directory is created if it does not already exist.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(target: "timecard::storage", "store opened at '{}'", root.display());
        Ok(Self { root, collections: RwLock::new(HashMap::new()) })
    }

    /// Return the configured root folder for this Store.
    pub fn root_path(&self) -> &PathBuf {
        &self.root
    }

    /// Fetch a collection by name, loading its snapshot on first access.
    pub fn collection(&self, name: &str) -> Result<Collection, StoreError> {
        if let Some(c) = self.collections.read().get(name).cloned() {
            return Ok(c);
        }
        let c = Collection::load(&self.root, name)?;
        let mut w = self.collections.write();
        // Another thread may have loaded it while we were reading the snapshot.
        let entry = w.entry(name.to_string()).or_insert(c);
        Ok(entry.clone())
    }

    /// Persist every open collection. Called on shutdown.
    pub fn flush(&self) -> Result<(), StoreError> {
        for (name, c) in self.collections.read().iter() {
            debug!(target: "timecard::storage", "flushing collection '{}'", name);
            c.flush()?;
        }
        Ok(())
    }
}

/// Thread-safe, cheaply-clonable handle around `Store`.
#[derive(Clone)]
pub struct SharedStore(Arc<Store>);

impl SharedStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self(Arc::new(Store::open(root)?)))
    }

    pub fn root_path(&self) -> PathBuf {
        self.0.root_path().clone()
    }

    pub fn collection(&self, name: &str) -> Result<Collection, StoreError> {
        self.0.collection(name)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.0.flush()
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod storage_tests;
