//! Typed config tables with atomically swappable snapshots.
//!
//! Readers always see one fully-decoded snapshot: the current `Arc` is
//! cloned under a read lock and the store replaces it wholesale on
//! publish, never mutating a live collection.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::Result;

/// Type-erased staged snapshot, produced by `decode` and consumed by
/// `publish` once every table of the store decoded successfully.
pub type Staged = Box<dyn Any + Send>;

/// One registered table: decode into a staged snapshot, publish it later.
/// Decoding must not touch the live snapshot.
pub trait StoreTable: Send + Sync {
    fn decode(&self, file: &str, bytes: &[u8]) -> Result<Staged>;
    fn publish(&self, staged: Staged);
}

fn read_snapshot<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(|e| e.into_inner()).clone()
}

fn write_snapshot<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(|e| e.into_inner()) = value;
}

/// Keyed table: a JSON object decoded into a map snapshot.
pub struct MapTable<K, E> {
    snapshot: RwLock<Arc<HashMap<K, Arc<E>>>>,
}

impl<K, E> Default for MapTable<K, E> {
    fn default() -> Self {
        MapTable {
            snapshot: RwLock::new(Arc::new(HashMap::new())),
        }
    }
}

impl<K, E> MapTable<K, E>
where
    K: Eq + Hash,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, key: &K) -> Option<Arc<E>> {
        read_snapshot(&self.snapshot).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        read_snapshot(&self.snapshot).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every entry of the current snapshot. Returning `false` stops
    /// the walk.
    pub fn for_each<F: FnMut(&K, &E) -> bool>(&self, mut f: F) {
        let snap = read_snapshot(&self.snapshot);
        for (key, value) in snap.iter() {
            if !f(key, value) {
                return;
            }
        }
    }
}

impl<K, E> StoreTable for MapTable<K, E>
where
    K: Eq + Hash + DeserializeOwned + Send + Sync + 'static,
    E: DeserializeOwned + Send + Sync + 'static,
{
    fn decode(&self, file: &str, bytes: &[u8]) -> Result<Staged> {
        let decoded: HashMap<K, E> =
            serde_json::from_slice(bytes).map_err(|source| crate::error::StoreError::Decode {
                file: file.to_string(),
                source,
            })?;
        let snapshot: HashMap<K, Arc<E>> =
            decoded.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        Ok(Box::new(snapshot))
    }

    fn publish(&self, staged: Staged) {
        if let Ok(snapshot) = staged.downcast::<HashMap<K, Arc<E>>>() {
            write_snapshot(&self.snapshot, Arc::new(*snapshot));
        }
    }
}

/// Sequential table: a JSON array decoded into a vec snapshot.
pub struct ListTable<E> {
    snapshot: RwLock<Arc<Vec<Arc<E>>>>,
    /// Optional id extractor; when present, duplicate ids in a freshly
    /// decoded snapshot are reported as diagnostics.
    id_of: Option<fn(&E) -> i64>,
}

impl<E> Default for ListTable<E> {
    fn default() -> Self {
        ListTable {
            snapshot: RwLock::new(Arc::new(Vec::new())),
            id_of: None,
        }
    }
}

impl<E> ListTable<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_id(id_of: fn(&E) -> i64) -> Arc<Self> {
        Arc::new(ListTable {
            snapshot: RwLock::new(Arc::new(Vec::new())),
            id_of: Some(id_of),
        })
    }

    pub fn get(&self, index: usize) -> Option<Arc<E>> {
        read_snapshot(&self.snapshot).get(index).cloned()
    }

    pub fn len(&self) -> usize {
        read_snapshot(&self.snapshot).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn for_each<F: FnMut(&E) -> bool>(&self, mut f: F) {
        let snap = read_snapshot(&self.snapshot);
        for value in snap.iter() {
            if !f(value) {
                return;
            }
        }
    }
}

impl<E> StoreTable for ListTable<E>
where
    E: DeserializeOwned + Send + Sync + 'static,
{
    fn decode(&self, file: &str, bytes: &[u8]) -> Result<Staged> {
        let decoded: Vec<E> =
            serde_json::from_slice(bytes).map_err(|source| crate::error::StoreError::Decode {
                file: file.to_string(),
                source,
            })?;
        let snapshot: Vec<Arc<E>> = decoded.into_iter().map(Arc::new).collect();
        if let Some(id_of) = self.id_of {
            check_duplicate_ids(file, &snapshot, id_of);
        }
        Ok(Box::new(snapshot))
    }

    fn publish(&self, staged: Staged) {
        if let Ok(snapshot) = staged.downcast::<Vec<Arc<E>>>() {
            write_snapshot(&self.snapshot, Arc::new(*snapshot));
        }
    }
}

fn check_duplicate_ids<E>(file: &str, entries: &[Arc<E>], id_of: fn(&E) -> i64) {
    let mut seen = HashMap::with_capacity(entries.len());
    for entry in entries {
        let id = id_of(entry);
        if seen.insert(id, ()).is_some() {
            warn!(file, id, "duplicate id in list table");
        }
    }
}
