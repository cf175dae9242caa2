//! Shared store handles
//!
//! The runtime layer and run file belong to the process, so hosts normally
//! want one store per configuration root. [`StoreManager`] hands out the
//! same handle for repeated opens of a root.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::constants::resolve_root;
use crate::store::{EtcStore, StoreOptions};

pub type SharedStore = Arc<Mutex<EtcStore>>;

#[derive(Debug, Default)]
pub struct StoreManager {
    stores: HashMap<PathBuf, SharedStore>,
}

impl StoreManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store for `root` (or `XCRAFT_ROOT`), opened on first request.
    pub fn open(&mut self, root: Option<&Path>) -> Option<SharedStore> {
        self.open_with(root, StoreOptions::default)
    }

    /// Like [`StoreManager::open`]; `options` is only consulted when the
    /// store is opened for the first time.
    pub fn open_with<F>(&mut self, root: Option<&Path>, options: F) -> Option<SharedStore>
    where
        F: FnOnce() -> StoreOptions,
    {
        let root = resolve_root(root)?;
        let key = fs::canonicalize(&root).unwrap_or_else(|_| root.clone());

        let store = self
            .stores
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(EtcStore::open_with(&root, options()))));
        Some(Arc::clone(store))
    }

    /// Forget the handle for a root. The store itself lives on until its
    /// last handle is dropped.
    pub fn release(&mut self, root: &Path) -> Option<SharedStore> {
        let key = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        self.stores.remove(&key)
    }
}
