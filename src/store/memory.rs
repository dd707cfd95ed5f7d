use std::{collections::{HashMap, HashSet}, path::{Path, PathBuf}, sync::Mutex};

use crate::{Error, Result};

use super::{Layer, VectorStore};

/// A store that keeps datasets in memory, keyed by path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    layers: Mutex<HashMap<PathBuf, Layer>>,
    read_only: Mutex<HashSet<PathBuf>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Seed (or replace) a dataset.
    pub fn insert(&self, path: impl Into<PathBuf>, layer: Layer) {
        self.lock().insert(path.into(), layer);
    }

    /// Snapshot of the dataset at `path`, if any.
    pub fn get(&self, path: &Path) -> Option<Layer> {
        self.lock().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    /// Make subsequent writes to `path` fail, as a read-only file would.
    pub fn set_read_only(&self, path: impl Into<PathBuf>) {
        self.read_only.lock().unwrap_or_else(|e| e.into_inner()).insert(path.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Layer>> {
        self.layers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl VectorStore for MemoryStore {
    fn open_layer(&self, path: &Path) -> Result<Layer> {
        self.get(path).ok_or_else(|| Error::DatasetOpen {
            path: path.to_path_buf(),
            reason: "no such dataset".to_string(),
        })
    }

    fn write_layer(&self, path: &Path, layer: &Layer) -> Result<()> {
        if self.read_only.lock().unwrap_or_else(|e| e.into_inner()).contains(path) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("{} is read-only", path.display()),
            )));
        }
        self.insert(path, layer.clone());
        Ok(())
    }
}
