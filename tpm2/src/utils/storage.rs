//! Storage backends that resolve a recording path to a [`ByteSource`].
//!
//! Backends are tried in the order they were registered. Removable storage is
//! expected to be registered before built-in storage, so a card inserted with
//! a newer copy of a recording wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use log::{debug, info};

use crate::utils::byte_source::{ByteSource, FileSource, SliceSource};
use crate::utils::errors::StorageError;

pub trait Storage {
    /// Short name used in log lines and error messages.
    fn name(&self) -> &str;

    fn exists(&self, path: &str) -> bool;

    fn open(&self, path: &str) -> Result<Box<dyn ByteSource>>;
}

/// A directory on the local filesystem acting as a storage device.
///
/// Recording paths are interpreted relative to the root, a leading `/` is
/// ignored.
#[derive(Debug, Clone)]
pub struct DirStorage {
    name: String,
    root: PathBuf,
    enabled: bool,
}

impl DirStorage {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Storage for DirStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &str) -> bool {
        self.enabled && self.resolve(path).is_file()
    }

    fn open(&self, path: &str) -> Result<Box<dyn ByteSource>> {
        let full = self.resolve(path);
        let source = FileSource::open(&full).map_err(|e| StorageError::Open {
            backend: self.name.clone(),
            path: path.to_string(),
            source: e,
        })?;
        Ok(Box::new(source))
    }
}

/// Recordings held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    name: String,
    files: HashMap<String, Arc<[u8]>>,
}

impl MemoryStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: HashMap::new(),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Arc<[u8]>>) {
        self.files.insert(path.into(), data.into());
    }
}

impl Storage for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn open(&self, path: &str) -> Result<Box<dyn ByteSource>> {
        let Some(data) = self.files.get(path) else {
            anyhow::bail!(StorageError::NotFound {
                path: path.to_string(),
                backends: self.name.clone(),
            });
        };
        Ok(Box::new(SliceSource::new(Arc::clone(data))))
    }
}

/// Ranked list of storage backends; the first one that has the file wins.
#[derive(Default)]
pub struct StorageChain {
    backends: Vec<Box<dyn Storage>>,
}

impl StorageChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: impl Storage + 'static) -> Self {
        self.push(backend);
        self
    }

    pub fn push(&mut self, backend: impl Storage + 'static) {
        self.backends.push(Box::new(backend));
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Comma separated backend names in resolution order.
    pub fn describe(&self) -> String {
        self.backends
            .iter()
            .map(|b| b.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Opens `path` on the first backend reporting that it exists.
    pub fn open(&self, path: &str) -> Result<Box<dyn ByteSource>> {
        for backend in &self.backends {
            if !backend.exists(path) {
                debug!("{path} not on {}", backend.name());
                continue;
            }

            info!("Reading {path} from {}", backend.name());
            return backend.open(path);
        }

        Err(StorageError::NotFound {
            path: path.to_string(),
            backends: self.describe(),
        }
        .into())
    }
}
