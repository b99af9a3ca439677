//! Stylesheet source loaders

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use crate::error::{LoadError, LoadResult};

/// Source of imported stylesheets
#[async_trait]
pub trait Loader: Send + Sync {
    /// Load the source text stored at `path`
    async fn load(&self, path: &str) -> LoadResult<String>;
}

/// Loads stylesheets from the filesystem
pub struct FileLoader {
    root: PathBuf,
    /// Simple in-memory cache (path -> source)
    cache: Mutex<FxHashMap<String, String>>,
}

impl FileLoader {
    /// Create a loader resolving paths against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    /// Create a loader resolving paths against the working directory
    pub fn current_dir() -> LoadResult<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// Clear the cache
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}

#[async_trait]
impl Loader for FileLoader {
    async fn load(&self, path: &str) -> LoadResult<String> {
        if path.contains("://") {
            return Err(LoadError::Unsupported(path.to_string()));
        }

        // Check cache first
        if let Some(source) = self.cache.lock().await.get(path) {
            log::debug!("Cache hit: {}", path);
            return Ok(source.clone());
        }

        let full_path = self.root.join(path);
        let source = match tokio::fs::read_to_string(&full_path).await {
            Ok(source) => source,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(LoadError::NotFound(path.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        log::debug!("Loaded {}", full_path.display());

        self.cache
            .lock()
            .await
            .insert(path.to_string(), source.clone());
        Ok(source)
    }
}

/// Serves stylesheets from a fixed in-memory map
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: FxHashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, builder style
    pub fn with(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.files.insert(path.into(), source.into());
    }
}

#[async_trait]
impl Loader for MemoryLoader {
    async fn load(&self, path: &str) -> LoadResult<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }
}
