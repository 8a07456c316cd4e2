//! Persistence is a named-JSON-document abstraction: the ledger, auth and
//! journal read and write whole documents and never touch the disk format
//! directly.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(String),

    #[error("store document corrupt: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the document has never been written.
    async fn read(&self, name: &str) -> Result<Option<Value>>;
    async fn write(&self, name: &str, value: &Value) -> Result<()>;
}

/// One pretty-printed JSON file per document under a root directory.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn read(&self, name: &str) -> Result<Option<Value>> {
        let path = self.path_for(name);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(format!("read {}: {e}", path.display()))),
        };
        let value = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Corrupt(format!("parse {}: {e}", path.display())))?;
        Ok(Some(value))
    }

    async fn write(&self, name: &str, value: &Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::Io(format!("create {}: {e}", self.root.display())))?;
        let path = self.path_for(name);
        let contents = serde_json::to_string_pretty(value)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| StoreError::Io(format!("write {}: {e}", path.display())))?;
        Ok(())
    }
}

/// In-memory store for tests; can be switched into an unavailable state to
/// exercise persistence-failure reporting.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, Value>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, name: &str) -> Result<Option<Value>> {
        self.check_available()?;
        Ok(self.docs.lock().await.get(name).cloned())
    }

    async fn write(&self, name: &str, value: &Value) -> Result<()> {
        self.check_available()?;
        self.docs.lock().await.insert(name.to_string(), value.clone());
        Ok(())
    }
}
