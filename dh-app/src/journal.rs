//! Append-only journal of submitted task text, kept for later review.

use crate::store::{DocumentStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

const TASKS_DOC: &str = "tasks";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub user_id: String,
    pub task: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

pub struct TaskJournal {
    store: Arc<dyn DocumentStore>,
    lock: Mutex<()>,
}

impl TaskJournal {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub async fn record(&self, user_id: &str, task: &str) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let id = entries.keys().max().copied().unwrap_or(0) + 1;
        entries.insert(
            id,
            TaskEntry {
                user_id: user_id.to_string(),
                task: task.to_string(),
                status: "pending".to_string(),
                timestamp: Utc::now(),
            },
        );
        let value =
            serde_json::to_value(&entries).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.store.write(TASKS_DOC, &value).await?;
        Ok(id)
    }

    pub async fn len(&self) -> usize {
        self.load().await.map(|entries| entries.len()).unwrap_or(0)
    }

    async fn load(&self) -> Result<BTreeMap<u64, TaskEntry>, StoreError> {
        let Some(value) = self.store.read(TASKS_DOC).await? else {
            return Ok(BTreeMap::new());
        };
        // Keys are stringified in JSON; parse them back.
        let raw: BTreeMap<String, TaskEntry> =
            serde_json::from_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(raw
            .into_iter()
            .filter_map(|(k, v)| k.parse().ok().map(|k: u64| (k, v)))
            .collect())
    }
}
