//! Reviewable change ledger: pending/accepted/rejected records with
//! monotonic `change_NNN` ids. The ledger is the sole mutator of status and
//! timestamp fields; producers only supply `data` at creation.

use crate::store::{DocumentStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

const CHANGES_DOC: &str = "changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: String,
    pub data: Value,
    pub status: ChangeStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

pub struct ChangeLedger {
    store: Arc<dyn DocumentStore>,
    // Serializes the read-modify-write cycle within this process.
    lock: Mutex<()>,
}

impl ChangeLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Creates a pending record and returns its id. Ids come from the
    /// maximum existing numeric suffix + 1 and are never reused, even when
    /// earlier records disappear.
    pub async fn create(&self, data: Value) -> Result<String, StoreError> {
        let _guard = self.lock.lock().await;
        let mut changes = self.load().await?;
        let id = next_change_id(&changes);
        changes.insert(
            id.clone(),
            ChangeRecord {
                id: id.clone(),
                data,
                status: ChangeStatus::Pending,
                timestamp: Utc::now(),
                accepted_at: None,
                rejected_at: None,
            },
        );
        self.save(&changes).await?;
        tracing::info!(%id, "change recorded");
        Ok(id)
    }

    pub async fn accept(&self, id: &str) -> (bool, String) {
        self.transition(id, ChangeStatus::Accepted).await
    }

    pub async fn reject(&self, id: &str) -> (bool, String) {
        self.transition(id, ChangeStatus::Rejected).await
    }

    // Overwrites status and timestamp even when the record is already
    // terminal, matching the store's historical behavior; see DESIGN.md.
    async fn transition(&self, id: &str, status: ChangeStatus) -> (bool, String) {
        let _guard = self.lock.lock().await;
        let mut changes = match self.load().await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(%e, %id, "change store unreadable");
                return (false, "change store unavailable".to_string());
            }
        };
        let Some(record) = changes.get_mut(id) else {
            return (false, format!("change {id} not found"));
        };
        record.status = status;
        match status {
            ChangeStatus::Accepted => record.accepted_at = Some(Utc::now()),
            ChangeStatus::Rejected => record.rejected_at = Some(Utc::now()),
            ChangeStatus::Pending => {}
        }
        if let Err(e) = self.save(&changes).await {
            tracing::error!(%e, %id, "change store unwritable");
            return (false, "change store unavailable".to_string());
        }
        let verb = status.as_str();
        tracing::info!(%id, %verb, "change reviewed");
        (true, format!("change {id} {verb}"))
    }

    pub async fn list(&self) -> Vec<ChangeRecord> {
        match self.load().await {
            Ok(changes) => changes.into_values().collect(),
            Err(e) => {
                tracing::error!(%e, "change store unreadable; listing nothing");
                Vec::new()
            }
        }
    }

    pub async fn list_pending(&self) -> Vec<ChangeRecord> {
        let mut records = self.list().await;
        records.retain(|record| record.status == ChangeStatus::Pending);
        records
    }

    pub async fn list_accepted(&self) -> Vec<ChangeRecord> {
        let mut records = self.list().await;
        records.retain(|record| record.status == ChangeStatus::Accepted);
        records
    }

    async fn load(&self) -> Result<BTreeMap<String, ChangeRecord>, StoreError> {
        let Some(value) = self.store.read(CHANGES_DOC).await? else {
            return Ok(BTreeMap::new());
        };
        serde_json::from_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn save(&self, changes: &BTreeMap<String, ChangeRecord>) -> Result<(), StoreError> {
        let value = serde_json::to_value(changes).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.store.write(CHANGES_DOC, &value).await
    }
}

fn next_change_id(changes: &BTreeMap<String, ChangeRecord>) -> String {
    let max = changes
        .keys()
        .filter_map(|id| id.strip_prefix("change_"))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("change_{:03}", max + 1)
}
