//! Operator registration and login. Credential checking sits behind
//! [`CredentialVerifier`] so the compatibility shared-secret scheme can be
//! swapped out without touching the pipeline.

use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

const USERS_DOC: &str = "users";

pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, secret: &str) -> bool;
}

pub fn hash_secret(secret: &str) -> String {
    format!("{:x}", Sha256::digest(secret.as_bytes()))
}

/// Compatibility scheme: one shared secret grants registration for every
/// identity. Only the hash is kept in memory.
pub struct SharedSecretVerifier {
    secret_hash: String,
}

impl SharedSecretVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            secret_hash: hash_secret(secret),
        }
    }
}

impl CredentialVerifier for SharedSecretVerifier {
    fn verify(&self, secret: &str) -> bool {
        hash_secret(secret) == self.secret_hash
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub secret_hash: String,
    pub registered_at: DateTime<Utc>,
}

pub struct AuthManager {
    verifier: Arc<dyn CredentialVerifier>,
    store: Arc<dyn DocumentStore>,
    registered: DashMap<String, UserRecord>,
    authenticated: DashSet<String>,
}

impl AuthManager {
    /// Loads registered users from the store; an unreadable document logs
    /// and starts empty rather than refusing to come up.
    pub async fn load(
        verifier: Arc<dyn CredentialVerifier>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let registered = DashMap::new();
        match store.read(USERS_DOC).await {
            Ok(Some(value)) => {
                match serde_json::from_value::<BTreeMap<String, UserRecord>>(value) {
                    Ok(users) => {
                        for (user_id, record) in users {
                            registered.insert(user_id, record);
                        }
                    }
                    Err(e) => tracing::warn!(%e, "users document corrupt; starting empty"),
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(%e, "users document unreadable; starting empty"),
        }
        tracing::info!(registered = registered.len(), "auth manager loaded");
        Self {
            verifier,
            store,
            registered,
            authenticated: DashSet::new(),
        }
    }

    pub async fn register(&self, user_id: &str, username: &str, secret: &str) -> (bool, String) {
        if !self.verifier.verify(secret) {
            tracing::warn!(%user_id, "registration rejected: wrong secret");
            return (false, "wrong secret".to_string());
        }
        if self.registered.contains_key(user_id) {
            return (false, "you are already registered".to_string());
        }

        self.registered.insert(
            user_id.to_string(),
            UserRecord {
                user_id: user_id.to_string(),
                username: username.to_string(),
                secret_hash: hash_secret(secret),
                registered_at: Utc::now(),
            },
        );
        self.authenticated.insert(user_id.to_string());
        if let Err(e) = self.persist().await {
            tracing::error!(%e, %user_id, "failed to persist registered users");
        }
        tracing::info!(%user_id, %username, "user registered");
        (true, format!("registered as '{username}'"))
    }

    pub async fn login(&self, user_id: &str, secret: &str) -> (bool, String) {
        let Some(record) = self.registered.get(user_id) else {
            return (
                false,
                "you are not registered; use /register <secret>".to_string(),
            );
        };
        let username = record.username.clone();
        if self.authenticated.contains(user_id) {
            return (true, format!("already authenticated as '{username}'"));
        }
        if hash_secret(secret) != record.secret_hash {
            tracing::warn!(%user_id, "login rejected: wrong secret");
            return (false, "wrong secret".to_string());
        }
        drop(record);
        self.authenticated.insert(user_id.to_string());
        tracing::info!(%user_id, %username, "user authenticated");
        (true, format!("authenticated as '{username}'"))
    }

    pub fn logout(&self, user_id: &str) -> (bool, String) {
        if self.authenticated.remove(user_id).is_some() {
            tracing::info!(%user_id, "user logged out");
            (true, "logged out".to_string())
        } else {
            (false, "you are not authenticated".to_string())
        }
    }

    pub fn is_authenticated(&self, user_id: &str) -> bool {
        self.authenticated.contains(user_id)
    }

    pub fn username(&self, user_id: &str) -> Option<String> {
        self.registered
            .get(user_id)
            .map(|record| record.username.clone())
    }

    async fn persist(&self) -> Result<(), crate::store::StoreError> {
        let users: BTreeMap<String, UserRecord> = self
            .registered
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let value = serde_json::to_value(users)
            .map_err(|e| crate::store::StoreError::Corrupt(e.to_string()))?;
        self.store.write(USERS_DOC, &value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn manager(store: Arc<MemoryStore>) -> AuthManager {
        AuthManager::load(Arc::new(SharedSecretVerifier::new("sesame")), store).await
    }

    #[tokio::test]
    async fn register_needs_the_shared_secret() {
        let auth = manager(Arc::new(MemoryStore::new())).await;

        let (ok, message) = auth.register("7", "alex", "wrong").await;
        assert!(!ok);
        assert_eq!(message, "wrong secret");
        assert!(!auth.is_authenticated("7"));

        let (ok, _) = auth.register("7", "alex", "sesame").await;
        assert!(ok);
        assert!(auth.is_authenticated("7"));

        let (ok, message) = auth.register("7", "alex", "sesame").await;
        assert!(!ok);
        assert_eq!(message, "you are already registered");
    }

    #[tokio::test]
    async fn registrations_survive_a_reload() {
        let store = Arc::new(MemoryStore::new());
        {
            let auth = manager(store.clone()).await;
            auth.register("7", "alex", "sesame").await;
        }

        let auth = manager(store).await;
        // Sessions are in-memory only; the registration is not.
        assert!(!auth.is_authenticated("7"));
        let (ok, message) = auth.login("7", "sesame").await;
        assert!(ok);
        assert_eq!(message, "authenticated as 'alex'");
    }

    #[tokio::test]
    async fn login_and_logout_flow() {
        let auth = manager(Arc::new(MemoryStore::new())).await;
        let (ok, _) = auth.login("9", "sesame").await;
        assert!(!ok, "unregistered users cannot log in");

        auth.register("9", "kim", "sesame").await;
        auth.logout("9");
        assert!(!auth.is_authenticated("9"));

        let (ok, _) = auth.login("9", "nope").await;
        assert!(!ok);
        let (ok, _) = auth.login("9", "sesame").await;
        assert!(ok);
        assert_eq!(auth.username("9").as_deref(), Some("kim"));
    }
}
