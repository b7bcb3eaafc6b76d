//! Rate limiter state storage
//!
//! Persists sliding-window/token-bucket limiter state in a pluggable
//! Redis-like key-value store. Storage keys are a one-way hash of the
//! limiter id, optionally namespaced, so raw client-identifying strings
//! (IP addresses and the like) never appear verbatim in the backing
//! store's keyspace. Entries expire with the state they hold, so
//! abandoned limiter windows self-clean without an explicit sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::{Error, Result};

/// Serialized limiter state for one client id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterState {
    /// Raw limiter id (e.g. a client IP); never stored as a key
    pub id: String,
    /// When this window's state stops mattering
    pub expires_at: Option<DateTime<Utc>>,
    /// Opaque serialized limiter state
    pub blob: String,
}

/// Redis-compatible key-value surface (`SET key value [EX seconds]`,
/// `GET key`, `DEL key`)
///
/// The concrete client is an external collaborator behind this trait.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set `key` to `value`, expiring after `ttl_secs` when given
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()>;

    /// Fetch the value at `key`, if present and unexpired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove `key`; removing a nonexistent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory key-value store honoring TTLs, for tests and development
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: tokio::sync::RwLock<HashMap<String, (String, Option<Instant>)>>,
}

impl InMemoryKeyValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        let deadline = ttl_secs.map(|secs| Instant::now() + std::time::Duration::from_secs(secs));
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|(value, deadline)| {
            match deadline {
                Some(deadline) if *deadline <= Instant::now() => None,
                _ => Some(value.clone()),
            }
        }))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}

/// Limiter state persistence over a key-value store
pub struct RateLimiterStorage {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl RateLimiterStorage {
    /// Create an adapter writing under `namespace` (may be empty)
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Derive the storage key for a raw limiter id
    fn key(&self, id: &str) -> String {
        let hash = hex::encode(Sha1::digest(id.as_bytes()));
        if self.namespace.is_empty() {
            hash
        } else {
            format!("{}/{}", self.namespace, hash)
        }
    }

    /// Create or overwrite the state for its id
    ///
    /// The entry's TTL mirrors the state's expiration when present.
    pub async fn save(&self, state: &RateLimiterState) -> Result<()> {
        let key = self.key(&state.id);
        let value = serde_json::to_string(state)
            .map_err(|e| Error::Config(format!("failed to serialize limiter state: {e}")))?;
        let ttl_secs = state
            .expires_at
            .map(|at| (at - Utc::now()).num_seconds().max(0) as u64);
        debug!(%key, ttl = ?ttl_secs, "saving limiter state");
        self.store.set(&key, &value, ttl_secs).await
    }

    /// Fetch the state previously saved for `id`
    pub async fn fetch(&self, id: &str) -> Result<Option<RateLimiterState>> {
        let key = self.key(id);
        match self.store.get(&key).await? {
            Some(value) => {
                let state = serde_json::from_str(&value).map_err(|e| {
                    Error::Config(format!("failed to deserialize limiter state: {e}"))
                })?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Remove the state for `id`; idempotent
    pub async fn delete(&self, id: &str) -> Result<()> {
        let key = self.key(id);
        debug!(%key, "deleting limiter state");
        self.store.delete(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn storage(namespace: &str) -> RateLimiterStorage {
        RateLimiterStorage::new(Arc::new(InMemoryKeyValueStore::new()), namespace)
    }

    fn state(id: &str) -> RateLimiterState {
        RateLimiterState {
            id: id.to_string(),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            blob: "{\"hits\":3}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_then_fetch_round_trips() {
        let storage = storage("limiter");
        let state = state("198.51.100.7");
        storage.save(&state).await.unwrap();
        let fetched = storage.fetch("198.51.100.7").await.unwrap().unwrap();
        assert_eq!(fetched, state);
    }

    #[tokio::test]
    async fn test_delete_then_fetch_returns_none_and_is_idempotent() {
        let storage = storage("limiter");
        storage.save(&state("client")).await.unwrap();
        storage.delete("client").await.unwrap();
        assert!(storage.fetch("client").await.unwrap().is_none());
        // deleting again is not an error
        storage.delete("client").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_are_hashed_and_namespaced() {
        let storage = storage("limiter");
        let key = storage.key("198.51.100.7");
        assert!(key.starts_with("limiter/"));
        assert!(!key.contains("198.51.100.7"));
        // sha1 hex digest after the namespace separator
        let digest = key.strip_prefix("limiter/").unwrap();
        assert_eq!(digest.len(), 40);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_empty_namespace_uses_bare_hash() {
        let storage = storage("");
        let key = storage.key("client");
        assert!(!key.contains('/'));
        assert_eq!(key.len(), 40);
    }

    #[tokio::test]
    async fn test_distinct_ids_use_distinct_keys() {
        let storage = storage("limiter");
        assert_ne!(storage.key("a"), storage.key("b"));
    }

    #[tokio::test]
    async fn test_expired_state_is_not_served() {
        let storage = storage("limiter");
        let state = RateLimiterState {
            id: "client".to_string(),
            expires_at: Some(Utc::now() - Duration::hours(1)),
            blob: String::new(),
        };
        storage.save(&state).await.unwrap();
        assert!(storage.fetch("client").await.unwrap().is_none());
    }
}
