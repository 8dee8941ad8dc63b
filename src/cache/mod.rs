//! Content-addressed memoization of generation results.
//!
//! Best-effort only: a broken store degrades to calling the backend,
//! never to a caller-visible error.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::StructuredGenerationClient;
use crate::types::{GenerationMeta, GenerationRequest, GenerationResult};

/// Input snippet budget for key derivation; longer snippets hash the
/// same prefix.
const SNIPPET_BUDGET: usize = 2048;

/// Default entry lifetime.
const DEFAULT_TTL_HOURS: i64 = 24;

/// Storage failure. Callers of the cache never see this; it is logged
/// and swallowed.
#[derive(Debug, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

/// Minimal key-value persistence surface for cached entries.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .read()
            .map_err(|e| StoreError(e.to_string()))?
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|e| StoreError(e.to_string()))?
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|e| StoreError(e.to_string()))?
            .remove(key);
        Ok(())
    }
}

/// Identifies what a cached entry was generated for.
#[derive(Debug, Clone)]
pub struct CacheScope {
    pub session_id: String,
    pub concept_id: String,
    /// Representative input excerpt; truncated before hashing.
    pub snippet: String,
}

/// Serialized cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    pub value: serde_json::Value,
    pub stored_at: DateTime<Utc>,
    pub model: Option<String>,
}

/// Stable key over scope plus the prompt-template version. Bumping the
/// version invalidates stale entries without a manual purge.
pub fn derive_key(scope: &CacheScope, prompt_version: &str) -> String {
    let snippet: String = scope.snippet.chars().take(SNIPPET_BUDGET).collect();
    let mut hasher = Sha256::new();
    for part in [
        scope.session_id.as_str(),
        scope.concept_id.as_str(),
        snippet.as_str(),
        prompt_version,
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Decorator memoizing successful generations within a TTL window.
pub struct CachedClient {
    inner: StructuredGenerationClient,
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    prompt_version: String,
}

impl CachedClient {
    pub fn new(
        inner: StructuredGenerationClient,
        store: Arc<dyn KeyValueStore>,
        prompt_version: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            store,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
            prompt_version: prompt_version.into(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The wrapped client, for calls that must bypass the cache.
    pub fn inner(&self) -> &StructuredGenerationClient {
        &self.inner
    }

    /// Serve from cache when a fresh entry exists, else generate and
    /// store the success.
    pub async fn generate_cached(
        &self,
        scope: &CacheScope,
        request: GenerationRequest,
    ) -> GenerationResult {
        let key = derive_key(scope, &self.prompt_version);

        if let Some(entry) = self.lookup(&key) {
            debug!(concept = %scope.concept_id, "cache hit");
            return GenerationResult::Success {
                value: entry.value,
                meta: GenerationMeta {
                    model: entry.model,
                    cache_hit: true,
                    ..Default::default()
                },
            };
        }

        let result = self.inner.generate(request).await;
        if let GenerationResult::Success { value, meta } = &result {
            self.store_entry(&key, value, meta);
        }
        result
    }

    fn lookup(&self, key: &str) -> Option<CachedEntry> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "cache read failed");
                return None;
            }
        };

        let entry: CachedEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "evicting unreadable cache entry");
                self.evict(key);
                return None;
            }
        };

        if Utc::now() - entry.stored_at > self.ttl {
            debug!("evicting stale cache entry");
            self.evict(key);
            return None;
        }

        Some(entry)
    }

    fn evict(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(error = %e, "cache eviction failed");
        }
    }

    fn store_entry(&self, key: &str, value: &serde_json::Value, meta: &GenerationMeta) {
        let entry = CachedEntry {
            value: value.clone(),
            stored_at: Utc::now(),
            model: meta.model.clone(),
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "cache entry serialization failed");
                return;
            }
        };
        if let Err(e) = self.store.set(key, raw) {
            warn!(error = %e, "cache write failed");
        }
    }
}
