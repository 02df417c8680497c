//! Cache-aside key/value layer with per-entry TTL
//!
//! Callers always `get` first and recompute+`set` only on absence; the
//! store never refreshes itself. The backend is selected once at startup
//! and fixed for the process lifetime. Any backend failure is treated
//! exactly like a miss; a degraded cache must never fail a request.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::CacheConfig;

/// Storage seam: serialized values with wall-clock TTL. An external
/// shared store plugs in here; the in-process backend below is the
/// default.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;
    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// In-process backend. Expiry is evaluated lazily at read time; an
/// expired entry is removed on read and indistinguishable from a missing
/// key. `ttl_secs = 0` entries are born expired.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if Utc::now() < entry.expires_at => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
            }
        }
        // Expired: drop it lazily.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let expires_at = Utc::now() + Duration::seconds(ttl_secs as i64);
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }
}

/// Typed cache-aside wrapper over the selected backend.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    ttl_secs: u64,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl_secs: u64) -> Self {
        Self { backend, ttl_secs }
    }

    /// Select the backend once at startup. No external store client is
    /// built in; a configured URL falls back to the in-process store.
    pub fn from_config(cfg: &CacheConfig) -> Self {
        if let Some(url) = &cfg.store_url {
            warn!(
                url = %url,
                "External cache store configured but no client is built in; using in-process store"
            );
        }
        Self::new(Arc::new(MemoryBackend::new()), cfg.ttl_secs)
    }

    /// Get a cached value. Absent, expired, unreadable, and failed all
    /// look the same to the caller: `None`, recompute.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get_raw(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key, error = %err, "Cache read failed; treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "Cache entry undecodable; treating as miss");
                None
            }
        }
    }

    /// Store a value under the configured TTL. Failures are logged and
    /// swallowed; the computation that produced `value` already succeeded.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.ttl_secs).await;
    }

    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "Cache value unserializable; skipping write");
                return;
            }
        };
        if let Err(err) = self.backend.set_raw(key, raw, ttl_secs).await {
            warn!(key, error = %err, "Cache write failed; continuing without cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl_secs: u64) -> CacheStore {
        CacheStore::new(Arc::new(MemoryBackend::new()), ttl_secs)
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let cache = store(60);
        cache.set("k", &vec![1u32, 2, 3]).await;
        let got: Option<Vec<u32>> = cache.get("k").await;
        assert_eq!(got, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let cache = store(60);
        let got: Option<String> = cache.get("nope").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn zero_ttl_entry_is_born_expired() {
        let cache = store(0);
        cache.set("k", &"v".to_string()).await;
        let got: Option<String> = cache.get("k").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn expired_entry_is_removed_on_read() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = CacheStore::new(backend.clone(), 0);
        cache.set("k", &"v".to_string()).await;

        let got: Option<String> = cache.get("k").await;
        assert_eq!(got, None);
        assert!(backend.entries.read().await.get("k").is_none());
    }

    #[tokio::test]
    async fn backend_failure_reads_as_miss() {
        struct BrokenBackend;

        #[async_trait]
        impl CacheBackend for BrokenBackend {
            async fn get_raw(&self, _key: &str) -> Result<Option<String>> {
                anyhow::bail!("store unreachable")
            }
            async fn set_raw(&self, _key: &str, _value: String, _ttl: u64) -> Result<()> {
                anyhow::bail!("store unreachable")
            }
        }

        let cache = CacheStore::new(Arc::new(BrokenBackend), 60);
        cache.set("k", &"v".to_string()).await;
        let got: Option<String> = cache.get("k").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn undecodable_entry_reads_as_miss() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .set_raw("k", "not json at all {".to_string(), 60)
            .await
            .unwrap();
        let cache = CacheStore::new(backend, 60);
        let got: Option<Vec<u32>> = cache.get("k").await;
        assert_eq!(got, None);
    }
}
