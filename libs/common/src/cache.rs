//! Response cache for the identity services
//!
//! This module defines the [`Cache`] port used by the read-through handlers
//! together with its two adapters: [`RedisPool`] for deployments and
//! [`InMemoryCache`] for tests and single-node runs.
//!
//! Bulk invalidation works on resource families rather than on glob patterns
//! over opaque keys. Every entry is written together with a membership record
//! in its family's key index, and invalidating a family deletes exactly the
//! indexed keys.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};

/// Resource family a cached entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceTag {
    /// User listings and lookups
    Users,
    /// Address listings
    Addresses,
}

impl ResourceTag {
    /// Get the tag name as used in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceTag::Users => "users",
            ResourceTag::Addresses => "addresses",
        }
    }

    fn index_key(&self) -> String {
        format!("cache-index:{}", self.as_str())
    }
}

impl fmt::Display for ResourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key scoped to a resource family
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    tag: ResourceTag,
    key: String,
}

impl CacheKey {
    /// Create a key from an already-normalized identifier
    pub fn new(tag: ResourceTag, raw: impl AsRef<str>) -> Self {
        Self {
            tag,
            key: format!("{}:{}", tag.as_str(), raw.as_ref()),
        }
    }

    /// Derive a key from a request path and its raw query string.
    ///
    /// Query pairs are sorted by name, then value, so two requests that only
    /// differ in parameter order share one entry.
    pub fn from_request(tag: ResourceTag, path: &str, query: Option<&str>) -> Self {
        let mut pairs: Vec<(&str, &str)> = query
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .collect();
        pairs.sort_unstable();

        if pairs.is_empty() {
            return Self::new(tag, path);
        }

        let query = pairs
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");
        Self::new(tag, format!("{}?{}", path, query))
    }

    /// Resource family of this key
    pub fn tag(&self) -> ResourceTag {
        self.tag
    }

    /// Full key as stored in the backend
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Key/value cache with TTL expiry and family-wide invalidation
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a key. Expired entries are reported as a miss.
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<String>>;

    /// Store a value that expires after `ttl`, recording the key in its
    /// family index
    async fn set_with_ttl(&self, key: &CacheKey, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Delete a single entry
    async fn delete(&self, key: &CacheKey) -> CacheResult<()>;

    /// Delete every entry recorded under `tag`, returning how many were live
    async fn delete_by_pattern(&self, tag: ResourceTag) -> CacheResult<u64>;
}

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> CacheResult<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(CacheError::Configuration(format!(
                "REDIS_URL must use the redis:// or rediss:// scheme, got {}",
                url
            )));
        }

        Ok(RedisConfig { url })
    }
}

// Deletes every member of the index set, then the set itself, in one step so
// a concurrent SADD cannot slip between the read and the delete.
const DELETE_INDEXED: &str = r#"
local keys = redis.call('SMEMBERS', KEYS[1])
local removed = 0
for _, key in ipairs(keys) do
    removed = removed + redis.call('DEL', key)
end
redis.call('DEL', KEYS[1])
return removed
"#;

/// Redis-backed cache
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis client
    pub async fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    /// Get a connection from the pool
    async fn get_connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[async_trait]
impl Cache for RedisPool {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key.as_str()).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &CacheKey, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;

        // The index itself never expires; it is emptied on invalidation, and
        // members whose entries already expired are harmless.
        let _: () = redis::pipe()
            .atomic()
            .set_ex(key.as_str(), value, ttl.as_secs().max(1))
            .ignore()
            .sadd(key.tag().index_key(), key.as_str())
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = conn.del(key.as_str()).await?;
        Ok(())
    }

    async fn delete_by_pattern(&self, tag: ResourceTag) -> CacheResult<u64> {
        let mut conn = self.get_connection().await?;
        let removed: u64 = redis::Script::new(DELETE_INDEXED)
            .key(tag.index_key())
            .invoke_async(&mut conn)
            .await?;
        debug!("Invalidated {} cached {} entries", removed, tag);
        Ok(removed)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, (String, Instant)>,
    index: HashMap<ResourceTag, HashSet<String>>,
}

/// Process-local cache with the same semantics as the Redis adapter
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries that have not expired yet
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        let now = Instant::now();
        state
            .entries
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    /// Whether the cache holds no live entry
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<String>> {
        let state = self.state.read().await;
        let value = state
            .entries
            .get(key.as_str())
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone());
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &CacheKey, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut state = self.state.write().await;
        let MemoryState { entries, index } = &mut *state;
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        for keys in index.values_mut() {
            keys.retain(|k| entries.contains_key(k));
        }
        index.retain(|_, keys| !keys.is_empty());

        entries.insert(key.as_str().to_string(), (value.to_string(), now + ttl));
        index
            .entry(key.tag())
            .or_default()
            .insert(key.as_str().to_string());
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        let mut state = self.state.write().await;
        state.entries.remove(key.as_str());
        if let Some(keys) = state.index.get_mut(&key.tag()) {
            keys.remove(key.as_str());
        }
        Ok(())
    }

    async fn delete_by_pattern(&self, tag: ResourceTag) -> CacheResult<u64> {
        let mut state = self.state.write().await;
        let keys = state.index.remove(&tag).unwrap_or_default();
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if let Some((_, expires_at)) = state.entries.remove(&key) {
                if expires_at > now {
                    removed += 1;
                }
            }
        }
        debug!("Invalidated {} cached {} entries", removed, tag);
        Ok(removed)
    }
}
